//! Routing graph: sources, sinks and the resolver.
//!
//! Each sink is described once in [`SINKS`], indexed by [`Sink`]. A
//! multiplexed sink carries at most one source, chosen by a fixed
//! precedence; a mixer sink sums any subset of its inputs. The resolved
//! [`RoutingGraph`] is stored nowhere but the selector and mixer registers:
//! [`RoutingGraph::decode`] reads it back from the shadow cache.

use crate::cache::ShadowCache;
use crate::config::InitConfig;
use crate::error::{ArgumentError, Error, Result};
use crate::power::{AdcFrontEnd, Amps, DigitalDomains, MicBias, PowerState};
use crate::regmap::{Bank, RegAddr};
use crate::registers::ANA_MIX_BASE;

/// A signal producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Source {
    /// Digital IO port 0 receive.
    Dio0In,
    /// Digital IO port 1 receive.
    Dio1In,
    /// Digital IO port 2 receive.
    Dio2In,
    /// ADC capture.
    Adc,
    /// PDM microphone capture.
    Pdm,
    /// Audio engine output.
    Engine,
    /// DAC left channel.
    DacL,
    /// DAC right channel.
    DacR,
    /// Line input left.
    LineInL,
    /// Line input right.
    LineInR,
    /// Microphone 1.
    Mic1,
    /// Microphone 2.
    Mic2,
    /// Microphone 3.
    Mic3,
}

impl Source {
    /// Number of sources.
    pub const COUNT: usize = 13;

    /// All sources in index order.
    pub const ALL: [Source; Self::COUNT] = [
        Source::Dio0In,
        Source::Dio1In,
        Source::Dio2In,
        Source::Adc,
        Source::Pdm,
        Source::Engine,
        Source::DacL,
        Source::DacR,
        Source::LineInL,
        Source::LineInR,
        Source::Mic1,
        Source::Mic2,
        Source::Mic3,
    ];

    #[allow(clippy::arithmetic_side_effects)] // discriminant < 16
    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// A signal consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Sink {
    /// Digital IO port 0 transmit.
    Dio0Out,
    /// Digital IO port 1 transmit.
    Dio1Out,
    /// Digital IO port 2 transmit.
    Dio2Out,
    /// DAC input.
    Dac,
    /// Audio engine input.
    EngineIn,
    /// ADC left mixer.
    AdcL,
    /// ADC right mixer.
    AdcR,
    /// Headphone left mixer.
    HpL,
    /// Headphone right mixer.
    HpR,
    /// Speaker mixer.
    Sp,
    /// Receiver mixer.
    Rc,
    /// Line out 1 left mixer.
    Lo1L,
    /// Line out 1 right mixer.
    Lo1R,
    /// Line out 2 left mixer.
    Lo2L,
    /// Line out 2 right mixer.
    Lo2R,
}

impl Sink {
    /// Number of sinks.
    pub const COUNT: usize = 15;

    /// All sinks in index order.
    pub const ALL: [Sink; Self::COUNT] = [
        Sink::Dio0Out,
        Sink::Dio1Out,
        Sink::Dio2Out,
        Sink::Dac,
        Sink::EngineIn,
        Sink::AdcL,
        Sink::AdcR,
        Sink::HpL,
        Sink::HpR,
        Sink::Sp,
        Sink::Rc,
        Sink::Lo1L,
        Sink::Lo1R,
        Sink::Lo2L,
        Sink::Lo2R,
    ];

    /// Descriptor of this sink.
    #[allow(clippy::indexing_slicing)] // SINKS has one entry per discriminant
    pub fn desc(self) -> &'static SinkDesc {
        &SINKS[self as usize]
    }
}

/// Request state of one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeState {
    /// Keep whatever the graph has now.
    #[default]
    Unset,
    /// Connect.
    On,
    /// Disconnect.
    Off,
}

/// How a sink combines its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// One source at a time; earlier entries win.
    Multiplexed {
        /// Allowed sources, highest precedence first.
        precedence: &'static [Source],
    },
    /// Any subset; register bit `i` enables `inputs[i]`.
    Mixer {
        /// Allowed sources in register bit order.
        inputs: &'static [Source],
    },
}

/// Static description of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkDesc {
    /// The sink.
    pub sink: Sink,
    /// Combination rule.
    pub kind: SinkKind,
    /// Selector or mixer register.
    pub reg: RegAddr,
    /// Sources this sink produces. A sink that produces something is only
    /// kept when one of them is consumed elsewhere.
    pub feeds: &'static [Source],
}

impl SinkDesc {
    /// Sources the sink can take.
    pub fn inputs(&self) -> &'static [Source] {
        match self.kind {
            SinkKind::Multiplexed { precedence } => precedence,
            SinkKind::Mixer { inputs } => inputs,
        }
    }

    fn accepts(&self, source: Source) -> bool {
        self.inputs().contains(&source)
    }
}

/// Selector code `n + 1` selects `MUX_CODES[n]`; `0` selects nothing.
pub const MUX_CODES: [Source; 6] = [
    Source::Dio0In,
    Source::Dio1In,
    Source::Dio2In,
    Source::Adc,
    Source::Pdm,
    Source::Engine,
];

const MUX_OUT: &[Source] = &[
    Source::Engine,
    Source::Dio0In,
    Source::Dio1In,
    Source::Dio2In,
    Source::Adc,
    Source::Pdm,
];
const MUX_ENGINE: &[Source] = &[
    Source::Dio0In,
    Source::Dio1In,
    Source::Dio2In,
    Source::Adc,
    Source::Pdm,
];
const MIX_ADC: &[Source] = &[
    Source::Mic1,
    Source::Mic2,
    Source::Mic3,
    Source::LineInL,
    Source::LineInR,
];
const MIX_OUT: &[Source] = &[
    Source::DacL,
    Source::DacR,
    Source::LineInL,
    Source::LineInR,
    Source::Mic1,
    Source::Mic2,
    Source::Mic3,
];

#[allow(clippy::arithmetic_side_effects)] // const table construction
const fn mixer(sink: Sink, inputs: &'static [Source], feeds: &'static [Source]) -> SinkDesc {
    SinkDesc {
        sink,
        kind: SinkKind::Mixer { inputs },
        reg: RegAddr::new(Bank::Ana, ANA_MIX_BASE + (sink as u8 - Sink::AdcL as u8)),
        feeds,
    }
}

const fn mux(
    sink: Sink,
    precedence: &'static [Source],
    offset: u8,
    feeds: &'static [Source],
) -> SinkDesc {
    SinkDesc {
        sink,
        kind: SinkKind::Multiplexed { precedence },
        reg: RegAddr::new(Bank::Ma, offset),
        feeds,
    }
}

/// Sink arena, indexed by [`Sink`].
pub static SINKS: [SinkDesc; Sink::COUNT] = [
    mux(Sink::Dio0Out, MUX_OUT, 0x00, &[]),
    mux(Sink::Dio1Out, MUX_OUT, 0x01, &[]),
    mux(Sink::Dio2Out, MUX_OUT, 0x02, &[]),
    mux(Sink::Dac, MUX_OUT, 0x03, &[Source::DacL, Source::DacR]),
    mux(Sink::EngineIn, MUX_ENGINE, 0x04, &[Source::Engine]),
    mixer(Sink::AdcL, MIX_ADC, &[Source::Adc]),
    mixer(Sink::AdcR, MIX_ADC, &[Source::Adc]),
    mixer(Sink::HpL, MIX_OUT, &[]),
    mixer(Sink::HpR, MIX_OUT, &[]),
    mixer(Sink::Sp, MIX_OUT, &[]),
    mixer(Sink::Rc, MIX_OUT, &[]),
    mixer(Sink::Lo1L, MIX_OUT, &[]),
    mixer(Sink::Lo1R, MIX_OUT, &[]),
    mixer(Sink::Lo2L, MIX_OUT, &[]),
    mixer(Sink::Lo2R, MIX_OUT, &[]),
];

/// A partial routing change: per-edge [`EdgeState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathRequest {
    edges: [[EdgeState; Source::COUNT]; Sink::COUNT],
}

impl PathRequest {
    /// A request that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// A request that turns every wired edge off.
    pub fn all_off() -> Self {
        let mut req = Self::new();
        for desc in &SINKS {
            for &source in desc.inputs() {
                req.set(desc.sink, source, EdgeState::Off);
            }
        }
        req
    }

    /// The request matching an existing graph exactly.
    pub fn from_graph(graph: &RoutingGraph) -> Self {
        let mut req = Self::all_off();
        for sink in Sink::ALL {
            for source in Source::ALL {
                if graph.is_on(sink, source) {
                    req.set(sink, source, EdgeState::On);
                }
            }
        }
        req
    }

    /// Set one edge.
    pub fn set(&mut self, sink: Sink, source: Source, state: EdgeState) -> &mut Self {
        if let Some(e) = self
            .edges
            .get_mut(sink as usize)
            .and_then(|row| row.get_mut(source as usize))
        {
            *e = state;
        }
        self
    }

    /// Connect `source` to `sink`.
    pub fn on(&mut self, sink: Sink, source: Source) -> &mut Self {
        self.set(sink, source, EdgeState::On)
    }

    /// Disconnect `source` from `sink`.
    pub fn off(&mut self, sink: Sink, source: Source) -> &mut Self {
        self.set(sink, source, EdgeState::Off)
    }

    /// Requested state of one edge.
    pub fn get(&self, sink: Sink, source: Source) -> EdgeState {
        self.edges
            .get(sink as usize)
            .and_then(|row| row.get(source as usize))
            .copied()
            .unwrap_or_default()
    }
}

/// A resolved graph: for every sink, the set of connected sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoutingGraph {
    active: [u16; Sink::COUNT],
}

impl RoutingGraph {
    /// Nothing connected.
    pub const EMPTY: Self = Self {
        active: [0; Sink::COUNT],
    };

    /// Whether nothing is connected.
    pub fn is_empty(&self) -> bool {
        self.active.iter().all(|&m| m == 0)
    }

    /// Whether `source` feeds `sink`.
    pub fn is_on(&self, sink: Sink, source: Source) -> bool {
        self.mask(sink) & source.bit() != 0
    }

    /// Whether `sink` has any input.
    pub fn sink_active(&self, sink: Sink) -> bool {
        self.mask(sink) != 0
    }

    /// Whether any sink takes `source`.
    pub fn source_used(&self, source: Source) -> bool {
        self.active.iter().any(|&m| m & source.bit() != 0)
    }

    /// Connected sources of `sink`, in index order.
    pub fn sources(&self, sink: Sink) -> impl Iterator<Item = Source> + '_ {
        let mask = self.mask(sink);
        Source::ALL
            .into_iter()
            .filter(move |s| mask & s.bit() != 0)
    }

    /// The source a multiplexed sink carries; `None` for idle or mixer
    /// sinks.
    pub fn active_source(&self, sink: Sink) -> Option<Source> {
        match sink.desc().kind {
            SinkKind::Multiplexed { precedence } => {
                precedence.iter().copied().find(|&s| self.is_on(sink, s))
            }
            SinkKind::Mixer { .. } => None,
        }
    }

    /// Output amplifiers driven by at least one source.
    pub fn active_amps(&self) -> Amps {
        const OUTPUTS: [(Sink, Amps); 8] = [
            (Sink::HpL, Amps::HP_L),
            (Sink::HpR, Amps::HP_R),
            (Sink::Sp, Amps::SP),
            (Sink::Rc, Amps::RC),
            (Sink::Lo1L, Amps::LO1_L),
            (Sink::Lo1R, Amps::LO1_R),
            (Sink::Lo2L, Amps::LO2_L),
            (Sink::Lo2R, Amps::LO2_R),
        ];
        OUTPUTS
            .iter()
            .filter(|(sink, _)| self.sink_active(*sink))
            .fold(Amps::empty(), |acc, (_, amp)| acc | *amp)
    }

    /// Selector and mixer register values for this graph.
    pub fn encode(&self) -> [(RegAddr, u8); Sink::COUNT] {
        let mut out = [(RegAddr::new(Bank::Ma, 0), 0u8); Sink::COUNT];
        for (slot, desc) in out.iter_mut().zip(SINKS.iter()) {
            let value = match desc.kind {
                SinkKind::Multiplexed { .. } => self
                    .active_source(desc.sink)
                    .and_then(|s| MUX_CODES.iter().position(|&c| c == s))
                    .and_then(|i| u8::try_from(i).ok())
                    .map_or(0, |i| i.saturating_add(1)),
                SinkKind::Mixer { inputs } => inputs
                    .iter()
                    .zip(0u32..)
                    .filter(|(s, _)| self.is_on(desc.sink, **s))
                    .fold(0u8, |acc, (_, bit)| acc | 1u8.wrapping_shl(bit)),
            };
            *slot = (desc.reg, value);
        }
        out
    }

    /// Read the graph back from selector and mixer registers.
    pub fn decode(cache: &ShadowCache) -> Self {
        let mut graph = Self::EMPTY;
        for desc in &SINKS {
            let value = cache.value(desc.reg);
            match desc.kind {
                SinkKind::Multiplexed { precedence } => {
                    let selected = usize::from(value)
                        .checked_sub(1)
                        .and_then(|i| MUX_CODES.get(i))
                        .filter(|s| precedence.contains(s));
                    if let Some(&s) = selected {
                        graph.connect(desc.sink, s);
                    }
                }
                SinkKind::Mixer { inputs } => {
                    for (&s, bit) in inputs.iter().zip(0u32..) {
                        if value & 1u8.wrapping_shl(bit) != 0 {
                            graph.connect(desc.sink, s);
                        }
                    }
                }
            }
        }
        graph
    }

    /// Power domains this graph needs.
    pub fn required_power(&self, config: &InitConfig) -> PowerState {
        let mut p = PowerState::OFF;
        if self.is_empty() {
            return p;
        }
        p.digital |= DigitalDomains::MIXER;
        p.amps = self.active_amps();
        for sink in [Sink::Dio0Out, Sink::Dio1Out, Sink::Dio2Out, Sink::Dac, Sink::EngineIn] {
            if let Some(source) = self.active_source(sink) {
                p.digital |= sink_block(sink) | source_block(source);
            }
        }
        for desc in SINKS.iter().filter(|d| matches!(d.kind, SinkKind::Mixer { .. })) {
            if !self.sink_active(desc.sink) {
                continue;
            }
            match desc.sink {
                Sink::AdcL => p.adc |= AdcFrontEnd::ADC_L,
                Sink::AdcR => p.adc |= AdcFrontEnd::ADC_R,
                _ => {}
            }
            for source in self.sources(desc.sink) {
                match source {
                    Source::DacL | Source::DacR => p.digital |= DigitalDomains::DAC,
                    Source::LineInL | Source::LineInR => p.adc |= AdcFrontEnd::LINE,
                    Source::Mic1 => mic(&mut p, config, 0, AdcFrontEnd::MIC1, MicBias::MB1),
                    Source::Mic2 => mic(&mut p, config, 1, AdcFrontEnd::MIC2, MicBias::MB2),
                    Source::Mic3 => mic(&mut p, config, 2, AdcFrontEnd::MIC3, MicBias::MB3),
                    _ => {}
                }
            }
        }
        p
    }

    fn mask(&self, sink: Sink) -> u16 {
        self.active.get(sink as usize).copied().unwrap_or(0)
    }

    fn connect(&mut self, sink: Sink, source: Source) {
        if let Some(m) = self.active.get_mut(sink as usize) {
            *m |= source.bit();
        }
    }

    fn disconnect(&mut self, sink: Sink, source: Source) {
        if let Some(m) = self.active.get_mut(sink as usize) {
            *m &= !source.bit();
        }
    }

    fn clear(&mut self, sink: Sink) {
        if let Some(m) = self.active.get_mut(sink as usize) {
            *m = 0;
        }
    }
}

fn mic(p: &mut PowerState, config: &InitConfig, index: usize, pre: AdcFrontEnd, bias: MicBias) {
    p.adc |= pre;
    if config.mic_bias.get(index).copied().unwrap_or(false) {
        p.mic_bias |= bias;
    }
}

fn sink_block(sink: Sink) -> DigitalDomains {
    match sink {
        Sink::Dio0Out => DigitalDomains::DIO0,
        Sink::Dio1Out => DigitalDomains::DIO1,
        Sink::Dio2Out => DigitalDomains::DIO2,
        Sink::Dac => DigitalDomains::DAC,
        Sink::EngineIn => DigitalDomains::ENGINE,
        _ => DigitalDomains::empty(),
    }
}

fn source_block(source: Source) -> DigitalDomains {
    match source {
        Source::Dio0In => DigitalDomains::DIO0,
        Source::Dio1In => DigitalDomains::DIO1,
        Source::Dio2In => DigitalDomains::DIO2,
        Source::Adc => DigitalDomains::ADC,
        Source::Pdm => DigitalDomains::PDM,
        Source::Engine => DigitalDomains::ENGINE,
        _ => DigitalDomains::empty(),
    }
}

/// Apply `request` on top of `current` and resolve the result.
///
/// Pure: the same inputs always give the same graph, and resolving a
/// resolved graph again under the same request changes nothing. A single
/// pass can expose a requested edge that a carried edge was hiding (the
/// carried winner gets swept), so passes repeat until the graph settles.
pub fn resolve(request: &PathRequest, current: &RoutingGraph) -> Result<RoutingGraph> {
    let mut graph = resolve_pass(request, current)?;
    for _ in 0..Sink::COUNT {
        let next = resolve_pass(request, &graph)?;
        if next == graph {
            return Ok(graph);
        }
        graph = next;
    }
    tracing::warn!("routing did not settle");
    Err(Error::Internal)
}

fn resolve_pass(request: &PathRequest, current: &RoutingGraph) -> Result<RoutingGraph> {
    let mut graph = *current;

    // Explicit edges overwrite; Unset keeps the prior state.
    for desc in &SINKS {
        for source in Source::ALL {
            let state = request.get(desc.sink, source);
            if state == EdgeState::Unset {
                continue;
            }
            if !desc.accepts(source) {
                return Err(ArgumentError::EdgeNotWired {
                    sink: desc.sink,
                    input: source,
                }
                .into());
            }
            match state {
                EdgeState::On => graph.connect(desc.sink, source),
                EdgeState::Off => graph.disconnect(desc.sink, source),
                EdgeState::Unset => {}
            }
        }
    }

    // Multiplexed sinks keep only their highest-precedence source.
    for desc in &SINKS {
        if let SinkKind::Multiplexed { .. } = desc.kind {
            if let Some(winner) = graph.active_source(desc.sink) {
                graph.clear(desc.sink);
                graph.connect(desc.sink, winner);
            }
        }
    }

    // Drop producing sinks whose output nobody consumes, until stable.
    loop {
        let mut changed = false;
        for desc in SINKS.iter().filter(|d| !d.feeds.is_empty()) {
            if !graph.sink_active(desc.sink) {
                continue;
            }
            let consumed = SINKS.iter().any(|other| {
                other.sink != desc.sink
                    && desc.feeds.iter().any(|&f| graph.is_on(other.sink, f))
            });
            if !consumed {
                graph.clear(desc.sink);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    // Only edges that survived the sweep carry signal.
    if graph.source_used(Source::Adc) && graph.source_used(Source::Pdm) {
        return Err(Error::Argument(ArgumentError::RoutingExclusive));
    }
    Ok(graph)
}
