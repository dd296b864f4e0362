//! Property-based tests for the routing resolver.
//! Verifies invariants hold for ALL wired requests, not just fixed examples.

#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)]

use codec::routing::{SinkKind, SINKS};
use codec::sim::DeviceModel;
use codec::{
    resolve, ArgumentError, EdgeState, Error, Executor, PathRequest, RoutingGraph, Sink, Source,
    WriteMode,
};
use platform::mocks::MockDelay;
use proptest::prelude::*;

/// Build a request from random (sink, source, on) triples, keeping only
/// edges the sink is wired for.
fn wired_request(edges: &[(usize, usize, bool)]) -> PathRequest {
    let mut req = PathRequest::new();
    for &(sink, source, on) in edges {
        let sink = Sink::ALL[sink];
        let source = Source::ALL[source];
        if sink.desc().inputs().contains(&source) {
            let state = if on { EdgeState::On } else { EdgeState::Off };
            req.set(sink, source, state);
        }
    }
    req
}

fn edges() -> impl Strategy<Value = Vec<(usize, usize, bool)>> {
    prop::collection::vec((0..Sink::COUNT, 0..Source::COUNT, any::<bool>()), 0..24)
}

#[test]
fn adc_and_pdm_capture_are_mutually_exclusive() {
    let mut req = PathRequest::new();
    req.on(Sink::AdcL, Source::Mic1)
        .on(Sink::Dio0Out, Source::Adc)
        .on(Sink::Dio1Out, Source::Pdm);
    assert_eq!(
        resolve(&req, &RoutingGraph::EMPTY),
        Err(Error::Argument(ArgumentError::RoutingExclusive))
    );
}

#[test]
fn switching_capture_source_in_one_request_is_allowed() {
    let mut req = PathRequest::new();
    req.on(Sink::AdcL, Source::Mic1).on(Sink::Dio0Out, Source::Adc);
    let adc = resolve(&req, &RoutingGraph::EMPTY).unwrap();

    let mut swap = PathRequest::new();
    swap.off(Sink::Dio0Out, Source::Adc)
        .on(Sink::Dio0Out, Source::Pdm);
    let pdm = resolve(&swap, &adc).unwrap();
    assert_eq!(pdm.active_source(Sink::Dio0Out), Some(Source::Pdm));
    assert!(!pdm.source_used(Source::Adc));
    assert!(!pdm.sink_active(Sink::AdcL));
}

#[test]
fn unwired_edge_names_the_sink_and_input() {
    let mut req = PathRequest::new();
    req.on(Sink::HpL, Source::Pdm);
    assert_eq!(
        resolve(&req, &RoutingGraph::EMPTY),
        Err(Error::Argument(ArgumentError::EdgeNotWired {
            sink: Sink::HpL,
            input: Source::Pdm,
        }))
    );
}

#[test]
fn hidden_request_edge_does_not_resurface_on_the_next_pass() {
    // DIO0 feeds the DAC into the left headphone.
    let mut base = PathRequest::new();
    base.on(Sink::Dac, Source::Dio0In).on(Sink::HpL, Source::DacL);
    let g = resolve(&base, &RoutingGraph::EMPTY).unwrap();

    // The ADC request loses to DIO0 on the DAC mux, then the DAC loses its
    // only consumer. Resolving again must not bring the ADC edge back.
    let mut req = PathRequest::new();
    req.on(Sink::Dac, Source::Adc)
        .off(Sink::HpL, Source::DacL)
        .on(Sink::Dio1Out, Source::Pdm);
    let once = resolve(&req, &g).unwrap();
    assert!(!once.sink_active(Sink::Dac));
    assert_eq!(once.active_source(Sink::Dio1Out), Some(Source::Pdm));
    assert_eq!(resolve(&req, &once), Ok(once));
}

proptest! {
    /// The same request applied twice lands on the same graph.
    #[test]
    fn repeating_a_request_is_idempotent(f in edges(), e in edges()) {
        let Ok(g) = resolve(&wired_request(&f), &RoutingGraph::EMPTY) else {
            return Ok(());
        };
        let req = wired_request(&e);
        if let Ok(once) = resolve(&req, &g) {
            prop_assert_eq!(resolve(&req, &once), Ok(once));
        }
    }

    /// Resolving a resolved graph again changes nothing.
    #[test]
    fn resolve_is_idempotent(e in edges()) {
        if let Ok(g) = resolve(&wired_request(&e), &RoutingGraph::EMPTY) {
            prop_assert_eq!(resolve(&PathRequest::new(), &g).unwrap(), g);
            prop_assert_eq!(
                resolve(&PathRequest::from_graph(&g), &RoutingGraph::EMPTY).unwrap(),
                g
            );
        }
    }

    /// Multiplexed sinks never carry more than one source.
    #[test]
    fn multiplexed_sinks_carry_at_most_one_source(e in edges(), f in edges()) {
        let Ok(first) = resolve(&wired_request(&e), &RoutingGraph::EMPTY) else {
            return Ok(());
        };
        if let Ok(g) = resolve(&wired_request(&f), &first) {
            for desc in SINKS.iter() {
                if let SinkKind::Multiplexed { .. } = desc.kind {
                    prop_assert!(g.sources(desc.sink).count() <= 1);
                }
            }
        }
    }

    /// ADC and PDM capture are never both in use.
    #[test]
    fn adc_and_pdm_never_both_used(e in edges()) {
        if let Ok(g) = resolve(&wired_request(&e), &RoutingGraph::EMPTY) {
            prop_assert!(!(g.source_used(Source::Adc) && g.source_used(Source::Pdm)));
        }
    }

    /// The register encoding reads back as the same graph.
    #[test]
    fn encoding_reads_back(e in edges()) {
        if let Ok(g) = resolve(&wired_request(&e), &RoutingGraph::EMPTY) {
            let mut exec = Executor::new(DeviceModel::default(), MockDelay::new());
            exec.allocate().unwrap();
            for (reg, value) in g.encode() {
                exec.enqueue_write(reg, value, WriteMode::Normal).unwrap();
            }
            exec.flush().unwrap();
            prop_assert_eq!(RoutingGraph::decode(exec.cache()), g);
        }
    }
}
