//! Session tests against the register-level device model: lifecycle,
//! power sequencing through `set_path`, abort behaviour and settings.

#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::arithmetic_side_effects)]

use codec::packet::WaitEvent;
use codec::power::{Amps, DigitalDomains};
use codec::regmap::Access;
use codec::registers::{A_PD_CLK, E_CTRL, IF_STATUS, MB_SRC_OWNER};
use codec::sim::DeviceModel;
use codec::{
    AudioEngine, Bank, Codec, DioPort, DioSettings, Error, InitConfig, PathRequest, PowerMode,
    PowerState, RegAddr, RoutingGraph, SettleTimes, Sink, Source,
};
use platform::mocks::{MockDelay, MockHooks};

type TestCodec = Codec<DeviceModel, MockDelay, MockHooks>;

fn codec() -> TestCodec {
    Codec::with_hooks(DeviceModel::default(), MockDelay::new(), MockHooks::new())
}

fn ready(config: InitConfig) -> TestCodec {
    let mut c = codec();
    c.initialize(config).unwrap();
    c
}

fn playback() -> PathRequest {
    let mut req = PathRequest::new();
    req.on(Sink::Dac, Source::Dio0In)
        .on(Sink::HpL, Source::DacL)
        .on(Sink::HpR, Source::DacR);
    req
}

fn assert_cache_matches_device(c: &TestCodec) {
    for bank in Bank::ALL {
        for (offset, info) in bank.table().iter().enumerate() {
            if !info.exists() || info.access.intersects(Access::VOLATILE | Access::WINDOW) {
                continue;
            }
            let reg = RegAddr::new(bank, u8::try_from(offset).unwrap());
            assert_eq!(c.cache().value(reg), c.bus().register(reg), "{reg:?}");
        }
    }
}

#[test]
fn initialize_then_terminate_depowers_everything() {
    let mut c = ready(InitConfig {
        hold_clocks: true,
        ..InitConfig::default()
    });
    assert!(PowerState::decode(c.cache())
        .digital
        .contains(DigitalDomains::CLOCKS));
    c.set_path(&playback()).unwrap();
    assert_eq!(PowerState::decode(c.cache()).amps, Amps::HP);

    c.terminate().unwrap();
    assert!(!c.is_initialized());
    assert!(PowerState::decode(c.cache()).is_off());
    assert!(RoutingGraph::decode(c.cache()).is_empty());
    assert_cache_matches_device(&c);
    assert_eq!(c.hooks().setup_count, 1);
    assert_eq!(c.hooks().teardown_count, 1);
}

#[test]
fn playback_path_powers_exactly_what_it_needs() {
    let mut c = ready(InitConfig::default());
    c.set_path(&playback()).unwrap();
    let power = PowerState::decode(c.cache());
    assert!(power.digital.contains(
        DigitalDomains::CLOCKS | DigitalDomains::DAC | DigitalDomains::DIO0 | DigitalDomains::MIXER
    ));
    assert!(!power.digital.contains(DigitalDomains::ADC));
    assert_eq!(power.amps, Amps::HP);
    assert!(!power.charge_pump.is_empty());
    assert!(power.mic_bias.is_empty());
    assert_eq!(c.active_source(Sink::Dac), Ok(Some(Source::Dio0In)));
    assert_cache_matches_device(&c);
}

#[test]
fn repeating_a_path_emits_nothing() {
    let mut c = ready(InitConfig::default());
    c.set_path(&playback()).unwrap();
    let writes = c.bus().write_count();
    c.set_path(&playback()).unwrap();
    assert_eq!(c.bus().write_count(), writes);
}

#[test]
fn repeating_a_request_with_a_hidden_edge_emits_nothing() {
    let mut c = ready(InitConfig::default());
    let mut base = PathRequest::new();
    base.on(Sink::Dac, Source::Dio0In).on(Sink::HpL, Source::DacL);
    c.set_path(&base).unwrap();

    let mut req = PathRequest::new();
    req.on(Sink::Dac, Source::Adc)
        .off(Sink::HpL, Source::DacL)
        .on(Sink::Dio1Out, Source::Pdm);
    c.set_path(&req).unwrap();
    let graph = c.path().unwrap();
    let writes = c.bus().write_count();
    c.set_path(&req).unwrap();
    assert_eq!(c.bus().write_count(), writes);
    assert_eq!(c.path().unwrap(), graph);
    assert_cache_matches_device(&c);
}

#[test]
fn clearing_the_path_returns_to_idle() {
    let mut c = ready(InitConfig::default());
    c.set_path(&playback()).unwrap();
    c.set_path(&PathRequest::all_off()).unwrap();
    assert!(c.path().unwrap().is_empty());
    assert!(PowerState::decode(c.cache()).is_off());
    assert_cache_matches_device(&c);
}

#[test]
fn manual_mode_waits_on_the_clock_not_on_flags() {
    let mut c = ready(InitConfig {
        power_mode: PowerMode::Manual,
        ..InitConfig::default()
    });
    let before = c.delay().elapsed_us();
    c.set_path(&playback()).unwrap();
    // PLL, reference, charge pump and headphone settle one after another.
    let s = SettleTimes::default();
    let serial = u64::from(s.pll + s.reference + s.charge_pump + s.headphone);
    assert!(c.delay().elapsed_us() - before >= serial);
}

#[test]
fn timeout_aborts_and_keeps_the_cache_truthful() {
    let mut c = ready(InitConfig::default());
    c.bus_mut().set_status(IF_STATUS, 0x00);
    assert_eq!(
        c.set_path(&playback()),
        Err(Error::Timeout(WaitEvent::PLL_LOCK))
    );
    assert_cache_matches_device(&c);
    // The PLL was switched on before the wait; the cache knows.
    assert_ne!(c.cache().value(A_PD_CLK), 0x07);

    // The packet buffer was released: the session is usable again.
    c.bus_mut().set_status(IF_STATUS, 0x07);
    c.set_path(&playback()).unwrap();
    assert_eq!(PowerState::decode(c.cache()).amps, Amps::HP);
    assert_cache_matches_device(&c);
}

#[test]
fn bus_failure_mid_sequence_keeps_the_cache_truthful() {
    let mut c = ready(InitConfig::default());
    c.bus_mut().fail_after(2);
    assert!(matches!(c.set_path(&playback()), Err(Error::Bus(_))));
    assert_cache_matches_device(&c);
    c.bus_mut().heal();
    c.set_path(&playback()).unwrap();
    assert_cache_matches_device(&c);
}

#[test]
fn state_errors_outside_a_session() {
    let mut c = codec();
    assert_eq!(c.set_path(&playback()), Err(Error::State));
    assert_eq!(c.volume(), Err(Error::State));
    c.initialize(InitConfig::default()).unwrap();
    c.terminate().unwrap();
    assert_eq!(c.set_path(&playback()), Err(Error::State));
    assert_eq!(c.terminate(), Err(Error::State));
}

#[test]
fn exclusive_capture_request_changes_nothing() {
    let mut c = ready(InitConfig::default());
    let writes = c.bus().write_count();
    let mut req = PathRequest::new();
    req.on(Sink::AdcL, Source::Mic1)
        .on(Sink::Dio0Out, Source::Adc)
        .on(Sink::Dio1Out, Source::Pdm);
    assert!(matches!(c.set_path(&req), Err(Error::Argument(_))));
    assert_eq!(c.bus().write_count(), writes);
}

#[test]
fn src_goes_to_the_lowest_requesting_port() {
    let mut c = ready(InitConfig::default());
    let with_src = DioSettings {
        src: true,
        ..DioSettings::default()
    };
    c.set_digital_io(DioPort::Dio2, &with_src).unwrap();
    assert_eq!(c.bus().register(MB_SRC_OWNER), 3);
    c.set_digital_io(DioPort::Dio1, &with_src).unwrap();
    assert_eq!(c.bus().register(MB_SRC_OWNER), 2);
    c.set_digital_io(DioPort::Dio1, &DioSettings::default())
        .unwrap();
    assert_eq!(c.bus().register(MB_SRC_OWNER), 3);
    assert!(c.digital_io(DioPort::Dio2).unwrap().src);
    assert!(!c.digital_io(DioPort::Dio1).unwrap().src);
}

#[test]
fn eq_reload_stops_the_running_equalizer_first() {
    let mut c = ready(InitConfig::default());
    let mut req = PathRequest::new();
    req.on(Sink::EngineIn, Source::Dio0In)
        .on(Sink::Dio1Out, Source::Engine);
    c.set_path(&req).unwrap();
    let on = AudioEngine {
        eq: true,
        ..AudioEngine::default()
    };
    c.set_audio_engine(&on).unwrap();
    c.bus_mut().clear_log();

    let mut retuned = on;
    retuned.eq_coefficients[0] = 0x11;
    retuned.eq_coefficients[1] = 0x22;
    c.set_audio_engine(&retuned).unwrap();

    let log: Vec<_> = c.bus().transfers().map(|t| t.bytes.to_vec()).collect();
    // E window: address port 0x08, data port 0x09.
    assert_eq!(log.first().unwrap(), &vec![0x10, 0x00, 0x12, 0x00]);
    assert_eq!(c.bus().register(E_CTRL), 0x01);
    assert_eq!(c.audio_engine().unwrap(), retuned);
    assert_cache_matches_device(&c);
}
