//! Volume programming through a session: activity gating, the stereo
//! latch and write elimination.

#![allow(clippy::unwrap_used)]
#![allow(clippy::arithmetic_side_effects)]

use codec::power::Amps;
use codec::registers::ANA_PD_AMP;
use codec::sim::DeviceModel;
use codec::volume::LATCH;
use codec::{
    Codec, Decibel, Error, InitConfig, PathRequest, PowerState, Sink, Source, VolumeRequest,
    VolumeTarget,
};
use platform::config::DEFAULT_ANALOG_ADDR;
use platform::mocks::MockDelay;

type TestCodec = Codec<DeviceModel, MockDelay>;

const HP: VolumeTarget = VolumeTarget::Headphone;

fn ready() -> TestCodec {
    let mut c = Codec::new(DeviceModel::default(), MockDelay::new());
    c.initialize(InitConfig::default()).unwrap();
    c
}

fn playback() -> PathRequest {
    let mut req = PathRequest::new();
    req.on(Sink::Dac, Source::Dio0In)
        .on(Sink::HpL, Source::DacL)
        .on(Sink::HpR, Source::DacR);
    req
}

/// Select byte for a register, with the burst flag in bit 0.
fn select(reg: u8, burst: bool) -> u8 {
    (reg << 1) | u8::from(burst)
}

fn hp_code(db: i16) -> u8 {
    HP.class().convert(Decibel::from_db(db))
}

/// Transfers to the analog slave that touch the headphone pair.
fn headphone_writes(c: &TestCodec) -> Vec<Vec<u8>> {
    let (left, _) = HP.regs();
    c.bus()
        .transfers()
        .filter(|t| t.addr == DEFAULT_ANALOG_ADDR)
        .filter(|t| {
            t.bytes
                .first()
                .is_some_and(|&s| s >> 1 == left.offset || s >> 1 == left.offset + 1)
        })
        .map(|t| t.bytes.to_vec())
        .collect()
}

/// Direct analog register writes in bus order, as (offset, value).
fn analog_writes(c: &TestCodec) -> Vec<(u8, u8)> {
    let mut out = Vec::new();
    for t in c.bus().transfers().filter(|t| t.addr == DEFAULT_ANALOG_ADDR) {
        let mut rest: &[u8] = &t.bytes;
        while let Some((&sel, tail)) = rest.split_first() {
            let reg = sel >> 1;
            if sel & 1 == 0 {
                let Some((&value, tail)) = tail.split_first() else {
                    break;
                };
                out.push((reg, value));
                rest = tail;
            } else {
                for (i, &value) in tail.iter().enumerate() {
                    out.push((reg + i as u8, value));
                }
                break;
            }
        }
    }
    out
}

#[test]
fn volume_without_a_path_is_stored_but_muted() {
    let mut c = ready();
    let writes = c.bus().write_count();
    let mut req = VolumeRequest::new();
    req.both(HP, Decibel::from_db(-10));
    c.set_volume(&req).unwrap();

    assert_eq!(c.volume().unwrap().get(HP), [Decibel::from_db(-10); 2]);
    assert_eq!(c.bus().write_count(), writes);
    let (left, right) = HP.regs();
    assert_eq!(c.bus().register(left), 0);
    assert_eq!(c.bus().register(right.unwrap()), 0);
}

#[test]
fn stereo_pair_is_latched_in_one_burst() {
    let mut c = ready();
    let mut req = VolumeRequest::new();
    req.both(HP, Decibel::from_db(-10));
    c.set_volume(&req).unwrap();
    c.bus_mut().clear_log();

    c.set_path(&playback()).unwrap();

    let code = hp_code(-10);
    let (left, right) = HP.regs();
    assert_eq!(
        headphone_writes(&c),
        vec![vec![select(left.offset, true), code | LATCH, code]]
    );
    assert_eq!(c.bus().register(left), code | LATCH);
    assert_eq!(c.bus().register(right.unwrap()), code);
}

#[test]
fn reapplying_current_volumes_emits_nothing() {
    let mut c = ready();
    let mut req = VolumeRequest::new();
    req.both(HP, Decibel::from_db(-10))
        .both(VolumeTarget::DacOut, Decibel::from_db(-3));
    c.set_volume(&req).unwrap();
    c.set_path(&playback()).unwrap();

    let writes = c.bus().write_count();
    let current = c.volume().unwrap();
    c.set_volume(&VolumeRequest::from(&current)).unwrap();
    assert_eq!(c.bus().write_count(), writes);
    assert_eq!(c.volume().unwrap(), current);
}

#[test]
fn single_channel_change_is_not_latched() {
    let mut c = ready();
    let mut req = VolumeRequest::new();
    req.both(HP, Decibel::from_db(-10));
    c.set_volume(&req).unwrap();
    c.set_path(&playback()).unwrap();
    c.bus_mut().clear_log();

    let mut left_only = VolumeRequest::new();
    left_only.set(HP, Some(Decibel::from_db(-6)), None);
    c.set_volume(&left_only).unwrap();

    let (left, _) = HP.regs();
    assert_eq!(
        headphone_writes(&c),
        vec![vec![select(left.offset, false), hp_code(-6)]]
    );
    assert_eq!(
        c.volume().unwrap().get(HP),
        [Decibel::from_db(-6), Decibel::from_db(-10)]
    );
}

#[test]
fn removing_the_path_mutes_without_latch() {
    let mut c = ready();
    let mut req = VolumeRequest::new();
    req.both(HP, Decibel::from_db(-10));
    c.set_volume(&req).unwrap();
    c.set_path(&playback()).unwrap();
    c.bus_mut().clear_log();

    c.set_path(&PathRequest::all_off()).unwrap();

    let (left, _) = HP.regs();
    assert_eq!(
        headphone_writes(&c).first(),
        Some(&vec![select(left.offset, true), 0, 0])
    );
    // The logical level survives the mute.
    assert_eq!(c.volume().unwrap().get(HP), [Decibel::from_db(-10); 2]);
}

#[test]
fn levels_are_quantized_to_the_curve() {
    let mut c = ready();
    let mut req = VolumeRequest::new();
    // Past the midpoint between -10 dB and -8 dB.
    req.both(HP, Decibel::from_raw(-2_560 + 300));
    c.set_volume(&req).unwrap();
    assert_eq!(c.volume().unwrap().get(HP), [Decibel::from_raw(-2_048); 2]);

    let mut mono = VolumeRequest::new();
    mono.both(VolumeTarget::Speaker, Decibel::from_db(-10));
    c.set_volume(&mono).unwrap();
    assert_eq!(
        c.volume().unwrap().get(VolumeTarget::Speaker),
        [Decibel::from_db(-10), Decibel::MUTE]
    );
}

#[test]
fn dropping_one_headphone_channel_mutes_it_before_its_amp_goes_down() {
    let mut c = ready();
    c.bus_mut().track_mute(true);
    let mut req = VolumeRequest::new();
    req.both(HP, Decibel::from_db(-10));
    c.set_volume(&req).unwrap();
    c.set_path(&playback()).unwrap();
    c.bus_mut().clear_log();

    let mut drop_right = PathRequest::new();
    drop_right.off(Sink::HpR, Source::DacR);
    c.set_path(&drop_right).unwrap();

    let (left, right) = HP.regs();
    let right = right.unwrap();
    let writes = analog_writes(&c);
    let mute = writes.iter().position(|&w| w == (right.offset, 0)).unwrap();
    let amp = writes
        .iter()
        .position(|&(reg, _)| reg == ANA_PD_AMP.offset)
        .unwrap();
    assert!(mute < amp, "{writes:x?}");
    // The mute is a plain write, the live channel is untouched.
    assert_eq!(
        headphone_writes(&c),
        vec![vec![select(right.offset, false), 0]]
    );
    assert_eq!(c.bus().register(right), 0);
    assert_eq!(c.bus().register(left) & 0x1F, hp_code(-10));
    assert_eq!(PowerState::decode(c.cache()).amps, Amps::HP_L);
    assert_eq!(c.volume().unwrap().get(HP), [Decibel::from_db(-10); 2]);
}

#[test]
fn aborted_volume_change_keeps_only_what_reached_the_chip() {
    let mut c = ready();
    c.set_path(&playback()).unwrap();

    // DAC out lands on the digital slave first, then the headphone write
    // to the analog slave is refused.
    let mut req = VolumeRequest::new();
    req.set(VolumeTarget::DacOut, Some(Decibel::from_db(-3)), None)
        .both(HP, Decibel::from_db(-10));
    c.bus_mut().fail_after(1);
    assert!(matches!(c.set_volume(&req), Err(Error::Bus(_))));

    let levels = c.volume().unwrap();
    assert_eq!(
        levels.get(VolumeTarget::DacOut),
        [Decibel::from_db(-3), Decibel::MUTE]
    );
    assert_eq!(levels.get(HP), [Decibel::MUTE; 2]);
    let (dac_left, _) = VolumeTarget::DacOut.regs();
    assert_eq!(
        c.cache().value(dac_left) & 0x7F,
        VolumeTarget::DacOut.class().convert(Decibel::from_db(-3))
    );

    c.bus_mut().heal();
    c.set_volume(&req).unwrap();
    assert_eq!(c.volume().unwrap().get(HP), [Decibel::from_db(-10); 2]);
}
