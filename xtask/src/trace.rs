use anyhow::{anyhow, Result};
use codec::sim::DeviceModel;
use codec::{
    Codec, Decibel, InitConfig, PathRequest, PowerMode, Sink, Source, VolumeRequest, VolumeTarget,
};
use colored::Colorize;
use platform::mocks::MockDelay;
use tracing_subscriber::EnvFilter;

type SimCodec = Codec<DeviceModel, MockDelay>;

pub fn run(manual: bool, volume_db: i16) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_target(false)
        .init();

    let config = InitConfig {
        power_mode: if manual {
            PowerMode::Manual
        } else {
            PowerMode::Auto
        },
        ..InitConfig::default()
    };
    let mut codec = Codec::new(DeviceModel::default(), MockDelay::new());

    stage(&mut codec, "initialize", |c| c.initialize(config))?;

    let mut volume = VolumeRequest::new();
    volume
        .both(VolumeTarget::Dio0In, Decibel::ZERO)
        .both(VolumeTarget::DacOut, Decibel::ZERO)
        .both(VolumeTarget::Headphone, Decibel::from_db(volume_db));
    stage(&mut codec, "set_volume (no path yet)", |c| c.set_volume(&volume))?;

    let mut playback = PathRequest::new();
    playback
        .on(Sink::Dac, Source::Dio0In)
        .on(Sink::HpL, Source::DacL)
        .on(Sink::HpR, Source::DacR);
    stage(&mut codec, "set_path DIO0 -> DAC -> HP", |c| c.set_path(&playback))?;

    let mut swap = PathRequest::new();
    swap.off(Sink::HpL, Source::DacL)
        .off(Sink::HpR, Source::DacR)
        .on(Sink::Sp, Source::DacL)
        .on(Sink::Sp, Source::DacR);
    stage(&mut codec, "set_path HP -> speaker", |c| c.set_path(&swap))?;

    stage(&mut codec, "terminate", SimCodec::terminate)?;
    Ok(())
}

/// Run one API call and print the transfers it produced.
fn stage(
    codec: &mut SimCodec,
    label: &str,
    f: impl FnOnce(&mut SimCodec) -> codec::Result<()>,
) -> Result<()> {
    println!();
    println!("{}", format!("▶ {label}").cyan().bold());
    codec.bus_mut().clear_log();
    let waited = codec.delay().elapsed_us();
    let reads = codec.bus().read_count();

    f(codec).map_err(|e| anyhow!("{label}: {e}"))?;

    for t in codec.bus().transfers() {
        let bytes: Vec<String> = t.bytes.iter().map(|b| format!("{b:02X}")).collect();
        println!("  W 0x{:02X}  {}", t.addr, bytes.join(" "));
    }
    println!(
        "{}",
        format!(
            "  {} reads, {} µs waited",
            codec.bus().read_count().saturating_sub(reads),
            codec.delay().elapsed_us().saturating_sub(waited)
        )
        .dimmed()
    );
    Ok(())
}
