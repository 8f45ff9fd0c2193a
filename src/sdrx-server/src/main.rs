// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use sdrx_app::{init_logging, ConfigFile};
use sdrx_core::DynResult;

use sdrx_server::audio::{self, AudioSink, NullSink, WavAudioSink};
use sdrx_server::config::{ServerConfig, SourceKind};
use sdrx_server::device::{FileIqSource, Gains, MockIqSource, RadioDevice};
use sdrx_server::EngineConfig;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - multi-channel SDR receiver");

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Interleaved signed 8-bit IQ file to read instead of the mock source
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    input: Option<PathBuf>,
    /// Capture sample rate (complex samples per second)
    #[arg(short = 's', long = "sample-rate")]
    sample_rate: Option<u32>,
    /// Capture center frequency (Hz)
    #[arg(short = 'f', long = "center")]
    center: Option<f64>,
    /// WAV file receiving the mixed audio
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long = "log-level")]
    log_level: Option<String>,
}

/// Apply command-line overrides on top of the file configuration.
fn apply_cli(cli: &Cli, cfg: &mut ServerConfig) {
    if let Some(ref path) = cli.input {
        cfg.capture.source = SourceKind::File;
        cfg.capture.path = Some(path.clone());
    }
    if let Some(rate) = cli.sample_rate {
        cfg.capture.sample_rate = rate;
    }
    if let Some(center) = cli.center {
        cfg.capture.center_freq_hz = center;
    }
    if let Some(ref output) = cli.output {
        cfg.audio.output = Some(output.clone());
    }
    if let Some(ref level) = cli.log_level {
        cfg.general.log_level = Some(level.clone());
    }
}

fn build_device(cfg: &ServerConfig) -> DynResult<Box<dyn RadioDevice>> {
    let capture = &cfg.capture;
    let device: Box<dyn RadioDevice> = match capture.source {
        SourceKind::Mock => Box::new(MockIqSource::new(capture.tone_offset_hz, capture.throttle)),
        SourceKind::File => {
            let path = capture
                .path
                .clone()
                .ok_or("[capture].path must be set for source = \"file\"")?;
            Box::new(FileIqSource::new(path, capture.looping, capture.throttle))
        }
    };
    Ok(device)
}

fn build_audio_sink(cfg: &ServerConfig) -> DynResult<Box<dyn AudioSink>> {
    let sink: Box<dyn AudioSink> = match cfg.audio.output {
        Some(ref path) => {
            info!("Writing audio to {}", path.display());
            Box::new(WavAudioSink::create(path)?)
        }
        None => Box::new(NullSink::default()),
    };
    Ok(sink)
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = ServerConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        ServerConfig::load_from_default_paths()?
    };
    apply_cli(&cli, &mut cfg);
    cfg.validate()
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let device = build_device(&cfg)?;
    let sink = build_audio_sink(&cfg)?;
    let handle = sdrx_server::spawn(
        EngineConfig {
            pipeline: cfg.pipeline_config(),
            gains: Gains {
                lna_db: cfg.capture.lna_gain_db,
                vga_db: cfg.capture.vga_gain_db,
                amp_enabled: cfg.capture.amp_enabled,
            },
            report_interval: Duration::from_millis(cfg.telemetry.report_interval_ms),
        },
        device,
    )?;

    for vfo in handle.vfo_infos() {
        info!(
            "vfo {}: {} {:.0} Hz (offset {:+.0} Hz, bw {:.0} Hz){}",
            vfo.id,
            vfo.mode,
            vfo.freq_hz,
            vfo.offset_hz,
            vfo.bandwidth_hz,
            if vfo.enabled { "" } else { " [disabled]" }
        );
    }

    let sink_task = tokio::spawn(audio::run_audio_sink(handle.subscribe_audio(), sink));

    let mut perf_rx = handle.performance();
    let perf_task = tokio::spawn(async move {
        while perf_rx.changed().await.is_ok() {
            let snapshot = perf_rx.borrow_and_update().clone();
            match serde_json::to_string(&snapshot) {
                Ok(line) => info!("performance: {}", line),
                Err(e) => warn!("failed to encode performance snapshot: {}", e),
            }
        }
    });

    tokio::select! {
        res = signal::ctrl_c() => {
            res?;
            info!("Ctrl+C received, shutting down");
        }
        _ = handle.stopped() => {
            info!("Input exhausted, shutting down");
        }
    }

    handle.stop().await;
    // Last audio sender goes away with the handle; the sink then finalizes.
    drop(handle);
    match sink_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Audio sink error: {}", e),
        Err(e) => error!("Audio sink task failed: {}", e),
    }
    perf_task.abort();
    let _ = perf_task.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::parse_from([
            "sdrx-server",
            "--input",
            "/tmp/capture.iq",
            "--sample-rate",
            "2400000",
            "--center",
            "145000000",
            "--log-level",
            "debug",
        ]);
        let mut cfg = ServerConfig::default();
        apply_cli(&cli, &mut cfg);
        assert_eq!(cfg.capture.source, SourceKind::File);
        assert_eq!(cfg.capture.path, Some(PathBuf::from("/tmp/capture.iq")));
        assert_eq!(cfg.capture.sample_rate, 2_400_000);
        assert_eq!(cfg.capture.center_freq_hz, 145e6);
        assert_eq!(cfg.general.log_level.as_deref(), Some("debug"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn print_config_flag() {
        let cli = Cli::parse_from(["sdrx-server", "--print-config"]);
        assert!(cli.print_config);
        assert!(cli.config.is_none());
    }
}
