// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Destinations for the mixed 48 kHz audio stream.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tokio::sync::broadcast;
use tracing::{info, warn};

use sdrx_core::AUDIO_SAMPLE_RATE;

pub trait AudioSink: Send {
    fn write(&mut self, samples: &[f32]) -> io::Result<()>;

    /// Flush and close the sink.
    fn finish(&mut self) -> io::Result<()>;
}

/// Discards audio, counting samples.
#[derive(Debug, Default)]
pub struct NullSink {
    samples: u64,
}

impl NullSink {
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

impl AudioSink for NullSink {
    fn write(&mut self, samples: &[f32]) -> io::Result<()> {
        self.samples += samples.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// RIFF chunk sizes are 32-bit; keep the data chunk and header below that.
const MAX_WAV_SAMPLES: u64 = (u32::MAX as u64 - 128) / 4;

fn wav_error(err: hound::Error) -> io::Error {
    match err {
        hound::Error::IoError(e) => e,
        other => io::Error::other(other),
    }
}

/// Mono 32-bit float WAV file at 48 kHz.
pub struct WavAudioSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    samples_written: u64,
}

impl WavAudioSink {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: AUDIO_SAMPLE_RATE,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(path, spec).map_err(wav_error)?;
        Ok(Self {
            writer: Some(writer),
            samples_written: 0,
        })
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }
}

impl AudioSink for WavAudioSink {
    fn write(&mut self, samples: &[f32]) -> io::Result<()> {
        let total = self.samples_written + samples.len() as u64;
        if total > MAX_WAV_SAMPLES {
            return Err(io::Error::other(format!(
                "WAV file full: {} samples exceed the 4 GiB RIFF limit",
                total
            )));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("WAV sink already finished"))?;
        for &s in samples {
            writer.write_sample(s).map_err(wav_error)?;
        }
        self.samples_written = total;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(writer) => writer.finalize().map_err(wav_error),
            None => Ok(()),
        }
    }
}

/// Drain audio batches into `sink` until the sender side closes.
pub async fn run_audio_sink(
    mut rx: broadcast::Receiver<Vec<f32>>,
    mut sink: Box<dyn AudioSink>,
) -> io::Result<()> {
    loop {
        match rx.recv().await {
            Ok(batch) => sink.write(&batch)?,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("audio sink lagged, dropped {} batches", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    sink.finish()?;
    info!("audio sink closed");
    Ok(())
}
