// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Whole receiver state driven once per capture chunk.

use std::time::{Duration, Instant};

use sdrx_core::{PerformanceSnapshot, VfoParams};
use tracing::debug;

use crate::batch::AudioBatcher;
use crate::manager::VfoManager;
use crate::spectrum::{SpectrumAnalyzer, SpectrumFrame, DEFAULT_FRAME_DECIMATION};
use crate::telemetry::PerformanceTelemetry;
use crate::DspError;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Capture sample rate (complex samples per second).
    pub capture_rate: f64,
    pub center_hz: f64,
    /// Largest capture chunk, in complex samples.
    pub max_chunk: usize,
    pub fft_size: usize,
    pub smoothing_speed: f32,
    pub frame_decimation: usize,
    /// Audio batch length (ms of 48 kHz audio).
    pub batch_ms: u32,
    /// Initial channels; one default channel if empty.
    pub vfos: Vec<VfoParams>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_rate: 2_000_000.0,
            center_hz: 100_000_000.0,
            max_chunk: 131_072,
            fft_size: 2048,
            smoothing_speed: 1.0,
            frame_decimation: DEFAULT_FRAME_DECIMATION,
            batch_ms: 50,
            vfos: Vec::new(),
        }
    }
}

/// Receiver of everything the pipeline emits.
pub trait PipelineSink {
    fn spectrum_frame(&mut self, frame: SpectrumFrame);
    fn audio_batch(&mut self, batch: Vec<f32>);
}

/// Spectrum analyzer, channels, audio batcher and telemetry of one capture
/// stream. Mutated only by whoever drives [`PipelineState::process_chunk`].
pub struct PipelineState {
    spectrum: SpectrumAnalyzer,
    vfos: VfoManager,
    batcher: AudioBatcher,
    telemetry: PerformanceTelemetry,
}

impl PipelineState {
    pub fn new(config: &PipelineConfig) -> Result<Self, DspError> {
        let mut spectrum = SpectrumAnalyzer::with_default_window(config.fft_size)?;
        spectrum.set_smoothing_speed(config.smoothing_speed);
        spectrum.set_frame_decimation(config.frame_decimation);

        let vfos = VfoManager::with_channels(
            config.center_hz,
            config.capture_rate,
            config.max_chunk,
            config.vfos.clone(),
        )?;

        Ok(Self {
            spectrum,
            vfos,
            batcher: AudioBatcher::for_duration(config.batch_ms),
            telemetry: PerformanceTelemetry::new(Instant::now()),
        })
    }

    pub fn vfos(&self) -> &VfoManager {
        &self.vfos
    }

    pub fn vfos_mut(&mut self) -> &mut VfoManager {
        &mut self.vfos
    }

    pub fn spectrum_mut(&mut self) -> &mut SpectrumAnalyzer {
        &mut self.spectrum
    }

    pub fn telemetry(&self) -> &PerformanceTelemetry {
        &self.telemetry
    }

    /// Feed one chunk of interleaved i8 IQ through spectrum and channels.
    pub fn process_chunk(
        &mut self,
        raw: &[i8],
        sink: &mut dyn PipelineSink,
    ) -> Result<(), DspError> {
        if raw.len() % 2 != 0 {
            return Err(DspError::BufferLength {
                what: "capture chunk",
                expected: raw.len() + 1,
                actual: raw.len(),
            });
        }
        let samples = raw.len() / 2;
        if samples > self.vfos.max_chunk() {
            return Err(DspError::BlockTooLarge {
                max: self.vfos.max_chunk(),
                actual: samples,
            });
        }

        self.telemetry.record_chunk(raw.len());
        self.spectrum.push(raw, |frame| sink.spectrum_frame(frame));

        let started = Instant::now();
        let mixed = self.vfos.process(raw);
        let elapsed = started.elapsed();

        self.telemetry.record_dsp(elapsed, mixed.audio.len());
        self.telemetry.record_failed(mixed.failed);
        self.telemetry.record_squelched(mixed.squelched);

        let budget = Duration::from_secs_f64(samples as f64 / self.vfos.capture_rate());
        if elapsed > budget {
            self.telemetry.record_late_chunk();
            debug!(
                "late chunk: {:.2} ms DSP for {:.2} ms of capture",
                elapsed.as_secs_f64() * 1000.0,
                budget.as_secs_f64() * 1000.0
            );
        }

        let batches = self.batcher.push(&mixed.audio, |batch| sink.audio_batch(batch));
        self.telemetry.record_batches(batches);
        Ok(())
    }

    /// Emit the trailing partial audio batch.
    pub fn finish(&mut self, sink: &mut dyn PipelineSink) {
        if self.batcher.flush(|batch| sink.audio_batch(batch)) {
            self.telemetry.record_batches(1);
        }
    }

    /// Roll telemetry if the interval is long enough.
    pub fn roll_telemetry(&mut self, now: Instant) -> Option<PerformanceSnapshot> {
        self.telemetry.roll(now).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdrx_core::{DemodMode, VfoPatch};

    #[derive(Default)]
    struct Collect {
        frames: Vec<SpectrumFrame>,
        batches: Vec<Vec<f32>>,
    }

    impl PipelineSink for Collect {
        fn spectrum_frame(&mut self, frame: SpectrumFrame) {
            self.frames.push(frame);
        }

        fn audio_batch(&mut self, batch: Vec<f32>) {
            self.batches.push(batch);
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            capture_rate: 1_000_000.0,
            center_hz: 100e6,
            max_chunk: 20_000,
            fft_size: 1024,
            frame_decimation: 2,
            vfos: vec![VfoParams {
                enabled: true,
                ..VfoParams::for_mode(100e6, DemodMode::Nfm, 1_000_000.0)
            }],
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn chunks_feed_spectrum_and_audio() {
        let mut state = PipelineState::new(&config()).unwrap();
        let mut sink = Collect::default();
        let chunk = vec![0_i8; 40_000];
        for _ in 0..10 {
            state.process_chunk(&chunk, &mut sink).unwrap();
        }
        // 200k samples -> 195 full FFT buffers -> 97 frames
        assert_eq!(sink.frames.len(), 97);
        assert!(sink.frames.iter().all(|f| f.bins_db.len() == 1024));
        // 200 ms of audio -> 9600 samples -> 4 batches of 2400
        assert_eq!(sink.batches.len(), 4);
        state.finish(&mut sink);
        assert_eq!(sink.batches.len(), 4);
    }

    #[test]
    fn odd_or_oversized_chunks_are_rejected() {
        let mut state = PipelineState::new(&config()).unwrap();
        let mut sink = Collect::default();
        assert!(matches!(
            state.process_chunk(&[0, 0, 0], &mut sink),
            Err(DspError::BufferLength { .. })
        ));
        assert!(matches!(
            state.process_chunk(&vec![0; 40_002], &mut sink),
            Err(DspError::BlockTooLarge { .. })
        ));
    }

    #[test]
    fn finish_flushes_partial_batch() {
        let mut state = PipelineState::new(&config()).unwrap();
        let mut sink = Collect::default();
        state.process_chunk(&vec![0_i8; 40_000], &mut sink).unwrap();
        assert!(sink.batches.is_empty());
        state.finish(&mut sink);
        assert_eq!(sink.batches.len(), 1);
        assert_eq!(sink.batches[0].len(), 960);
    }

    #[test]
    fn controller_changes_apply_between_chunks() {
        let mut state = PipelineState::new(&config()).unwrap();
        let mut sink = Collect::default();
        let id = state.vfos().ids()[0];
        state.process_chunk(&vec![0_i8; 40_000], &mut sink).unwrap();
        state
            .vfos_mut()
            .set_vfo_params(
                id,
                &VfoPatch {
                    enabled: Some(false),
                    ..VfoPatch::default()
                },
            )
            .unwrap();
        state.process_chunk(&vec![0_i8; 40_000], &mut sink).unwrap();
        state.finish(&mut sink);
        let total: usize = sink.batches.iter().map(Vec::len).sum();
        assert_eq!(total, 960);
    }
}
