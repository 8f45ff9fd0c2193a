// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::time::{Duration, Instant};

use sdrx_core::PerformanceSnapshot;

/// Intervals shorter than this are not rolled into a snapshot.
const MIN_ROLL_INTERVAL: Duration = Duration::from_millis(100);

/// Rolling DSP counters, turned into a [`PerformanceSnapshot`] on each roll.
#[derive(Debug, Clone)]
pub struct PerformanceTelemetry {
    chunks: u64,
    dsp_calls: u64,
    input_samples: u64,
    audio_samples: u64,
    dsp_time_sum: Duration,
    dsp_time_max: Duration,
    dropped: u64,
    failed: u64,
    squelched: u64,
    batches: u64,
    last_chunk_size: usize,
    last_roll: Instant,
    report: PerformanceSnapshot,
}

impl PerformanceTelemetry {
    pub fn new(now: Instant) -> Self {
        Self {
            chunks: 0,
            dsp_calls: 0,
            input_samples: 0,
            audio_samples: 0,
            dsp_time_sum: Duration::ZERO,
            dsp_time_max: Duration::ZERO,
            dropped: 0,
            failed: 0,
            squelched: 0,
            batches: 0,
            last_chunk_size: 0,
            last_roll: now,
            report: PerformanceSnapshot::default(),
        }
    }

    /// A capture chunk of `bytes` interleaved i8 values arrived.
    pub fn record_chunk(&mut self, bytes: usize) {
        self.chunks += 1;
        self.last_chunk_size = bytes;
        self.input_samples += (bytes / 2) as u64;
    }

    pub fn record_dsp(&mut self, elapsed: Duration, audio_samples: usize) {
        self.dsp_calls += 1;
        self.dsp_time_sum += elapsed;
        self.dsp_time_max = self.dsp_time_max.max(elapsed);
        self.audio_samples += audio_samples as u64;
    }

    /// Processing of a chunk outlasted its capture duration.
    pub fn record_late_chunk(&mut self) {
        self.dropped += 1;
    }

    pub fn record_failed(&mut self, blocks: usize) {
        self.failed += blocks as u64;
    }

    pub fn record_squelched(&mut self, blocks: usize) {
        self.squelched += blocks as u64;
    }

    pub fn record_batches(&mut self, batches: usize) {
        self.batches += batches as u64;
    }

    /// Most recent snapshot.
    pub fn snapshot(&self) -> &PerformanceSnapshot {
        &self.report
    }

    /// Turn the counters into a new snapshot and clear them. Returns `None`
    /// and keeps counting if less than 100 ms passed since the last roll.
    pub fn roll(&mut self, now: Instant) -> Option<&PerformanceSnapshot> {
        let dt = now.saturating_duration_since(self.last_roll);
        if dt < MIN_ROLL_INTERVAL {
            return None;
        }
        let secs = dt.as_secs_f64();
        let rate = |count: u64| (count as f64 / secs).round() as u32;

        self.report = PerformanceSnapshot {
            chunk_rate: rate(self.chunks),
            dsp_call_rate: rate(self.dsp_calls),
            input_rate: rate(self.input_samples),
            audio_rate: rate(self.audio_samples),
            avg_dsp_ms: if self.dsp_calls > 0 {
                self.dsp_time_sum.as_secs_f64() * 1000.0 / self.dsp_calls as f64
            } else {
                0.0
            },
            max_dsp_ms: self.dsp_time_max.as_secs_f64() * 1000.0,
            dropped_chunks: self.dropped,
            failed_blocks: self.failed,
            squelched_blocks: self.squelched,
            chunk_size: self.last_chunk_size,
            batch_rate: rate(self.batches),
        };

        let last_chunk_size = self.last_chunk_size;
        *self = Self {
            last_chunk_size,
            report: std::mem::take(&mut self.report),
            ..Self::new(now)
        };
        Some(&self.report)
    }
}
