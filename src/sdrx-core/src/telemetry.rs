// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

/// Aggregate DSP counters over one reporting interval.
///
/// Rates are per second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// Capture chunks delivered by the device.
    pub chunk_rate: u32,
    /// Channel DSP invocations.
    pub dsp_call_rate: u32,
    /// IQ samples received.
    pub input_rate: u32,
    /// Audio samples produced.
    pub audio_rate: u32,
    pub avg_dsp_ms: f64,
    pub max_dsp_ms: f64,
    /// Chunks whose processing took longer than their capture duration.
    pub dropped_chunks: u64,
    /// Channel blocks that failed and were left out of the mix.
    pub failed_blocks: u64,
    /// Channel blocks gated by squelch. Never counted as dropped.
    pub squelched_blocks: u64,
    /// Size of the most recent chunk (bytes).
    pub chunk_size: usize,
    /// Audio batches handed to the sink.
    pub batch_rate: u32,
}
