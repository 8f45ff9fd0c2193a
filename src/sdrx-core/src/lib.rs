// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod mode;
pub mod telemetry;
pub mod vfo;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Output audio rate of every channel (Hz).
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

pub use mode::{DeEmphasis, DemodMode};
pub use telemetry::PerformanceSnapshot;
pub use vfo::{VfoId, VfoInfo, VfoParams, VfoPatch, MIN_BANDWIDTH_HZ};
