// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receiver daemon: radio sources, the DSP engine thread and audio output.

pub mod audio;
pub mod config;
pub mod device;
pub mod engine;

pub use engine::{spawn, DspHandle, EngineConfig, EngineError};
