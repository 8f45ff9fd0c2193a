// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use sdrx_core::VfoId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DspError {
    #[error("FFT size {0} must be a non-zero power of two")]
    InvalidFftSize(usize),
    #[error("window length {actual} does not match FFT size {expected}")]
    WindowLength { expected: usize, actual: usize },
    #[error("{what} buffer has length {actual}, expected {expected}")]
    BufferLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("invalid channel parameter: {0}")]
    InvalidParameter(String),
    #[error("invalid sample rate: {0}")]
    InvalidRate(String),
    #[error("block of {actual} samples exceeds the preallocated maximum of {max}")]
    BlockTooLarge { max: usize, actual: usize },
    #[error("no channel with id {0}")]
    UnknownVfo(VfoId),
    #[error("the last channel cannot be removed")]
    LastVfo,
}

