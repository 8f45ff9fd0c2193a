// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use sdrx_core::AUDIO_SAMPLE_RATE;

/// Collects variable-length audio into fixed-size batches.
pub struct AudioBatcher {
    buf: Vec<f32>,
    pos: usize,
}

impl AudioBatcher {
    /// Batches of exactly `threshold` samples (at least one).
    pub fn new(threshold: usize) -> Self {
        Self {
            buf: vec![0.0; threshold.max(1)],
            pos: 0,
        }
    }

    /// Batches of `duration_ms` worth of 48 kHz audio.
    pub fn for_duration(duration_ms: u32) -> Self {
        Self::new((AUDIO_SAMPLE_RATE as u64 * duration_ms as u64 / 1000) as usize)
    }

    pub fn threshold(&self) -> usize {
        self.buf.len()
    }

    /// Samples waiting for the next batch.
    pub fn pending(&self) -> usize {
        self.pos
    }

    /// Copy `samples` in, emitting a batch every time the threshold is
    /// reached. Returns the number of batches emitted.
    pub fn push(&mut self, samples: &[f32], mut emit: impl FnMut(Vec<f32>)) -> usize {
        let mut emitted = 0;
        let mut src = samples;
        while !src.is_empty() {
            let take = (self.buf.len() - self.pos).min(src.len());
            self.buf[self.pos..self.pos + take].copy_from_slice(&src[..take]);
            self.pos += take;
            src = &src[take..];

            if self.pos == self.buf.len() {
                emit(self.buf.clone());
                self.pos = 0;
                emitted += 1;
            }
        }
        emitted
    }

    /// Emit the partial batch, if any.
    pub fn flush(&mut self, mut emit: impl FnMut(Vec<f32>)) -> bool {
        if self.pos == 0 {
            return false;
        }
        emit(self.buf[..self.pos].to_vec());
        self.pos = 0;
        true
    }
}
