// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use sdrx_core::{VfoId, VfoInfo, VfoParams, VfoPatch};
use tracing::{info, warn};

use crate::vfo::VfoChannel;
use crate::{hard_clip, DspError};

/// Mixed result of one capture chunk across all channels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MixedBlock {
    pub audio: Vec<f32>,
    /// Channels that produced audio (gated ones included).
    pub contributing: usize,
    pub squelched: usize,
    /// Channels whose block failed and was dropped.
    pub failed: usize,
}

/// Sum `(audio, gain)` pairs sample-wise up to the longest input, then clip.
///
/// Shorter inputs count as zero past their end. Order is the channel order so
/// results are reproducible.
pub fn mix_channels(outputs: &[(Vec<f32>, f32)]) -> Vec<f32> {
    let len = outputs.iter().map(|(audio, _)| audio.len()).max().unwrap_or(0);
    let mut mixed = vec![0.0_f32; len];
    for (audio, gain) in outputs {
        for (acc, &sample) in mixed.iter_mut().zip(audio) {
            *acc += sample * gain;
        }
    }
    hard_clip(&mut mixed);
    mixed
}

/// Owns every receive channel and drives them over each capture chunk.
pub struct VfoManager {
    channels: Vec<VfoChannel>,
    center_hz: f64,
    capture_rate: f64,
    max_chunk: usize,
}

impl VfoManager {
    /// Manager with one default channel tuned to the capture center.
    pub fn new(center_hz: f64, capture_rate: f64, max_chunk: usize) -> Result<Self, DspError> {
        Self::with_channels(center_hz, capture_rate, max_chunk, Vec::new())
    }

    /// Manager with the given channels, or one default channel if empty.
    pub fn with_channels(
        center_hz: f64,
        capture_rate: f64,
        max_chunk: usize,
        params: Vec<VfoParams>,
    ) -> Result<Self, DspError> {
        let mut manager = Self {
            channels: Vec::new(),
            center_hz,
            capture_rate,
            max_chunk,
        };
        if params.is_empty() {
            manager.add_vfo()?;
        }
        for p in params {
            manager.add_vfo_with(p)?;
        }
        Ok(manager)
    }

    pub fn center_frequency(&self) -> f64 {
        self.center_hz
    }

    pub fn capture_rate(&self) -> f64 {
        self.capture_rate
    }

    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel ids in mixing order.
    pub fn ids(&self) -> Vec<VfoId> {
        self.channels.iter().map(VfoChannel::id).collect()
    }

    fn position(&self, id: VfoId) -> Result<usize, DspError> {
        self.channels
            .iter()
            .position(|ch| ch.id() == id)
            .ok_or(DspError::UnknownVfo(id))
    }

    pub fn channel(&self, id: VfoId) -> Option<&VfoChannel> {
        self.channels.iter().find(|ch| ch.id() == id)
    }

    pub fn params(&self, id: VfoId) -> Option<&VfoParams> {
        self.channel(id).map(VfoChannel::params)
    }

    /// Append a disabled WFM channel at the capture center.
    pub fn add_vfo(&mut self) -> Result<VfoId, DspError> {
        let params = VfoParams {
            freq_hz: self.center_hz,
            ..VfoParams::default()
        };
        self.add_vfo_with(params)
    }

    pub fn add_vfo_with(&mut self, params: VfoParams) -> Result<VfoId, DspError> {
        let id = VfoId::new();
        let channel = VfoChannel::new(
            id,
            params,
            self.center_hz,
            self.capture_rate,
            self.max_chunk,
        )?;
        info!(
            "vfo {} added: {} at {:.0} Hz",
            id,
            channel.params().mode,
            channel.params().freq_hz
        );
        self.channels.push(channel);
        Ok(id)
    }

    /// Drop a channel and all its DSP state. The last channel stays.
    pub fn remove_vfo(&mut self, id: VfoId) -> Result<(), DspError> {
        let idx = self.position(id)?;
        if self.channels.len() == 1 {
            return Err(DspError::LastVfo);
        }
        self.channels.remove(idx);
        info!("vfo {} removed", id);
        Ok(())
    }

    pub fn set_vfo_params(&mut self, id: VfoId, patch: &VfoPatch) -> Result<(), DspError> {
        let idx = self.position(id)?;
        self.channels[idx].apply_patch(patch)
    }

    pub fn vfo_infos(&self) -> Vec<VfoInfo> {
        self.channels.iter().map(VfoChannel::info).collect()
    }

    /// Retune the capture center and re-derive every channel's offset.
    pub fn set_center_frequency(&mut self, center_hz: f64) -> Result<(), DspError> {
        if !center_hz.is_finite() {
            return Err(DspError::InvalidParameter(format!(
                "center {} Hz is not finite",
                center_hz
            )));
        }
        for channel in &mut self.channels {
            channel.set_center_frequency(center_hz)?;
        }
        self.center_hz = center_hz;
        Ok(())
    }

    /// Run every enabled channel over `raw` and mix the results.
    ///
    /// A failing channel is logged and skipped for this block only.
    pub fn process(&mut self, raw: &[i8]) -> MixedBlock {
        let mut block = MixedBlock::default();
        let mut outputs = Vec::with_capacity(self.channels.len());
        for channel in &mut self.channels {
            if !channel.params().enabled {
                continue;
            }
            match channel.process(raw) {
                Ok(out) => {
                    if out.squelched {
                        block.squelched += 1;
                    }
                    if !out.audio.is_empty() {
                        outputs.push((out.audio, channel.params().volume_gain()));
                    }
                }
                Err(err) => {
                    warn!("vfo {}: dropping block: {}", channel.id(), err);
                    block.failed += 1;
                }
            }
        }
        block.contributing = outputs.len();
        block.audio = mix_channels(&outputs);
        block
    }
}
