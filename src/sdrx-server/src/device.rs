// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Radio device abstraction and the built-in IQ sources.

use std::f64::consts::TAU;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Front-end gain settings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Gains {
    pub lna_db: u32,
    pub vga_db: u32,
    pub amp_enabled: bool,
}

/// A source of interleaved signed 8-bit IQ chunks.
pub trait RadioDevice: Send + 'static {
    fn open(&mut self) -> Result<(), String>;

    fn close(&mut self);

    fn set_sample_rate(&mut self, sample_rate: f64) -> Result<(), String>;

    fn set_center_frequency(&mut self, center_hz: f64) -> Result<(), String>;

    fn set_gains(&mut self, gains: Gains) -> Result<(), String>;

    /// Fill `buf` with the next chunk and return the number of bytes
    /// written (always even). `Ok(0)` means the stream has ended.
    fn read_chunk(&mut self, buf: &mut [i8]) -> Result<usize, String>;
}

/// Sleeps so that reads do not run ahead of the capture rate.
struct Pacer {
    enabled: bool,
    next: Option<Instant>,
}

impl Pacer {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            next: None,
        }
    }

    fn pace(&mut self, samples: usize, sample_rate: f64) {
        if !self.enabled || sample_rate <= 0.0 {
            return;
        }
        let now = Instant::now();
        let due = self.next.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        // Restart the schedule when more than a second behind.
        let base = if now.saturating_duration_since(due) > Duration::from_secs(1) {
            now
        } else {
            due
        };
        self.next = Some(base + Duration::from_secs_f64(samples as f64 / sample_rate));
    }
}

fn quantize(value: f64) -> i8 {
    (value * 127.0).round().clamp(-128.0, 127.0) as i8
}

/// Synthetic device: silence, or one carrier at a fixed offset from center.
pub struct MockIqSource {
    sample_rate: f64,
    center_hz: f64,
    tone_offset_hz: Option<f64>,
    amplitude: f64,
    phase: f64,
    gains: Gains,
    opened: bool,
    pacer: Pacer,
}

impl MockIqSource {
    pub fn new(tone_offset_hz: Option<f64>, throttle: bool) -> Self {
        Self {
            sample_rate: 2_000_000.0,
            center_hz: 100_000_000.0,
            tone_offset_hz,
            amplitude: 0.5,
            phase: 0.0,
            gains: Gains::default(),
            opened: false,
            pacer: Pacer::new(throttle),
        }
    }

    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    pub fn center_frequency(&self) -> f64 {
        self.center_hz
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }
}

impl RadioDevice for MockIqSource {
    fn open(&mut self) -> Result<(), String> {
        self.opened = true;
        info!(
            "mock IQ source opened ({})",
            match self.tone_offset_hz {
                Some(offset) => format!("carrier at {:+.0} Hz", offset),
                None => "silence".to_string(),
            }
        );
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) -> Result<(), String> {
        if !(sample_rate > 0.0) {
            return Err(format!("invalid sample rate {}", sample_rate));
        }
        self.sample_rate = sample_rate;
        Ok(())
    }

    fn set_center_frequency(&mut self, center_hz: f64) -> Result<(), String> {
        // The carrier stays at a fixed absolute frequency.
        if let Some(offset) = self.tone_offset_hz.as_mut() {
            *offset -= center_hz - self.center_hz;
        }
        self.center_hz = center_hz;
        Ok(())
    }

    fn set_gains(&mut self, gains: Gains) -> Result<(), String> {
        self.gains = gains;
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [i8]) -> Result<usize, String> {
        if !self.opened {
            return Err("mock IQ source is not open".to_string());
        }
        let len = buf.len() & !1;
        match self.tone_offset_hz {
            None => buf[..len].fill(0),
            Some(offset) => {
                let step = TAU * offset / self.sample_rate;
                for pair in buf[..len].chunks_exact_mut(2) {
                    pair[0] = quantize(self.amplitude * self.phase.cos());
                    pair[1] = quantize(self.amplitude * self.phase.sin());
                    self.phase = (self.phase + step).rem_euclid(TAU);
                }
            }
        }
        self.pacer.pace(len / 2, self.sample_rate);
        Ok(len)
    }
}

/// Raw interleaved i8 IQ file, optionally restarted at its end.
pub struct FileIqSource {
    path: PathBuf,
    looping: bool,
    sample_rate: f64,
    reader: Option<BufReader<File>>,
    pacer: Pacer,
}

impl FileIqSource {
    pub fn new(path: impl Into<PathBuf>, looping: bool, throttle: bool) -> Self {
        Self {
            path: path.into(),
            looping,
            sample_rate: 2_000_000.0,
            reader: None,
            pacer: Pacer::new(throttle),
        }
    }

    fn fill(reader: &mut BufReader<File>, buf: &mut [i8]) -> Result<usize, String> {
        let mut bytes = vec![0_u8; buf.len()];
        let mut filled = 0;
        while filled < bytes.len() {
            match reader.read(&mut bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.to_string()),
            }
        }
        for (dst, &src) in buf.iter_mut().zip(&bytes[..filled]) {
            *dst = src as i8;
        }
        Ok(filled)
    }
}

impl RadioDevice for FileIqSource {
    fn open(&mut self) -> Result<(), String> {
        let file = File::open(&self.path)
            .map_err(|e| format!("failed to open {}: {}", self.path.display(), e))?;
        self.reader = Some(BufReader::new(file));
        info!(
            "IQ file {} opened{}",
            self.path.display(),
            if self.looping { " (looping)" } else { "" }
        );
        Ok(())
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) -> Result<(), String> {
        if !(sample_rate > 0.0) {
            return Err(format!("invalid sample rate {}", sample_rate));
        }
        self.sample_rate = sample_rate;
        Ok(())
    }

    fn set_center_frequency(&mut self, _center_hz: f64) -> Result<(), String> {
        Ok(())
    }

    fn set_gains(&mut self, _gains: Gains) -> Result<(), String> {
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [i8]) -> Result<usize, String> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| format!("IQ file {} is not open", self.path.display()))?;
        let want = buf.len() & !1;

        let mut filled = Self::fill(reader, &mut buf[..want])?;
        if filled < want && self.looping {
            reader.seek(SeekFrom::Start(0)).map_err(|e| e.to_string())?;
            debug!("IQ file {} rewound", self.path.display());
            // One pass per call; an empty file stays empty.
            while filled < want {
                let n = Self::fill(reader, &mut buf[filled..want])?;
                if n == 0 {
                    break;
                }
                filled += n;
                if filled < want {
                    reader.seek(SeekFrom::Start(0)).map_err(|e| e.to_string())?;
                }
            }
        }

        // A trailing odd byte cannot form a sample.
        let len = filled & !1;
        self.pacer.pace(len / 2, self.sample_rate);
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn assert_approx_eq(a: f64, b: f64, tol: f64, label: &str) {
        assert!(
            (a - b).abs() <= tol,
            "{}: expected ~{}, got {} (tol {})",
            label,
            b,
            a,
            tol
        );
    }

    fn iq_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn mock_silence() {
        let mut dev = MockIqSource::new(None, false);
        dev.open().unwrap();
        let mut buf = vec![1_i8; 65];
        assert_eq!(dev.read_chunk(&mut buf).unwrap(), 64);
        assert!(buf[..64].iter().all(|&b| b == 0));
    }

    #[test]
    fn mock_requires_open() {
        let mut dev = MockIqSource::new(None, false);
        assert!(dev.read_chunk(&mut [0; 8]).is_err());
    }

    #[test]
    fn mock_carrier_rotates_at_offset() {
        let mut dev = MockIqSource::new(Some(250_000.0), false).with_amplitude(0.9);
        dev.open().unwrap();
        dev.set_sample_rate(1_000_000.0).unwrap();
        let mut buf = vec![0_i8; 16];
        dev.read_chunk(&mut buf).unwrap();
        // Quarter turn per sample: (1,0) (0,1) (-1,0) (0,-1)
        let expect = [114, 0, 0, 114, -114, 0, 0, -114];
        assert_eq!(&buf[..8], &expect);
        assert_eq!(&buf[8..], &expect);
    }

    #[test]
    fn mock_carrier_keeps_absolute_frequency_on_retune() {
        let mut dev = MockIqSource::new(Some(100_000.0), false);
        dev.set_center_frequency(100_050_000.0).unwrap();
        assert_approx_eq(
            dev.tone_offset_hz.unwrap_or_default(),
            50_000.0,
            1e-6,
            "offset",
        );
        assert_eq!(dev.center_frequency(), 100_050_000.0);
    }

    #[test]
    fn file_source_ends() {
        let file = iq_file(&[1, 2, 3, 4, 5]);
        let mut dev = FileIqSource::new(file.path(), false, false);
        dev.open().unwrap();
        let mut buf = vec![0_i8; 4];
        assert_eq!(dev.read_chunk(&mut buf).unwrap(), 4);
        assert_eq!(buf, vec![1, 2, 3, 4]);
        // Odd trailing byte is dropped.
        assert_eq!(dev.read_chunk(&mut buf).unwrap(), 0);
    }

    #[test]
    fn file_source_loops() {
        let file = iq_file(&[1, 2, 0xff, 0x80]);
        let mut dev = FileIqSource::new(file.path(), true, false);
        dev.open().unwrap();
        let mut buf = vec![0_i8; 10];
        assert_eq!(dev.read_chunk(&mut buf).unwrap(), 10);
        assert_eq!(buf, vec![1, 2, -1, -128, 1, 2, -1, -128, 1, 2]);
        assert_eq!(dev.read_chunk(&mut buf[..4]).unwrap(), 4);
        assert_eq!(&buf[..4], &[-1, -128, 1, 2]);
    }

    #[test]
    fn empty_looping_file_ends() {
        let file = iq_file(&[]);
        let mut dev = FileIqSource::new(file.path(), true, false);
        dev.open().unwrap();
        assert_eq!(dev.read_chunk(&mut [0; 8]).unwrap(), 0);
    }

    #[test]
    fn missing_file_fails_to_open() {
        let mut dev = FileIqSource::new("/nonexistent/capture.iq", false, false);
        assert!(dev.open().unwrap_err().contains("failed to open"));
        assert!(dev.read_chunk(&mut [0; 8]).is_err());
    }

    #[test]
    fn pacer_spaces_reads() {
        let mut pacer = Pacer::new(true);
        let start = Instant::now();
        pacer.pace(1000, 100_000.0);
        pacer.pace(1000, 100_000.0);
        pacer.pace(1000, 100_000.0);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
