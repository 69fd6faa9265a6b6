//! WAV replay acquisition.
//!
//! Plays a 16-bit PCM WAV file into the analyzer as if it were captured
//! live. The file's own sample rate is reported as the negotiated rate.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use hound::{SampleFormat as WavSampleFormat, WavReader};

use crate::backend::{Acquisition, ReadError, SampleFormat};
use crate::{Error, Result};

/// File-backed [`Acquisition`].
#[derive(Debug)]
pub struct WavAcquisition {
    path: PathBuf,
    looping: bool,
    realtime: bool,
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
    position: usize,
    frames_delivered: u64,
    clock: Option<Instant>,
}

impl WavAcquisition {
    /// Replay the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            looping: false,
            realtime: false,
            samples: Vec::new(),
            channels: 0,
            sample_rate: 0,
            position: 0,
            frames_delivered: 0,
            clock: None,
        }
    }

    /// Start over from the beginning when the file ends.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Pace reads to the file's sample rate.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    fn pace(&mut self, frames: u64) {
        if !self.realtime || self.sample_rate == 0 {
            return;
        }
        let start = *self.clock.get_or_insert_with(Instant::now);
        self.frames_delivered += frames;
        let due = Duration::from_secs_f64(self.frames_delivered as f64 / f64::from(self.sample_rate));
        if let Some(wait) = due.checked_sub(start.elapsed()) {
            std::thread::sleep(wait);
        }
    }
}

impl Acquisition for WavAcquisition {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn open(&mut self, _device: Option<&str>) -> Result<()> {
        let reader = WavReader::open(&self.path)?;
        let spec = reader.spec();
        if spec.sample_format != WavSampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(Error::UnsupportedFormat(format!(
                "{}: {}-bit {:?}, expected 16-bit PCM",
                self.path.display(),
                spec.bits_per_sample,
                spec.sample_format
            )));
        }

        self.samples = reader.into_samples::<i16>().collect::<std::result::Result<_, _>>()?;
        self.channels = spec.channels;
        self.sample_rate = spec.sample_rate;
        self.position = 0;
        tracing::info!(
            path = %self.path.display(),
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            frames = self.samples.len() / usize::from(spec.channels.max(1)),
            "wav source opened"
        );
        Ok(())
    }

    fn negotiate(&mut self, format: SampleFormat, channels: u16, sample_rate: u32) -> Result<u32> {
        let SampleFormat::S16Le = format;
        if channels != self.channels {
            return Err(Error::InvalidSettings(format!(
                "{} has {} channels, {} requested",
                self.path.display(),
                self.channels,
                channels
            )));
        }
        if sample_rate != self.sample_rate {
            tracing::info!(
                requested = sample_rate,
                actual = self.sample_rate,
                "using the file's sample rate"
            );
        }
        Ok(self.sample_rate)
    }

    fn read(&mut self, buf: &mut [i16]) -> std::result::Result<usize, ReadError> {
        let channels = usize::from(self.channels);
        if channels == 0 || self.samples.len() < channels {
            return Err(ReadError::Fatal(format!("{} holds no frames", self.path.display())));
        }
        if self.position >= self.samples.len() {
            if !self.looping {
                return Err(ReadError::Fatal(format!("end of {}", self.path.display())));
            }
            self.position = 0;
        }

        let available = self.samples.len() - self.position;
        let len = buf.len().min(available) / channels * channels;
        buf[..len].copy_from_slice(&self.samples[self.position..self.position + len]);
        self.position += len;
        self.pace((len / channels) as u64);
        Ok(len)
    }

    fn recover(&mut self) -> Result<()> {
        Ok(())
    }

    fn resume(&mut self) {
        self.clock = None;
        self.frames_delivered = 0;
    }

    fn close(&mut self) {
        self.samples = Vec::new();
        self.position = 0;
    }
}
