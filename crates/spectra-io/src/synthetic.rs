//! Synthetic acquisition: generated tones with scripted faults.
//!
//! Stands in for a capture device in tests and demos. Each channel carries
//! its own [`ToneGenerator`]; a [`FaultPlan`] injects overruns and fatal
//! faults at chosen read calls so the analyzer's recovery paths can be
//! exercised without hardware.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use spectra_analysis::{ToneGenerator, Waveform};

use crate::backend::{Acquisition, ReadError, SampleFormat};
use crate::{Error, Result};

/// Faults to inject, keyed by zero-based read call number.
///
/// Read calls are counted across the whole session, including the retries
/// that follow an overrun.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Read calls that report an overrun instead of data.
    pub overrun_at: BTreeSet<u64>,
    /// First read call that reports a fatal fault; every later read fails too.
    pub fatal_at: Option<u64>,
    /// Make `open` fail.
    pub fail_open: bool,
    /// Make `recover` fail.
    pub fail_recover: bool,
}

impl FaultPlan {
    /// Overruns at the given read calls.
    pub fn overruns(reads: impl IntoIterator<Item = u64>) -> Self {
        Self {
            overrun_at: reads.into_iter().collect(),
            ..Self::default()
        }
    }

    /// A fatal fault starting at read call `read`.
    pub fn fatal(read: u64) -> Self {
        Self {
            fatal_at: Some(read),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ToneSpec {
    waveform: Waveform,
    frequency: f64,
    amplitude: f64,
}

/// Tone source implementing [`Acquisition`].
#[derive(Debug)]
pub struct SyntheticAcquisition {
    default_tone: ToneSpec,
    overrides: Vec<(usize, ToneSpec)>,
    faults: FaultPlan,
    realtime: bool,
    generators: Vec<ToneGenerator>,
    sample_rate: u32,
    reads: u64,
    frames_delivered: u64,
    clock: Option<Instant>,
    open: bool,
}

impl SyntheticAcquisition {
    /// Every channel carries a sine of `frequency` Hz at `amplitude` (0..=1).
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            default_tone: ToneSpec {
                waveform: Waveform::Sine,
                frequency,
                amplitude,
            },
            overrides: Vec::new(),
            faults: FaultPlan::default(),
            realtime: false,
            generators: Vec::new(),
            sample_rate: 0,
            reads: 0,
            frames_delivered: 0,
            clock: None,
            open: false,
        }
    }

    /// Override the tone on one channel. Amplitude 0 gives a silent channel.
    pub fn with_channel_tone(
        mut self,
        channel: usize,
        waveform: Waveform,
        frequency: f64,
        amplitude: f64,
    ) -> Self {
        self.overrides.push((
            channel,
            ToneSpec {
                waveform,
                frequency,
                amplitude,
            },
        ));
        self
    }

    /// Inject faults.
    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    /// Pace reads to the negotiated sample rate instead of returning at once.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Number of read calls served so far.
    pub fn reads(&self) -> u64 {
        self.reads
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

impl Acquisition for SyntheticAcquisition {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn open(&mut self, _device: Option<&str>) -> Result<()> {
        if self.faults.fail_open {
            return Err(Error::Device("synthetic open failure".into()));
        }
        self.open = true;
        Ok(())
    }

    fn negotiate(&mut self, format: SampleFormat, channels: u16, sample_rate: u32) -> Result<u32> {
        let SampleFormat::S16Le = format;
        if !self.open {
            return Err(Error::Device("negotiate before open".into()));
        }
        if channels == 0 || sample_rate == 0 {
            return Err(Error::InvalidSettings(format!(
                "cannot synthesize {channels} channels at {sample_rate} Hz"
            )));
        }

        let fs = f64::from(sample_rate);
        self.generators = (0..usize::from(channels))
            .map(|channel| {
                let spec = self
                    .overrides
                    .iter()
                    .rev()
                    .find(|(c, _)| *c == channel)
                    .map_or(self.default_tone, |(_, spec)| *spec);
                ToneGenerator::new(spec.waveform, fs, spec.frequency, spec.amplitude)
            })
            .collect();
        for (channel, generator) in self.generators.iter().enumerate() {
            if generator.frequency() > generator.max_frequency() {
                tracing::warn!(
                    channel,
                    frequency = generator.frequency(),
                    nyquist = generator.max_frequency(),
                    "synthetic tone above Nyquist will alias"
                );
            } else {
                tracing::debug!(
                    channel,
                    frequency = generator.frequency(),
                    amplitude = generator.amplitude(),
                    "synthetic tone"
                );
            }
        }
        self.sample_rate = sample_rate;
        Ok(sample_rate)
    }

    fn read(&mut self, buf: &mut [i16]) -> std::result::Result<usize, ReadError> {
        let call = self.reads;
        self.reads += 1;

        if self.faults.fatal_at.is_some_and(|at| call >= at) {
            return Err(ReadError::Fatal(format!("injected fault at read {call}")));
        }
        if self.faults.overrun_at.remove(&call) {
            return Err(ReadError::Overrun);
        }

        let channels = self.generators.len();
        if channels == 0 {
            return Err(ReadError::Fatal("read before negotiate".into()));
        }
        let frames = buf.len() / channels;
        let len = frames * channels;
        for (channel, generator) in self.generators.iter_mut().enumerate() {
            generator.fill_interleaved_i16(&mut buf[..len], channels, channel);
        }
        self.pace(frames as u64);
        Ok(len)
    }

    fn recover(&mut self) -> Result<()> {
        if self.faults.fail_recover {
            return Err(Error::Device("synthetic recover failure".into()));
        }
        Ok(())
    }

    fn resume(&mut self) {
        self.clock = None;
        self.frames_delivered = 0;
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened(acq: &mut SyntheticAcquisition, channels: u16) {
        acq.open(None).unwrap();
        assert_eq!(acq.negotiate(SampleFormat::S16Le, channels, 48000).unwrap(), 48000);
    }

    #[test]
    fn test_channels_carry_their_own_tone() {
        let mut acq = SyntheticAcquisition::new(1000.0, 0.5).with_channel_tone(1, Waveform::Sine, 1000.0, 0.0);
        opened(&mut acq, 2);

        let mut buf = [0i16; 64];
        assert_eq!(acq.read(&mut buf).unwrap(), 64);
        // Cosine phase: first sample of channel 0 is the peak.
        assert_eq!(buf[0], 16384);
        assert!(buf.iter().skip(1).step_by(2).all(|&s| s == 0));
    }

    #[test]
    fn test_overrun_fires_once() {
        let mut acq = SyntheticAcquisition::new(440.0, 0.5).with_faults(FaultPlan::overruns([1]));
        opened(&mut acq, 2);

        let mut buf = [0i16; 32];
        assert!(acq.read(&mut buf).is_ok());
        assert_eq!(acq.read(&mut buf), Err(ReadError::Overrun));
        assert!(acq.read(&mut buf).is_ok());
        assert_eq!(acq.reads(), 3);
    }

    #[test]
    fn test_fatal_is_sticky() {
        let mut acq = SyntheticAcquisition::new(440.0, 0.5).with_faults(FaultPlan::fatal(1));
        opened(&mut acq, 2);

        let mut buf = [0i16; 32];
        assert!(acq.read(&mut buf).is_ok());
        assert!(matches!(acq.read(&mut buf), Err(ReadError::Fatal(_))));
        assert!(matches!(acq.read(&mut buf), Err(ReadError::Fatal(_))));
    }

    #[test]
    fn test_open_failure() {
        let mut acq = SyntheticAcquisition::new(440.0, 0.5).with_faults(FaultPlan {
            fail_open: true,
            ..FaultPlan::default()
        });
        assert!(acq.open(None).is_err());
    }

    #[test]
    fn test_read_truncates_to_whole_frames() {
        let mut acq = SyntheticAcquisition::new(440.0, 0.5);
        opened(&mut acq, 4);
        let mut buf = [0i16; 10];
        assert_eq!(acq.read(&mut buf).unwrap(), 8);
    }
}
