//! Test tone synthesis.
//!
//! [`ToneGenerator`] produces a continuous periodic waveform, block after
//! block, with no phase discontinuity between blocks. Output is available as
//! normalized floats or as 16-bit signed samples written into an interleaved
//! frame buffer, the layout delivered by the capture hardware.

use std::f64::consts::PI;

/// Periodic waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    /// Cosine.
    #[default]
    Sine,
    /// Rising ramp from -1 to 1 once per period.
    Sawtooth,
    /// +1 for the first half period, -1 for the second.
    Square,
}

impl std::str::FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sine" | "cosine" => Ok(Waveform::Sine),
            "saw" | "sawtooth" => Ok(Waveform::Sawtooth),
            "square" => Ok(Waveform::Square),
            other => Err(format!("unknown waveform '{other}' (expected sine, sawtooth or square)")),
        }
    }
}

/// Continuous-phase tone generator.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    waveform: Waveform,
    sample_rate: f64,
    frequency: f64,
    amplitude: f64,
    /// Phase in cycles, kept in `[0, 1)`.
    phase: f64,
}

impl ToneGenerator {
    /// Create a generator for `frequency` Hz at `sample_rate` Hz with the given peak amplitude.
    pub fn new(waveform: Waveform, sample_rate: f64, frequency: f64, amplitude: f64) -> Self {
        Self {
            waveform,
            sample_rate,
            frequency,
            amplitude: amplitude.clamp(0.0, 1.0),
            phase: 0.0,
        }
    }

    /// Current fundamental frequency in Hz.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Peak amplitude in `[0, 1]`.
    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// Highest frequency this generator can represent (Nyquist).
    pub fn max_frequency(&self) -> f64 {
        self.sample_rate / 2.0
    }

    /// Produce the next sample in `[-amplitude, amplitude]`.
    pub fn next_sample(&mut self) -> f64 {
        let value = match self.waveform {
            Waveform::Sine => (2.0 * PI * self.phase).cos(),
            Waveform::Sawtooth => 2.0 * self.phase - 1.0,
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        };
        self.phase = (self.phase + self.frequency / self.sample_rate).fract();
        self.amplitude * value
    }

    /// Fill `out` with consecutive samples.
    pub fn fill(&mut self, out: &mut [f64]) {
        for sample in out {
            *sample = self.next_sample();
        }
    }

    /// Write consecutive samples into one channel of an interleaved i16 buffer.
    ///
    /// `frames` holds `frames.len() / channels` frames; sample `i` of this
    /// tone goes to `frames[i * channels + channel]`.
    pub fn fill_interleaved_i16(&mut self, frames: &mut [i16], channels: usize, channel: usize) {
        debug_assert!(channel < channels);
        for frame in frames.chunks_exact_mut(channels) {
            frame[channel] = to_i16(self.next_sample());
        }
    }
}

/// Quantize a normalized sample to 16-bit signed, saturating at full scale.
pub fn to_i16(sample: f64) -> i16 {
    (sample * 32767.0).round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Generate `num_samples` of a cosine tone, for tests and offline analysis.
pub fn generate_test_tone(sample_rate: f64, frequency: f64, num_samples: usize, amplitude: f64) -> Vec<f64> {
    let mut generator = ToneGenerator::new(Waveform::Sine, sample_rate, frequency, amplitude);
    let mut out = vec![0.0; num_samples];
    generator.fill(&mut out);
    out
}
