//! Shared CLI helpers used across multiple commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use spectra_analysis::Waveform;
use spectra_config::{AnalyzerConfig, Backend, SnriConfig, default_config_path};
use spectra_io::{
    Acquisition, Analyzer, AnalyzerSettings, CpalAcquisition, FaultPlan, SyntheticAcquisition,
    WavAcquisition,
};

/// Source and transform overrides shared by `monitor` and `dump`.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Sample source: cpal, wav or synthetic
    #[arg(long)]
    pub backend: Option<Backend>,

    /// Capture device (index or name, partial match supported)
    #[arg(short, long)]
    pub device: Option<String>,

    /// WAV file to replay (implies --backend wav)
    #[arg(long)]
    pub wav: Option<PathBuf>,

    /// Restart the WAV file when it ends
    #[arg(long = "loop")]
    pub looping: bool,

    /// Synthetic tone frequency in Hz
    #[arg(long)]
    pub tone: Option<f64>,

    /// Synthetic tone amplitude (0-1)
    #[arg(long)]
    pub amplitude: Option<f64>,

    /// Requested sample rate in Hz
    #[arg(short = 'r', long)]
    pub sample_rate: Option<u32>,

    /// Channel count (even)
    #[arg(short, long)]
    pub channels: Option<u16>,

    /// Transform size (power of two)
    #[arg(short = 'n', long)]
    pub dft_size: Option<usize>,

    /// Read file and synthetic sources as fast as possible
    #[arg(long)]
    pub no_realtime: bool,

    /// SNRI band in Hz, e.g. `--snri 900 1100`
    #[arg(long, num_args = 2, value_names = ["F1", "F2"])]
    pub snri: Option<Vec<f64>>,

    /// Make the synthetic source fail at this read (testing aid)
    #[arg(long, hide = true)]
    pub fail_after: Option<u64>,
}

impl SourceArgs {
    /// Apply command-line overrides on top of the file configuration.
    pub fn apply(&self, config: &mut AnalyzerConfig) {
        let acquisition = &mut config.acquisition;
        if let Some(backend) = self.backend {
            acquisition.backend = backend;
        }
        if let Some(path) = &self.wav {
            acquisition.wav_path = Some(path.clone());
            if self.backend.is_none() {
                acquisition.backend = Backend::Wav;
            }
        }
        if self.device.is_some() {
            acquisition.device.clone_from(&self.device);
        }
        if self.looping {
            acquisition.looping = true;
        }
        if let Some(tone) = self.tone {
            acquisition.tone_hz = tone;
        }
        if let Some(amplitude) = self.amplitude {
            acquisition.tone_amplitude = amplitude;
        }
        if let Some(rate) = self.sample_rate {
            acquisition.sample_rate = rate;
        }
        if let Some(channels) = self.channels {
            acquisition.channels = channels;
        }
        if self.no_realtime {
            acquisition.realtime = false;
        }
        if let Some(size) = self.dft_size {
            config.transform.dft_size = size;
        }
        if let Some([f1, f2]) = self.snri.as_deref() {
            config.snri = Some(SnriConfig { f1: *f1, f2: *f2 });
        }
    }
}

/// Load the configuration.
///
/// An explicit path must exist. Without one, the user config file is used
/// if present, otherwise built-in defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AnalyzerConfig> {
    if let Some(path) = path {
        return AnalyzerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()));
    }

    let default = default_config_path();
    if default.exists() {
        tracing::debug!(path = %default.display(), "using user config");
        return AnalyzerConfig::load(&default)
            .with_context(|| format!("loading config {}", default.display()));
    }
    Ok(AnalyzerConfig::default())
}

/// Load the configuration and apply `source` overrides, then validate.
pub fn effective_config(path: Option<&Path>, source: &SourceArgs) -> anyhow::Result<AnalyzerConfig> {
    let mut config = load_config(path)?;
    source.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Build the acquisition backend named by the configuration.
pub fn build_acquisition(config: &AnalyzerConfig, fail_after: Option<u64>) -> anyhow::Result<Box<dyn Acquisition>> {
    let acquisition = &config.acquisition;
    Ok(match acquisition.backend {
        Backend::Cpal => Box::new(CpalAcquisition::new()),
        Backend::Wav => {
            let path = acquisition
                .wav_path
                .as_ref()
                .context("the wav backend needs a file (--wav or acquisition.wav_path)")?;
            Box::new(
                WavAcquisition::new(path)
                    .looping(acquisition.looping)
                    .realtime(acquisition.realtime),
            )
        }
        Backend::Synthetic => {
            let mut source = SyntheticAcquisition::new(acquisition.tone_hz, acquisition.tone_amplitude)
                .realtime(acquisition.realtime);
            // Odd channels carry the second harmonic so pairs are distinguishable.
            for channel in (1..usize::from(acquisition.channels)).step_by(2) {
                source = source.with_channel_tone(
                    channel,
                    Waveform::Sine,
                    acquisition.tone_hz * 2.0,
                    acquisition.tone_amplitude / 2.0,
                );
            }
            if let Some(read) = fail_after {
                source = source.with_faults(FaultPlan::fatal(read));
            }
            Box::new(source)
        }
    })
}

/// Build, initialize and configure an analyzer. The analyzer is left stopped.
pub fn build_analyzer(config: &AnalyzerConfig, fail_after: Option<u64>) -> anyhow::Result<Analyzer> {
    let settings = AnalyzerSettings {
        device: config.acquisition.device.clone(),
        channels: config.acquisition.channels,
        sample_rate: config.acquisition.sample_rate,
        dft_size: config.transform.dft_size,
    };
    let acquisition = build_acquisition(config, fail_after)?;
    let backend = acquisition.name();

    let mut analyzer = Analyzer::new(settings, acquisition)?;
    analyzer
        .init()
        .with_context(|| format!("initializing the {backend} source"))?;
    apply_masks(&analyzer, config);
    Ok(analyzer)
}

/// Attach the configured masks to their channels.
pub fn apply_masks(analyzer: &Analyzer, config: &AnalyzerConfig) {
    for mask in &config.masks {
        analyzer.with_mask(mask.channel, |m| {
            m.reset(mask.attenuation);
            for band in &mask.bands {
                m.set_band_attenuation(band.f1, band.f2, band.attenuation);
            }
            m.set_vertical_offset(mask.vertical_offset);
        });
        tracing::debug!(channel = mask.channel, bands = mask.bands.len(), "mask attached");
    }
}

/// Format a possibly infinite dB value.
pub fn format_db(value: f64) -> String {
    if value.is_nan() {
        "    n/a".to_string()
    } else if value == f64::INFINITY {
        "   +inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "   -inf".to_string()
    } else {
        format!("{value:7.2}")
    }
}
