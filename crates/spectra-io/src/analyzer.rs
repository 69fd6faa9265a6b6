//! The real-time analyzer: channel buffers, capture thread and run state.
//!
//! ## Threads and locks
//!
//! One capture thread, spawned by [`Analyzer::init`], reads blocks from the
//! [`Acquisition`] and processes them. Any number of caller threads may query
//! the analyzer through `&Analyzer`.
//!
//! Each channel's [`ChannelData`] sits behind its own mutex. The capture
//! thread holds both locks of a pair `(c, c+1)` while it converts samples,
//! transforms, searches the peak and scans the mask, so a reader holding a
//! channel lock always sees one complete block. Locks are always taken in
//! ascending channel order. Mask mutation goes through the same lock, so a
//! scan never sees a half-written curve.
//!
//! ## States
//!
//! ```text
//! NotInitialized --init--> Stopped <--start/stop--> Running --fatal fault--> Crashed
//! ```
//!
//! `start` and `stop` only publish the new state and wake the capture thread;
//! a block already being read or processed still completes. Nothing leaves
//! `Crashed`: queries keep returning the last block, the block counter stops,
//! and the analyzer has to be dropped and rebuilt.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use spectra_analysis::{
    ChannelData, MaskScanResult, MaskSnapshot, PairTransform, Peak, SpectrumMask, log2_size,
    snri_db, write_psd_table,
};

use crate::backend::{Acquisition, ReadError, SampleFormat, read_block};
use crate::{Error, Result};

/// Full scale of a 16-bit sample; samples normalize into `[-1.0, 1.0)`.
const I16_SCALE: f64 = 32768.0;

/// Largest supported transform size.
pub const MAX_DFT_SIZE: usize = 1 << 16;

/// Run state of an [`Analyzer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalyzerState {
    /// Constructed, `init` not yet successful.
    NotInitialized,
    /// Capture thread parked, device paused.
    Stopped,
    /// Capture thread reading and processing blocks.
    Running,
    /// Unrecoverable acquisition fault. Terminal.
    Crashed,
}

impl std::fmt::Display for AnalyzerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotInitialized => "not initialized",
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Crashed => "crashed",
        };
        f.write_str(name)
    }
}

/// Construction parameters for an [`Analyzer`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    /// Device identifier passed to [`Acquisition::open`]; `None` for the default.
    pub device: Option<String>,
    /// Interleaved channel count. Must be even.
    pub channels: u16,
    /// Requested sample rate in Hz. The device may settle on another.
    pub sample_rate: u32,
    /// Transform size in points, also the block size in frames.
    pub dft_size: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            device: None,
            channels: 2,
            sample_rate: 48000,
            dft_size: 4096,
        }
    }
}

impl AnalyzerSettings {
    /// Check the settings the analyzer depends on.
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 || self.channels % 2 != 0 {
            return Err(Error::InvalidSettings(format!(
                "channel count must be even and non-zero, got {}",
                self.channels
            )));
        }
        if self.sample_rate == 0 {
            return Err(Error::InvalidSettings("sample rate must be positive".into()));
        }
        if self.dft_size < 2 || self.dft_size > MAX_DFT_SIZE || log2_size(self.dft_size).is_none() {
            return Err(Error::InvalidSettings(format!(
                "transform size must be a power of two in 2..={MAX_DFT_SIZE}, got {}",
                self.dft_size
            )));
        }
        Ok(())
    }
}

/// Per-channel results of the latest block, read under one lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    /// Channel index.
    pub channel: usize,
    /// Sequence number of the block the values come from.
    pub block: u64,
    /// Peak search result.
    pub peak: Peak,
    /// Analog frequency of the peak bin, if any.
    pub peak_frequency: Option<f64>,
    /// Peak level in dB.
    pub peak_db: f64,
    /// Peak absolute normalized sample.
    pub amplitude: f64,
    /// RMS of the normalized samples.
    pub rms: f64,
    /// Latest mask scan; clean when no mask is attached.
    pub mask: MaskScanResult,
}

#[derive(Debug)]
struct Control {
    state: AnalyzerState,
    exit: bool,
}

/// Entry point handed to the thread spawner.
type CaptureBody = Box<dyn FnOnce() + Send + 'static>;

/// State shared between the analyzer handle and the capture thread.
#[derive(Debug)]
struct Shared {
    channels: Vec<Mutex<ChannelData>>,
    control: Mutex<Control>,
    wake: Condvar,
    blocks: AtomicU64,
    overruns: AtomicU64,
    sample_rate: AtomicU32,
}

impl Shared {
    fn state(&self) -> AnalyzerState {
        self.control.lock().state
    }

    fn set_state(&self, state: AnalyzerState) {
        let mut control = self.control.lock();
        if control.state != AnalyzerState::Crashed {
            control.state = state;
        }
        self.wake.notify_all();
    }
}

/// Multi-channel periodogram analyzer.
///
/// # Panics
///
/// Queries and mask operations panic when called before a successful
/// [`init`](Self::init), or with a channel or bin index out of range.
pub struct Analyzer {
    settings: AnalyzerSettings,
    shared: Arc<Shared>,
    acquisition: Mutex<Option<Box<dyn Acquisition>>>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("settings", &self.settings)
            .field("state", &self.shared.state())
            .field("blocks", &self.block_count())
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    /// Allocate channel buffers for `settings` around `acquisition`.
    ///
    /// Nothing touches the device until [`init`](Self::init).
    pub fn new(settings: AnalyzerSettings, acquisition: Box<dyn Acquisition>) -> Result<Self> {
        settings.validate()?;

        let channels = (0..settings.channels)
            .map(|_| Mutex::new(ChannelData::new(settings.dft_size)))
            .collect();
        let shared = Arc::new(Shared {
            channels,
            control: Mutex::new(Control {
                state: AnalyzerState::NotInitialized,
                exit: false,
            }),
            wake: Condvar::new(),
            blocks: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            sample_rate: AtomicU32::new(settings.sample_rate),
        });

        Ok(Self {
            settings,
            shared,
            acquisition: Mutex::new(Some(acquisition)),
            worker: None,
        })
    }

    /// Open and negotiate the device, then spawn the capture thread.
    ///
    /// On success the state is [`AnalyzerState::Stopped`]. On a device
    /// failure the state stays [`AnalyzerState::NotInitialized`], the
    /// acquisition is closed and kept, and `init` may be called again.
    ///
    /// # Panics
    ///
    /// Panics if the analyzer was already initialized.
    pub fn init(&mut self) -> Result<()> {
        self.init_with(|builder, body| builder.spawn(body))
    }

    fn init_with<F>(&mut self, spawn: F) -> Result<()>
    where
        F: FnOnce(std::thread::Builder, CaptureBody) -> std::io::Result<JoinHandle<()>>,
    {
        assert!(self.worker.is_none(), "analyzer already initialized");
        let mut slot = self.acquisition.lock();
        let Some(acquisition) = slot.as_deref_mut() else {
            panic!("analyzer has no acquisition");
        };

        let name = acquisition.name();
        let rate = match Self::setup(acquisition, &self.settings) {
            Ok(rate) => rate,
            Err(e) => {
                tracing::error!(backend = name, error = %e, "analyzer init failed");
                acquisition.close();
                return Err(e);
            }
        };

        // The thread receives the acquisition only once it exists, so a
        // failed spawn leaves it in the slot for a retry.
        let (handoff, inbox) = crossbeam_channel::bounded::<Box<dyn Acquisition>>(1);
        let shared = Arc::clone(&self.shared);
        let dft_size = self.settings.dft_size;
        let body: CaptureBody = Box::new(move || {
            if let Ok(acquisition) = inbox.recv() {
                capture_loop(&shared, acquisition, dft_size);
            }
        });
        let builder = std::thread::Builder::new().name("spectra-capture".to_string());
        let worker = match spawn(builder, body) {
            Ok(worker) => worker,
            Err(e) => {
                tracing::error!(backend = name, error = %e, "capture thread spawn failed");
                acquisition.close();
                return Err(e.into());
            }
        };

        let Some(acquisition) = slot.take() else {
            panic!("analyzer has no acquisition");
        };
        drop(slot);
        self.shared.sample_rate.store(rate, Ordering::Release);
        if let Err(returned) = handoff.send(acquisition) {
            let mut acquisition = returned.into_inner();
            acquisition.close();
            *self.acquisition.lock() = Some(acquisition);
            let _ = worker.join();
            return Err(Error::Device("capture thread exited before start".into()));
        }

        self.worker = Some(worker);
        self.shared.control.lock().state = AnalyzerState::Stopped;
        tracing::info!(
            backend = name,
            channels = self.settings.channels,
            sample_rate = rate,
            dft_size,
            "analyzer initialized"
        );
        Ok(())
    }

    fn setup(acquisition: &mut dyn Acquisition, settings: &AnalyzerSettings) -> Result<u32> {
        acquisition.open(settings.device.as_deref())?;
        let rate = acquisition.negotiate(SampleFormat::S16Le, settings.channels, settings.sample_rate)?;
        if rate == 0 {
            return Err(Error::Device("device negotiated a zero sample rate".into()));
        }
        Ok(rate)
    }

    /// Begin processing blocks.
    ///
    /// Returns [`Error::Crashed`] if the capture thread has died.
    ///
    /// # Panics
    ///
    /// Panics before a successful [`init`](Self::init).
    pub fn start(&self) -> Result<()> {
        self.transition(AnalyzerState::Running)
    }

    /// Stop processing after the block in flight.
    ///
    /// Returns [`Error::Crashed`] if the capture thread has died.
    ///
    /// # Panics
    ///
    /// Panics before a successful [`init`](Self::init).
    pub fn stop(&self) -> Result<()> {
        self.transition(AnalyzerState::Stopped)
    }

    fn transition(&self, target: AnalyzerState) -> Result<()> {
        let mut control = self.shared.control.lock();
        match control.state {
            AnalyzerState::NotInitialized => panic!("analyzer not initialized"),
            AnalyzerState::Crashed => Err(Error::Crashed),
            current => {
                if current != target {
                    tracing::info!(from = %current, to = %target, "analyzer state change");
                }
                control.state = target;
                self.shared.wake.notify_all();
                Ok(())
            }
        }
    }

    /// Current run state.
    pub fn state(&self) -> AnalyzerState {
        self.shared.state()
    }

    /// Settings the analyzer was built with.
    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    fn assert_initialized(&self) {
        assert!(
            self.shared.state() != AnalyzerState::NotInitialized,
            "analyzer not initialized"
        );
    }

    fn channel(&self, channel: usize) -> MutexGuard<'_, ChannelData> {
        self.assert_initialized();
        assert!(
            channel < self.shared.channels.len(),
            "channel {channel} out of range (analyzer has {})",
            self.shared.channels.len()
        );
        self.shared.channels[channel].lock()
    }

    fn check_bin(&self, bin: usize) {
        assert!(
            bin < self.settings.dft_size,
            "bin {bin} out of range (transform size {})",
            self.settings.dft_size
        );
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.shared.channels.len()
    }

    /// Bin of the largest positive-frequency PSD value, `None` if all bins
    /// are below the detection floor.
    pub fn find_peak(&self, channel: usize) -> Option<usize> {
        self.channel(channel).peak().index
    }

    /// Peak bin and value.
    pub fn peak(&self, channel: usize) -> Peak {
        self.channel(channel).peak()
    }

    /// Analog frequency of the peak bin.
    pub fn peak_frequency(&self, channel: usize) -> Option<f64> {
        self.find_peak(channel).map(|bin| self.analog_frequency(bin))
    }

    /// Linear power at `bin`.
    pub fn power_spectral_density(&self, channel: usize, bin: usize) -> f64 {
        self.check_bin(bin);
        self.channel(channel).psd()[bin]
    }

    /// Power at `bin` in dB; `-inf` for a zero bin.
    pub fn power_spectral_density_decibels(&self, channel: usize, bin: usize) -> f64 {
        10.0 * self.power_spectral_density(channel, bin).log10()
    }

    /// Center frequency of `bin` in Hz.
    pub fn analog_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.analog_resolution()
    }

    /// SNRI in dB of the band `[f1, f2]` Hz on `channel`.
    pub fn snri(&self, channel: usize, f1: f64, f2: f64) -> f64 {
        let fs = f64::from(self.sampling_frequency());
        let data = self.channel(channel);
        snri_db(data.psd(), fs, f1, f2)
    }

    /// Peak absolute normalized sample of the last block.
    pub fn amplitude(&self, channel: usize) -> f64 {
        self.channel(channel).amplitude()
    }

    /// RMS of the last block.
    pub fn rms(&self, channel: usize) -> f64 {
        self.channel(channel).rms()
    }

    /// Peak, levels and mask result of one channel, all from the same block.
    pub fn snapshot(&self, channel: usize) -> ChannelSnapshot {
        let resolution = self.analog_resolution();
        let data = self.channel(channel);
        let peak = data.peak();
        ChannelSnapshot {
            channel,
            block: data.block(),
            peak,
            peak_frequency: peak.index.map(|bin| bin as f64 * resolution),
            peak_db: 10.0 * peak.value.log10(),
            amplitude: data.amplitude(),
            rms: data.rms(),
            mask: data.mask_result(),
        }
    }

    /// Copy of the channel's mask curve and latest scan, if a mask is attached.
    pub fn mask(&self, channel: usize) -> Option<MaskSnapshot> {
        self.channel(channel).mask_snapshot()
    }

    /// Attach `mask` to `channel`, replacing any previous one.
    ///
    /// # Panics
    ///
    /// Panics if the mask was built for another transform size or for a
    /// sample rate other than the negotiated one.
    pub fn set_mask(&self, channel: usize, mask: SpectrumMask) {
        let sample_rate = self.sampling_frequency();
        assert_eq!(
            mask.sample_rate(),
            sample_rate,
            "mask sample rate does not match the negotiated rate"
        );
        self.channel(channel).set_mask(mask);
    }

    /// Detach the mask from `channel`.
    pub fn clear_mask(&self, channel: usize) -> Option<SpectrumMask> {
        self.channel(channel).clear_mask()
    }

    /// Mutate the mask of `channel` under the channel lock.
    ///
    /// A mask with all thresholds at 0 dB is attached first if the channel
    /// has none.
    pub fn with_mask<R>(&self, channel: usize, f: impl FnOnce(&mut SpectrumMask) -> R) -> R {
        let sample_rate = self.sampling_frequency();
        let dft_size = self.settings.dft_size;
        let mut data = self.channel(channel);
        if let Some(mask) = data.mask_mut() {
            return f(mask);
        }
        let mut mask = SpectrumMask::new(sample_rate, dft_size);
        let result = f(&mut mask);
        data.set_mask(mask);
        result
    }

    /// Set every threshold of the channel's mask to `-attenuation` dB.
    pub fn reset_mask(&self, channel: usize, attenuation: f64) {
        self.with_mask(channel, |mask| mask.reset(attenuation));
    }

    /// Set the band `[f1, f2]` Hz of the channel's mask to `-attenuation` dB.
    pub fn set_mask_band(&self, channel: usize, f1: f64, f2: f64, attenuation: f64) {
        self.with_mask(channel, |mask| mask.set_band_attenuation(f1, f2, attenuation));
    }

    /// Shift the channel's mask by `offset_db`.
    pub fn set_mask_offset(&self, channel: usize, offset_db: f64) {
        self.with_mask(channel, |mask| mask.set_vertical_offset(offset_db));
    }

    /// Number of fully processed blocks.
    pub fn block_count(&self) -> u64 {
        self.shared.blocks.load(Ordering::Acquire)
    }

    /// Number of overruns absorbed by the capture thread.
    pub fn overrun_count(&self) -> u64 {
        self.shared.overruns.load(Ordering::Acquire)
    }

    /// Transform size in points.
    pub fn dft_size(&self) -> usize {
        self.settings.dft_size
    }

    /// Negotiated sample rate in Hz.
    pub fn sampling_frequency(&self) -> u32 {
        self.assert_initialized();
        self.shared.sample_rate.load(Ordering::Acquire)
    }

    /// Bin width in Hz.
    pub fn analog_resolution(&self) -> f64 {
        f64::from(self.sampling_frequency()) / self.settings.dft_size as f64
    }

    /// Write the PSD of every channel as a text table.
    ///
    /// All channel locks are held while writing, so the table describes a
    /// single block.
    pub fn write_psd<W: Write>(&self, out: W) -> Result<()> {
        let fs = f64::from(self.sampling_frequency());
        let guards: Vec<MutexGuard<'_, ChannelData>> =
            self.shared.channels.iter().map(|c| c.lock()).collect();
        let psds: Vec<&[f64]> = guards.iter().map(|g| g.psd()).collect();
        write_psd_table(out, fs, &psds)?;
        Ok(())
    }

    /// Write the PSD table to the file at `path`.
    pub fn dump_psd(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        self.write_psd(std::io::BufWriter::new(file))?;
        tracing::info!(path = %path.display(), blocks = self.block_count(), "psd dumped");
        Ok(())
    }
}

impl Drop for Analyzer {
    fn drop(&mut self) {
        {
            let mut control = self.shared.control.lock();
            control.exit = true;
            self.shared.wake.notify_all();
        }
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!("capture thread panicked");
        }
    }
}

/// Body of the capture thread.
///
/// Parks while not running, reads one block per iteration, absorbs overruns
/// and exits on a fatal fault or an exit request.
fn capture_loop(shared: &Shared, mut acquisition: Box<dyn Acquisition>, dft_size: usize) {
    let channels = shared.channels.len();
    let mut raw = vec![0i16; dft_size * channels];
    let mut transform = PairTransform::new(dft_size);
    let mut paused = true;

    tracing::info!(backend = acquisition.name(), "capture thread started");
    acquisition.pause();

    loop {
        {
            let mut control = shared.control.lock();
            if control.state != AnalyzerState::Running && !control.exit && !paused {
                drop(control);
                acquisition.pause();
                paused = true;
                continue;
            }
            while control.state != AnalyzerState::Running && !control.exit {
                shared.wake.wait(&mut control);
            }
            if control.exit {
                break;
            }
        }
        if paused {
            acquisition.resume();
            paused = false;
        }

        match read_block(acquisition.as_mut(), &mut raw) {
            Ok(()) => {}
            Err(ReadError::Overrun) => {
                let total = shared.overruns.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::warn!(overruns = total, "input overrun");
                if let Err(e) = acquisition.recover() {
                    tracing::warn!(error = %e, "overrun recovery failed");
                }
                continue;
            }
            Err(ReadError::Fatal(reason)) => {
                tracing::error!(%reason, "fatal acquisition fault, analyzer crashed");
                {
                    let mut control = shared.control.lock();
                    control.state = AnalyzerState::Crashed;
                    shared.wake.notify_all();
                }
                acquisition.close();
                return;
            }
        }

        // Only this thread advances the counter.
        let block = shared.blocks.load(Ordering::Acquire) + 1;
        process_block(shared, &raw, &mut transform, block);
        shared.blocks.store(block, Ordering::Release);
        tracing::debug!(block, "block processed");
    }

    shared.set_state(AnalyzerState::Stopped);
    acquisition.close();
    tracing::info!("capture thread stopped");
}

/// Convert one interleaved block and analyze every channel pair.
fn process_block(shared: &Shared, raw: &[i16], transform: &mut PairTransform, block: u64) {
    let channels = shared.channels.len();
    for (index, pair) in shared.channels.chunks_exact(2).enumerate() {
        let first = index * 2;
        let mut a = pair[0].lock();
        let mut b = pair[1].lock();

        deinterleave(raw, channels, first, a.time_domain_mut());
        deinterleave(raw, channels, first + 1, b.time_domain_mut());
        transform.transform_pair(&mut a, &mut b);
        a.analyze();
        b.analyze();
        a.set_block(block);
        b.set_block(block);
    }
}

/// Extract channel `channel` of interleaved 16-bit frames as normalized samples.
fn deinterleave(raw: &[i16], channels: usize, channel: usize, out: &mut [f64]) {
    for (sample, frame) in out.iter_mut().zip(raw.chunks_exact(channels)) {
        *sample = f64::from(frame[channel]) / I16_SCALE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_validation() {
        assert!(AnalyzerSettings::default().validate().is_ok());

        let odd = AnalyzerSettings {
            channels: 3,
            ..AnalyzerSettings::default()
        };
        assert!(matches!(odd.validate(), Err(Error::InvalidSettings(_))));

        let not_pow2 = AnalyzerSettings {
            dft_size: 1000,
            ..AnalyzerSettings::default()
        };
        assert!(not_pow2.validate().is_err());

        let too_big = AnalyzerSettings {
            dft_size: MAX_DFT_SIZE * 2,
            ..AnalyzerSettings::default()
        };
        assert!(too_big.validate().is_err());
    }

    #[test]
    fn test_deinterleave_normalizes() {
        let raw = [i16::MIN, 0, 16384, i16::MAX, 0, 1];
        let mut left = [0.0; 3];
        let mut right = [0.0; 3];
        deinterleave(&raw, 2, 0, &mut left);
        deinterleave(&raw, 2, 1, &mut right);
        assert_eq!(left, [-1.0, 0.5, 0.0]);
        assert_eq!(right[0], 0.0);
        assert!(right[1] < 1.0);
        assert_eq!(right[2], 1.0 / 32768.0);
    }

    #[test]
    fn test_failed_spawn_keeps_acquisition_for_retry() {
        let settings = AnalyzerSettings {
            dft_size: 256,
            ..AnalyzerSettings::default()
        };
        let source = crate::SyntheticAcquisition::new(1000.0, 0.5);
        let mut analyzer = Analyzer::new(settings, Box::new(source)).unwrap();

        let err = analyzer
            .init_with(|_, _| Err(std::io::Error::other("thread limit reached")))
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(analyzer.state(), AnalyzerState::NotInitialized);

        analyzer.init().unwrap();
        assert_eq!(analyzer.state(), AnalyzerState::Stopped);
        analyzer.start().unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while analyzer.block_count() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(analyzer.block_count() > 0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(AnalyzerState::Crashed.to_string(), "crashed");
        assert_eq!(AnalyzerState::NotInitialized.to_string(), "not initialized");
    }
}
