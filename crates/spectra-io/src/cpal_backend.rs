//! cpal capture backend.
//!
//! cpal delivers samples through a callback on its own audio thread. The
//! callback copies each buffer into a bounded [`crossbeam_channel`] queue and
//! [`CpalAcquisition::read`] drains that queue from the capture thread,
//! turning the push-style API into the blocking read the analyzer expects.
//!
//! Fault mapping:
//!
//! - queue full in the callback: the buffer is dropped and the next read
//!   reports [`ReadError::Overrun`]
//! - stream error callback: the next read reports [`ReadError::Fatal`]
//! - no data for [`STARVATION_TIMEOUT`]: [`ReadError::Fatal`]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Host, Stream};
use crossbeam_channel::{Receiver, RecvTimeoutError, TrySendError};

use crate::backend::{Acquisition, ReadError, SampleFormat};
use crate::devices::{device_name, find_input_device};
use crate::{Error, Result};

/// How long a read waits for the device before declaring it dead.
pub const STARVATION_TIMEOUT: Duration = Duration::from_secs(1);

/// Callback buffers held between the audio thread and the reader.
const QUEUE_DEPTH: usize = 64;

/// cpal-based [`Acquisition`] capturing 16-bit signed samples.
pub struct CpalAcquisition {
    host: Host,
    device: Option<Device>,
    stream: Option<Stream>,
    data: Option<Receiver<Vec<i16>>>,
    faults: Option<Receiver<String>>,
    overrun: Arc<AtomicBool>,
    pending: Vec<i16>,
    pending_pos: usize,
    channels: usize,
}

impl CpalAcquisition {
    /// Create a backend on the platform's default audio host.
    pub fn new() -> Self {
        let host = cpal::default_host();
        tracing::info!(host = host.id().name(), "cpal backend initialized");
        Self {
            host,
            device: None,
            stream: None,
            data: None,
            faults: None,
            overrun: Arc::new(AtomicBool::new(false)),
            pending: Vec::new(),
            pending_pos: 0,
            channels: 0,
        }
    }

    /// Pick the supported rate nearest to `requested` for an i16 config with
    /// `channels` channels.
    fn supported_rate(device: &Device, channels: u16, requested: u32) -> Result<u32> {
        let ranges = device
            .supported_input_configs()
            .map_err(|e| Error::Device(e.to_string()))?;

        let mut saw_channels = false;
        let mut best: Option<u32> = None;
        for range in ranges.filter(|r| r.channels() == channels) {
            saw_channels = true;
            if range.sample_format() != cpal::SampleFormat::I16 {
                continue;
            }
            let rate = requested.clamp(range.min_sample_rate(), range.max_sample_rate());
            if best.is_none_or(|b| rate.abs_diff(requested) < b.abs_diff(requested)) {
                best = Some(rate);
            }
        }

        match best {
            Some(rate) => Ok(rate),
            None if saw_channels => Err(Error::UnsupportedFormat(
                "device does not capture 16-bit signed samples".into(),
            )),
            None => Err(Error::InvalidSettings(format!(
                "device does not support {channels} input channels"
            ))),
        }
    }

    fn drain_queue(&mut self) {
        if let Some(data) = &self.data {
            while data.try_recv().is_ok() {}
        }
        self.pending.clear();
        self.pending_pos = 0;
    }
}

impl Default for CpalAcquisition {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CpalAcquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalAcquisition")
            .field("host", &self.host.id().name())
            .field("open", &self.device.is_some())
            .field("streaming", &self.stream.is_some())
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

impl Acquisition for CpalAcquisition {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open(&mut self, device: Option<&str>) -> Result<()> {
        let found = find_input_device(&self.host, device)?;
        let name = device_name(&found).unwrap_or_else(|_| "<unnamed>".into());
        tracing::info!(device = %name, "capture device opened");
        self.device = Some(found);
        Ok(())
    }

    fn negotiate(&mut self, format: SampleFormat, channels: u16, sample_rate: u32) -> Result<u32> {
        let SampleFormat::S16Le = format;
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| Error::Device("negotiate before open".into()))?;

        let rate = Self::supported_rate(device, channels, sample_rate)?;
        if rate != sample_rate {
            tracing::info!(requested = sample_rate, actual = rate, "sample rate adjusted by device");
        }

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let (data_tx, data_rx) = crossbeam_channel::bounded::<Vec<i16>>(QUEUE_DEPTH);
        let (fault_tx, fault_rx) = crossbeam_channel::unbounded::<String>();
        let overrun = Arc::clone(&self.overrun);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if let Err(TrySendError::Full(_)) = data_tx.try_send(data.to_vec()) {
                        overrun.store(true, Ordering::Release);
                    }
                },
                move |err| {
                    let _ = fault_tx.send(err.to_string());
                },
                None,
            )
            .map_err(|e| Error::Device(e.to_string()))?;

        // Held until the analyzer starts running.
        stream.pause().map_err(|e| Error::Device(e.to_string()))?;

        tracing::info!(channels, sample_rate = rate, "input stream built");
        self.stream = Some(stream);
        self.data = Some(data_rx);
        self.faults = Some(fault_rx);
        self.channels = usize::from(channels);
        self.overrun.store(false, Ordering::Release);
        Ok(rate)
    }

    fn read(&mut self, buf: &mut [i16]) -> std::result::Result<usize, ReadError> {
        if let Some(message) = self.faults.as_ref().and_then(|f| f.try_recv().ok()) {
            return Err(ReadError::Fatal(message));
        }
        if self.overrun.swap(false, Ordering::AcqRel) {
            return Err(ReadError::Overrun);
        }

        if self.pending_pos >= self.pending.len() {
            let Some(data) = &self.data else {
                return Err(ReadError::Fatal("stream not built".into()));
            };
            self.pending = match data.recv_timeout(STARVATION_TIMEOUT) {
                Ok(samples) => samples,
                Err(RecvTimeoutError::Timeout) => {
                    let reason = self
                        .faults
                        .as_ref()
                        .and_then(|f| f.try_recv().ok())
                        .unwrap_or_else(|| format!("no input for {STARVATION_TIMEOUT:?}"));
                    return Err(ReadError::Fatal(reason));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ReadError::Fatal("input stream closed".into()));
                }
            };
            self.pending_pos = 0;
        }

        let channels = self.channels.max(1);
        let available = self.pending.len() - self.pending_pos;
        let len = buf.len().min(available) / channels * channels;
        buf[..len].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + len]);
        self.pending_pos += len;
        Ok(len)
    }

    fn recover(&mut self) -> Result<()> {
        self.drain_queue();
        self.overrun.store(false, Ordering::Release);
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(stream) = &self.stream
            && let Err(e) = stream.pause()
        {
            tracing::warn!(error = %e, "failed to pause input stream");
        }
    }

    fn resume(&mut self) {
        self.drain_queue();
        self.overrun.store(false, Ordering::Release);
        if let Some(stream) = &self.stream
            && let Err(e) = stream.play()
        {
            tracing::warn!(error = %e, "failed to resume input stream");
        }
    }

    fn close(&mut self) {
        self.stream = None;
        self.data = None;
        self.faults = None;
        self.device = None;
        self.pending.clear();
        self.pending_pos = 0;
        tracing::info!("capture device closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpal_backend_name() {
        assert_eq!(CpalAcquisition::new().name(), "cpal");
    }

    #[test]
    fn test_negotiate_before_open_fails() {
        let mut acq = CpalAcquisition::new();
        assert!(acq.negotiate(SampleFormat::S16Le, 2, 48000).is_err());
    }

    #[test]
    fn test_read_before_negotiate_is_fatal() {
        let mut acq = CpalAcquisition::new();
        let mut buf = [0i16; 8];
        assert!(matches!(acq.read(&mut buf), Err(ReadError::Fatal(_))));
    }
}
