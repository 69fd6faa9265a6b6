//! Pluggable acquisition abstraction.
//!
//! The analyzer never talks to an audio API directly. It drives an
//! [`Acquisition`], which hands it blocks of interleaved 16-bit frames:
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │     Analyzer capture thread      │
//! └──────────────┬───────────────────┘
//!                │ open / negotiate / read / recover / close
//!                ▼
//! ┌──────────────────────────────────┐
//! │        Acquisition trait         │
//! └──────────────┬───────────────────┘
//!        ┌───────┼─────────────┐
//!        ▼       ▼             ▼
//!    ┌───────┐ ┌─────┐ ┌─────────────┐
//!    │ cpal  │ │ WAV │ │  Synthetic  │
//!    └───────┘ └─────┘ └─────────────┘
//! ```
//!
//! The trait is object safe so the backend can be chosen at runtime from
//! configuration. Every implementation must be `Send`: `open` and
//! `negotiate` run on the caller's thread during `Analyzer::init`, after
//! which the acquisition moves into the capture thread.

use crate::Result;

/// Raw sample format requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 16-bit signed little-endian, the only format the analyzer consumes.
    S16Le,
}

/// Failure of a blocking read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// Samples were lost because the reader fell behind; recoverable.
    #[error("input overrun")]
    Overrun,

    /// The device is gone or the stream failed; not recoverable.
    #[error("fatal acquisition fault: {0}")]
    Fatal(String),
}

/// A source of interleaved 16-bit frames.
pub trait Acquisition: Send {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Open the device. `None` selects the default device.
    fn open(&mut self, device: Option<&str>) -> Result<()>;

    /// Negotiate format, channel count and sample rate.
    ///
    /// Returns the sample rate actually in force, which may differ from
    /// `sample_rate`.
    fn negotiate(&mut self, format: SampleFormat, channels: u16, sample_rate: u32) -> Result<u32>;

    /// Read interleaved frames into `buf`, blocking until at least one frame
    /// is available.
    ///
    /// Returns the number of samples written, always a whole number of frames.
    fn read(&mut self, buf: &mut [i16]) -> std::result::Result<usize, ReadError>;

    /// Bring the device back to a readable state after an overrun.
    fn recover(&mut self) -> Result<()>;

    /// Suspend delivery while the analyzer is stopped.
    fn pause(&mut self) {}

    /// Resume delivery after [`pause`](Acquisition::pause).
    fn resume(&mut self) {}

    /// Release the device.
    fn close(&mut self);
}

impl std::fmt::Debug for dyn Acquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquisition")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Read exactly `buf.len()` samples, absorbing partial reads.
///
/// An error aborts the block; whatever was read so far is discarded.
pub fn read_block(
    acquisition: &mut dyn Acquisition,
    buf: &mut [i16],
) -> std::result::Result<(), ReadError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = acquisition.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(ReadError::Fatal("acquisition returned no data".into()));
        }
        filled += n;
    }
    Ok(())
}
