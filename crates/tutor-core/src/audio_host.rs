//! Seams between the session and the machine's audio devices.
//!
//! Device handles are usually not `Send`, so none of these traits require it;
//! the session that owns them runs on one task.

use crate::error::SessionError;
use crate::pcm::AudioBuffer;
use tokio::sync::mpsc;

/// Identifies one scheduled playback source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

pub trait AudioHost {
    /// Acquires the microphone as mono audio at `sample_rate`, delivered in
    /// blocks of `block_size` samples once a tap is attached.
    fn request_microphone(
        &mut self,
        sample_rate: u32,
        block_size: usize,
    ) -> Result<Box<dyn CaptureStream>, SessionError>;

    /// Opens an output context that plays buffers at `sample_rate`.
    fn open_playback(&mut self, sample_rate: u32) -> Result<Box<dyn PlaybackContext>, SessionError>;
}

pub trait CaptureStream {
    /// Starts delivering capture blocks. Blocks captured before this are discarded.
    fn attach_tap(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, SessionError>;

    /// Stops capture and gives the device back. Idempotent.
    fn release(&mut self);
}

/// A clock-driven output that plays buffers at scheduled times.
pub trait PlaybackContext {
    /// Seconds since the context was opened, on the output clock.
    fn current_time(&self) -> f64;

    /// Schedules `buffer` to begin at `at` seconds on the output clock.
    fn start(&mut self, buffer: AudioBuffer, at: f64) -> Result<SourceId, SessionError>;

    /// Silences a source immediately. Unknown or finished ids are ignored.
    fn stop(&mut self, id: SourceId);

    /// Ids of sources that played to the end since the last call.
    fn take_finished(&mut self) -> Vec<SourceId>;

    /// Releases the output device. Idempotent.
    fn close(&mut self);
}
