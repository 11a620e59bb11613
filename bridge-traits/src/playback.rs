//! Audio playback contract.
//!
//! An [`AudioAdapter`] hands out an [`AudioHandle`] per `play` call and
//! reports progress through [`PlaybackEvent`]s. Handles are plain ids;
//! operations on a stopped or unknown handle are no-ops.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{AudioError, AudioResult};
use crate::listeners::Subscription;

/// Identifier of one playback started through [`AudioAdapter::play`].
///
/// Ids are unique per adapter instance, not per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AudioHandle(u64);

impl AudioHandle {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audio-{}", self.0)
    }
}

/// Playback lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
    Error,
}

impl PlaybackState {
    /// `Ended` and `Error` are left only through an explicit stop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::Ended | PlaybackState::Error)
    }
}

/// Observable playback events.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    StateChange {
        from: PlaybackState,
        to: PlaybackState,
    },
    Ended,
    Error(AudioError),
    Loaded {
        duration: Option<Duration>,
    },
    TimeUpdate {
        position: Duration,
    },
}

/// Options supplied with [`AudioAdapter::play`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayOptions {
    /// Overrides the adapter's default volume (0.0..=1.0)
    pub volume: Option<f32>,
    /// Overrides the adapter's default playback rate
    pub playback_rate: Option<f32>,
    /// Seek here before starting
    pub start_position: Option<Duration>,
}

impl PlayOptions {
    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn playback_rate(mut self, rate: f32) -> Self {
        self.playback_rate = Some(rate);
        self
    }

    pub fn start_at(mut self, position: Duration) -> Self {
        self.start_position = Some(position);
        self
    }
}

pub type PlaybackListener = Box<dyn Fn(&PlaybackEvent) + Send + Sync>;

/// Audio adapter trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::playback::{AudioAdapter, PlayOptions, PlaybackEvent};
///
/// async fn read_aloud(audio: &dyn AudioAdapter, url: &str) -> AudioResult<()> {
///     let handle = audio.play(url, PlayOptions::default()).await?;
///     let sub = audio.subscribe(handle, Box::new(|event| {
///         if let PlaybackEvent::Ended = event {
///             tracing::info!("chapter finished");
///         }
///     }));
///     // ...
///     sub.unsubscribe();
///     audio.stop(handle).await;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait AudioAdapter: Send + Sync {
    fn adapter_name(&self) -> &'static str;

    /// Start playing `url` and return a fresh handle.
    ///
    /// # Errors
    ///
    /// `PERMISSION_DENIED` when the host requires a user interaction before
    /// audio may start; `UNKNOWN` for any other start failure.
    async fn play(&self, url: &str, options: PlayOptions) -> AudioResult<AudioHandle>;

    async fn pause(&self, handle: AudioHandle) -> AudioResult<()>;

    async fn resume(&self, handle: AudioHandle) -> AudioResult<()>;

    /// Idempotent. Releases the handle's element and listeners.
    async fn stop(&self, handle: AudioHandle);

    async fn seek(&self, handle: AudioHandle, position: Duration) -> AudioResult<()>;

    async fn set_volume(&self, handle: AudioHandle, volume: f32) -> AudioResult<()>;

    async fn set_playback_rate(&self, handle: AudioHandle, rate: f32) -> AudioResult<()>;

    /// `None` for unknown or stopped handles.
    fn state(&self, handle: AudioHandle) -> Option<PlaybackState>;

    fn position(&self, handle: AudioHandle) -> Option<Duration>;

    /// Subscribe to one handle's events. Unknown handles yield a no-op token.
    fn subscribe(&self, handle: AudioHandle, listener: PlaybackListener) -> Subscription;

    fn active_handles(&self) -> Vec<AudioHandle>;

    async fn stop_all(&self) {
        for handle in self.active_handles() {
            self.stop(handle).await;
        }
    }
}
