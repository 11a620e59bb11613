//! Host media element abstraction.
//!
//! The host owns the real media element (an HTML audio tag, an AVPlayer, a
//! native sink) and exposes it through [`MediaElement`]. Elements report
//! what happens to them by calling the [`MediaEventSink`] handed over at
//! creation. A sink may be invoked from inside any element method.

use async_trait::async_trait;
use bridge_traits::error::AudioError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure categories reported by a media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaErrorKind {
    Aborted,
    Network,
    Decode,
    SourceNotSupported,
}

impl MediaErrorKind {
    pub fn into_audio_error(self, url: &str) -> AudioError {
        match self {
            MediaErrorKind::Aborted => AudioError::Aborted(url.to_string()),
            MediaErrorKind::Network => AudioError::NetworkError(url.to_string()),
            MediaErrorKind::Decode => AudioError::DecodeError(url.to_string()),
            MediaErrorKind::SourceNotSupported => AudioError::NotSupported(url.to_string()),
        }
    }
}

/// Events fired by a media element.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Play,
    Pause,
    Ended,
    Error(MediaErrorKind),
    LoadedMetadata { duration: Option<Duration> },
    TimeUpdate { position: Duration },
}

/// Why an element refused to start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaFailure {
    /// The host blocks audio until the user has interacted with the app.
    #[error("playback is not allowed before a user gesture")]
    NotAllowed,

    #[error("{0}")]
    Other(String),
}

impl MediaFailure {
    pub fn into_audio_error(self, url: &str) -> AudioError {
        match self {
            MediaFailure::NotAllowed => {
                AudioError::PermissionDenied(format!("{}: {}", url, MediaFailure::NotAllowed))
            }
            MediaFailure::Other(message) => AudioError::Unknown(format!("{}: {}", url, message)),
        }
    }
}

/// Callback an element uses to report [`MediaEvent`]s.
pub type MediaEventSink = Arc<dyn Fn(MediaEvent) + Send + Sync>;

/// One playable media element bound to a single source URL.
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Start or resume playback. Success is followed by a `Play` event.
    async fn play(&self) -> Result<(), MediaFailure>;

    fn pause(&self);

    fn seek(&self, position: Duration);

    fn set_volume(&self, volume: f32);

    fn set_playback_rate(&self, rate: f32);

    fn position(&self) -> Duration;

    /// Detach the source and stop reporting events. Called once per element.
    fn release(&self);
}

/// Creates media elements for URLs.
pub trait MediaElementFactory: Send + Sync {
    fn create(
        &self,
        url: &str,
        events: MediaEventSink,
    ) -> Result<Arc<dyn MediaElement>, MediaFailure>;
}

impl<F> MediaElementFactory for F
where
    F: Fn(&str, MediaEventSink) -> Result<Arc<dyn MediaElement>, MediaFailure> + Send + Sync,
{
    fn create(
        &self,
        url: &str,
        events: MediaEventSink,
    ) -> Result<Arc<dyn MediaElement>, MediaFailure> {
        self(url, events)
    }
}
