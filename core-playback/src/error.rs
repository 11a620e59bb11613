//! # Playback Error Types

use bridge_traits::error::AudioError;
use bridge_traits::playback::PlaybackState;
use thiserror::Error;

use crate::state_machine::PlaybackInput;

/// Errors raised inside the playback core before they reach the adapter
/// contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// The state machine has no edge for `input` out of `from`.
    #[error("Invalid playback transition from {from:?} on {input:?}")]
    InvalidTransition {
        from: PlaybackState,
        input: PlaybackInput,
    },

    /// Invalid volume value (must be in range [0.0, 1.0]).
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    /// Playback rate must be finite and positive.
    #[error("Invalid playback rate: {0}")]
    InvalidPlaybackRate(f32),
}

impl From<PlaybackError> for AudioError {
    fn from(err: PlaybackError) -> Self {
        match err {
            PlaybackError::InvalidVolume(_) | PlaybackError::InvalidPlaybackRate(_) => {
                AudioError::NotSupported(err.to_string())
            }
            PlaybackError::InvalidTransition { .. } => AudioError::Unknown(err.to_string()),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Check a volume in `0.0..=1.0`.
pub fn validate_volume(volume: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&volume) {
        Ok(volume)
    } else {
        Err(PlaybackError::InvalidVolume(volume))
    }
}

/// Check a playback rate is finite and positive.
pub fn validate_playback_rate(rate: f32) -> Result<f32> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(PlaybackError::InvalidPlaybackRate(rate))
    }
}
