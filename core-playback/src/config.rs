//! # Playback Configuration

use serde::{Deserialize, Serialize};

use crate::error::{validate_playback_rate, validate_volume, Result};

/// Values applied to every new handle unless [`PlayOptions`] override them.
///
/// [`PlayOptions`]: bridge_traits::playback::PlayOptions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackDefaults {
    #[serde(default = "default_volume")]
    pub volume: f32,

    #[serde(default = "default_playback_rate")]
    pub playback_rate: f32,
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            playback_rate: default_playback_rate(),
        }
    }
}

impl PlaybackDefaults {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        validate_volume(self.volume)?;
        validate_playback_rate(self.playback_rate)?;
        Ok(())
    }
}

fn default_volume() -> f32 {
    1.0
}

fn default_playback_rate() -> f32 {
    1.0
}
