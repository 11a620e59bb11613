//! Pure playback state machine.
//!
//! ```text
//! Idle    --Load--> Loading
//! Loading --Play--> Playing
//! Playing --Pause-> Paused
//! Paused  --Play--> Playing
//! Loading|Playing|Paused --Ended--> Ended
//! Loading|Playing|Paused --Error--> Error
//! any     --Stop--> Idle
//! ```
//!
//! `Metadata` and `TimeUpdate` are accepted everywhere and never move the
//! state. Every other pair is rejected.

use bridge_traits::playback::PlaybackState;

use crate::element::MediaEvent;
use crate::error::{PlaybackError, Result};

/// Inputs driving the state machine: media events plus the adapter-issued
/// `Load` and `Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackInput {
    Load,
    Stop,
    Play,
    Pause,
    Ended,
    Error,
    Metadata,
    TimeUpdate,
}

impl From<&MediaEvent> for PlaybackInput {
    fn from(event: &MediaEvent) -> Self {
        match event {
            MediaEvent::Play => PlaybackInput::Play,
            MediaEvent::Pause => PlaybackInput::Pause,
            MediaEvent::Ended => PlaybackInput::Ended,
            MediaEvent::Error(_) => PlaybackInput::Error,
            MediaEvent::LoadedMetadata { .. } => PlaybackInput::Metadata,
            MediaEvent::TimeUpdate { .. } => PlaybackInput::TimeUpdate,
        }
    }
}

/// Target state for `input` out of `from`, or `None` when no edge exists.
pub fn next_state(from: PlaybackState, input: PlaybackInput) -> Option<PlaybackState> {
    use PlaybackInput as I;
    use PlaybackState as S;

    match (from, input) {
        (_, I::Stop) => Some(S::Idle),
        (state, I::Metadata | I::TimeUpdate) => Some(state),
        (S::Idle, I::Load) => Some(S::Loading),
        (S::Loading, I::Play) | (S::Paused, I::Play) => Some(S::Playing),
        (S::Playing, I::Pause) => Some(S::Paused),
        (S::Loading | S::Playing | S::Paused, I::Ended) => Some(S::Ended),
        (S::Loading | S::Playing | S::Paused, I::Error) => Some(S::Error),
        _ => None,
    }
}

/// A state with its transition function applied in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStateMachine {
    state: PlaybackState,
}

impl Default for PlaybackStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackStateMachine {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Apply `input`. Returns `Some((from, to))` when the state changed and
    /// `None` for accepted inputs that keep it. Rejected inputs leave the
    /// state untouched.
    pub fn apply(
        &mut self,
        input: PlaybackInput,
    ) -> Result<Option<(PlaybackState, PlaybackState)>> {
        let from = self.state;
        let to = next_state(from, input)
            .ok_or(PlaybackError::InvalidTransition { from, input })?;
        self.state = to;
        Ok((from != to).then_some((from, to)))
    }
}
