//! # Playback Module
//!
//! Handle-based audio playback on top of host media elements.
//!
//! ## Overview
//!
//! This module handles:
//! - The playback state machine (`Idle`, `Loading`, `Playing`, `Paused`,
//!   `Ended`, `Error`)
//! - The [`MediaElement`] abstraction hosts implement
//! - [`ElementAudioAdapter`], the [`AudioAdapter`](bridge_traits::AudioAdapter)
//!   that drives elements and publishes [`PlaybackEvent`](bridge_traits::PlaybackEvent)s
//! - [`MockMediaElement`] for tests and automated environments

pub mod adapter;
pub mod config;
pub mod element;
pub mod error;
pub mod mock;
pub mod state_machine;

pub use adapter::ElementAudioAdapter;
pub use config::PlaybackDefaults;
pub use element::{
    MediaElement, MediaElementFactory, MediaErrorKind, MediaEvent, MediaEventSink, MediaFailure,
};
pub use error::{PlaybackError, Result};
pub use mock::{MockMediaElement, MockMediaElementFactory};
pub use state_machine::{next_state, PlaybackInput, PlaybackStateMachine};
