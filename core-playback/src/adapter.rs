//! Audio adapter driving host media elements through the playback state
//! machine.

use async_trait::async_trait;
use bridge_traits::{
    error::AudioResult,
    listeners::{ListenerRegistry, Subscription},
    playback::{AudioAdapter, AudioHandle, PlayOptions, PlaybackEvent, PlaybackListener, PlaybackState},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::PlaybackDefaults;
use crate::element::{MediaElement, MediaElementFactory, MediaEvent, MediaEventSink};
use crate::error::{validate_playback_rate, validate_volume};
use crate::state_machine::{PlaybackInput, PlaybackStateMachine};

struct Session {
    url: String,
    element: Arc<dyn MediaElement>,
    machine: PlaybackStateMachine,
    listeners: ListenerRegistry<PlaybackEvent>,
}

type Sessions = Mutex<HashMap<AudioHandle, Session>>;

/// [`AudioAdapter`] backed by elements from a [`MediaElementFactory`].
///
/// Each `play` creates one element and one handle. The session table lock is
/// never held while calling into an element, so elements may report events
/// synchronously.
pub struct ElementAudioAdapter {
    name: &'static str,
    factory: Arc<dyn MediaElementFactory>,
    defaults: PlaybackDefaults,
    next_id: AtomicU64,
    sessions: Arc<Sessions>,
}

impl ElementAudioAdapter {
    pub fn new(factory: Arc<dyn MediaElementFactory>, defaults: PlaybackDefaults) -> Self {
        Self {
            name: "native-element",
            factory,
            defaults,
            next_id: AtomicU64::new(0),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Report `name` from [`AudioAdapter::adapter_name`].
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn defaults(&self) -> PlaybackDefaults {
        self.defaults
    }

    fn element(&self, handle: AudioHandle) -> Option<Arc<dyn MediaElement>> {
        self.sessions
            .lock()
            .get(&handle)
            .map(|session| Arc::clone(&session.element))
    }

    fn event_sink(&self, handle: AudioHandle) -> MediaEventSink {
        let sessions: Weak<Sessions> = Arc::downgrade(&self.sessions);
        Arc::new(move |event: MediaEvent| {
            if let Some(sessions) = sessions.upgrade() {
                dispatch(&sessions, handle, PlaybackInput::from(&event), Some(event));
            }
        })
    }
}

/// Apply `input` to the handle's machine and notify its listeners.
///
/// Rejected inputs are logged and dropped. Listeners run after the session
/// lock is released.
fn dispatch(sessions: &Sessions, handle: AudioHandle, input: PlaybackInput, event: Option<MediaEvent>) {
    let (listeners, outgoing) = {
        let mut guard = sessions.lock();
        let Some(session) = guard.get_mut(&handle) else {
            trace!(handle = %handle, ?input, "Event for released handle");
            return;
        };

        let change = match session.machine.apply(input) {
            Ok(change) => change,
            Err(e) => {
                warn!(handle = %handle, error = %e, "Ignoring media event");
                return;
            }
        };

        let mut outgoing = Vec::with_capacity(2);
        if let Some((from, to)) = change {
            debug!(handle = %handle, ?from, ?to, "Playback state changed");
            outgoing.push(PlaybackEvent::StateChange { from, to });
        }
        match event {
            Some(MediaEvent::Ended) => outgoing.push(PlaybackEvent::Ended),
            Some(MediaEvent::Error(kind)) => {
                outgoing.push(PlaybackEvent::Error(kind.into_audio_error(&session.url)))
            }
            Some(MediaEvent::LoadedMetadata { duration }) => {
                outgoing.push(PlaybackEvent::Loaded { duration })
            }
            Some(MediaEvent::TimeUpdate { position }) => {
                outgoing.push(PlaybackEvent::TimeUpdate { position })
            }
            Some(MediaEvent::Play | MediaEvent::Pause) | None => {}
        }

        (session.listeners.clone(), outgoing)
    };

    for event in &outgoing {
        listeners.emit(event);
    }
}

#[async_trait]
impl AudioAdapter for ElementAudioAdapter {
    fn adapter_name(&self) -> &'static str {
        self.name
    }

    async fn play(&self, url: &str, options: PlayOptions) -> AudioResult<AudioHandle> {
        let volume = validate_volume(options.volume.unwrap_or(self.defaults.volume))?;
        let rate =
            validate_playback_rate(options.playback_rate.unwrap_or(self.defaults.playback_rate))?;

        let handle = AudioHandle::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let element = self
            .factory
            .create(url, self.event_sink(handle))
            .map_err(|e| e.into_audio_error(url))?;

        self.sessions.lock().insert(
            handle,
            Session {
                url: url.to_string(),
                element: Arc::clone(&element),
                machine: PlaybackStateMachine::new(),
                listeners: ListenerRegistry::new(),
            },
        );
        dispatch(&self.sessions, handle, PlaybackInput::Load, None);

        element.set_volume(volume);
        element.set_playback_rate(rate);
        if let Some(position) = options.start_position {
            element.seek(position);
        }

        if let Err(failure) = element.play().await {
            warn!(handle = %handle, url = url, error = %failure, "Playback failed to start");
            self.sessions.lock().remove(&handle);
            element.release();
            return Err(failure.into_audio_error(url));
        }

        debug!(handle = %handle, url = url, "Playback started");
        Ok(handle)
    }

    async fn pause(&self, handle: AudioHandle) -> AudioResult<()> {
        if let Some(element) = self.element(handle) {
            element.pause();
        }
        Ok(())
    }

    async fn resume(&self, handle: AudioHandle) -> AudioResult<()> {
        let Some(element) = self.element(handle) else {
            return Ok(());
        };
        element.play().await.map_err(|e| {
            let url = self
                .sessions
                .lock()
                .get(&handle)
                .map(|session| session.url.clone())
                .unwrap_or_default();
            e.into_audio_error(&url)
        })
    }

    async fn stop(&self, handle: AudioHandle) {
        let Some(session) = self.sessions.lock().remove(&handle) else {
            return;
        };

        session.element.release();
        let mut machine = session.machine;
        if let Ok(Some((from, to))) = machine.apply(PlaybackInput::Stop) {
            session
                .listeners
                .emit(&PlaybackEvent::StateChange { from, to });
        }
        session.listeners.clear();
        debug!(handle = %handle, "Playback stopped");
    }

    async fn seek(&self, handle: AudioHandle, position: Duration) -> AudioResult<()> {
        if let Some(element) = self.element(handle) {
            element.seek(position);
        }
        Ok(())
    }

    async fn set_volume(&self, handle: AudioHandle, volume: f32) -> AudioResult<()> {
        let volume = validate_volume(volume)?;
        if let Some(element) = self.element(handle) {
            element.set_volume(volume);
        }
        Ok(())
    }

    async fn set_playback_rate(&self, handle: AudioHandle, rate: f32) -> AudioResult<()> {
        let rate = validate_playback_rate(rate)?;
        if let Some(element) = self.element(handle) {
            element.set_playback_rate(rate);
        }
        Ok(())
    }

    fn state(&self, handle: AudioHandle) -> Option<PlaybackState> {
        self.sessions
            .lock()
            .get(&handle)
            .map(|session| session.machine.state())
    }

    fn position(&self, handle: AudioHandle) -> Option<Duration> {
        self.element(handle).map(|element| element.position())
    }

    fn subscribe(&self, handle: AudioHandle, listener: PlaybackListener) -> Subscription {
        match self.sessions.lock().get(&handle) {
            Some(session) => session.listeners.subscribe(listener),
            None => Subscription::noop(),
        }
    }

    fn active_handles(&self) -> Vec<AudioHandle> {
        let mut handles: Vec<AudioHandle> = self.sessions.lock().keys().copied().collect();
        handles.sort();
        handles
    }
}
