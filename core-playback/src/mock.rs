//! Scripted media elements for tests and automated environments.
//!
//! A [`MockMediaElement`] never produces sound. It fires the events a real
//! element would, and tests push it along with [`MockMediaElement::advance`],
//! [`MockMediaElement::finish`] and [`MockMediaElement::fail`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::element::{
    MediaElement, MediaElementFactory, MediaErrorKind, MediaEvent, MediaEventSink, MediaFailure,
};

#[derive(Debug, Default)]
struct ElementState {
    position: Duration,
    volume: f32,
    playback_rate: f32,
    playing: bool,
    loaded: bool,
    released: bool,
}

pub struct MockMediaElement {
    url: String,
    duration: Option<Duration>,
    gesture_required: bool,
    gesture_granted: Arc<AtomicBool>,
    start_failure: Mutex<Option<MediaFailure>>,
    sink: Mutex<Option<MediaEventSink>>,
    state: Mutex<ElementState>,
}

impl MockMediaElement {
    fn fire(&self, event: MediaEvent) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn playback_rate(&self) -> f32 {
        self.state.lock().playback_rate
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Move the playhead forward, firing `TimeUpdate` and, when the end of a
    /// known duration is reached, `Ended`.
    pub fn advance(&self, by: Duration) {
        let (position, reached_end) = {
            let mut state = self.state.lock();
            let mut position = state.position + by;
            let mut reached_end = false;
            if let Some(duration) = self.duration {
                if position >= duration {
                    position = duration;
                    reached_end = true;
                    state.playing = false;
                }
            }
            state.position = position;
            (position, reached_end)
        };

        self.fire(MediaEvent::TimeUpdate { position });
        if reached_end {
            self.fire(MediaEvent::Ended);
        }
    }

    /// Jump to the end and fire `Ended`.
    pub fn finish(&self) {
        {
            let mut state = self.state.lock();
            if let Some(duration) = self.duration {
                state.position = duration;
            }
            state.playing = false;
        }
        self.fire(MediaEvent::Ended);
    }

    /// Fire a media error.
    pub fn fail(&self, kind: MediaErrorKind) {
        self.state.lock().playing = false;
        self.fire(MediaEvent::Error(kind));
    }
}

#[async_trait]
impl MediaElement for MockMediaElement {
    async fn play(&self) -> Result<(), MediaFailure> {
        if self.gesture_required && !self.gesture_granted.load(Ordering::SeqCst) {
            return Err(MediaFailure::NotAllowed);
        }
        if let Some(failure) = self.start_failure.lock().take() {
            return Err(failure);
        }

        let first_load = {
            let mut state = self.state.lock();
            if state.released {
                return Err(MediaFailure::Other("element released".to_string()));
            }
            state.playing = true;
            !std::mem::replace(&mut state.loaded, true)
        };

        if first_load {
            self.fire(MediaEvent::LoadedMetadata {
                duration: self.duration,
            });
        }
        self.fire(MediaEvent::Play);
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().playing = false;
        self.fire(MediaEvent::Pause);
    }

    fn seek(&self, position: Duration) {
        let position = match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        };
        self.state.lock().position = position;
        self.fire(MediaEvent::TimeUpdate { position });
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().volume = volume;
    }

    fn set_playback_rate(&self, rate: f32) {
        self.state.lock().playback_rate = rate;
    }

    fn position(&self) -> Duration {
        self.state.lock().position
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.released = true;
        state.playing = false;
        *self.sink.lock() = None;
    }
}

/// Factory producing [`MockMediaElement`]s and keeping them for inspection.
pub struct MockMediaElementFactory {
    duration: Option<Duration>,
    gesture_required: bool,
    gesture_granted: Arc<AtomicBool>,
    scripted_failures: Mutex<VecDeque<MediaFailure>>,
    elements: Mutex<Vec<Arc<MockMediaElement>>>,
}

impl Default for MockMediaElementFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMediaElementFactory {
    pub fn new() -> Self {
        Self {
            duration: Some(Duration::from_secs(180)),
            gesture_required: false,
            gesture_granted: Arc::new(AtomicBool::new(false)),
            scripted_failures: Mutex::new(VecDeque::new()),
            elements: Mutex::new(Vec::new()),
        }
    }

    /// Duration reported by new elements; `None` for live streams.
    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    /// Refuse to start until [`grant_user_gesture`](Self::grant_user_gesture).
    pub fn require_user_gesture(mut self) -> Self {
        self.gesture_required = true;
        self
    }

    pub fn grant_user_gesture(&self) {
        self.gesture_granted.store(true, Ordering::SeqCst);
    }

    /// The next created element fails its first start with `failure`.
    pub fn fail_next_start(&self, failure: MediaFailure) {
        self.scripted_failures.lock().push_back(failure);
    }

    pub fn elements(&self) -> Vec<Arc<MockMediaElement>> {
        self.elements.lock().clone()
    }

    pub fn last_element(&self) -> Option<Arc<MockMediaElement>> {
        self.elements.lock().last().cloned()
    }
}

impl MediaElementFactory for MockMediaElementFactory {
    fn create(
        &self,
        url: &str,
        events: MediaEventSink,
    ) -> Result<Arc<dyn MediaElement>, MediaFailure> {
        let element = Arc::new(MockMediaElement {
            url: url.to_string(),
            duration: self.duration,
            gesture_required: self.gesture_required,
            gesture_granted: Arc::clone(&self.gesture_granted),
            start_failure: Mutex::new(self.scripted_failures.lock().pop_front()),
            sink: Mutex::new(Some(events)),
            state: Mutex::new(ElementState {
                volume: 1.0,
                playback_rate: 1.0,
                ..ElementState::default()
            }),
        });
        self.elements.lock().push(Arc::clone(&element));
        Ok(element as Arc<dyn MediaElement>)
    }
}
