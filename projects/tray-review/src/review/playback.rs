// Playback state controller
//
// Turns media lifecycle signals into the displayed playback state and owns
// the auto-hide timer for the player controls.

use crate::review::capture::CapturedFrame;
use crate::review::time::{format_time, frame_index};
use crate::video::MediaErrorCode;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Delay after the last pointer movement before controls hide during playback.
pub const CONTROLS_HIDE_DELAY: Duration = Duration::from_millis(2500);

/// Lifecycle signals reported by the media element.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackSignal {
    MetadataReady { duration: Option<f64> },
    DataReady,
    TimeUpdate { current: f64, duration: Option<f64> },
    Seeked { current: f64 },
    Ended,
    Play,
    Pause,
    Error(MediaErrorCode),
}

impl PlaybackSignal {
    /// Signals after which the currently displayed frame should be captured.
    pub fn triggers_capture(&self) -> bool {
        matches!(
            self,
            PlaybackSignal::DataReady
                | PlaybackSignal::TimeUpdate { .. }
                | PlaybackSignal::Seeked { .. }
        )
    }
}

pub fn error_message(code: MediaErrorCode) -> &'static str {
    match code {
        MediaErrorCode::Aborted => "The video playback was aborted by the user.",
        MediaErrorCode::Network => "A network error caused the video download to fail.",
        MediaErrorCode::Decode => {
            "The video could not be decoded, it may be corrupt or in an unsupported format."
        }
        MediaErrorCode::SrcNotSupported => "The video format is not supported.",
        MediaErrorCode::Unknown => "An unknown error occurred while trying to play the video.",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub progress_percent: f64,
    pub current_time_text: String,
    pub duration_text: String,
    pub current_frame: u64,
    pub total_frames: u64,
    pub controls_visible: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            progress_percent: 0.0,
            current_time_text: format_time(0.0),
            duration_text: format_time(0.0),
            current_frame: 0,
            total_frames: 0,
            controls_visible: true,
        }
    }
}

/// Visibility of the player controls, hidden a fixed delay after the last
/// pointer movement while playing.
#[derive(Debug, Clone, Default)]
pub struct ControlsTimer {
    hide_at: Option<Instant>,
}

impl ControlsTimer {
    pub fn is_armed(&self) -> bool {
        self.hide_at.is_some()
    }

    fn cancel(&mut self) {
        self.hide_at = None;
    }
}

#[derive(Debug, Default)]
pub struct PlaybackController {
    state: PlaybackState,
    duration: Option<f64>,
    timer: ControlsTimer,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn controls_timer(&self) -> &ControlsTimer {
        &self.timer
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply one signal. Returns the message to surface when the signal is an error.
    pub fn apply(&mut self, signal: &PlaybackSignal) -> Option<&'static str> {
        match signal {
            PlaybackSignal::MetadataReady { duration } => {
                self.duration = duration.filter(|d| d.is_finite() && *d >= 0.0);
                let secs = self.duration.unwrap_or(0.0);
                self.state.duration_text = format_time(secs);
                self.state.total_frames = frame_index(secs);
            }
            PlaybackSignal::DataReady | PlaybackSignal::Seeked { .. } => {}
            PlaybackSignal::TimeUpdate { current, duration } => {
                self.state.current_time_text = format_time(*current);
                self.state.current_frame = frame_index(*current);
                if let Some(total) = duration.filter(|d| d.is_finite() && *d > 0.0) {
                    self.state.progress_percent = (current / total * 100.0).clamp(0.0, 100.0);
                }
            }
            PlaybackSignal::Ended => {
                self.state.is_playing = false;
                self.state.progress_percent = 100.0;
                self.show_controls();
            }
            PlaybackSignal::Play => {
                self.state.is_playing = true;
            }
            PlaybackSignal::Pause => {
                self.state.is_playing = false;
                self.show_controls();
            }
            PlaybackSignal::Error(code) => {
                self.state.is_playing = false;
                self.show_controls();
                return Some(error_message(*code));
            }
        }
        None
    }

    /// Seek time for a click at `fraction` of the progress bar.
    /// `None` when the result is not finite, e.g. the duration is unknown.
    pub fn seek_target(&self, fraction: f64) -> Option<f64> {
        let target = fraction.clamp(0.0, 1.0) * self.duration.unwrap_or(f64::NAN);
        target.is_finite().then_some(target)
    }

    pub fn pointer_moved(&mut self, now: Instant) {
        self.state.controls_visible = true;
        self.timer.hide_at = if self.state.is_playing {
            Some(now + CONTROLS_HIDE_DELAY)
        } else {
            None
        };
    }

    pub fn pointer_left(&mut self) {
        self.timer.cancel();
        if self.state.is_playing {
            self.state.controls_visible = false;
        }
    }

    /// Hide the controls once the deadline has passed. Returns true if visibility changed.
    pub fn poll_controls(&mut self, now: Instant) -> bool {
        match self.timer.hide_at {
            Some(deadline) if now >= deadline => {
                self.timer.cancel();
                let changed = self.state.controls_visible;
                self.state.controls_visible = false;
                changed
            }
            _ => false,
        }
    }

    fn show_controls(&mut self) {
        self.timer.cancel();
        self.state.controls_visible = true;
    }
}

/// Receives playback signals and captured frames from the player.
pub trait PlaybackObserver: Send {
    /// Called before the player opens a new video. Everything emitted after
    /// this belongs to `generation`.
    fn on_load(&mut self, _generation: u64) {}

    fn on_signal(&mut self, signal: &PlaybackSignal);

    fn on_frame(&mut self, _frame: &CapturedFrame) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fan-out of playback signals to registered observers.
#[derive(Default)]
pub struct SignalHub {
    observers: Vec<(SubscriptionId, Box<dyn PlaybackObserver>)>,
    next_id: u64,
}

impl SignalHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn PlaybackObserver>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn begin_load(&mut self, generation: u64) {
        for (_, observer) in self.observers.iter_mut() {
            observer.on_load(generation);
        }
    }

    pub fn emit(&mut self, signal: &PlaybackSignal) {
        for (_, observer) in self.observers.iter_mut() {
            observer.on_signal(signal);
        }
    }

    pub fn emit_frame(&mut self, frame: &CapturedFrame) {
        for (_, observer) in self.observers.iter_mut() {
            observer.on_frame(frame);
        }
    }
}
