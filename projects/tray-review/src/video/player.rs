// Playback thread
//
// Owns the media element and drives it from a command channel plus a fixed
// tick. Every lifecycle change is published to the signal hub; capture-worthy
// signals are followed by a fresh frame capture.

use crate::review::capture::FrameCapture;
use crate::review::playback::{PlaybackSignal, SignalHub};
use crate::video::{Advance, MediaElement, MediaError, MediaOpener};
use crossbeam::channel::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Load { location: String, generation: u64 },
    Play,
    Pause,
    Toggle,
    Seek(f64),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Interval between time updates while playing.
    pub tick: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(250),
        }
    }
}

/// Handle to the playback thread. Dropping it stops and joins the thread.
pub struct Player {
    tx: Sender<PlayerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl Player {
    pub fn spawn(opener: MediaOpener, hub: SignalHub, config: PlayerConfig) -> std::io::Result<Self> {
        let (tx, rx) = channel::unbounded();
        let handle = thread::Builder::new()
            .name("player".to_string())
            .spawn(move || {
                tracing::info!("Player thread started (tick={:?})", config.tick);
                PlayerWorker::new(opener, hub).run(rx, config.tick);
                tracing::info!("Player thread finished");
            })?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    pub fn send(&self, command: PlayerCommand) {
        if self.tx.send(command).is_err() {
            tracing::warn!("Player thread is gone, command dropped");
        }
    }

    /// Open `location`. Signals and frames that follow are tagged with
    /// `generation` through [`SignalHub::begin_load`].
    pub fn load(&self, location: &str, generation: u64) {
        self.send(PlayerCommand::Load {
            location: location.to_string(),
            generation,
        });
    }

    pub fn play(&self) {
        self.send(PlayerCommand::Play);
    }

    pub fn pause(&self) {
        self.send(PlayerCommand::Pause);
    }

    pub fn toggle(&self) {
        self.send(PlayerCommand::Toggle);
    }

    pub fn seek(&self, seconds: f64) {
        self.send(PlayerCommand::Seek(seconds));
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let _ = self.tx.send(PlayerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Player thread panicked");
            }
        }
    }
}

struct PlayerWorker {
    opener: MediaOpener,
    hub: SignalHub,
    capture: FrameCapture,
    media: Option<Box<dyn MediaElement>>,
    duration: Option<f64>,
    position: f64,
    playing: bool,
    ended: bool,
    last_tick: Instant,
}

impl PlayerWorker {
    fn new(opener: MediaOpener, hub: SignalHub) -> Self {
        Self {
            opener,
            hub,
            capture: FrameCapture::new(),
            media: None,
            duration: None,
            position: 0.0,
            playing: false,
            ended: false,
            last_tick: Instant::now(),
        }
    }

    fn run(mut self, rx: Receiver<PlayerCommand>, tick: Duration) {
        let ticker = channel::tick(tick);
        loop {
            crossbeam::select! {
                recv(rx) -> msg => match msg {
                    Ok(PlayerCommand::Shutdown) | Err(_) => break,
                    Ok(command) => self.handle(command),
                },
                recv(ticker) -> _ => self.tick(),
            }
        }
    }

    fn handle(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Load {
                location,
                generation,
            } => self.load(&location, generation),
            PlayerCommand::Play => self.play(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::Toggle => {
                if self.playing {
                    self.pause()
                } else {
                    self.play()
                }
            }
            PlayerCommand::Seek(seconds) => self.seek(seconds),
            PlayerCommand::Shutdown => {}
        }
    }

    fn emit(&mut self, signal: PlaybackSignal) {
        self.hub.emit(&signal);
        if !signal.triggers_capture() {
            return;
        }
        if let Some(media) = self.media.as_deref() {
            if let Some(frame) = self.capture.capture(media) {
                self.hub.emit_frame(&frame);
            }
        }
    }

    fn time_update(&mut self) {
        self.emit(PlaybackSignal::TimeUpdate {
            current: self.position,
            duration: self.duration,
        });
    }

    fn fail(&mut self, error: MediaError) {
        tracing::warn!("Playback failed: {}", error);
        self.playing = false;
        self.emit(PlaybackSignal::Error(error.code()));
    }

    fn load(&mut self, location: &str, generation: u64) {
        self.hub.begin_load(generation);
        self.media = None;
        self.duration = None;
        self.position = 0.0;
        self.playing = false;
        self.ended = false;

        match (self.opener)(location) {
            Ok(media) => {
                self.duration = media.duration();
                let has_frame = media.ready_state() >= crate::video::ReadyState::HaveCurrentData;
                self.media = Some(media);
                self.emit(PlaybackSignal::MetadataReady {
                    duration: self.duration,
                });
                // Position reset only; the capture follows data-ready
                self.hub.emit(&PlaybackSignal::TimeUpdate {
                    current: 0.0,
                    duration: self.duration,
                });
                if has_frame {
                    self.emit(PlaybackSignal::DataReady);
                }
            }
            Err(e) => self.fail(e),
        }
    }

    fn play(&mut self) {
        if self.playing {
            return;
        }
        let Some(media) = self.media.as_mut() else {
            tracing::debug!("Play requested with no media loaded");
            return;
        };
        if self.ended {
            if let Err(e) = media.seek(0.0) {
                self.fail(e);
                return;
            }
            self.position = 0.0;
            self.ended = false;
            self.emit(PlaybackSignal::Seeked { current: 0.0 });
        }
        self.playing = true;
        self.last_tick = Instant::now();
        self.emit(PlaybackSignal::Play);
    }

    fn pause(&mut self) {
        if !self.playing {
            return;
        }
        self.advance_clock();
        self.playing = false;
        self.emit(PlaybackSignal::Pause);
        self.time_update();
    }

    fn seek(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        let Some(media) = self.media.as_mut() else {
            return;
        };
        let target = seconds.clamp(0.0, self.duration.unwrap_or(f64::INFINITY));
        if let Err(e) = media.seek(target) {
            self.fail(e);
            return;
        }
        self.position = target;
        self.ended = false;
        self.last_tick = Instant::now();
        self.time_update();
        self.emit(PlaybackSignal::Seeked { current: target });
    }

    fn advance_clock(&mut self) {
        let now = Instant::now();
        self.position += now.duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;
    }

    fn tick(&mut self) {
        if !self.playing {
            return;
        }
        self.advance_clock();

        let past_end = self.duration.is_some_and(|d| self.position >= d);
        let step = match self.media.as_mut() {
            Some(_) if past_end => Ok(Advance::End),
            Some(media) => media.advance_to(self.position),
            None => return,
        };

        match step {
            Ok(Advance::Frame) => self.time_update(),
            Ok(Advance::End) => self.finish(),
            Err(e) => self.fail(e),
        }
    }

    fn finish(&mut self) {
        if let Some(d) = self.duration {
            self.position = d;
        }
        self.playing = false;
        self.ended = true;
        self.time_update();
        self.emit(PlaybackSignal::Pause);
        self.emit(PlaybackSignal::Ended);
    }
}
