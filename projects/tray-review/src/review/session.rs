use crate::review::capture::CapturedFrame;
use crate::review::counts::{CountKey, DetectionCounts};
use crate::review::detection::{AnalysisGate, Detection, DetectionError, InFlight};
use crate::review::export::{export_csv, CsvReport};
use crate::review::ledger::{HistoryEntry, HistoryLedger, NewEntry, Rating};
use crate::review::notice::{Notice, NoticeQueue, ANALYSIS_FAILED_TITLE, PLAYBACK_ERROR_TITLE};
use crate::review::playback::{PlaybackController, PlaybackObserver, PlaybackSignal, PlaybackState};
use crate::review::resources::{BlobHandle, BlobRegistry, UploadedVideo};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;

pub const CURRENT_FRAME_URL: &str = "/api/frame/current";

/// Where the video under review comes from.
#[derive(Debug)]
pub enum VideoSource {
    Remote(String),
    Local(PathBuf),
    Uploaded(UploadedVideo),
}

impl VideoSource {
    /// Location handed to the media backend.
    pub fn location(&self) -> String {
        match self {
            VideoSource::Remote(url) => url.clone(),
            VideoSource::Local(path) => path.to_string_lossy().into_owned(),
            VideoSource::Uploaded(upload) => upload.path().to_string_lossy().into_owned(),
        }
    }
}

/// Display name for a remote video: the last path segment without query.
pub fn name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(url)
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AnalyzeRejected {
    #[error("No frame has been captured yet")]
    NoFrame,
    #[error("A detection request is already in flight")]
    Busy,
}

/// Everything a detection request needs, taken from the session under lock.
#[derive(Debug)]
pub struct AnalysisTicket {
    pub frame: CapturedFrame,
    pub generation: u64,
    pub guard: InFlight,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub video_name: String,
    pub playback: PlaybackState,
    pub frame_seq: Option<u64>,
    pub current_frame_url: Option<String>,
    pub annotated_url: Option<String>,
    pub preview_url: Option<String>,
    pub analyzing: bool,
    pub can_analyze: bool,
    pub counts: DetectionCounts,
    pub history: Vec<HistoryEntry>,
    pub notices: Vec<Notice>,
}

/// State of one review: the loaded video, its playback, the live tally and the history.
pub struct ReviewSession {
    blobs: BlobRegistry,
    video_name: String,
    video: Option<VideoSource>,
    playback: PlaybackController,
    frame: Option<CapturedFrame>,
    annotated: Option<BlobHandle>,
    counts: DetectionCounts,
    ledger: HistoryLedger,
    notices: NoticeQueue,
    gate: AnalysisGate,
    generation: u64,
    version: watch::Sender<u64>,
}

impl ReviewSession {
    pub fn new(blobs: BlobRegistry) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            blobs,
            video_name: String::new(),
            video: None,
            playback: PlaybackController::new(),
            frame: None,
            annotated: None,
            counts: DetectionCounts::default(),
            ledger: HistoryLedger::new(),
            notices: NoticeQueue::default(),
            gate: AnalysisGate::default(),
            generation: 0,
            version,
        }
    }

    /// Receiver that changes whenever the session does.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn touch(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Swap in a new video. Clears the history, the captured frame and the
    /// annotated image, and resets playback. Returns the location to open.
    pub fn load_video(&mut self, name: &str, source: VideoSource) -> String {
        let location = source.location();
        tracing::info!("Loading video '{}' from {}", name, location);

        self.video_name = name.to_string();
        self.video = Some(source);
        self.ledger.clear();
        self.frame = None;
        self.annotated = None;
        self.playback.reset();
        self.generation += 1;
        self.touch();
        location
    }

    pub fn video_name(&self) -> &str {
        &self.video_name
    }

    pub fn video(&self) -> Option<&VideoSource> {
        self.video.as_ref()
    }

    pub fn playback(&self) -> &PlaybackState {
        self.playback.state()
    }

    /// Load generation the player output must carry to be applied.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Apply a player signal. Output from an earlier load is dropped.
    pub fn on_signal(&mut self, generation: u64, signal: &PlaybackSignal) {
        if generation != self.generation {
            tracing::debug!("Dropping {:?} from load {}", signal, generation);
            return;
        }
        if let Some(message) = self.playback.apply(signal) {
            tracing::warn!("Video playback error: {}", message);
            self.notices.push(PLAYBACK_ERROR_TITLE, message);
        }
        self.touch();
    }

    pub fn on_frame(&mut self, generation: u64, frame: CapturedFrame) {
        if generation != self.generation {
            return;
        }
        self.frame = Some(frame);
        self.touch();
    }

    pub fn current_frame(&self) -> Option<&CapturedFrame> {
        self.frame.as_ref()
    }

    pub fn seek_target(&self, fraction: f64) -> Option<f64> {
        self.playback.seek_target(fraction)
    }

    pub fn pointer_moved(&mut self, now: Instant) {
        self.playback.pointer_moved(now);
        self.touch();
    }

    pub fn pointer_left(&mut self) {
        self.playback.pointer_left();
        self.touch();
    }

    pub fn poll_controls(&mut self, now: Instant) {
        if self.playback.poll_controls(now) {
            self.touch();
        }
    }

    pub fn can_analyze(&self) -> bool {
        self.frame.is_some() && !self.gate.is_busy()
    }

    pub fn begin_analysis(&mut self) -> Result<AnalysisTicket, AnalyzeRejected> {
        let frame = self.frame.clone().ok_or(AnalyzeRejected::NoFrame)?;
        let guard = self.gate.try_enter().ok_or(AnalyzeRejected::Busy)?;
        self.touch();
        Ok(AnalysisTicket {
            frame,
            generation: self.generation,
            guard,
        })
    }

    /// Apply a finished request. Results for a video that has since been
    /// replaced are dropped. Returns the error message on failure.
    pub fn finish_analysis(
        &mut self,
        ticket: AnalysisTicket,
        result: Result<Detection, DetectionError>,
    ) -> Option<String> {
        let AnalysisTicket {
            generation, guard, ..
        } = ticket;

        let outcome = if generation != self.generation {
            tracing::debug!(
                "Discarding detection result for generation {} (now {})",
                generation,
                self.generation
            );
            None
        } else {
            match result {
                Ok(detection) => {
                    self.annotated = Some(self.blobs.create(detection.image, &detection.content_type));
                    if let Some(counts) = detection.counts {
                        self.counts = counts;
                    }
                    None
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!("AI analysis failed: {}", message);
                    self.notices.push(ANALYSIS_FAILED_TITLE, message.clone());
                    Some(message)
                }
            }
        };

        drop(guard);
        self.touch();
        outcome
    }

    pub fn counts(&self) -> DetectionCounts {
        self.counts
    }

    pub fn increment(&mut self, key: CountKey) {
        self.counts.increment(key);
        self.touch();
    }

    /// Record the live tally against the current frame and start a fresh tally.
    pub fn confirm(&mut self, rating: Rating) -> i64 {
        let state = self.playback.state();
        let id = self.ledger.append(NewEntry {
            current_frame: state.current_frame,
            total_frames: state.total_frames,
            counts: self.counts,
            rating,
        });
        self.counts.reset();
        self.touch();
        id
    }

    pub fn adjust_entry(&mut self, id: i64, key: CountKey, delta: i64) -> bool {
        let changed = self.ledger.adjust_count(id, key, delta);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn set_rating(&mut self, id: i64, rating: Rating) -> bool {
        let changed = self.ledger.set_rating(id, rating);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn remove_entry(&mut self, id: i64) -> bool {
        let changed = self.ledger.remove(id);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn clear_history(&mut self) {
        self.ledger.clear();
        self.touch();
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn export(&self) -> anyhow::Result<Option<CsvReport>> {
        export_csv(&self.ledger, &self.video_name)
    }

    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        let changed = self.notices.dismiss(id);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let current_frame_url = self.frame.as_ref().map(|_| CURRENT_FRAME_URL.to_string());
        let annotated_url = self.annotated.as_ref().map(BlobHandle::url);
        SessionSnapshot {
            video_name: self.video_name.clone(),
            playback: self.playback.state().clone(),
            frame_seq: self.frame.as_ref().map(|f| f.seq),
            preview_url: annotated_url.clone().or_else(|| current_frame_url.clone()),
            current_frame_url,
            annotated_url,
            analyzing: self.gate.is_busy(),
            can_analyze: self.can_analyze(),
            counts: self.counts,
            history: self.ledger.entries().cloned().collect(),
            notices: self.notices.as_slice().to_vec(),
        }
    }
}

/// Session shared between the player thread and request handlers.
#[derive(Clone)]
pub struct SharedSession(Arc<Mutex<ReviewSession>>);

impl SharedSession {
    pub fn new(session: ReviewSession) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub fn lock(&self) -> MutexGuard<'_, ReviewSession> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Feeds player output into the shared session, tagged with the load it
/// came from.
pub struct SessionObserver {
    session: SharedSession,
    generation: u64,
}

impl SessionObserver {
    pub fn new(session: SharedSession) -> Self {
        Self {
            session,
            generation: 0,
        }
    }
}

impl PlaybackObserver for SessionObserver {
    fn on_load(&mut self, generation: u64) {
        self.generation = generation;
    }

    fn on_signal(&mut self, signal: &PlaybackSignal) {
        self.session.lock().on_signal(self.generation, signal);
    }

    fn on_frame(&mut self, frame: &CapturedFrame) {
        self.session.lock().on_frame(self.generation, frame.clone());
    }
}
