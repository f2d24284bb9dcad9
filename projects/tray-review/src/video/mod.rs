pub mod opencv_media;
pub mod player;

use image::RgbImage;
use serde::Serialize;

/// How much of the media is available, mirroring the HTML media ready states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
}

/// Category of a playback failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaErrorCode {
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Playback aborted: {0}")]
    Aborted(String),
    #[error("Network failure: {0}")]
    Network(String),
    #[error("Decode failure: {0}")]
    Decode(String),
    #[error("Unsupported source: {0}")]
    SrcNotSupported(String),
}

impl MediaError {
    pub fn code(&self) -> MediaErrorCode {
        match self {
            MediaError::Aborted(_) => MediaErrorCode::Aborted,
            MediaError::Network(_) => MediaErrorCode::Network,
            MediaError::Decode(_) => MediaErrorCode::Decode,
            MediaError::SrcNotSupported(_) => MediaErrorCode::SrcNotSupported,
        }
    }
}

/// Result of moving the decode position forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Frame,
    End,
}

/// A decoding source the player drives. Decoding itself is delegated to the backend.
/// Elements are opened and used on the player thread only.
pub trait MediaElement {
    fn ready_state(&self) -> ReadyState;
    /// Duration in seconds, if the container reports one.
    fn duration(&self) -> Option<f64>;
    /// Native frame size of the decoded video.
    fn video_size(&self) -> (u32, u32);
    fn seek(&mut self, seconds: f64) -> Result<(), MediaError>;
    /// Decode forward until the frame shown at `seconds` is current.
    fn advance_to(&mut self, seconds: f64) -> Result<Advance, MediaError>;
    /// Copy the current frame into `surface`, which is already sized to [`Self::video_size`].
    fn copy_frame(&self, surface: &mut RgbImage) -> Result<(), MediaError>;
}

/// Opens a media element for a location (file path or URL).
pub type MediaOpener = Box<dyn Fn(&str) -> Result<Box<dyn MediaElement>, MediaError> + Send>;

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}
