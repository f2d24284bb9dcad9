use super::{is_remote, Advance, MediaElement, MediaError, MediaOpener, ReadyState};
use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_HW_ACCELERATION,
        CAP_PROP_POS_FRAMES, VIDEO_ACCELERATION_ANY,
    },
};

const FALLBACK_FPS: f64 = 30.0;

fn decode_err(e: opencv::Error) -> MediaError {
    MediaError::Decode(e.to_string())
}

/// Media element backed by an OpenCV capture. Holds the most recently decoded
/// frame already converted to RGB.
pub struct OpencvMedia {
    capture: VideoCapture,
    fps: f64,
    frame_count: u64,
    /// Index of the frame held in `frame`.
    current_index: u64,
    frame: Mat,
}

impl OpencvMedia {
    pub fn open(location: &str) -> Result<Self, MediaError> {
        let not_opened = || {
            let msg = format!("Failed to open video: {}", location);
            if is_remote(location) {
                MediaError::Network(msg)
            } else {
                MediaError::SrcNotSupported(msg)
            }
        };

        let mut capture = VideoCapture::from_file(location, CAP_ANY).map_err(|_| not_opened())?;
        if !capture.is_opened().map_err(decode_err)? {
            return Err(not_opened());
        }

        if let Ok(enabled) = capture.set(CAP_PROP_HW_ACCELERATION, VIDEO_ACCELERATION_ANY as f64) {
            tracing::debug!("OpencvMedia: hardware acceleration enabled={}", enabled);
        }

        let mut fps = capture.get(CAP_PROP_FPS).map_err(decode_err)?;
        if !fps.is_finite() || fps <= 0.0 {
            tracing::warn!("OpencvMedia: no FPS in metadata, falling back to {}", FALLBACK_FPS);
            fps = FALLBACK_FPS;
        }
        let raw_count = capture.get(CAP_PROP_FRAME_COUNT).map_err(decode_err)?;
        let frame_count = if raw_count.is_finite() && raw_count > 0.0 {
            raw_count as u64
        } else {
            0
        };

        let mut media = Self {
            capture,
            fps,
            frame_count,
            current_index: 0,
            frame: Mat::default(),
        };
        if !media.read_current()? {
            return Err(MediaError::Decode(format!(
                "No decodable frames in {}",
                location
            )));
        }

        tracing::info!(
            "OpencvMedia: opened {}, duration={:?}, fps={:.2}, frames={}",
            location,
            media.duration(),
            fps,
            frame_count
        );
        Ok(media)
    }

    /// Read the next frame into `self.frame`. Returns false at end of stream.
    fn read_current(&mut self) -> Result<bool, MediaError> {
        let mut bgr = Mat::default();
        if !self.capture.read(&mut bgr).map_err(decode_err)? || bgr.empty() {
            return Ok(false);
        }
        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB).map_err(decode_err)?;
        self.frame = rgb;
        Ok(true)
    }

    fn index_at(&self, seconds: f64) -> u64 {
        if seconds.is_finite() && seconds > 0.0 {
            (seconds * self.fps).floor() as u64
        } else {
            0
        }
    }
}

impl MediaElement for OpencvMedia {
    fn ready_state(&self) -> ReadyState {
        if self.frame.empty() {
            ReadyState::HaveMetadata
        } else {
            ReadyState::HaveCurrentData
        }
    }

    fn duration(&self) -> Option<f64> {
        (self.frame_count > 0).then(|| self.frame_count as f64 / self.fps)
    }

    fn video_size(&self) -> (u32, u32) {
        (self.frame.cols().max(0) as u32, self.frame.rows().max(0) as u32)
    }

    fn seek(&mut self, seconds: f64) -> Result<(), MediaError> {
        let mut target = self.index_at(seconds);
        if self.frame_count > 0 {
            target = target.min(self.frame_count - 1);
        }
        self.capture
            .set(CAP_PROP_POS_FRAMES, target as f64)
            .map_err(decode_err)?;
        if self.read_current()? {
            self.current_index = target;
        }
        Ok(())
    }

    fn advance_to(&mut self, seconds: f64) -> Result<Advance, MediaError> {
        let target = self.index_at(seconds);
        if target < self.current_index {
            self.seek(seconds)?;
            return Ok(Advance::Frame);
        }

        // Skip intermediate frames without decoding them
        while self.current_index + 1 < target {
            if !self.capture.grab().map_err(decode_err)? {
                return Ok(Advance::End);
            }
            self.current_index += 1;
        }
        if self.current_index < target {
            if !self.read_current()? {
                return Ok(Advance::End);
            }
            self.current_index = target;
        }
        Ok(Advance::Frame)
    }

    fn copy_frame(&self, surface: &mut RgbImage) -> Result<(), MediaError> {
        let bytes = self.frame.data_bytes().map_err(decode_err)?;
        let dst: &mut [u8] = surface;
        if bytes.len() != dst.len() {
            return Err(MediaError::Decode(format!(
                "Frame buffer size mismatch: {} != {}",
                bytes.len(),
                dst.len()
            )));
        }
        dst.copy_from_slice(bytes);
        Ok(())
    }
}

/// Opener used by the player for real media.
pub fn opener() -> MediaOpener {
    Box::new(|location: &str| {
        OpencvMedia::open(location).map(|media| Box::new(media) as Box<dyn MediaElement>)
    })
}
