use crate::video::{MediaElement, ReadyState};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};
use std::sync::Arc;

/// Browser default for canvas JPEG encoding.
pub const JPEG_QUALITY: u8 = 92;

/// The most recent still taken from the playing video.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    pub jpeg: Arc<[u8]>,
}

/// Copies the current video frame to an offscreen surface and encodes it.
pub struct FrameCapture {
    surface: RgbImage,
    quality: u8,
    seq: u64,
}

impl FrameCapture {
    pub fn new() -> Self {
        Self::with_quality(JPEG_QUALITY)
    }

    pub fn with_quality(quality: u8) -> Self {
        Self {
            surface: RgbImage::new(0, 0),
            quality: quality.clamp(1, 100),
            seq: 0,
        }
    }

    pub fn surface_dimensions(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    /// Returns `None` while the element has no decoded frame, leaving the
    /// previous capture in effect.
    pub fn capture(&mut self, media: &dyn MediaElement) -> Option<CapturedFrame> {
        if media.ready_state() < ReadyState::HaveCurrentData {
            return None;
        }

        let (width, height) = media.video_size();
        if width == 0 || height == 0 {
            return None;
        }
        if self.surface.dimensions() != (width, height) {
            tracing::debug!("Resizing capture surface to {}x{}", width, height);
            self.surface = RgbImage::new(width, height);
        }

        if let Err(e) = media.copy_frame(&mut self.surface) {
            tracing::warn!("Frame capture failed: {}", e);
            return None;
        }

        let mut jpeg = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, self.quality);
        if let Err(e) = encoder.encode(self.surface.as_raw(), width, height, ExtendedColorType::Rgb8) {
            tracing::warn!("JPEG encoding failed: {}", e);
            return None;
        }

        self.seq += 1;
        Some(CapturedFrame {
            seq: self.seq,
            width,
            height,
            jpeg: jpeg.into(),
        })
    }
}

impl Default for FrameCapture {
    fn default() -> Self {
        Self::new()
    }
}
