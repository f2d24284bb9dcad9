use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

pub const DEFAULT_VIDEO_URL: &str =
    "https://interactive-examples.mdn.mozilla.net/media/cc0-videos/flower.mp4";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind to
    #[arg(long, default_value_t = 12206)]
    pub port: u16,

    /// Base URL of the detection service
    #[arg(long, env = "PYTHON_API_URL", default_value = "http://localhost:5000")]
    pub detect_url: String,

    /// Video loaded when the server starts
    #[arg(long, env = "TRAY_REVIEW_DEFAULT_VIDEO", default_value = DEFAULT_VIDEO_URL)]
    pub default_video: String,

    /// Optional directory of local videos offered in the picker
    #[arg(long, env = "TRAY_REVIEW_VIDEO_ROOT")]
    pub video_root: Option<PathBuf>,

    /// Largest accepted video upload, in MiB
    #[arg(long, default_value_t = 1024)]
    pub max_upload_mb: usize,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
