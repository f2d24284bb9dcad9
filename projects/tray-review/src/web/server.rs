use crate::cli::Args;
use crate::review::detection::DetectionClient;
use crate::review::resources::BlobRegistry;
use crate::review::playback::SignalHub;
use crate::review::session::{
    name_from_url, ReviewSession, SessionObserver, SharedSession, VideoSource,
};
use crate::video::player::{Player, PlayerConfig};
use crate::video::{is_remote, opencv_media, MediaOpener};
use crate::web::assets::{index_handler, static_handler};
use crate::web::{api, history};
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub session: SharedSession,
    pub player: Arc<Player>,
    pub detector: Arc<DetectionClient>,
    pub blobs: BlobRegistry,
    pub args: Arc<Args>,
    pub shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(args: Args, opener: MediaOpener) -> Result<Self> {
        let blobs = BlobRegistry::new();
        let session = SharedSession::new(ReviewSession::new(blobs.clone()));

        let mut hub = SignalHub::new();
        hub.subscribe(Box::new(SessionObserver::new(session.clone())));
        let player = Player::spawn(opener, hub, PlayerConfig::default())?;

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            session,
            player: Arc::new(player),
            detector: Arc::new(DetectionClient::new(&args.detect_url)),
            blobs,
            args: Arc::new(args),
            shutdown: Arc::new(shutdown),
        })
    }

    /// Reset the session for a new video and start it in the player.
    pub fn load(&self, name: &str, source: VideoSource) {
        let mut session = self.session.lock();
        let location = session.load_video(name, source);
        self.player.load(&location, session.generation());
    }

    /// Load a location given on the command line, remote or local.
    pub fn load_location(&self, location: &str) {
        if is_remote(location) {
            self.load(&name_from_url(location), VideoSource::Remote(location.to_string()));
        } else {
            let path = PathBuf::from(location);
            let name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or(location)
                .to_string();
            self.load(&name, VideoSource::Local(path));
        }
    }
}

pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.args.max_upload_bytes());

    Router::new()
        .route("/", get(index_handler))
        .route("/blob/:id", get(api::get_blob))
        .route("/api/frame/current", get(api::current_frame))
        .route("/api/state", get(api::get_state))
        .route("/api/events", get(api::events))
        .route("/api/video/url", post(api::load_url))
        .route("/api/video/upload", post(api::upload_video).layer(upload_limit))
        .route("/api/videos", get(api::get_videos))
        .route("/api/video/open", post(api::open_video))
        .route("/api/playback/toggle", post(api::toggle))
        .route("/api/playback/play", post(api::play))
        .route("/api/playback/pause", post(api::pause))
        .route("/api/playback/seek", post(api::seek))
        .route("/api/pointer/move", post(api::pointer_move))
        .route("/api/pointer/leave", post(api::pointer_leave))
        .route("/api/analyze", post(api::analyze))
        .route("/api/counts/:key/increment", post(history::increment))
        .route("/api/confirm", post(history::confirm))
        .route("/api/history", delete(history::clear))
        .route("/api/history/:id", delete(history::remove))
        .route("/api/history/:id/counts/:key", post(history::adjust))
        .route("/api/history/:id/rating", put(history::set_rating))
        .route("/api/export", get(history::export))
        .route("/api/notices/:id", delete(history::dismiss_notice))
        .route("/*path", get(static_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn bind(host: IpAddr, port: u16) -> Result<TcpListener> {
    let mut current_port = port;
    loop {
        let addr = SocketAddr::new(host, current_port);
        match TcpListener::bind(addr) {
            Ok(listener) => {
                listener.set_nonblocking(true)?;
                info!("Successfully bound to {}", addr);
                return Ok(listener);
            }
            Err(e) => {
                warn!("Failed to bind to {}: {}. Trying next port...", addr, e);
                current_port = current_port.wrapping_add(1);
                if current_port == 0 {
                    return Err(anyhow::anyhow!("No available ports found"));
                }
            }
        }
    }
}

pub async fn run_server(args: Args) -> Result<()> {
    let listener = bind(args.host, args.port)?;

    let state = AppState::new(args, opencv_media::opener())?;
    state.load_location(&state.args.default_video);

    if state.detector.ping().await {
        info!("Detection service reachable at {}", state.detector.endpoint());
    } else {
        warn!(
            "Detection service not reachable at {}; analysis will fail until it is up",
            state.detector.endpoint()
        );
    }

    let shutdown = state.shutdown.clone();
    let app = router(state);

    let tokio_listener = tokio::net::TcpListener::from_std(listener)?;
    info!(
        "Tray Review server started on http://{}",
        tokio_listener.local_addr()?
    );

    axum::serve(tokio_listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
            shutdown.send_replace(true);
        })
        .await?;

    Ok(())
}
