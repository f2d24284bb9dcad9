use crate::library::{is_video_file_name, is_video_mime, list_videos, resolve_video, VideoEntry};
use crate::review::resources::UploadedVideo;
use crate::review::session::{name_from_url, AnalyzeRejected, SessionSnapshot, VideoSource};
use crate::video::is_remote;
use crate::web::server::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

/// Upper bound between two snapshots on the event stream.
const EVENT_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

#[derive(Deserialize)]
pub struct OpenRequest {
    pub path: String,
}

#[derive(Deserialize)]
pub struct SeekRequest {
    /// Position on the progress bar, 0.0 to 1.0.
    pub fraction: f64,
}

pub async fn get_state(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let snapshot = state.session.lock().snapshot();
    Json(snapshot)
}

pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = state.session.clone();
    let mut changes = session.lock().subscribe();
    let mut shutdown = state.shutdown.subscribe();

    let stream = async_stream::stream! {
        let mut ticker = tokio::time::interval(EVENT_INTERVAL);
        loop {
            let snapshot = {
                let mut session = session.lock();
                session.poll_controls(Instant::now());
                session.snapshot()
            };
            match Event::default().event("state").json_data(&snapshot) {
                Ok(event) => yield Ok(event),
                Err(e) => tracing::warn!("Failed to encode state event: {}", e),
            }

            let open = tokio::select! {
                changed = changes.changed() => changed.is_ok(),
                _ = ticker.tick() => true,
                _ = shutdown.changed() => false,
            };
            if !open {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn load_url(
    State(state): State<AppState>,
    Json(payload): Json<UrlRequest>,
) -> Result<Json<SessionSnapshot>, StatusCode> {
    let url = payload.url.trim();
    if !is_remote(url) {
        return Err(StatusCode::BAD_REQUEST);
    }
    state.load(&name_from_url(url), VideoSource::Remote(url.to_string()));
    Ok(get_state(State(state)).await)
}

fn store_failed(e: std::io::Error) -> StatusCode {
    tracing::error!("Failed to store upload: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, StatusCode> {
    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("Malformed upload: {}", e);
        StatusCode::BAD_REQUEST
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let mime = field.content_type().unwrap_or_default().to_string();
        if !is_video_mime(&mime) && !is_video_file_name(&file_name) {
            tracing::warn!("Rejected upload '{}' ({})", file_name, mime);
            return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE);
        }

        let (file, upload) = UploadedVideo::create(&file_name).map_err(store_failed)?;
        let mut file = tokio::fs::File::from_std(file);
        let mut received = 0usize;
        while let Some(chunk) = field.chunk().await.map_err(|e| {
            tracing::warn!("Upload of '{}' failed: {}", file_name, e);
            StatusCode::BAD_REQUEST
        })? {
            received += chunk.len();
            file.write_all(&chunk).await.map_err(store_failed)?;
        }
        file.flush().await.map_err(store_failed)?;
        drop(file);
        tracing::info!("Received upload '{}' ({} bytes)", file_name, received);

        state.load(&file_name, VideoSource::Uploaded(upload));
        return Ok(get_state(State(state)).await);
    }

    Err(StatusCode::BAD_REQUEST)
}

pub async fn get_videos(State(state): State<AppState>) -> Json<Vec<VideoEntry>> {
    let videos = match &state.args.video_root {
        Some(root) => list_videos(root),
        None => Vec::new(),
    };
    Json(videos)
}

pub async fn open_video(
    State(state): State<AppState>,
    Json(payload): Json<OpenRequest>,
) -> Result<Json<SessionSnapshot>, StatusCode> {
    let root = state.args.video_root.as_ref().ok_or(StatusCode::NOT_FOUND)?;
    let path = resolve_video(root, &payload.path).map_err(|e| {
        tracing::warn!("{}", e);
        StatusCode::NOT_FOUND
    })?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(&payload.path)
        .to_string();

    state.load(&name, VideoSource::Local(path));
    Ok(get_state(State(state)).await)
}

pub async fn toggle(State(state): State<AppState>) -> StatusCode {
    state.player.toggle();
    StatusCode::NO_CONTENT
}

pub async fn play(State(state): State<AppState>) -> StatusCode {
    state.player.play();
    StatusCode::NO_CONTENT
}

pub async fn pause(State(state): State<AppState>) -> StatusCode {
    state.player.pause();
    StatusCode::NO_CONTENT
}

pub async fn seek(State(state): State<AppState>, Json(payload): Json<SeekRequest>) -> StatusCode {
    let target = state.session.lock().seek_target(payload.fraction);
    if let Some(seconds) = target {
        state.player.seek(seconds);
    }
    StatusCode::NO_CONTENT
}

pub async fn pointer_move(State(state): State<AppState>) -> StatusCode {
    state.session.lock().pointer_moved(Instant::now());
    StatusCode::NO_CONTENT
}

pub async fn pointer_leave(State(state): State<AppState>) -> StatusCode {
    state.session.lock().pointer_left();
    StatusCode::NO_CONTENT
}

/// Send the current frame to the detection service and wait for the outcome.
pub async fn analyze(State(state): State<AppState>) -> Result<Json<SessionSnapshot>, StatusCode> {
    let ticket = state.session.lock().begin_analysis().map_err(|e| {
        tracing::debug!("Analyze rejected: {}", e);
        match e {
            AnalyzeRejected::NoFrame => StatusCode::PRECONDITION_FAILED,
            AnalyzeRejected::Busy => StatusCode::CONFLICT,
        }
    })?;

    let detector = state.detector.clone();
    let session = state.session.clone();
    let task = tokio::spawn(async move {
        tracing::info!(
            "Submitting frame {} ({}x{}) to {}",
            ticket.frame.seq,
            ticket.frame.width,
            ticket.frame.height,
            detector.endpoint()
        );
        let result = detector.detect(&ticket.frame).await;
        session.lock().finish_analysis(ticket, result)
    });

    let failure = task.await.map_err(|e| {
        tracing::error!("Detection task failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if failure.is_some() {
        return Err(StatusCode::BAD_GATEWAY);
    }
    Ok(get_state(State(state)).await)
}

pub async fn current_frame(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let frame = state
        .session
        .lock()
        .current_frame()
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        frame.jpeg.to_vec(),
    )
        .into_response())
}

pub async fn get_blob(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Response, StatusCode> {
    let blob = state.blobs.get(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(([(header::CONTENT_TYPE, blob.mime)], blob.bytes.to_vec()).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::counts::DetectionCounts;
    use crate::web::testing::{app_state, wait_for_frame};
    use axum::routing::post;
    use axum::Router;

    async fn stub_detector(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_analyze_requires_frame() {
        let state = app_state("http://127.0.0.1:9");
        let err = analyze(State(state)).await.unwrap_err();
        assert_eq!(err, StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn test_load_url_validates() {
        let state = app_state("http://127.0.0.1:9");
        let err = load_url(
            State(state.clone()),
            Json(UrlRequest {
                url: "ftp://example.com/a.mp4".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err, StatusCode::BAD_REQUEST);

        let Json(snapshot) = load_url(
            State(state.clone()),
            Json(UrlRequest {
                url: " https://example.com/clips/tray.webm ".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(snapshot.video_name, "tray.webm");

        wait_for_frame(&state.session).await;
        assert!(current_frame(State(state)).await.is_ok());
    }

    #[tokio::test]
    async fn test_analyze_applies_detection() {
        let app = Router::new().route(
            "/detect",
            post(|| async {
                (
                    [
                        ("content-type", "image/jpeg"),
                        ("x-detection-counts", "trayWithFood:3,trayWithoutFood:1,food:5"),
                    ],
                    vec![0xFFu8, 0xD8, 0x00],
                )
            }),
        );
        let state = app_state(&stub_detector(app).await);
        state.load_location("https://example.com/flower.mp4");
        wait_for_frame(&state.session).await;

        let Json(snapshot) = analyze(State(state.clone())).await.unwrap();
        assert_eq!(snapshot.counts, DetectionCounts::new(3, 1, 5));
        assert!(!snapshot.analyzing);

        let url = snapshot.annotated_url.unwrap();
        let id: u64 = url.trim_start_matches("/blob/").parse().unwrap();
        let resp = get_blob(State(state.clone()), Path(id)).await.unwrap();
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/jpeg");

        assert_eq!(
            get_blob(State(state), Path(id + 100)).await.unwrap_err(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_analyze_failure_raises_notice() {
        let app = Router::new().route(
            "/detect",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({"error": "model offline"})),
                )
            }),
        );
        let state = app_state(&stub_detector(app).await);
        state.load_location("https://example.com/flower.mp4");
        wait_for_frame(&state.session).await;

        let err = analyze(State(state.clone())).await.unwrap_err();
        assert_eq!(err, StatusCode::BAD_GATEWAY);

        let snapshot = state.session.lock().snapshot();
        assert_eq!(snapshot.notices.len(), 1);
        assert_eq!(snapshot.notices[0].description, "API Error (500): model offline");
        assert!(snapshot.annotated_url.is_none());
        assert!(snapshot.can_analyze);
    }

    #[tokio::test]
    async fn test_missing_video_raises_playback_notice() {
        let state = app_state("http://127.0.0.1:9");
        state.load_location("/videos/missing.mp4");

        for _ in 0..200 {
            if !state.session.lock().snapshot().notices.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let snapshot = state.session.lock().snapshot();
        assert_eq!(snapshot.notices[0].title, "Video Playback Error");
        assert_eq!(snapshot.notices[0].description, "The video format is not supported.");
    }

    #[tokio::test]
    async fn test_seek_without_duration_is_ignored() {
        let state = app_state("http://127.0.0.1:9");
        let status = seek(State(state), Json(SeekRequest { fraction: 0.5 })).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_videos_empty_without_root() {
        let state = app_state("http://127.0.0.1:9");
        let Json(videos) = get_videos(State(state.clone())).await;
        assert!(videos.is_empty());

        let err = open_video(
            State(state),
            Json(OpenRequest {
                path: "a.mp4".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err, StatusCode::NOT_FOUND);
    }
}
