//! HTTP client for the external detection service.
//!
//! The service accepts one JPEG frame as a multipart upload and answers with
//! an annotated JPEG plus an `X-Detection-Counts` header.

use crate::review::capture::CapturedFrame;
use crate::review::counts::DetectionCounts;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const COUNTS_HEADER: &str = "X-Detection-Counts";
const UNKNOWN_API_ERROR: &str = "An unknown API error occurred.";

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    /// The service answered with a non-2xx status.
    #[error("API Error ({status}): {message}")]
    Api { status: u16, message: String },

    /// No response was received (connection, DNS, TLS, body read).
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

/// A successful detection response.
#[derive(Debug, Clone)]
pub struct Detection {
    pub image: Vec<u8>,
    pub content_type: String,
    /// `None` when the response carried no counts header.
    pub counts: Option<DetectionCounts>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub struct DetectionClient {
    client: reqwest::Client,
    base_url: String,
}

impl DetectionClient {
    /// * `base_url` - service root, e.g. `http://localhost:5000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/detect", self.base_url)
    }

    /// Upload one frame and collect the annotated image and counts.
    pub async fn detect(&self, frame: &CapturedFrame) -> Result<Detection, DetectionError> {
        let part = reqwest::multipart::Part::bytes(frame.jpeg.to_vec())
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body
                    .error
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string()),
                Err(_) => UNKNOWN_API_ERROR.to_string(),
            };
            return Err(DetectionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let counts = response
            .headers()
            .get(COUNTS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(DetectionCounts::parse_header);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let image = response.bytes().await?.to_vec();

        Ok(Detection {
            image,
            content_type,
            counts,
        })
    }

    /// Probe the service root; used for a startup log line only.
    pub async fn ping(&self) -> bool {
        match self.client.get(format!("{}/", self.base_url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Admits at most one detection request at a time.
#[derive(Debug, Clone, Default)]
pub struct AnalysisGate {
    busy: Arc<AtomicBool>,
}

impl AnalysisGate {
    pub fn try_enter(&self) -> Option<InFlight> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the lifetime of a request; dropping it reopens the gate.
#[derive(Debug)]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Multipart;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};

    fn frame() -> CapturedFrame {
        CapturedFrame {
            seq: 1,
            width: 2,
            height: 2,
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9].into(),
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn echo_detect(mut multipart: Multipart) -> impl IntoResponse {
        let mut upload = None;
        while let Some(field) = multipart.next_field().await.unwrap() {
            if field.name() == Some("file") {
                assert_eq!(field.file_name(), Some("frame.jpg"));
                assert_eq!(field.content_type(), Some("image/jpeg"));
                upload = Some(field.bytes().await.unwrap().to_vec());
            }
        }
        let Some(data) = upload else {
            return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": "No file part"})))
                .into_response();
        };
        (
            [
                (header::CONTENT_TYPE, "image/jpeg"),
                (
                    header::HeaderName::from_static("x-detection-counts"),
                    "trayWithFood:2,trayWithoutFood:1,food:0,plate:4",
                ),
            ],
            data,
        )
            .into_response()
    }

    #[tokio::test]
    async fn test_detect_parses_image_and_counts() {
        let base = serve(Router::new().route("/detect", post(echo_detect))).await;
        let client = DetectionClient::new(&format!("{}/", base));

        let detection = client.detect(&frame()).await.unwrap();
        assert_eq!(detection.image, vec![0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(detection.content_type, "image/jpeg");
        assert_eq!(detection.counts, Some(DetectionCounts::new(2, 1, 0)));
    }

    #[tokio::test]
    async fn test_detect_without_counts_header() {
        let app = Router::new().route("/detect", post(|| async { vec![1u8, 2, 3] }));
        let client = DetectionClient::new(&serve(app).await);

        let detection = client.detect(&frame()).await.unwrap();
        assert_eq!(detection.counts, None);
    }

    #[tokio::test]
    async fn test_api_error_uses_json_message() {
        let app = Router::new().route(
            "/detect",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({"error": "Error processing image: boom"})),
                )
            }),
        );
        let client = DetectionClient::new(&serve(app).await);

        let err = client.detect(&frame()).await.unwrap_err();
        assert!(matches!(err, DetectionError::Api { status: 500, .. }));
        assert_eq!(err.to_string(), "API Error (500): Error processing image: boom");
    }

    #[tokio::test]
    async fn test_api_error_fallbacks() {
        let app = Router::new()
            .route(
                "/detect",
                post(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
            );
        let client = DetectionClient::new(&serve(app).await);
        let err = client.detect(&frame()).await.unwrap_err();
        assert_eq!(err.to_string(), "API Error (502): An unknown API error occurred.");

        let app = Router::new().route(
            "/detect",
            post(|| async { (StatusCode::NOT_FOUND, Json(serde_json::json!({}))) }),
        );
        let client = DetectionClient::new(&serve(app).await);
        let err = client.detect(&frame()).await.unwrap_err();
        assert_eq!(err.to_string(), "API Error (404): Not Found");

        let app = Router::new().route(
            "/detect",
            post(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(serde_json::json!({"error": ""})),
                )
            }),
        );
        let client = DetectionClient::new(&serve(app).await);
        let err = client.detect(&frame()).await.unwrap_err();
        assert_eq!(err.to_string(), "API Error (503): Service Unavailable");
    }

    #[tokio::test]
    async fn test_transport_error() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = DetectionClient::new(&format!("http://{}", addr));
        let err = client.detect(&frame()).await.unwrap_err();
        assert!(matches!(err, DetectionError::Transport(_)));
        assert!(!client.ping().await);
    }

    #[test]
    fn test_gate_admits_one_request() {
        let gate = AnalysisGate::default();
        let first = gate.try_enter().unwrap();
        assert!(gate.is_busy());
        assert!(gate.try_enter().is_none());

        drop(first);
        assert!(!gate.is_busy());
        assert!(gate.try_enter().is_some());
    }
}
