use crate::review::counts::{CountKey, DetectionCounts};
use crate::review::export::CSV_CONTENT_TYPE;
use crate::review::ledger::Rating;
use crate::web::server::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub correct: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConfirmResponse {
    pub id: i64,
}

#[derive(Deserialize)]
pub struct AdjustRequest {
    pub delta: i64,
}

#[derive(Deserialize)]
pub struct RatingRequest {
    pub rating: Rating,
}

fn found(changed: bool) -> StatusCode {
    if changed {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn increment(
    State(state): State<AppState>,
    Path(key): Path<CountKey>,
) -> Json<DetectionCounts> {
    let mut session = state.session.lock();
    session.increment(key);
    Json(session.counts())
}

pub async fn confirm(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmRequest>,
) -> Json<ConfirmResponse> {
    let id = state
        .session
        .lock()
        .confirm(Rating::from_correct(payload.correct));
    tracing::info!("Recorded history entry {}", id);
    Json(ConfirmResponse { id })
}

pub async fn clear(State(state): State<AppState>) -> StatusCode {
    state.session.lock().clear_history();
    StatusCode::NO_CONTENT
}

pub async fn adjust(
    State(state): State<AppState>,
    Path((id, key)): Path<(i64, CountKey)>,
    Json(payload): Json<AdjustRequest>,
) -> StatusCode {
    found(state.session.lock().adjust_entry(id, key, payload.delta))
}

pub async fn set_rating(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<RatingRequest>,
) -> StatusCode {
    found(state.session.lock().set_rating(id, payload.rating))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> StatusCode {
    found(state.session.lock().remove_entry(id))
}

pub async fn dismiss_notice(State(state): State<AppState>, Path(id): Path<u64>) -> StatusCode {
    found(state.session.lock().dismiss_notice(id))
}

/// `Content-Disposition` value with an ASCII fallback plus the UTF-8 name.
fn attachment(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded: String = file_name
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
                (b as char).to_string()
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

pub async fn export(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let report = state.session.lock().export().map_err(|e| {
        tracing::error!("CSV export failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let Some(report) = report else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    tracing::info!("Exporting {}", report.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, attachment(&report.file_name)),
        ],
        report.body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::testing::app_state;

    #[test]
    fn test_attachment_header() {
        assert_eq!(
            attachment("Detection Report flower.csv"),
            "attachment; filename=\"Detection Report flower.csv\"; filename*=UTF-8''Detection%20Report%20flower.csv"
        );
        assert!(attachment("Détection \"x\".csv").starts_with("attachment; filename=\"D_tection _x_.csv\""));
    }

    #[tokio::test]
    async fn test_history_edits() {
        let state = app_state("http://127.0.0.1:9");

        increment(State(state.clone()), Path(CountKey::TrayWithFood)).await;
        let Json(counts) = increment(State(state.clone()), Path(CountKey::TrayWithFood)).await;
        assert_eq!(counts, DetectionCounts::new(2, 0, 0));

        let Json(first) = confirm(State(state.clone()), Json(ConfirmRequest { correct: true })).await;
        let Json(second) = confirm(State(state.clone()), Json(ConfirmRequest { correct: false })).await;
        assert!(second.id > first.id);

        let status = adjust(
            State(state.clone()),
            Path((first.id, CountKey::TrayWithFood)),
            Json(AdjustRequest { delta: -5 }),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let status = set_rating(
            State(state.clone()),
            Path(second.id),
            Json(RatingRequest {
                rating: Rating::Correct,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        {
            let session = state.session.lock();
            let entries: Vec<_> = session.ledger().entries().cloned().collect();
            assert_eq!(entries[0].id, second.id);
            assert_eq!(entries[0].rating, Rating::Correct);
            assert_eq!(entries[1].counts.tray_with_food, 0);
        }

        assert_eq!(remove(State(state.clone()), Path(first.id)).await, StatusCode::NO_CONTENT);
        assert_eq!(remove(State(state.clone()), Path(first.id)).await, StatusCode::NOT_FOUND);
        assert_eq!(
            adjust(
                State(state.clone()),
                Path((first.id, CountKey::Food)),
                Json(AdjustRequest { delta: 1 }),
            )
            .await,
            StatusCode::NOT_FOUND
        );

        assert_eq!(clear(State(state.clone())).await, StatusCode::NO_CONTENT);
        let resp = export(State(state)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_export_headers() {
        let state = app_state("http://127.0.0.1:9");
        state.load_location("https://example.com/media/flower.mp4");
        confirm(State(state.clone()), Json(ConfirmRequest { correct: true })).await;

        let resp = export(State(state)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], CSV_CONTENT_TYPE);
        assert!(resp.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("Detection Report flower.csv"));
    }

    #[tokio::test]
    async fn test_dismiss_unknown_notice() {
        let state = app_state("http://127.0.0.1:9");
        assert_eq!(dismiss_notice(State(state), Path(7)).await, StatusCode::NOT_FOUND);
    }
}
