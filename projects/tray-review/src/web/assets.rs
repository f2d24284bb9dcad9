use axum::{
    body::Body,
    extract::Path,
    http::{header, Response, StatusCode},
    response::IntoResponse,
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/ui/"]
pub struct Assets;

pub async fn static_handler(Path(path): Path<String>) -> impl IntoResponse {
    let path = path.trim_start_matches('/');

    if path.is_empty() || path == "index.html" {
        return index_response();
    }

    // Unknown paths fall back to the single page
    serve_asset(path).unwrap_or_else(|_| index_response())
}

pub async fn index_handler() -> impl IntoResponse {
    index_response()
}

fn index_response() -> Response<Body> {
    serve_asset("index.html").unwrap_or_else(|status| (status, "UI assets missing").into_response())
}

fn serve_asset(path: &str) -> Result<Response<Body>, StatusCode> {
    let asset = Assets::get(path).ok_or(StatusCode::NOT_FOUND)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .body(Body::from(asset.data.into_owned()))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_ui_present() {
        for file in ["index.html", "app.js", "style.css"] {
            assert!(Assets::get(file).is_some(), "missing {}", file);
        }
    }

    #[test]
    fn test_asset_mime_types() {
        let resp = serve_asset("style.css").unwrap();
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/css");
        assert_eq!(serve_asset("nope.png").unwrap_err(), StatusCode::NOT_FOUND);
    }
}
