//! Embedded static asset serving utilities.

use axum::{
    body::Body,
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, include_dir};
use mime_guess::{Mime, MimeGuess};

use crate::application::error::ErrorReport;

static STATIC_PUBLIC_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static/public");

/// Serve the player script and stylesheet compiled into the binary.
pub async fn serve_public(path: Option<Path<String>>) -> Response {
    serve_static(&STATIC_PUBLIC_ASSETS, path, "infra::assets::serve_public")
}

fn serve_static(
    bundle: &'static Dir<'static>,
    path: Option<Path<String>>,
    source: &'static str,
) -> Response {
    let captured = path.map(|Path(value)| value);
    match resolve_asset(bundle, captured) {
        Ok(Some(asset)) => asset.into_response(),
        Ok(None) => not_found_response(source),
        Err(status) => rejected_response(source, status),
    }
}

fn not_found_response(source: &'static str) -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, "Static asset not found")
        .attach(&mut response);
    response
}

fn rejected_response(source: &'static str, status: StatusCode) -> Response {
    let mut response = status.into_response();
    ErrorReport::from_message(source, status, "Static asset request rejected")
        .attach(&mut response);
    response
}

struct Asset {
    contents: &'static [u8],
    mime: MimeGuess,
}

fn resolve_asset(
    bundle: &'static Dir<'static>,
    path: Option<String>,
) -> Result<Option<Asset>, StatusCode> {
    let raw = path.unwrap_or_default();
    let candidate = raw.trim_start_matches('/');

    if candidate.contains('\\') || candidate.contains('\0') {
        return Err(StatusCode::BAD_REQUEST);
    }
    if candidate.is_empty() || candidate.ends_with('/') || candidate.contains("..") {
        // No traversal, no directory listings.
        return Ok(None);
    }

    let Some(file) = bundle.get_file(candidate) else {
        return Ok(None);
    };

    Ok(Some(Asset {
        contents: file.contents(),
        mime: mime_guess::from_path(candidate),
    }))
}

impl IntoResponse for Asset {
    fn into_response(self) -> Response {
        let mime = self.mime.first_or_octet_stream();
        build_response(Bytes::from_static(self.contents), mime)
    }
}

fn build_response(bytes: Bytes, mime: Mime) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );

    response
}
