use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header::CACHE_CONTROL},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::services::ServeDir;

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        reader::ReaderService,
        synthesis::SynthesisService,
    },
    infra::audio_store::AudioStorage,
    presentation::views::{
        AJAX_PATH, IndexTemplate, IndexView, LayoutChrome, LayoutContext, PostListItem,
        PostTemplate, PostView, render_not_found_response, render_template_response,
    },
};

use super::{
    ajax::ajax,
    db_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub reader: Arc<ReaderService>,
    pub synthesis: Arc<SynthesisService>,
    pub audio_storage: Arc<AudioStorage>,
    pub chrome: LayoutChrome,
}

pub fn build_router(state: HttpState) -> Router {
    // ServeDir streams the file and answers `Range` requests so players can seek.
    let uploads = Router::new()
        .nest_service("/uploads", ServeDir::new(state.audio_storage.root()))
        .layer(middleware::map_response(upload_headers));

    Router::new()
        .route("/", get(index))
        .route("/posts/{id}", get(post_detail))
        .route(AJAX_PATH, post(ajax))
        .route(
            "/static/public/{*path}",
            get(crate::infra::assets::serve_public),
        )
        .route("/_health/db", get(public_health))
        .merge(uploads)
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn index(State(state): State<HttpState>) -> Response {
    let posts = match state.reader.recent_posts().await {
        Ok(posts) => posts,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let content = IndexView {
        posts: posts.iter().map(PostListItem::from).collect(),
    };
    let view = LayoutContext::new(state.chrome.clone(), "Posts", content);
    render_template_response(IndexTemplate { view }, StatusCode::OK)
}

async fn post_detail(State(state): State<HttpState>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<i64>() else {
        return render_not_found_response(state.chrome.clone());
    };

    match state.reader.post_page(id).await {
        Ok(Some(page)) => {
            let title = page.post.title.clone();
            let content = PostView::new(page.post, page.nonce);
            let view = LayoutContext::new(state.chrome.clone(), title, content);
            let mut response = render_template_response(PostTemplate { view }, StatusCode::OK);
            // The page embeds a time-limited token.
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
        Ok(None) => render_not_found_response(state.chrome.clone()),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(
        "infra::http::public::public_health",
        state.reader.health_check().await,
    )
}

async fn fallback(State(state): State<HttpState>) -> Response {
    render_not_found_response(state.chrome.clone())
}

/// Stored audio is never rewritten in place, so successful responses are cacheable
/// forever. Missing files get an [`ErrorReport`] for the response log.
async fn upload_headers(mut response: Response) -> Response {
    let status = response.status();
    if status.is_success() {
        response.headers_mut().insert(
            CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=31536000, immutable"),
        );
    } else if status == StatusCode::NOT_FOUND {
        ErrorReport::from_message(
            "infra::http::public::uploads",
            StatusCode::NOT_FOUND,
            "The requested upload is not available",
        )
        .attach(&mut response);
    }
    response
}
