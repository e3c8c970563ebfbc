use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        nonce::{NonceService, SETTINGS_NONCE_ACTION},
        reader::ReaderService,
        settings::{SettingsError, TtsSettingsService, UpdateTtsSettingsCommand, probe_server},
        tts::TtsClient,
    },
    domain::entities::TtsSettings,
    presentation::{
        admin::views::{SettingsTemplate, SettingsView},
        views::{LayoutChrome, render_template_response},
    },
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
};

const SAVED_NOTICE: &str = "Settings saved.";

#[derive(Clone)]
pub struct AdminState {
    pub settings: TtsSettingsService,
    pub tts: Arc<dyn TtsClient>,
    pub reader: Arc<ReaderService>,
    pub nonces: NonceService,
    pub chrome: LayoutChrome,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/", get(admin_root))
        .route("/settings", get(settings_page).post(save_settings))
        .route(
            "/static/public/{*path}",
            get(crate::infra::assets::serve_public),
        )
        .route("/_health/db", get(admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsQuery {
    saved: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsForm {
    #[serde(rename = "_token")]
    token: String,
    endpoint: String,
    language: String,
    speaker: String,
}

async fn admin_root() -> Redirect {
    Redirect::to("/settings")
}

async fn settings_page(
    State(state): State<AdminState>,
    Query(query): Query<SettingsQuery>,
) -> Response {
    let settings = match state.settings.load().await {
        Ok(settings) => settings,
        Err(err) => return settings_error_to_http(err).into_response(),
    };

    let probe = probe_server(state.tts.as_ref(), &settings).await;
    let token = state.nonces.issue(SETTINGS_NONCE_ACTION);
    let mut view = SettingsView::new(&settings, token).with_probe(&probe);
    if query.saved.is_some() {
        view = view.with_notice(SAVED_NOTICE);
    }

    render_template_response(
        SettingsTemplate::new(state.chrome.clone(), view),
        StatusCode::OK,
    )
}

async fn save_settings(State(state): State<AdminState>, Form(form): Form<SettingsForm>) -> Response {
    if let Err(err) = state.nonces.verify(SETTINGS_NONCE_ACTION, &form.token) {
        return HttpError::from_error(
            "infra::http::admin::save_settings",
            StatusCode::FORBIDDEN,
            "The settings form has expired, reload the page and try again",
            &err,
        )
        .into_response();
    }

    let command = UpdateTtsSettingsCommand {
        endpoint: form.endpoint.clone(),
        language: form.language.clone(),
        speaker: form.speaker.clone(),
    };

    match state.settings.update(command).await {
        Ok(saved) => {
            info!(
                target = "melo::admin::settings",
                endpoint = %saved.endpoint,
                language = %saved.language,
                speaker = %saved.speaker,
                "TTS settings updated"
            );
            Redirect::to("/settings?saved=1").into_response()
        }
        Err(SettingsError::ConstraintViolation(field)) => {
            let submitted = TtsSettings {
                endpoint: form.endpoint,
                language: form.language,
                speaker: form.speaker,
            };
            let token = state.nonces.issue(SETTINGS_NONCE_ACTION);
            let view = SettingsView::new(&submitted, token)
                .with_error(format!("The {field} field must not be empty."));
            let mut response = render_template_response(
                SettingsTemplate::new(state.chrome.clone(), view),
                StatusCode::BAD_REQUEST,
            );
            ErrorReport::from_message(
                "infra::http::admin::save_settings",
                StatusCode::BAD_REQUEST,
                format!("`{field}` must not be empty"),
            )
            .attach(&mut response);
            response
        }
        Err(err) => settings_error_to_http(err).into_response(),
    }
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(
        "infra::http::admin::admin_health",
        state.reader.health_check().await,
    )
}

fn settings_error_to_http(err: SettingsError) -> HttpError {
    match err {
        SettingsError::Repo(repo) => repo.into(),
        SettingsError::ConstraintViolation(field) => HttpError::new(
            "infra::http::admin::settings",
            StatusCode::BAD_REQUEST,
            "Invalid settings",
            format!("`{field}` must not be empty"),
        ),
    }
}
