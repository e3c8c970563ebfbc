//! `POST /ajax`: form-encoded synthesis requests answered with a `{success, data}` envelope.

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::application::{
    error::ErrorReport,
    synthesis::{GENERATE_TTS_ACTION, SynthesisError, SynthesisOutcome},
};

use super::public::HttpState;

const SOURCE: &str = "infra::http::ajax";
const GENERIC_FAILURE: &str = "audio could not be generated";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AjaxForm {
    action: String,
    post_id: String,
    nonce: String,
}

#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct AudioPayload {
    audio_url: String,
}

pub(super) async fn ajax(
    State(state): State<HttpState>,
    form: Result<Form<AjaxForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            return failure(StatusCode::BAD_REQUEST, "malformed request", &rejection);
        }
    };

    if form.action != GENERATE_TTS_ACTION {
        return failure_message(
            StatusCode::BAD_REQUEST,
            "unknown action",
            format!("unsupported action `{}`", form.action),
        );
    }

    if let Err(err) = state.synthesis.authorize(&form.nonce) {
        return synthesis_failure(&err);
    }

    // An id that is not a number names no post.
    let post_id = form.post_id.trim().parse::<i64>().unwrap_or(0);

    match state.synthesis.ensure_audio(post_id).await {
        Ok(outcome) => success(outcome),
        Err(err) => synthesis_failure(&err),
    }
}

fn success(outcome: SynthesisOutcome) -> Response {
    let envelope = Envelope {
        success: true,
        data: AudioPayload {
            audio_url: outcome.audio_url,
        },
    };
    (StatusCode::OK, Json(envelope)).into_response()
}

fn synthesis_failure(err: &SynthesisError) -> Response {
    match err {
        SynthesisError::Auth(inner) => failure(StatusCode::FORBIDDEN, &inner.to_string(), err),
        SynthesisError::PostNotFound { .. } => {
            failure(StatusCode::NOT_FOUND, "post not found", err)
        }
        SynthesisError::Transport(_) => failure(StatusCode::BAD_GATEWAY, &err.to_string(), err),
        SynthesisError::Text(_)
        | SynthesisError::Storage(_)
        | SynthesisError::Settings(_)
        | SynthesisError::Repo(_) => failure(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE, err),
    }
}

fn failure(status: StatusCode, message: &str, error: &dyn std::error::Error) -> Response {
    let mut response = envelope_error(status, message);
    ErrorReport::from_error(SOURCE, status, error).attach(&mut response);
    response
}

fn failure_message(status: StatusCode, message: &str, detail: String) -> Response {
    let mut response = envelope_error(status, message);
    ErrorReport::from_message(SOURCE, status, detail).attach(&mut response);
    response
}

fn envelope_error(status: StatusCode, message: &str) -> Response {
    let envelope = Envelope {
        success: false,
        data: message,
    };
    (status, Json(envelope)).into_response()
}
