use crate::application::error::{ErrorReport, HttpError};
use crate::application::player::{
    FAILURE_PREFIX, LOADING_TEXT, PlaybackLabel, SERVER_ERROR_TEXT,
};
use crate::application::synthesis::GENERATE_TTS_ACTION;
use crate::domain::entities::{PostRecord, PostSummaryRecord};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");

/// Path of the synthesis endpoint on the public listener.
pub const AJAX_PATH: &str = "/ajax";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, "Not found", ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

pub fn format_human_date(value: OffsetDateTime) -> String {
    value.format(HUMAN_DATE_FORMAT).unwrap_or_default()
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub site_title: String,
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub site_title: String,
    pub page_title: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, page_title: impl Into<String>, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            page_title: page_title.into(),
            content,
        }
    }
}

#[derive(Clone)]
pub struct PostListItem {
    pub href: String,
    pub title: String,
    pub published: String,
}

impl From<&PostSummaryRecord> for PostListItem {
    fn from(record: &PostSummaryRecord) -> Self {
        Self {
            href: format!("/posts/{}", record.id),
            title: record.title.clone(),
            published: format_human_date(record.created_at),
        }
    }
}

pub struct IndexView {
    pub posts: Vec<PostListItem>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexView>,
}

/// Everything the listen button needs in the browser, rendered as `data-*` attributes.
#[derive(Clone)]
pub struct PlayerWidgetView {
    pub ajax_url: String,
    pub action: &'static str,
    pub post_id: i64,
    pub nonce: String,
    pub label_listen: &'static str,
    pub label_pause: &'static str,
    pub label_play: &'static str,
    pub label_replay: &'static str,
    pub icon_play: &'static str,
    pub icon_pause: &'static str,
    pub loading_text: &'static str,
    pub failure_prefix: &'static str,
    pub server_error_text: &'static str,
}

impl PlayerWidgetView {
    pub fn new(post_id: i64, nonce: String) -> Self {
        Self {
            ajax_url: AJAX_PATH.to_string(),
            action: GENERATE_TTS_ACTION,
            post_id,
            nonce,
            label_listen: PlaybackLabel::Listen.text(),
            label_pause: PlaybackLabel::Pause.text(),
            label_play: PlaybackLabel::Play.text(),
            label_replay: PlaybackLabel::Replay.text(),
            icon_play: PlaybackLabel::Play.icon(),
            icon_pause: PlaybackLabel::Pause.icon(),
            loading_text: LOADING_TEXT,
            failure_prefix: FAILURE_PREFIX,
            server_error_text: SERVER_ERROR_TEXT,
        }
    }
}

pub struct PostView {
    pub title: String,
    pub published: String,
    pub body_html: String,
    pub player: PlayerWidgetView,
}

impl PostView {
    pub fn new(post: PostRecord, nonce: String) -> Self {
        Self {
            player: PlayerWidgetView::new(post.id, nonce),
            published: format_human_date(post.created_at),
            title: post.title,
            body_html: post.body,
        }
    }
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostView>,
}

pub struct ErrorPageView {
    pub status: u16,
    pub heading: &'static str,
    pub message: &'static str,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            status: 404,
            heading: "Page not found",
            message: "The page you requested does not exist.",
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
