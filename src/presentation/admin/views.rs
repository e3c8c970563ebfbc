use askama::Template;

use crate::application::settings::TtsProbe;
use crate::domain::entities::{DEFAULT_SPEAKER, SpeechLanguage, TtsSettings};
use crate::presentation::views::{LayoutChrome, LayoutContext};

#[derive(Clone)]
pub struct SelectOptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Clone)]
pub struct ProbeView {
    pub health_ok: bool,
    pub health_text: String,
    pub languages: String,
    pub speakers_ok: bool,
    pub speakers_text: String,
}

impl ProbeView {
    pub fn from_probe(probe: &TtsProbe) -> Self {
        let (health_ok, health_text, languages) = match &probe.health {
            Ok(health) => (true, health.status.clone(), health.available_languages.join(", ")),
            Err(message) => (false, message.clone(), String::new()),
        };
        let (speakers_ok, speakers_text) = match &probe.speakers {
            Ok(speakers) if speakers.is_empty() => (true, "none".to_string()),
            Ok(speakers) => (true, speakers.join(", ")),
            Err(message) => (false, message.clone()),
        };

        Self {
            health_ok,
            health_text,
            languages,
            speakers_ok,
            speakers_text,
        }
    }
}

#[derive(Clone)]
pub struct SettingsView {
    pub endpoint: String,
    pub speaker: String,
    /// Hidden form token bound to the settings action.
    pub token: String,
    pub languages: Vec<SelectOptionView>,
    pub speakers: Vec<SelectOptionView>,
    pub notice: String,
    pub error: String,
    pub probe: Option<ProbeView>,
}

impl SettingsView {
    pub fn new(settings: &TtsSettings, token: String) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            speaker: settings.speaker.clone(),
            token,
            languages: language_options(&settings.language),
            speakers: speaker_options(&[], &settings.speaker),
            notice: String::new(),
            error: String::new(),
            probe: None,
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = notice.into();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self
    }

    pub fn with_probe(mut self, probe: &TtsProbe) -> Self {
        if let Ok(names) = &probe.speakers {
            self.speakers = speaker_options(names, &self.speaker);
        }
        self.probe = Some(ProbeView::from_probe(probe));
        self
    }
}

/// The fixed language list, plus the stored value when it is not one of them.
fn language_options(current: &str) -> Vec<SelectOptionView> {
    let mut options: Vec<SelectOptionView> = SpeechLanguage::ALL
        .iter()
        .map(|language| SelectOptionView {
            value: language.code().to_string(),
            label: format!("{} ({})", language.label(), language.code()),
            selected: language.code() == current,
        })
        .collect();

    if !current.is_empty() && !options.iter().any(|option| option.selected) {
        options.push(SelectOptionView {
            value: current.to_string(),
            label: current.to_string(),
            selected: true,
        });
    }

    options
}

/// Speakers reported by the server, or the default speaker when none are known. The stored
/// speaker is always present so saving the form never silently changes it.
fn speaker_options(reported: &[String], current: &str) -> Vec<SelectOptionView> {
    let mut names: Vec<&str> = reported.iter().map(String::as_str).collect();
    if names.is_empty() {
        names.push(DEFAULT_SPEAKER);
    }
    if !current.is_empty() && !names.contains(&current) {
        names.push(current);
    }

    names
        .into_iter()
        .map(|name| SelectOptionView {
            value: name.to_string(),
            label: name.to_string(),
            selected: name == current,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "admin/settings.html")]
pub struct SettingsTemplate {
    pub view: LayoutContext<SettingsView>,
}

impl SettingsTemplate {
    pub fn new(chrome: LayoutChrome, content: SettingsView) -> Self {
        Self {
            view: LayoutContext::new(chrome, "Text-to-speech settings", content),
        }
    }
}
