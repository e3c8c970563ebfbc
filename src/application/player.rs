//! Listen-button state machine shared by the rendered widget and the browser script.
//!
//! The server renders the initial labels from [`PlaybackLabel`] and hands every label to
//! the script through `data-*` attributes, so `static/public/player.js` and this module
//! describe the same transitions.

/// Button caption shown by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackLabel {
    Listen,
    Pause,
    Play,
    Replay,
}

impl PlaybackLabel {
    pub fn text(self) -> &'static str {
        match self {
            PlaybackLabel::Listen => "Listen to this post",
            PlaybackLabel::Pause => "Pause",
            PlaybackLabel::Play => "Play",
            PlaybackLabel::Replay => "Listen again",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            PlaybackLabel::Pause => "⏸",
            PlaybackLabel::Listen | PlaybackLabel::Play | PlaybackLabel::Replay => "▶",
        }
    }
}

pub const LOADING_TEXT: &str = "Generating audio...";
pub const FAILURE_PREFIX: &str = "Audio generation failed: ";
pub const SERVER_ERROR_TEXT: &str = "A server error occurred.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Loading,
    Ready { paused: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Click,
    SynthesisSucceeded { audio_url: String },
    /// `message` is `None` when the server reply carried no readable envelope.
    SynthesisFailed { message: Option<String> },
    AudioPlayed,
    AudioPaused,
    AudioEnded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEffect {
    RequestSynthesis,
    StartPlayback { audio_url: String },
    Play,
    Pause,
    Alert(String),
}

#[derive(Debug, Clone)]
pub struct PlayerWidget {
    state: PlayerState,
    generated: bool,
    audio_url: Option<String>,
    label: PlaybackLabel,
    button_enabled: bool,
    loading_visible: bool,
    player_visible: bool,
}

impl Default for PlayerWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerWidget {
    pub fn new() -> Self {
        Self {
            state: PlayerState::Idle,
            generated: false,
            audio_url: None,
            label: PlaybackLabel::Listen,
            button_enabled: true,
            loading_visible: false,
            player_visible: false,
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn label(&self) -> PlaybackLabel {
        self.label
    }

    pub fn button_enabled(&self) -> bool {
        self.button_enabled
    }

    pub fn loading_visible(&self) -> bool {
        self.loading_visible
    }

    pub fn player_visible(&self) -> bool {
        self.player_visible
    }

    pub fn audio_url(&self) -> Option<&str> {
        self.audio_url.as_deref()
    }

    pub fn handle(&mut self, event: PlayerEvent) -> Vec<PlayerEffect> {
        match (self.state.clone(), event) {
            (PlayerState::Idle, PlayerEvent::Click) if !self.generated => {
                self.state = PlayerState::Loading;
                self.button_enabled = false;
                self.player_visible = true;
                self.loading_visible = true;
                vec![PlayerEffect::RequestSynthesis]
            }
            (PlayerState::Loading, PlayerEvent::SynthesisSucceeded { audio_url }) => {
                self.generated = true;
                self.audio_url = Some(audio_url.clone());
                self.state = PlayerState::Ready { paused: false };
                self.loading_visible = false;
                self.button_enabled = true;
                self.label = PlaybackLabel::Pause;
                vec![PlayerEffect::StartPlayback { audio_url }]
            }
            (PlayerState::Loading, PlayerEvent::SynthesisFailed { message }) => {
                self.state = PlayerState::Idle;
                self.loading_visible = false;
                self.button_enabled = true;
                let alert = match message {
                    Some(message) => format!("{FAILURE_PREFIX}{message}"),
                    None => SERVER_ERROR_TEXT.to_string(),
                };
                vec![PlayerEffect::Alert(alert)]
            }
            (PlayerState::Ready { paused }, PlayerEvent::Click) => {
                if paused {
                    self.state = PlayerState::Ready { paused: false };
                    self.label = PlaybackLabel::Pause;
                    vec![PlayerEffect::Play]
                } else {
                    self.state = PlayerState::Ready { paused: true };
                    self.label = PlaybackLabel::Play;
                    vec![PlayerEffect::Pause]
                }
            }
            (PlayerState::Ready { .. }, PlayerEvent::AudioPlayed) => {
                self.state = PlayerState::Ready { paused: false };
                self.label = PlaybackLabel::Pause;
                Vec::new()
            }
            (PlayerState::Ready { .. }, PlayerEvent::AudioPaused) => {
                self.state = PlayerState::Ready { paused: true };
                self.label = PlaybackLabel::Play;
                Vec::new()
            }
            (PlayerState::Ready { .. }, PlayerEvent::AudioEnded) => {
                self.state = PlayerState::Ready { paused: true };
                self.label = PlaybackLabel::Replay;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}
