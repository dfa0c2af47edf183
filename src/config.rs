use std::time::Duration;

use clap::Args;

use crate::window::WindowSpan;

/// Where session state is kept when nothing else is configured.
pub const DEFAULT_DATA_FILE: &str = "video_player_data.json";

/// Timing and display settings for a playback session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Cadence of the subtitle panel refresh.
    pub subtitle_interval: Duration,
    /// Cadence of the position/slider refresh.
    pub position_interval: Duration,
    /// Cadence at which the engine is asked for the media length after opening.
    pub length_poll_interval: Duration,
    pub span: WindowSpan,
    /// How far before the next caption "jump to next" lands.
    pub jump_lead: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            subtitle_interval: Duration::from_millis(100),
            position_interval: Duration::from_millis(500),
            length_poll_interval: Duration::from_millis(100),
            span: WindowSpan::default(),
            jump_lead: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct WindowArgs {
    #[arg(
        long = "context-before",
        value_name = "N",
        default_value_t = 3,
        env = "DUALSUB_CONTEXT_BEFORE",
        help = "Number of captions shown before the active one."
    )]
    pub before: usize,
    #[arg(
        long = "context-after",
        value_name = "N",
        default_value_t = 2,
        env = "DUALSUB_CONTEXT_AFTER",
        help = "Number of captions shown after the active one."
    )]
    pub after: usize,
}

impl From<&WindowArgs> for WindowSpan {
    fn from(args: &WindowArgs) -> Self {
        WindowSpan {
            before: args.before,
            after: args.after,
        }
    }
}

impl PlayerConfig {
    pub fn with_span(mut self, span: WindowSpan) -> Self {
        self.span = span;
        self
    }
}
