//! Dual-subtitle playback support and subtitle stream extraction.
//!
//! The playback side parses SRT files ([`parser`]), picks the caption on
//! display with some context around it ([`window`]), and keeps per-media
//! playback state across runs ([`session`], [`controller`]). The media engine
//! itself is abstracted behind [`engine::PlaybackEngine`].
//!
//! The extraction side ([`extract`]) drives `ffprobe` and `ffmpeg` to write
//! each subtitle stream of a container to its own `.srt` file.

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod extract;
pub mod parser;
pub mod scheduler;
pub mod session;
pub mod srt;
pub mod timefmt;
pub mod window;

pub use crate::controller::SessionController;
pub use crate::error::DualsubError;
pub use crate::parser::Parser;
pub use crate::srt::{SubtitleEntry, SubtitleTrack};
