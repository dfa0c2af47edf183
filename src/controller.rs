//! Sequencing of a playback session around a [`PlaybackEngine`].
//!
//! The controller owns everything that outlives a single refresh tick: the
//! session store, both subtitle panels, the chosen audio and subtitle tracks
//! and the operator notices raised along the way. It never blocks; the
//! caller drives it from a [`Scheduler`] using [`Tick`]s.

use std::mem;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::PlayerConfig;
use crate::engine::{PlaybackEngine, TrackDescriptor};
use crate::error::{DualsubError, Result};
use crate::parser;
use crate::scheduler::Scheduler;
use crate::session::{self, SessionRecord, SessionStore};
use crate::timefmt;
use crate::window::{next_entry, Panel, PanelUpdate, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Media is loaded but the engine has not reported its length yet.
    AwaitingLength,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Subtitles,
    Position,
    LengthPoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Something the operator should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtitleRefresh {
    pub left: PanelUpdate,
    pub right: PanelUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionStatus {
    pub position: Duration,
    pub length: Option<Duration>,
    /// Slider position in thousandths of the media length.
    pub slider: u16,
    pub label: String,
}

pub struct SessionController<E> {
    engine: E,
    store: SessionStore,
    config: PlayerConfig,
    phase: Phase,
    media: Option<PathBuf>,
    length: Option<Duration>,
    left: Panel,
    right: Panel,
    left_path: Option<PathBuf>,
    right_path: Option<PathBuf>,
    audio_track: Option<i32>,
    subtitle_track: Option<i32>,
    notices: Vec<Notice>,
}

impl<E: PlaybackEngine> SessionController<E> {
    pub fn new(engine: E, store: SessionStore, config: PlayerConfig) -> Self {
        let span = config.span;
        Self {
            engine,
            store,
            config,
            phase: Phase::Idle,
            media: None,
            length: None,
            left: Panel::new(span),
            right: Panel::new(span),
            left_path: None,
            right_path: None,
            audio_track: None,
            subtitle_track: None,
            notices: Vec::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn media(&self) -> Option<&Path> {
        self.media.as_deref()
    }

    pub fn length(&self) -> Option<Duration> {
        self.length
    }

    pub fn panel(&self, side: Side) -> &Panel {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn subtitle_path(&self, side: Side) -> Option<&Path> {
        match side {
            Side::Left => self.left_path.as_deref(),
            Side::Right => self.right_path.as_deref(),
        }
    }

    pub fn audio_track(&self) -> Option<i32> {
        self.audio_track
    }

    pub fn subtitle_track(&self) -> Option<i32> {
        self.subtitle_track
    }

    /// Timers for the steady-state refresh and the initial length poll.
    pub fn schedule(&self, start: Instant) -> Scheduler<Tick> {
        let mut sched = Scheduler::new();
        sched.every(self.config.subtitle_interval, Tick::Subtitles, start);
        sched.every(self.config.position_interval, Tick::Position, start);
        if self.phase == Phase::AwaitingLength {
            sched.every(self.config.length_poll_interval, Tick::LengthPoll, start);
        }
        sched
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        mem::take(&mut self.notices)
    }

    fn notify(&mut self, level: NoticeLevel, message: String) {
        match level {
            NoticeLevel::Info => info!("{}", message),
            NoticeLevel::Warning => warn!("{}", message),
            NoticeLevel::Error => error!("{}", message),
        }
        self.notices.push(Notice { level, message });
    }

    /// Loads `media` into the engine and starts playback.
    ///
    /// Persisted state is applied once the engine knows the media length; see
    /// [`SessionController::poll_length`]. Failing to load is fatal for the
    /// session and returned as an error, leaving any open session untouched.
    pub fn open(&mut self, media: &Path) -> Result<()> {
        let media = session::absolute_path(media)?;

        self.engine.load(&media)?;

        self.left.clear();
        self.right.clear();
        self.left_path = None;
        self.right_path = None;
        self.audio_track = None;
        self.subtitle_track = None;
        self.length = None;
        self.media = Some(media.clone());
        self.phase = Phase::Idle;

        self.engine.play()?;
        info!("Playing video: {}", media.display());

        self.phase = Phase::AwaitingLength;
        self.poll_length();
        Ok(())
    }

    /// Asks the engine for the media length; once known, restores the
    /// persisted session. Returns `true` on the call that completes loading.
    pub fn poll_length(&mut self) -> bool {
        if self.phase != Phase::AwaitingLength {
            return false;
        }
        match self.engine.duration() {
            Some(length) if !length.is_zero() => {
                info!("Video length: {:.3} seconds", length.as_secs_f64());
                self.length = Some(length);
                self.phase = Phase::Ready;
                self.resume();
                true
            }
            _ => {
                debug!("Video length not available yet");
                false
            }
        }
    }

    fn resume(&mut self) {
        let record = match self.media.as_deref().and_then(|m| self.store.get(m)) {
            Some(record) => record.clone(),
            None => {
                debug!("No persisted session for this video");
                return;
            }
        };

        self.audio_track = record.audio_track;
        self.subtitle_track = record.subtitle_track;

        for (side, path) in [
            (Side::Left, record.left_subtitle),
            (Side::Right, record.right_subtitle),
        ] {
            let path = match path {
                Some(path) => path,
                None => continue,
            };
            if !path.is_file() {
                self.notify(
                    NoticeLevel::Warning,
                    format!(
                        "{} subtitle file not found: {}",
                        capitalise(side.label()),
                        path.display()
                    ),
                );
                continue;
            }
            if let Err(err) = self.load_subtitles(side, &path) {
                self.notify(
                    NoticeLevel::Error,
                    format!("Failed to load {} subtitles: {}", side.label(), err),
                );
            }
        }

        if !record.position.is_zero() {
            match self.engine.seek(record.position) {
                Ok(()) => info!(
                    "Resumed playback from {} seconds",
                    record.position.as_secs_f64()
                ),
                Err(err) => self.notify(
                    NoticeLevel::Error,
                    format!("Failed to seek to the last playback time: {}", err),
                ),
            }
        }

        self.restore_tracks();
    }

    fn restore_tracks(&mut self) {
        if let Some(id) = self.audio_track {
            match self.engine.select_audio_track(id) {
                Ok(()) => info!("Restored audio track: {}", id),
                Err(err) => self.notify(
                    NoticeLevel::Error,
                    format!("Failed to restore audio track {}: {}", id, err),
                ),
            }
        }
        if let Some(id) = self.subtitle_track {
            match self.engine.select_subtitle_track(Some(id)) {
                Ok(()) => info!("Restored subtitle track: {}", id),
                Err(err) => self.notify(
                    NoticeLevel::Error,
                    format!("Failed to restore subtitle track {}: {}", id, err),
                ),
            }
        }
    }

    /// Saves the session for the open media, then stops the engine.
    ///
    /// The whole store is rewritten. A write failure raises an error notice
    /// and is also returned; the engine is stopped either way.
    pub fn close(&mut self) -> Result<()> {
        let media = match self.media.take() {
            Some(media) => media,
            None => {
                warn!("No media is currently loaded.");
                return Ok(());
            }
        };

        let position = self.engine.position().unwrap_or(Duration::ZERO);
        let record = SessionRecord {
            left_subtitle: self.left_path.clone(),
            right_subtitle: self.right_path.clone(),
            position,
            audio_track: self.audio_track,
            subtitle_track: self.subtitle_track,
        };
        self.store.upsert(&media, record);
        let saved = self.store.save();
        match &saved {
            Ok(()) => info!(
                "Persisted state for {} saved at {} seconds",
                media.display(),
                position.as_secs_f64()
            ),
            Err(err) => self.notify(
                NoticeLevel::Error,
                format!("Error saving persisted data: {}", err),
            ),
        }

        match self.engine.stop() {
            Ok(()) => info!("Video player stopped."),
            Err(err) => self.notify(
                NoticeLevel::Error,
                format!("Failed to stop playback: {}", err),
            ),
        }
        self.phase = Phase::Idle;
        self.length = None;
        saved
    }

    /// Parses `path` into the panel on `side` and remembers it for the session.
    pub fn load_subtitles(&mut self, side: Side, path: &Path) -> Result<usize> {
        let path = session::absolute_path(path)?;
        if !path.is_file() {
            return Err(DualsubError::SubtitleMissing(path));
        }
        let track = parser::load_track(&path)?;
        let count = track.len();

        let (panel, slot) = match side {
            Side::Left => (&mut self.left, &mut self.left_path),
            Side::Right => (&mut self.right, &mut self.right_path),
        };
        panel.set_track(track);
        info!(
            "Loaded {} subtitle(s) for {} section: {}",
            count,
            side.label(),
            path.display()
        );
        *slot = Some(path);

        self.refresh_subtitles();
        Ok(count)
    }

    /// The fast tick: recomputes both panels for the current position.
    ///
    /// Does nothing unless the engine is playing.
    pub fn refresh_subtitles(&mut self) -> Option<SubtitleRefresh> {
        if !self.engine.is_playing() {
            return None;
        }
        let t = self.engine.position()?;
        Some(SubtitleRefresh {
            left: self.left.refresh(t),
            right: self.right.refresh(t),
        })
    }

    /// The slow tick: position, slider and time label.
    pub fn refresh_position(&self) -> Option<PositionStatus> {
        if !self.engine.is_playing() {
            return None;
        }
        let position = self.engine.position()?;
        let slider = match self.length {
            Some(length) if !length.is_zero() => {
                ((position.as_secs_f64() / length.as_secs_f64()) * 1000.0)
                    .round()
                    .clamp(0.0, 1000.0) as u16
            }
            _ => 0,
        };
        Some(PositionStatus {
            position,
            length: self.length,
            slider,
            label: timefmt::position_label(position, self.length),
        })
    }

    /// Returns `true` when playback is running afterwards.
    pub fn toggle_play_pause(&mut self) -> Result<bool> {
        if self.engine.is_playing() {
            self.engine.pause()?;
            info!("Playback paused.");
            Ok(false)
        } else {
            self.engine.play()?;
            info!("Playback started.");
            Ok(true)
        }
    }

    /// Seeks by `offset` seconds from the current position, never before 0.
    pub fn seek_relative(&mut self, offset: f64) -> Result<Duration> {
        let current = self.engine.position().ok_or(DualsubError::NoMedia)?;
        let delta = Duration::try_from_secs_f64(offset.abs()).unwrap_or(Duration::ZERO);
        let target = if offset >= 0.0 {
            current + delta
        } else {
            current.saturating_sub(delta)
        };
        self.engine.seek(target)?;
        info!(
            "Seeked {} by {} seconds",
            if offset > 0.0 { "forward" } else { "backward" },
            offset.abs()
        );
        Ok(target)
    }

    pub fn rewind(&mut self, seconds: f64) -> Result<Duration> {
        self.seek_relative(-seconds.abs())
    }

    /// Slider seek. Only applied while playing and once the length is known;
    /// returns whether a seek was issued.
    pub fn seek_fraction(&mut self, per_mille: u16) -> Result<bool> {
        let length = match self.length {
            Some(length) if self.engine.is_playing() => length,
            _ => return Ok(false),
        };
        let target = length.mul_f64(f64::from(per_mille.min(1000)) / 1000.0);
        self.engine.seek(target)?;
        debug!("Seeking to: {:?}", target);
        Ok(true)
    }

    pub fn set_volume(&mut self, volume: u8) -> Result<()> {
        let volume = volume.min(100);
        self.engine.set_volume(volume)?;
        info!("Volume set to: {}", volume);
        Ok(())
    }

    /// Seeks to just before the next caption of the left panel.
    ///
    /// Returns the start of the caption jumped to, or `None` when there is
    /// nothing further to jump to.
    pub fn jump_to_next(&mut self) -> Result<Option<Duration>> {
        if self.left.track().is_empty() {
            info!("No left subtitles loaded to jump to");
            return Ok(None);
        }
        let t = self.engine.position().ok_or(DualsubError::NoMedia)?;
        let start = match next_entry(self.left.track(), t) {
            Some(entry) => entry.start,
            None => {
                info!("No next subtitle found");
                return Ok(None);
            }
        };
        self.engine.seek(start.saturating_sub(self.config.jump_lead))?;
        info!("Jumped to next subtitle at {} seconds", start.as_secs_f64());
        Ok(Some(start))
    }

    pub fn audio_tracks(&self) -> Vec<TrackDescriptor> {
        self.engine.audio_tracks()
    }

    pub fn subtitle_tracks(&self) -> Vec<TrackDescriptor> {
        self.engine.subtitle_tracks()
    }

    pub fn select_audio_track(&mut self, id: i32) -> Result<()> {
        self.engine.select_audio_track(id)?;
        self.audio_track = Some(id);
        info!("Audio track set to: {}", id);
        Ok(())
    }

    /// `None` disables the engine's embedded subtitles.
    pub fn select_subtitle_track(&mut self, id: Option<i32>) -> Result<()> {
        self.engine.select_subtitle_track(id)?;
        self.subtitle_track = id;
        match id {
            Some(id) => info!("Subtitle track set to: {}", id),
            None => info!("Subtitles disabled."),
        }
        Ok(())
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
