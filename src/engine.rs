//! The playback capabilities the session controller relies on.
//!
//! A real front end implements [`PlaybackEngine`] over a native media
//! library. [`ClockEngine`] is a stand-in that plays nothing and only keeps
//! time, which is enough to drive the subtitle panels headlessly.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        EngineError(msg.into())
    }
}

/// An audio or subtitle stream as the engine enumerates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    pub id: i32,
    pub name: String,
}

pub trait PlaybackEngine {
    fn load(&mut self, media: &Path) -> Result<(), EngineError>;
    fn play(&mut self) -> Result<(), EngineError>;
    fn pause(&mut self) -> Result<(), EngineError>;
    fn stop(&mut self) -> Result<(), EngineError>;
    fn is_playing(&self) -> bool;
    fn seek(&mut self, position: Duration) -> Result<(), EngineError>;
    /// `None` until media is loaded.
    fn position(&self) -> Option<Duration>;
    /// `None` while the engine has not yet worked out the media length.
    fn duration(&self) -> Option<Duration>;
    /// Volume in percent, `0..=100`.
    fn set_volume(&mut self, volume: u8) -> Result<(), EngineError>;
    fn audio_tracks(&self) -> Vec<TrackDescriptor>;
    fn select_audio_track(&mut self, id: i32) -> Result<(), EngineError>;
    fn subtitle_tracks(&self) -> Vec<TrackDescriptor>;
    /// `None` disables the engine's own subtitle rendering.
    fn select_subtitle_track(&mut self, id: Option<i32>) -> Result<(), EngineError>;
}

/// Wall-clock engine with a fixed media length.
#[derive(Debug)]
pub struct ClockEngine {
    length: Duration,
    audio: Vec<TrackDescriptor>,
    subtitles: Vec<TrackDescriptor>,
    media: Option<PathBuf>,
    offset: Duration,
    resumed_at: Option<Instant>,
    volume: u8,
    audio_track: Option<i32>,
    subtitle_track: Option<i32>,
}

impl ClockEngine {
    pub fn new(
        length: Duration,
        audio: Vec<TrackDescriptor>,
        subtitles: Vec<TrackDescriptor>,
    ) -> Self {
        Self {
            length,
            audio,
            subtitles,
            media: None,
            offset: Duration::ZERO,
            resumed_at: None,
            volume: 100,
            audio_track: None,
            subtitle_track: None,
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn selected_audio_track(&self) -> Option<i32> {
        self.audio_track
    }

    pub fn selected_subtitle_track(&self) -> Option<i32> {
        self.subtitle_track
    }

    fn elapsed(&self) -> Duration {
        let running = self.resumed_at.map_or(Duration::ZERO, |t| t.elapsed());
        (self.offset + running).min(self.length)
    }

    fn require_media(&self) -> Result<(), EngineError> {
        match self.media {
            Some(_) => Ok(()),
            None => Err(EngineError::new("no media loaded")),
        }
    }
}

impl PlaybackEngine for ClockEngine {
    fn load(&mut self, media: &Path) -> Result<(), EngineError> {
        if !media.is_file() {
            return Err(EngineError::new(format!(
                "cannot open media '{}'",
                media.display()
            )));
        }
        self.media = Some(media.to_path_buf());
        self.offset = Duration::ZERO;
        self.resumed_at = None;
        debug!("Loaded '{}' ({:?})", media.display(), self.length);
        Ok(())
    }

    fn play(&mut self) -> Result<(), EngineError> {
        self.require_media()?;
        if self.resumed_at.is_none() {
            self.resumed_at = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.require_media()?;
        self.offset = self.elapsed();
        self.resumed_at = None;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.resumed_at = None;
        self.offset = Duration::ZERO;
        self.media = None;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.resumed_at.is_some() && self.elapsed() < self.length
    }

    fn seek(&mut self, position: Duration) -> Result<(), EngineError> {
        self.require_media()?;
        self.offset = position.min(self.length);
        if self.resumed_at.is_some() {
            self.resumed_at = Some(Instant::now());
        }
        Ok(())
    }

    fn position(&self) -> Option<Duration> {
        self.media.as_ref().map(|_| self.elapsed())
    }

    fn duration(&self) -> Option<Duration> {
        self.media
            .as_ref()
            .map(|_| self.length)
            .filter(|l| !l.is_zero())
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), EngineError> {
        self.volume = volume.min(100);
        Ok(())
    }

    fn audio_tracks(&self) -> Vec<TrackDescriptor> {
        self.audio.clone()
    }

    fn select_audio_track(&mut self, id: i32) -> Result<(), EngineError> {
        if !self.audio.iter().any(|t| t.id == id) {
            return Err(EngineError::new(format!("no audio track {}", id)));
        }
        self.audio_track = Some(id);
        Ok(())
    }

    fn subtitle_tracks(&self) -> Vec<TrackDescriptor> {
        self.subtitles.clone()
    }

    fn select_subtitle_track(&mut self, id: Option<i32>) -> Result<(), EngineError> {
        if let Some(id) = id {
            if !self.subtitles.iter().any(|t| t.id == id) {
                return Err(EngineError::new(format!("no subtitle track {}", id)));
            }
        }
        self.subtitle_track = id;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_media() -> (ClockEngine, tempfile::NamedTempFile) {
        let media = tempfile::NamedTempFile::new().unwrap();
        let mut engine = ClockEngine::new(
            Duration::from_secs(60),
            vec![TrackDescriptor { id: 1, name: "English".into() }],
            vec![TrackDescriptor { id: 3, name: "French".into() }],
        );
        engine.load(media.path()).unwrap();
        (engine, media)
    }

    #[test]
    fn load_rejects_missing_media() {
        let mut engine = ClockEngine::new(Duration::from_secs(1), vec![], vec![]);
        assert!(engine.load(Path::new("/definitely/not/here.mkv")).is_err());
        assert_eq!(engine.position(), None);
        assert!(engine.play().is_err());
    }

    #[test]
    fn paused_position_follows_seeks() {
        let (mut engine, _media) = engine_with_media();
        assert_eq!(engine.position(), Some(Duration::ZERO));
        assert!(!engine.is_playing());

        engine.seek(Duration::from_secs_f64(42.5)).unwrap();
        assert_eq!(engine.position(), Some(Duration::from_secs_f64(42.5)));

        engine.seek(Duration::from_secs(600)).unwrap();
        assert_eq!(engine.position(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn play_then_pause_keeps_position_monotonic() {
        let (mut engine, _media) = engine_with_media();
        engine.seek(Duration::from_secs(10)).unwrap();
        engine.play().unwrap();
        assert!(engine.is_playing());
        engine.pause().unwrap();
        assert!(!engine.is_playing());
        assert!(engine.position().unwrap() >= Duration::from_secs(10));
    }

    #[test]
    fn track_selection_is_validated() {
        let (mut engine, _media) = engine_with_media();
        assert!(engine.select_audio_track(1).is_ok());
        assert!(engine.select_audio_track(9).is_err());
        assert!(engine.select_subtitle_track(Some(3)).is_ok());
        assert!(engine.select_subtitle_track(None).is_ok());
        assert_eq!(engine.selected_subtitle_track(), None);
        assert_eq!(engine.selected_audio_track(), Some(1));
    }

    #[test]
    fn zero_length_reports_no_duration() {
        let media = tempfile::NamedTempFile::new().unwrap();
        let mut engine = ClockEngine::new(Duration::ZERO, vec![], vec![]);
        engine.load(media.path()).unwrap();
        assert_eq!(engine.duration(), None);
    }
}
