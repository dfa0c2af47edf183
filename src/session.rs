//! Per-media playback state, kept in one JSON file.
//!
//! The file is a map from absolute media path to [`SessionRecord`]. It is read
//! once when the store is opened and rewritten in full by [`SessionStore::save`].
//! Records are never evicted.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::error::{DualsubError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub left_subtitle: Option<PathBuf>,
    #[serde(default)]
    pub right_subtitle: Option<PathBuf>,
    #[serde(rename = "last_playback_time", with = "seconds", default)]
    pub position: Duration,
    #[serde(with = "track_id", default)]
    pub audio_track: Option<i32>,
    #[serde(with = "track_id", default)]
    pub subtitle_track: Option<i32>,
}

/// Positions are stored as fractional seconds.
mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
    }
}

/// Track ids are stored as integers with `-1` meaning "none".
mod track_id {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<i32>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i32(value.unwrap_or(-1))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
        let raw = Option::<i32>::deserialize(d)?;
        Ok(raw.filter(|id| *id >= 0))
    }
}

#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    records: BTreeMap<String, SessionRecord>,
}

impl SessionStore {
    /// Opens the store at `path`.
    ///
    /// A missing file is a first run and gives an empty store. An unreadable
    /// or corrupt file is logged and also gives an empty store.
    pub fn load<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(records) => {
                    info!("Persisted data loaded from '{}'", path.display());
                    records
                }
                Err(err) => {
                    error!("Error decoding persisted data '{}': {}", path.display(), err);
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No persisted data at '{}'", path.display());
                BTreeMap::new()
            }
            Err(err) => {
                error!("Error loading persisted data '{}': {}", path.display(), err);
                BTreeMap::new()
            }
        };
        Self { path, records }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, media: &Path) -> Option<&SessionRecord> {
        self.records.get(&key(media))
    }

    pub fn upsert(&mut self, media: &Path, record: SessionRecord) {
        self.records.insert(key(media), record);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SessionRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Rewrites the whole file.
    pub fn save(&self) -> Result<()> {
        let data = encode(&self.records)?;
        let tmp = self.path.with_extension("tmp");
        let write_err = |source: io::Error| DualsubError::SessionWrite {
            path: self.path.clone(),
            source,
        };
        fs::write(&tmp, data).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        info!("Persisted data saved to '{}'", self.path.display());
        Ok(())
    }
}

/// Absolute form of `path` used to key records. `.` and `..` are resolved
/// lexically, so the file need not exist and symlinks are not followed.
pub fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in std::path::absolute(path)?.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn key(media: &Path) -> String {
    media.to_string_lossy().into_owned()
}

fn encode(records: &BTreeMap<String, SessionRecord>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    records
        .serialize(&mut ser)
        .map_err(DualsubError::SessionEncode)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_existing_data_file_format() {
        let data = r#"{
            "/media/x.mp4": {
                "left_subtitle": "/subs/x.en.srt",
                "right_subtitle": null,
                "last_playback_time": 42.5,
                "audio_track": 2,
                "subtitle_track": -1
            }
        }"#;
        let records: BTreeMap<String, SessionRecord> = serde_json::from_str(data).unwrap();
        let record = &records["/media/x.mp4"];

        assert_eq!(record.left_subtitle.as_deref(), Some(Path::new("/subs/x.en.srt")));
        assert_eq!(record.right_subtitle, None);
        assert_eq!(record.position, Duration::from_secs_f64(42.5));
        assert_eq!(record.audio_track, Some(2));
        assert_eq!(record.subtitle_track, None);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let record: SessionRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record, SessionRecord::default());

        let record: SessionRecord =
            serde_json::from_str(r#"{"last_playback_time": -3.0, "audio_track": null}"#).unwrap();
        assert_eq!(record.position, Duration::ZERO);
        assert_eq!(record.audio_track, None);
    }

    #[test]
    fn writes_sentinels_for_unset_tracks() {
        let mut records = BTreeMap::new();
        records.insert("/m.mkv".to_string(), SessionRecord::default());
        let text = String::from_utf8(encode(&records).unwrap()).unwrap();

        assert!(text.contains(r#""audio_track": -1"#), "{}", text);
        assert!(text.contains(r#""subtitle_track": -1"#), "{}", text);
        assert!(text.contains(r#""last_playback_time": 0.0"#), "{}", text);
        assert!(text.contains("\n        \"left_subtitle\": null"), "{}", text);
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::load(dir.path().join("absent.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(SessionStore::load(&path).is_empty());
    }

    #[test]
    fn save_then_load_keeps_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let mut store = SessionStore::load(&path);
        store.upsert(
            Path::new("/media/a.mkv"),
            SessionRecord {
                position: Duration::from_millis(1500),
                subtitle_track: Some(4),
                ..Default::default()
            },
        );
        store.upsert(Path::new("/media/b.mkv"), SessionRecord::default());
        store.save().unwrap();

        let reloaded = SessionStore::load(&path);
        assert_eq!(reloaded.len(), 2);
        let a = reloaded.get(Path::new("/media/a.mkv")).unwrap();
        assert_eq!(a.position, Duration::from_millis(1500));
        assert_eq!(a.subtitle_track, Some(4));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn absolute_path_resolves_dot_components() {
        assert_eq!(
            absolute_path(Path::new("/media/sub/../x.mp4")).unwrap(),
            Path::new("/media/x.mp4")
        );
        assert_eq!(
            absolute_path(Path::new("/media/./a/./b.mkv")).unwrap(),
            Path::new("/media/a/b.mkv")
        );
        assert_eq!(absolute_path(Path::new("/../x")).unwrap(), Path::new("/x"));
        assert!(absolute_path(Path::new("rel/../y")).unwrap().is_absolute());
    }
}
