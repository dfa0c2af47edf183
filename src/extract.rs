//! Subtitle stream extraction through the `ffprobe`/`ffmpeg` command-line tools.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use log::{debug, error, info, warn};
use regex::Regex;
use serde::Deserialize;

use crate::engine::TrackDescriptor;
use crate::error::{DualsubError, Result};

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";

#[derive(Debug, Clone, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub codec_name: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl ProbeStream {
    pub fn language(&self) -> Option<&str> {
        self.tags.get("language").map(String::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.tags.get("title").map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
}

/// What `ffprobe` reports about a whole media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub duration: Option<Duration>,
    pub audio: Vec<TrackDescriptor>,
    pub subtitles: Vec<TrackDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    /// Position among the subtitle streams, as used by `-map 0:s:N`.
    pub position: usize,
    pub language: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<usize>,
}

fn run(tool: &'static str, args: &[OsString]) -> Result<Output> {
    debug!("Running {} {:?}", tool, args);
    let output = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| match err.kind() {
            ErrorKind::NotFound => DualsubError::ToolMissing { tool },
            _ => DualsubError::Io(err),
        })?;
    if !output.status.success() {
        return Err(DualsubError::ToolFailed {
            tool,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

fn os_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    args.into_iter().map(Into::into).collect()
}

/// Checks that `ffmpeg` can be run and returns its version string.
pub fn check_ffmpeg() -> Result<String> {
    let output = run(FFMPEG, &os_args(["-version"]))?;
    let version = parse_ffmpeg_version(&String::from_utf8_lossy(&output.stdout))
        .unwrap_or_else(|| "unknown".to_string());
    info!("Found ffmpeg version {}", version);
    Ok(version)
}

fn parse_ffmpeg_version(banner: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^ffmpeg version (\S+)").ok()?;
    re.captures(banner).map(|c| c[1].to_string())
}

fn parse_probe_output(stdout: &[u8]) -> Result<ProbeOutput> {
    let text = String::from_utf8_lossy(stdout);
    serde_json::from_str(&text).map_err(DualsubError::ProbeDecode)
}

/// Lists the subtitle streams of `video` in container order.
pub fn probe_subtitle_streams(video: &Path) -> Result<Vec<ProbeStream>> {
    let mut args = os_args([
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_streams",
        "-select_streams",
        "s",
    ]);
    args.push(video.as_os_str().to_owned());
    let output = run(FFPROBE, &args)?;
    Ok(parse_probe_output(&output.stdout)?.streams)
}

/// Probes the length and the audio/subtitle streams of `media`.
pub fn probe_media(media: &Path) -> Result<MediaInfo> {
    let mut args = os_args([
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_streams",
        "-show_format",
    ]);
    args.push(media.as_os_str().to_owned());
    let output = run(FFPROBE, &args)?;
    Ok(media_info(parse_probe_output(&output.stdout)?))
}

fn media_info(probe: ProbeOutput) -> MediaInfo {
    let duration = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());

    let describe = |stream: &ProbeStream, kind: &str| {
        let mut name = stream
            .title()
            .or_else(|| stream.language())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} {}", kind, stream.index));
        if let (Some(_), Some(lang)) = (stream.title(), stream.language()) {
            name = format!("{} [{}]", name, lang);
        }
        TrackDescriptor {
            id: stream.index as i32,
            name,
        }
    };

    let mut info = MediaInfo {
        duration,
        ..Default::default()
    };
    for stream in &probe.streams {
        match stream.codec_type.as_deref() {
            Some("audio") => info.audio.push(describe(stream, "Audio")),
            Some("subtitle") => info.subtitles.push(describe(stream, "Subtitle")),
            _ => (),
        }
    }
    info
}

/// Assigns an output file to each subtitle stream.
///
/// Files go next to `video` as `<stem>.<lang>.srt`. Streams without a language
/// tag use `und_<position>`. The second and later streams sharing a language
/// get a `_<count>` suffix.
pub fn plan_outputs(video: &Path, streams: &[ProbeStream]) -> Vec<PlannedOutput> {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut seen: HashMap<String, usize> = HashMap::new();

    streams
        .iter()
        .enumerate()
        .map(|(position, stream)| {
            let language = stream
                .language()
                .map(str::to_string)
                .unwrap_or_else(|| format!("und_{}", position));
            let count = seen.entry(language.clone()).or_insert(0);
            *count += 1;
            let suffix = if *count > 1 {
                format!("_{}", count)
            } else {
                String::new()
            };
            let path = video.with_file_name(format!("{}.{}{}.srt", stem, language, suffix));
            PlannedOutput {
                position,
                language,
                path,
            }
        })
        .collect()
}

fn extract_stream(video: &Path, planned: &PlannedOutput, overwrite: bool) -> Result<()> {
    let mut args = os_args(["-i"]);
    args.push(video.as_os_str().to_owned());
    args.extend(os_args([
        "-map".to_string(),
        format!("0:s:{}", planned.position),
        "-f".to_string(),
        "srt".to_string(),
        (if overwrite { "-y" } else { "-n" }).to_string(),
    ]));
    args.push(planned.path.as_os_str().to_owned());
    run(FFMPEG, &args)?;
    Ok(())
}

/// Writes every subtitle stream of `video` to its own `.srt` file.
///
/// A stream that fails to extract is logged and skipped; the rest still run.
pub fn extract_subtitles(video: &Path, overwrite: bool) -> Result<ExtractReport> {
    info!("Starting subtitle extraction for: {}", video.display());

    let streams = probe_subtitle_streams(video)?;
    info!("Found {} subtitle stream(s).", streams.len());
    if streams.is_empty() {
        warn!("No subtitle streams found in the video file.");
        return Ok(ExtractReport::default());
    }

    let mut report = ExtractReport::default();
    for planned in plan_outputs(video, &streams) {
        info!(
            "Processing subtitle stream {}: Language='{}', Output='{}'",
            planned.position,
            planned.language,
            planned.path.display()
        );
        match extract_stream(video, &planned, overwrite) {
            Ok(()) => {
                info!("Subtitles extracted successfully: {}", planned.path.display());
                report.written.push(planned.path);
            }
            Err(err) => {
                error!(
                    "Error extracting subtitles for stream {}: {}",
                    planned.position, err
                );
                report.failed.push(planned.position);
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(index: u32, lang: Option<&str>) -> ProbeStream {
        let mut tags = HashMap::new();
        if let Some(lang) = lang {
            tags.insert("language".to_string(), lang.to_string());
        }
        ProbeStream {
            index,
            codec_type: Some("subtitle".to_string()),
            codec_name: Some("subrip".to_string()),
            tags,
        }
    }

    #[test]
    fn plans_names_with_language_counters() {
        let streams = [
            stream(2, Some("eng")),
            stream(3, Some("fre")),
            stream(4, Some("eng")),
            stream(5, None),
            stream(6, Some("eng")),
        ];
        let planned = plan_outputs(Path::new("/videos/Movie.2020.mkv"), &streams);
        let names: Vec<String> = planned
            .iter()
            .map(|p| p.path.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            names,
            [
                "/videos/Movie.2020.eng.srt",
                "/videos/Movie.2020.fre.srt",
                "/videos/Movie.2020.eng_2.srt",
                "/videos/Movie.2020.und_3.srt",
                "/videos/Movie.2020.eng_3.srt",
            ]
        );
        let positions: Vec<usize> = planned.iter().map(|p| p.position).collect();
        assert_eq!(positions, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn plans_relative_paths_next_to_video() {
        let planned = plan_outputs(Path::new("clip.mp4"), &[stream(0, Some("jpn"))]);
        assert_eq!(planned[0].path, PathBuf::from("clip.jpn.srt"));
    }

    #[test]
    fn decodes_probe_json() {
        let json = br#"{
            "streams": [
                {"index": 2, "codec_name": "subrip", "codec_type": "subtitle",
                 "tags": {"language": "eng", "title": "SDH"}},
                {"index": 3, "codec_name": "ass", "codec_type": "subtitle"}
            ]
        }"#;
        let streams = parse_probe_output(json).unwrap().streams;

        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].language(), Some("eng"));
        assert_eq!(streams[0].title(), Some("SDH"));
        assert_eq!(streams[1].language(), None);
    }

    #[test]
    fn empty_probe_object_has_no_streams() {
        assert!(parse_probe_output(b"{}").unwrap().streams.is_empty());
        assert!(matches!(
            parse_probe_output(b"not json"),
            Err(DualsubError::ProbeDecode(_))
        ));
    }

    #[test]
    fn media_info_splits_tracks_and_reads_duration() {
        let json = br#"{
            "streams": [
                {"index": 0, "codec_type": "video"},
                {"index": 1, "codec_type": "audio", "tags": {"language": "eng"}},
                {"index": 2, "codec_type": "audio"},
                {"index": 3, "codec_type": "subtitle", "tags": {"language": "fre", "title": "Forced"}}
            ],
            "format": {"duration": "5423.120000"}
        }"#;
        let info = media_info(parse_probe_output(json).unwrap());

        let millis = info.duration.map(|d| (d.as_secs_f64() * 1000.0).round() as u64);
        assert_eq!(millis, Some(5_423_120));
        assert_eq!(
            info.audio,
            [
                TrackDescriptor { id: 1, name: "eng".into() },
                TrackDescriptor { id: 2, name: "Audio 2".into() },
            ]
        );
        assert_eq!(
            info.subtitles,
            [TrackDescriptor { id: 3, name: "Forced [fre]".into() }]
        );
    }

    #[test]
    fn reads_ffmpeg_version_banner() {
        let banner = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023 the FFmpeg developers\n\
                      built with gcc 13 (Ubuntu 13.2.0-23ubuntu3)\n";
        assert_eq!(parse_ffmpeg_version(banner).as_deref(), Some("6.1.1-3ubuntu5"));
        assert_eq!(parse_ffmpeg_version("something else"), None);
    }
}
