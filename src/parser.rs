use crate::error::{DualsubError, Result};
use crate::srt::{SubtitleEntry, SubtitleTrack};

use std::path::Path;
use std::time::Duration;

use log::debug;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1, take_while_m_n};
use nom::character::complete::{char, digit1};
use nom::combinator::{map, map_res, opt};
use nom::error::ErrorKind;
use nom::multi::many_till;
use nom::sequence::terminated;
use nom::{error_position, Err, IResult};

/// Lenient SRT reader.
///
/// Input that does not match the grammar is dropped until a well-formed block
/// begins, which may be part way through a line. A damaged file yields
/// whatever captions could be recovered rather than an error.
pub struct Parser {
    skipped_lines: usize,
}

impl Parser {
    pub fn new() -> Self {
        Self { skipped_lines: 0 }
    }

    /// Non-blank lines discarded by the most recent call to [`Parser::parse`].
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    pub fn parse(&mut self, input: &str) -> SubtitleTrack {
        self.skipped_lines = 0;

        let input = match optional_bom(input) {
            Ok((rest, _)) => rest,
            Err(_) => input,
        };
        let normalised = input.replace("\r\n", "\n").replace('\r', "\n");

        let mut entries = Vec::new();
        let mut rest = normalised.as_str();
        while !rest.is_empty() {
            match subtitle(rest) {
                Ok((rem, entry)) => {
                    entries.push(entry);
                    rest = rem;
                }
                Err(_) => {
                    let (line, rem) = split_line(rest);
                    let resume = block_start_within(line, rest);
                    let dropped = match resume {
                        Some(offset) => &line[..offset],
                        None => line,
                    };
                    if !dropped.trim().is_empty() {
                        self.skipped_lines += 1;
                    }
                    rest = match resume {
                        Some(offset) => &rest[offset..],
                        None => rem,
                    };
                }
            }
        }

        if self.skipped_lines > 0 {
            debug!(
                "Dropped {} line(s) that did not form a subtitle block",
                self.skipped_lines
            );
        }
        SubtitleTrack::new(entries)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads and parses a subtitle file. Invalid UTF-8 is replaced rather than rejected.
pub fn load_track<P: AsRef<Path>>(path: P) -> Result<SubtitleTrack> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| DualsubError::SubtitleRead {
        path: path.to_path_buf(),
        source,
    })?;
    let track = Parser::new().parse(&String::from_utf8_lossy(&bytes));
    debug!("Parsed {} subtitle(s) from '{}'", track.len(), path.display());
    Ok(track)
}

fn split_line(input: &str) -> (&str, &str) {
    match input.find('\n') {
        Some(i) => (&input[..i], &input[i + 1..]),
        None => (input, ""),
    }
}

/// Offset of the first digit run inside `line`, past its start, at which a
/// well-formed block begins. `rest` is `line` followed by the remaining input.
fn block_start_within(line: &str, rest: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    (1..bytes.len())
        .filter(|&i| bytes[i].is_ascii_digit() && !bytes[i - 1].is_ascii_digit())
        .find(|&i| subtitle(&rest[i..]).is_ok())
}

fn optional_bom(input: &str) -> IResult<&str, Option<&str>> {
    opt(tag("\u{FEFF}"))(input)
}

fn subtitle(input: &str) -> IResult<&str, SubtitleEntry> {
    let (input, sequence_hint) = terminated(seq_num, char('\n'))(input)?;
    let (input, (start, end)) = terminated(show_hide, char('\n'))(input)?;
    let (input, text) = sub_text(input)?;

    Ok((
        input,
        SubtitleEntry {
            sequence_hint,
            start,
            end,
            text,
        },
    ))
}

fn end_of_file(input: &str) -> IResult<&str, &str> {
    if input.is_empty() {
        Ok((input, input))
    } else {
        std::result::Result::Err(Err::Error(error_position!(input, ErrorKind::Eof)))
    }
}

fn sub_text(input: &str) -> IResult<&str, String> {
    let line = terminated(
        take_while1(|c: char| c != '\n'),
        alt((tag("\n"), end_of_file)),
    );

    let (input, (lines, _)) = many_till(line, alt((tag("\n"), end_of_file)))(input)?;

    Ok((input, lines.join("\n").trim().to_string()))
}

fn show_hide(input: &str) -> IResult<&str, (Duration, Duration)> {
    let (input, show_at) = timestamp(input)?;
    let (input, _) = tag(" --> ")(input)?;
    let (input, hide_at) = timestamp(input)?;

    Ok((input, (show_at, hide_at)))
}

fn timestamp(input: &str) -> IResult<&str, Duration> {
    let fixed = |width: usize| {
        map_res(
            take_while_m_n(width, width, |c: char| c.is_ascii_digit()),
            |s: &str| s.parse::<u64>(),
        )
    };

    let (input, hours) = fixed(2)(input)?;
    let (input, _) = tag(":")(input)?;
    let (input, minutes) = fixed(2)(input)?;
    let (input, _) = tag(":")(input)?;
    let (input, seconds) = fixed(2)(input)?;
    let (input, _) = tag(",")(input)?;
    let (input, millis) = fixed(3)(input)?;

    Ok((
        input,
        Duration::from_millis(
            millis + seconds * 1000 + minutes * 60 * 1000 + hours * 60 * 60 * 1000,
        ),
    ))
}

fn seq_num(input: &str) -> IResult<&str, u64> {
    map(digit1, |s: &str| {
        s.bytes().fold(0u64, |acc, b| {
            acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
        })
    })(input)
}
