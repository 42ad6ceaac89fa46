use crate::cue::{Cue, CueList};

use std::sync::OnceLock;

use nom::branch::alt;
use nom::character::complete::{char, digit0, digit1, one_of};
use nom::combinator::{opt, recognize};
use nom::sequence::{pair, tuple};
use nom::IResult;
use regex::Regex;
use tracing::debug;

const ARROW: &str = "-->";
const HEADER: &str = "WEBVTT";

/// Result of reading one block of a caption track.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Cue(Cue),
    /// The block had a line containing `-->` that is not a valid timing line.
    /// `line` is 1-based.
    Skipped { line: usize, timing: String },
}

/// Permissive WebVTT reader.
///
/// Never fails: blocks it cannot make sense of are skipped and reading
/// continues with the rest of the track.
pub struct Parser {
    timing: &'static Regex,
}

fn timing_regex() -> &'static Regex {
    static TIMING: OnceLock<Regex> = OnceLock::new();
    TIMING.get_or_init(|| Regex::new(r"(\S+)\s+-->\s+(\S+)").expect("timing pattern is valid"))
}

impl Parser {
    pub fn new() -> Self {
        Self {
            timing: timing_regex(),
        }
    }

    pub fn parse(&self, input: &str) -> CueList {
        self.blocks(input)
            .filter_map(|outcome| match outcome {
                ParseOutcome::Cue(cue) => Some(cue),
                ParseOutcome::Skipped { .. } => None,
            })
            .collect()
    }

    pub fn blocks<'p, 't>(&'p self, input: &'t str) -> Blocks<'p, 't> {
        Blocks {
            parser: self,
            lines: input.lines().collect(),
            cursor: 0,
        }
    }

    fn timing(&self, line: &str) -> Option<(f64, f64)> {
        let caps = self.timing.captures(line)?;
        Some((timestamp_to_seconds(&caps[1]), timestamp_to_seconds(&caps[2])))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a whole track with a throwaway [`Parser`].
pub fn parse(input: &str) -> CueList {
    Parser::new().parse(input)
}

pub struct Blocks<'p, 't> {
    parser: &'p Parser,
    lines: Vec<&'t str>,
    cursor: usize,
}

impl<'p, 't> Iterator for Blocks<'p, 't> {
    type Item = ParseOutcome;

    fn next(&mut self) -> Option<ParseOutcome> {
        while self.cursor < self.lines.len() {
            let line = trim(self.lines[self.cursor]);
            if line.is_empty() || is_header(line) {
                self.cursor += 1;
                continue;
            }

            let next = self.lines.get(self.cursor + 1).map_or("", |&l| trim(l));
            let timing_at = if !line.contains(ARROW) && next.contains(ARROW) {
                self.cursor + 1
            } else if line.contains(ARROW) {
                self.cursor
            } else {
                debug!(line = self.cursor + 1, "ignoring stray caption line");
                self.cursor += 1;
                continue;
            };
            self.cursor = timing_at + 1;

            let timing = trim(self.lines[timing_at]);
            let (start, end) = match self.parser.timing(timing) {
                Some(times) => times,
                None => {
                    debug!(line = timing_at + 1, timing, "skipping cue with malformed timing");
                    return Some(ParseOutcome::Skipped {
                        line: timing_at + 1,
                        timing: timing.to_string(),
                    });
                }
            };

            let body_start = self.cursor;
            while self.cursor < self.lines.len() && !trim(self.lines[self.cursor]).is_empty() {
                self.cursor += 1;
            }
            let text = trim(&self.lines[body_start..self.cursor].join("\n")).to_string();
            // Blank separator.
            self.cursor += 1;

            return Some(ParseOutcome::Cue(Cue::new(start, end, text)));
        }
        None
    }
}

/// Whitespace trim that also drops a byte-order mark.
fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}')
}

fn is_header(line: &str) -> bool {
    line.get(..HEADER.len())
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case(HEADER))
}

/// Convert a `[HH:]MM:SS[.mmm]` token into seconds.
///
/// With three segments the first one is hours, otherwise the first one is
/// minutes and the second one seconds. Segments that do not start with a
/// number count as zero.
pub fn timestamp_to_seconds(token: &str) -> f64 {
    let segments: Vec<&str> = token.split(':').collect();
    let (hours, minutes, seconds) = match segments.as_slice() {
        [h, m, s] => (leading_int(h), leading_int(m), leading_float(s)),
        [m, rest @ ..] => (
            0.0,
            leading_int(m),
            rest.first().map_or(0.0, |s| leading_float(s)),
        ),
        [] => (0.0, 0.0, 0.0),
    };
    hours * 3600.0 + minutes * 60.0 + seconds
}

fn leading_int(segment: &str) -> f64 {
    int_prefix(segment)
        .ok()
        .and_then(|(_, digits)| digits.parse().ok())
        .unwrap_or(0.0)
}

fn leading_float(segment: &str) -> f64 {
    float_prefix(segment)
        .ok()
        .and_then(|(_, number)| number.parse().ok())
        .unwrap_or(0.0)
}

fn int_prefix(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(one_of("+-")), digit1))(input)
}

fn float_prefix(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)
}
