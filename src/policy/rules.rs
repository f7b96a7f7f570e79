// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Allow-list rules and the bounded line reader that reads them.
//!
//! An allow-list file holds one rule per line. Everything from the
//! first `#`, space, tab, CR, or LF onward is ignored, and lines that
//! are empty after that are skipped. A line consisting of `*` allows
//! every name; any other line is a domain suffix, with or without a
//! leading dot.
//!
//! Lines are read at most [`MAX_RULE_LEN`] bytes at a time. The rest of
//! a longer line is discarded, so a very long suffix may fail to match
//! but can never make the reader buffer without bound.

use std::fmt;
use std::io::{self, BufRead};

use arrayvec::ArrayVec;

use crate::util::ends_with_bytes;

/// The maximum number of bytes of a rule line that are considered.
pub const MAX_RULE_LEN: usize = 127;

const TERMINATORS: &[u8] = b"#\t\n\r \0";

/// A single allow-list rule.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Rule {
    /// Matches every name.
    Any,

    /// Matches names ending with this suffix, which always starts with
    /// a dot, and the name equal to the suffix without its dot.
    Suffix(ArrayVec<u8, { MAX_RULE_LEN + 1 }>),
}

impl Rule {
    /// Parses a rule line. Returns [`None`] for lines that hold no rule
    /// (blank lines and comments).
    pub fn parse(line: &[u8]) -> Option<Self> {
        let line = &line[..line.len().min(MAX_RULE_LEN)];
        let end = line
            .iter()
            .position(|b| TERMINATORS.contains(b))
            .unwrap_or(line.len());
        let text = &line[..end];

        match text {
            [] => None,
            b"*" => Some(Self::Any),
            _ => {
                let mut suffix = ArrayVec::new();
                if text[0] != b'.' {
                    suffix.push(b'.');
                }
                suffix.extend(text.iter().copied());
                Some(Self::Suffix(suffix))
            }
        }
    }

    /// Returns whether this rule allows `name`.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Suffix(suffix) => {
                let name = name.as_bytes();
                ends_with_bytes(name, suffix) || name.eq_ignore_ascii_case(&suffix[1..])
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Suffix(suffix) => f.write_str(&String::from_utf8_lossy(suffix)),
        }
    }
}

/// An iterator over the rules of an allow-list.
///
/// Blank and comment lines are skipped. Iteration ends at the end of
/// the input or after the first I/O error, which is yielded.
pub struct Rules<R> {
    reader: Option<R>,
}

impl<R: BufRead> Rules<R> {
    /// Creates an iterator over the rules read from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }
}

impl<R: BufRead> Iterator for Rules<R> {
    type Item = io::Result<Rule>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        let mut line = ArrayVec::new();
        loop {
            match read_line(reader, &mut line) {
                Ok(false) => {
                    self.reader = None;
                    return None;
                }
                Ok(true) => {
                    if let Some(rule) = Rule::parse(&line) {
                        return Some(Ok(rule));
                    }
                }
                Err(e) => {
                    self.reader = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Reads the next line from `reader` into `line`, keeping at most
/// [`MAX_RULE_LEN`] bytes of it and discarding the rest. The newline is
/// consumed but not stored. Returns `false` if the reader was already
/// at the end of its input.
fn read_line<R: BufRead>(
    reader: &mut R,
    line: &mut ArrayVec<u8, MAX_RULE_LEN>,
) -> io::Result<bool> {
    line.clear();
    let mut read_any = false;
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(read_any);
        }
        read_any = true;

        let (chunk, consumed, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (&available[..i], i + 1, true),
            None => (available, available.len(), false),
        };
        let room = line.remaining_capacity();
        line.extend(chunk.iter().copied().take(room));
        reader.consume(consumed);
        if done {
            return Ok(true);
        }
    }
}
