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

//! Name-related string utilities.
//!
//! Host names handled by this crate are compared ASCII-case-insensitively
//! and are otherwise treated as opaque byte strings; no IDNA or other
//! encoding processing is done.

/// A wrapper around [`str`] references whose [`PartialEq`] and [`Eq`]
/// implementations are ASCII-case-insensitive.
pub struct Caseless<'a>(pub &'a str);

impl PartialEq for Caseless<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(other.0)
    }
}

impl Eq for Caseless<'_> {}

/// Returns whether `name` ends with `suffix`, ignoring ASCII case.
///
/// If `suffix` is longer than `name`, this is always `false`.
pub fn ends_with(name: &str, suffix: &str) -> bool {
    ends_with_bytes(name.as_bytes(), suffix.as_bytes())
}

/// The byte-string version of [`ends_with`], for rule text that is not
/// necessarily UTF-8.
pub(crate) fn ends_with_bytes(name: &[u8], suffix: &[u8]) -> bool {
    match name.len().checked_sub(suffix.len()) {
        Some(start) => name[start..].eq_ignore_ascii_case(suffix),
        None => false,
    }
}

/// Counts the labels of a textual domain name.
///
/// The count starts at one and increases for every `.` that is not the
/// last character of `name`. Thus a trailing dot (as in `foo.local.`)
/// does not introduce an extra label. No escape processing is done.
pub fn label_count(name: &str) -> usize {
    let bytes = name.as_bytes();
    let last = bytes.len().saturating_sub(1);
    1 + bytes
        .iter()
        .enumerate()
        .filter(|&(i, &b)| b == b'.' && i != last)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ends_with_ignores_case() {
        assert!(ends_with("Foo.LOCAL", ".local"));
        assert!(ends_with("foo.local", ".LoCaL"));
        assert!(!ends_with("foo.locale", ".local"));
    }

    #[test]
    fn ends_with_rejects_suffix_longer_than_name() {
        assert!(!ends_with("local", ".local"));
        assert!(!ends_with("", "a"));
    }

    #[test]
    fn ends_with_accepts_empty_suffix_and_exact_match() {
        assert!(ends_with("foo.local", ""));
        assert!(ends_with(".local", ".LOCAL"));
    }

    #[test]
    fn label_count_ignores_trailing_dot() {
        assert_eq!(label_count("a.b.c"), 3);
        assert_eq!(label_count("a.b.c."), 3);
        assert_eq!(label_count("a"), 1);
        assert_eq!(label_count("foo.local"), 2);
        assert_eq!(label_count("foo.local."), 2);
    }

    #[test]
    fn label_count_of_degenerate_names() {
        assert_eq!(label_count(""), 1);
        assert_eq!(label_count("."), 1);
        assert_eq!(label_count("a..b"), 3);
    }

    #[test]
    fn caseless_compares_ascii_case_insensitively() {
        assert!(Caseless("INET6") == Caseless("inet6"));
        assert!(Caseless("inet") != Caseless("inet6"));
    }
}
