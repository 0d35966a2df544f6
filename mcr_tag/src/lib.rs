//! Fixed-width positional morphological tags and distance between them.
//!
//! A canonical [`Tag`] is the 9-character positional string described in the
//! data model: position 0 is part of speech, the remaining 8 positions are
//! person, number, tense, mood, voice, gender, case, degree, with `-` where a
//! category does not apply. [`RawTag`] is the 12-character variant emitted by
//! the external analyzer; [`RawTag::to_tag`] narrows it to canonical form.
#![allow(dead_code)]
use std::fmt;

use serde::{Deserialize, Serialize};
use snafu::{ensure, Snafu};
use unicode_normalization::UnicodeNormalization;

type Result<T, E = Error> = std::result::Result<T, E>;

pub const CANONICAL_LEN: usize = 9;
pub const RAW_LEN: usize = 12;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Error)))]
pub enum Error {
    #[snafu(display("Mismatched or invalid tag lengths: {a_len} vs {b_len}"))]
    MismatchedLength { a_len: usize, b_len: usize },
    #[snafu(display("tag {tag:?} has length {len}, expected {expected}"))]
    WrongLength {
        tag: String,
        len: usize,
        expected: usize,
    },
}

/// The canonical 9-character positional tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(String);

impl Tag {
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        ensure!(
            s.chars().count() == CANONICAL_LEN,
            WrongLengthError {
                tag: s.clone(),
                len: s.chars().count(),
                expected: CANONICAL_LEN,
            }
        );
        Ok(Tag(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn part_of_speech(&self) -> char {
        self.0.chars().next().unwrap()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The 12-character positional tag as emitted by the external sequence
/// tagger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawTag(String);

impl RawTag {
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        ensure!(
            s.chars().count() == RAW_LEN,
            WrongLengthError {
                tag: s.clone(),
                len: s.chars().count(),
                expected: RAW_LEN,
            }
        );
        Ok(RawTag(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Narrows the 12-position tagger tag to the 9-position canonical form.
    ///
    /// The mapping keeps positions 0 (POS), 2..=8 (person..case) of the raw
    /// tag and drops positions 1 and 9..12 (the raw tagset's extra
    /// declension/strength/reserved slots, which have no canonical
    /// counterpart).
    pub fn to_tag(&self) -> Tag {
        let chars: Vec<char> = self.0.chars().collect();
        let mut out = String::with_capacity(CANONICAL_LEN);
        out.push(chars[0].to_ascii_lowercase());
        for &i in &[2usize, 3, 4, 5, 6, 7, 8] {
            out.push(chars[i]);
        }
        out.push(chars[9]);
        Tag(out)
    }
}

impl fmt::Display for RawTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// In-band marker following a vowel that carries a long mark.
pub const MACRON_MARKER: char = '_';
/// In-band marker following a vowel that carries a short mark.
pub const BREVE_MARKER: char = '^';

/// A macronized surface form, carrying vowel length as in-band `_`/`^`
/// markers rather than combining diacritics. Every pipeline stage works on
/// this representation; [`AccentedForm::to_glyphs`] renders the
/// combining-diacritic form used for final output only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccentedForm(String);

impl AccentedForm {
    pub fn new(s: impl Into<String>) -> Self {
        AccentedForm(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this form has no vowel-length marks at all.
    pub fn is_unmarked(&self) -> bool {
        !self.0.contains(MACRON_MARKER) && !self.0.contains(BREVE_MARKER)
    }

    /// Renders the in-band markers as combining diacritics and normalizes
    /// to precomposed form (e.g. `ama_ns` -> `am\u{101}ns`).
    pub fn to_glyphs(&self) -> String {
        let mut raw = String::with_capacity(self.0.len());
        for ch in self.0.chars() {
            match ch {
                MACRON_MARKER => raw.push('\u{0304}'),
                BREVE_MARKER => raw.push('\u{0306}'),
                _ => raw.push(ch),
            }
        }
        raw.nfc().collect()
    }
}

impl fmt::Display for AccentedForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Count of position-wise mismatches between two tags of equal length.
///
/// Defined only for tags of equal length in `{9, 12}`; any other pairing
/// (unequal lengths, or lengths outside that set) is an error.
pub fn tag_distance(a: &str, b: &str) -> Result<u32> {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    ensure!(
        a_len == b_len && (a_len == CANONICAL_LEN || a_len == RAW_LEN),
        MismatchedLengthError { a_len, b_len }
    );
    Ok(a.chars()
        .zip(b.chars())
        .filter(|(x, y)| x != y)
        .count() as u32)
}

/// Morphological part of speech, the first canonical-tag position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartOfSpeech {
    Verb,
    Noun,
    Adjective,
    Pronoun,
    Adverb,
    Conjunction,
    Preposition,
    Interjection,
    Numeral,
    Punctuation,
    Exclamation,
    Unknown,
}

impl PartOfSpeech {
    pub fn code(self) -> char {
        use PartOfSpeech::*;
        match self {
            Verb => 'v',
            Noun => 'n',
            Adjective => 'a',
            Pronoun => 'p',
            Adverb => 'd',
            Conjunction => 'c',
            Preposition => 'r',
            Interjection => 'i',
            Numeral => 'm',
            Punctuation => 'u',
            Exclamation => 'e',
            Unknown => '-',
        }
    }
}

/// A single morphological category slot in the canonical tag, used by the
/// morpheus adapter to build up a [`Tag`] from a parsed feature list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    PartOfSpeech,
    Person,
    Number,
    Tense,
    Mood,
    Voice,
    Gender,
    Case,
    Degree,
}

impl Slot {
    pub fn index(self) -> usize {
        use Slot::*;
        match self {
            PartOfSpeech => 0,
            Person => 1,
            Number => 2,
            Tense => 3,
            Mood => 4,
            Voice => 5,
            Gender => 6,
            Case => 7,
            Degree => 8,
        }
    }
}

/// Builds up a canonical [`Tag`] one slot at a time, defaulting every
/// unfilled position to `-`. Mirrors the "first write wins, unknown codes
/// ignored" semantics of the external analyzer's feature parser: setting an
/// already-filled slot again is a no-op unless `overwrite` is requested.
#[derive(Clone, Debug, Default)]
pub struct TagBuilder {
    slots: [char; CANONICAL_LEN],
    filled: [bool; CANONICAL_LEN],
}

impl TagBuilder {
    pub fn new() -> Self {
        TagBuilder {
            slots: ['-'; CANONICAL_LEN],
            filled: [false; CANONICAL_LEN],
        }
    }

    pub fn set(&mut self, slot: Slot, value: char) -> &mut Self {
        self.set_with(slot, value, false)
    }

    pub fn set_with(&mut self, slot: Slot, value: char, overwrite: bool) -> &mut Self {
        let i = slot.index();
        if overwrite || !self.filled[i] {
            self.slots[i] = value;
            self.filled[i] = true;
        }
        self
    }

    pub fn is_set(&self, slot: Slot) -> bool {
        self.filled[slot.index()]
    }

    pub fn get(&self, slot: Slot) -> char {
        self.slots[slot.index()]
    }

    pub fn build(&self) -> Tag {
        Tag(self.slots.iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_accepts_valid_9_char_tags() {
        assert_eq!(tag_distance("v1spia---", "v3spia---").unwrap(), 1);
    }

    #[test]
    fn distance_accepts_valid_12_char_tags() {
        assert_eq!(tag_distance("V--piap-s---", "V--piap-p---").unwrap(), 1);
    }

    #[test]
    fn distance_rejects_mismatched_lengths() {
        let err = tag_distance("v1spia---", "V--piap-s---").unwrap_err();
        assert!(matches!(err, Error::MismatchedLength { .. }));
    }

    #[test]
    fn distance_rejects_invalid_lengths() {
        let err = tag_distance("short", "short").unwrap_err();
        assert!(matches!(err, Error::MismatchedLength { .. }));
    }

    #[test]
    fn distance_is_symmetric() {
        let a = "v1spia---";
        let b = "v3spsa---";
        assert_eq!(tag_distance(a, b).unwrap(), tag_distance(b, a).unwrap());
    }

    #[test]
    fn builder_first_write_wins() {
        let mut b = TagBuilder::new();
        b.set(Slot::Person, '3');
        b.set(Slot::Person, '1');
        assert_eq!(b.get(Slot::Person), '3');
    }

    #[test]
    fn builder_overwrite() {
        let mut b = TagBuilder::new();
        b.set(Slot::Person, '3');
        b.set_with(Slot::Person, '1', true);
        assert_eq!(b.get(Slot::Person), '1');
    }

    #[test]
    fn accented_form_renders_macron() {
        let form = AccentedForm::new("ama_ns");
        assert_eq!(form.to_glyphs(), "am\u{101}ns");
    }

    #[test]
    fn accented_form_renders_breve() {
        let form = AccentedForm::new("bene^");
        assert_eq!(form.to_glyphs(), "ben\u{115}");
    }

    #[test]
    fn accented_form_without_markers_is_unchanged() {
        let form = AccentedForm::new("sine");
        assert!(form.is_unmarked());
        assert_eq!(form.to_glyphs(), "sine");
    }
}
