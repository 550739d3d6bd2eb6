//! Section keys for alphabetic navigation.
//!
//! Every entry is bucketed under a single uppercase Latin letter or under `#`.
//! Non-Latin leading characters are transliterated first: Han characters through
//! their pinyin reading, everything else through `deunicode`.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use deunicode::deunicode_char;
use pinyin::ToPinyin;

use crate::model::AppEntry;

pub const SYMBOL_KEY: char = '#';

/// A section key: `A`-`Z`, or `#` for labels without a Latin reading.
///
/// `#` orders after every letter, both for entries and for the section index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortKey(char);

impl SortKey {
    pub const SYMBOL: SortKey = SortKey(SYMBOL_KEY);

    pub fn for_label(label: &str) -> Self {
        label
            .chars()
            .next()
            .and_then(latin_initial)
            .map(SortKey)
            .unwrap_or(Self::SYMBOL)
    }

    /// Parses a stored key. Accepts lowercase letters; rejects anything that is not
    /// a single letter or `#`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut chars = raw.chars();
        let first = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::from_char(first)
    }

    pub fn from_char(c: char) -> Option<Self> {
        if c == SYMBOL_KEY {
            return Some(Self::SYMBOL);
        }
        if c.is_ascii_alphabetic() {
            return Some(SortKey(c.to_ascii_uppercase()));
        }
        None
    }

    pub fn as_char(self) -> char {
        self.0
    }

    pub fn is_symbol(self) -> bool {
        self.0 == SYMBOL_KEY
    }

    fn rank(self) -> u8 {
        if self.is_symbol() {
            26
        } else {
            self.0 as u8 - b'A'
        }
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn latin_initial(c: char) -> Option<char> {
    if c.is_ascii_alphabetic() {
        return Some(c.to_ascii_uppercase());
    }
    if c.is_ascii() {
        return None;
    }

    let reading = match c.to_pinyin() {
        Some(pinyin) => pinyin.plain(),
        None => deunicode_char(c)?,
    };
    reading
        .chars()
        .next()
        .filter(char::is_ascii_alphabetic)
        .map(|initial| initial.to_ascii_uppercase())
}

/// Orders entries by section key, then by label case-insensitively, then by id.
pub fn compare_entries(a: &AppEntry, b: &AppEntry) -> Ordering {
    a.sort_key
        .cmp(&b.sort_key)
        .then_with(|| a.normalized_label().cmp(b.normalized_label()))
        .then_with(|| a.package_id.cmp(&b.package_id))
}

pub fn sort_entries(entries: &mut [AppEntry]) {
    entries.sort_by(compare_entries);
}

/// Position at which `entry` keeps `entries` ordered by [`compare_entries`].
pub fn insertion_point(entries: &[AppEntry], entry: &AppEntry) -> usize {
    entries.partition_point(|existing| compare_entries(existing, entry) != Ordering::Greater)
}

/// The distinct section keys present in the registry, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionIndex {
    keys: BTreeSet<SortKey>,
}

impl SectionIndex {
    pub fn build(entries: &[AppEntry]) -> Self {
        Self {
            keys: entries.iter().map(|entry| entry.sort_key).collect(),
        }
    }

    pub fn insert(&mut self, key: SortKey) {
        self.keys.insert(key);
    }

    pub fn contains(&self, key: SortKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = SortKey> + '_ {
        self.keys.iter().copied()
    }

    pub fn letters(&self) -> Vec<char> {
        self.keys().map(SortKey::as_char).collect()
    }
}
