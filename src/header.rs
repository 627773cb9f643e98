//! Column headers and their per-target cache
//!
//! A [`Header`] maps 1-based column positions to names and back. Names are
//! discovered lazily: read from an existing header row, set explicitly, or
//! taken from the keys of the first keyed record. New names are appended
//! and flag the header row for rewriting.
//!
//! A header can only be declared from keys while its target has nothing
//! persisted at the header row. Once data rows occupy that row the header
//! is settled and keyed records can no longer introduce names.

use crate::coord::{col_to_letter, letter_to_col};
use crate::error::{RecorderError, Result};
use crate::types::{CellValue, Record};
use std::collections::HashMap;

/// Column names for one target
#[derive(Debug, Clone, Default)]
pub struct Header {
    names: Vec<Option<String>>,
    index: HashMap<String, u32>,
    positional: bool,
    needs_rewrite: bool,
    settled: bool,
}

impl Header {
    /// Empty header, waiting to be declared
    pub fn new() -> Self {
        Self::default()
    }

    /// Header for targets without a header row
    ///
    /// Column letters address positions directly, the header never grows
    /// and never asks to be rewritten.
    pub fn positional() -> Self {
        Header {
            positional: true,
            ..Self::default()
        }
    }

    /// Build from a persisted header row
    ///
    /// Empty names become unset and trailing unset names are trimmed.
    pub fn from_existing<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let mut names: Vec<Option<String>> = names
            .into_iter()
            .map(|n| n.map(Into::into).filter(|s: &String| !s.is_empty()))
            .collect();
        while matches!(names.last(), Some(None)) {
            names.pop();
        }

        let mut header = Header {
            names,
            ..Self::default()
        };
        header.reindex();
        header
    }

    /// Build from caller-supplied names; the header row must be written
    pub fn declared<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut header = Self::from_existing(names.into_iter().map(|n| Some::<String>(n.into())));
        header.needs_rewrite = true;
        header
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, name) in self.names.iter().enumerate() {
            if let Some(name) = name {
                // First occurrence wins for duplicated names
                self.index.entry(name.clone()).or_insert(i as u32 + 1);
            }
        }
    }

    /// Derive the header from a keyed record when none exists yet
    ///
    /// Returns `true` if the header was declared by this call.
    pub fn declare<'a, I>(&mut self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        if self.positional || self.settled || !self.names.is_empty() {
            return false;
        }
        for key in keys {
            self.grow(key);
        }
        !self.names.is_empty()
    }

    /// Position of `key`
    ///
    /// Header names are tried first. Unless `by_header_key` is set, column
    /// letters and plain numbers are accepted as positions too. Returns
    /// `None` when nothing matches.
    pub fn resolve(&self, key: &str, by_header_key: bool) -> Option<u32> {
        if let Some(pos) = self.index.get(key) {
            return Some(*pos);
        }
        if by_header_key && !self.positional {
            return None;
        }
        if let Ok(n) = key.trim().parse::<u32>() {
            return (n > 0).then_some(n);
        }
        letter_to_col(key.trim()).ok()
    }

    /// Whether unknown keys may be appended as new columns
    pub fn can_grow(&self) -> bool {
        !self.positional && !self.settled
    }

    /// Append `key` as a new column, returning its position
    ///
    /// Growing with an existing name returns the existing position.
    pub fn grow(&mut self, key: &str) -> u32 {
        if let Some(pos) = self.index.get(key) {
            return *pos;
        }
        self.names.push(Some(key.to_string()));
        let pos = self.names.len() as u32;
        self.index.insert(key.to_string(), pos);
        self.needs_rewrite = true;
        pos
    }

    /// Name at a 1-based position
    ///
    /// Positional headers name every column by its letters.
    pub fn name_at(&self, pos: u32) -> Option<String> {
        if self.positional {
            return Some(col_to_letter(pos));
        }
        self.names
            .get(pos.checked_sub(1)? as usize)
            .cloned()
            .flatten()
    }

    pub fn names(&self) -> &[Option<String>] {
        &self.names
    }

    /// Number of declared positions
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn is_positional(&self) -> bool {
        self.positional
    }

    /// Whether the persisted header row is stale
    pub fn needs_rewrite(&self) -> bool {
        self.needs_rewrite && !self.positional && !self.names.is_empty()
    }

    /// Reconcile with the number of rows the target currently holds
    ///
    /// A target shorter than the header row has lost its header (or never
    /// had one): known names are written again and an empty header may
    /// still be declared. A nameless header whose header row is taken by
    /// data is settled.
    pub fn sync_extent(&mut self, extent: u32, header_row: u32) {
        if self.positional || header_row == 0 {
            return;
        }
        if extent < header_row {
            self.settled = false;
            if !self.names.is_empty() {
                self.needs_rewrite = true;
            }
        } else if self.names.is_empty() {
            self.settled = true;
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Called after the header row has been persisted
    pub fn mark_written(&mut self) {
        self.needs_rewrite = false;
    }

    /// Header row as cell values, unset names left empty
    pub fn to_values(&self) -> Vec<CellValue> {
        self.names
            .iter()
            .map(|n| n.clone().map(CellValue::String).unwrap_or(CellValue::Empty))
            .collect()
    }

    /// Place a record's values into `(column, value)` pairs
    ///
    /// Positional records start at `start_col`. Keyed records are placed by
    /// header name; unknown keys are appended when `auto_grow` is set and
    /// rejected otherwise.
    pub fn place(
        &mut self,
        record: &Record,
        start_col: u32,
        auto_grow: bool,
        target: &str,
    ) -> Result<Vec<(u32, CellValue)>> {
        match record {
            Record::Value(v) => Ok(vec![(start_col, v.clone())]),
            Record::Row(values) => Ok(values
                .iter()
                .enumerate()
                .map(|(i, v)| (start_col + i as u32, v.clone()))
                .collect()),
            Record::Map(map) => {
                self.declare(map.keys());
                let mut cells = Vec::with_capacity(map.len());
                for (key, value) in map {
                    let pos = match self.resolve(key, !self.positional) {
                        Some(pos) => pos,
                        None if auto_grow && self.can_grow() => self.grow(key),
                        None => {
                            return Err(RecorderError::UnknownColumn {
                                column: key.clone(),
                                target: target.to_string(),
                            })
                        }
                    };
                    cells.push((pos, value.clone()));
                }
                Ok(cells)
            }
        }
    }
}

/// Headers cached by target name
///
/// `None` stands for the default target. Once a backend learns the real
/// name of the default target (the first sheet, the first table) it is
/// registered with [`HeaderRegistry::set_default`], so both spellings share
/// one entry.
#[derive(Debug, Default, Clone)]
pub struct HeaderRegistry {
    cache: HashMap<Option<String>, Header>,
    default: Option<String>,
}

impl HeaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(&self, target: Option<&str>) -> Option<String> {
        target.map(str::to_string).or_else(|| self.default.clone())
    }

    /// Name the default target, moving any header cached under `None`
    pub fn set_default(&mut self, name: &str) {
        if self.default.as_deref() == Some(name) {
            return;
        }
        self.default = Some(name.to_string());
        if let Some(header) = self.cache.remove(&None) {
            self.cache.entry(Some(name.to_string())).or_insert(header);
        }
    }

    pub fn get(&self, target: Option<&str>) -> Option<&Header> {
        self.cache.get(&self.key(target))
    }

    pub fn insert(&mut self, target: Option<&str>, header: Header) {
        let key = self.key(target);
        self.cache.insert(key, header);
    }

    /// Cached header for `target`, loading it on first use
    pub fn get_or_load<F>(&mut self, target: Option<&str>, load: F) -> Result<&mut Header>
    where
        F: FnOnce() -> Result<Header>,
    {
        let key = self.key(target);
        if !self.cache.contains_key(&key) {
            let header = load()?;
            self.cache.insert(key.clone(), header);
        }
        self.cache
            .get_mut(&key)
            .ok_or_else(|| RecorderError::InvalidFormat("header cache miss".to_string()))
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.default = None;
    }
}
