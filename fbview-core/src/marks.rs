use std::collections::HashMap;

/// Identifier of the implicit "previous position" mark.
pub const PREVIOUS_MARK: char = '\'';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub page: usize,
    /// Display row divided by the zoom in effect when the mark was set.
    pub row: i32,
}

/// Named positions for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MarkStore {
    entries: HashMap<char, Mark>,
}

impl MarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a raw key to a mark identifier. Backtick aliases the apostrophe;
    /// anything other than a letter or those two is not a mark.
    pub fn normalize(key: u8) -> Option<char> {
        match key {
            b'`' | b'\'' => Some(PREVIOUS_MARK),
            key if key.is_ascii_alphabetic() => Some(key as char),
            _ => None,
        }
    }

    /// Records `mark` under `key`; keys that are not marks are ignored.
    pub fn set(&mut self, key: u8, mark: Mark) -> bool {
        match Self::normalize(key) {
            Some(id) => {
                self.entries.insert(id, mark);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: u8) -> Option<Mark> {
        Self::normalize(key).and_then(|id| self.entries.get(&id).copied())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
