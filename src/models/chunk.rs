use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::ascii_stem;

/// One overlapping window of a document's text, bound to its source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub index: usize,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(source: &Path, index: usize, start: usize, end: usize, text: String) -> Self {
        Self {
            id: Self::generate_id(source, index),
            index,
            start,
            end,
            text,
        }
    }

    /// `"{ascii_stem}_chunk_{index}"`, stable across runs for the same file name.
    pub fn generate_id(source: &Path, index: usize) -> String {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        format!("{}_chunk_{}", ascii_stem(&stem), index)
    }

    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}
