//! Sliding-window text splitting with overlap.

use std::path::Path;

use crate::error::SplitError;
use crate::models::{Chunk, SplitterConfig};

/// Splits text into fixed-size windows that overlap by a fixed amount.
///
/// Sizes are counted in characters (Unicode scalar values), never bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, SplitError> {
        if chunk_size == 0 {
            return Err(SplitError::InvalidChunkSize);
        }
        if overlap >= chunk_size {
            return Err(SplitError::OverlapTooLarge {
                size: chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &SplitterConfig) -> Result<Self, SplitError> {
        Self::new(config.chunk_size as usize, config.chunk_overlap as usize)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between the starts of consecutive chunks.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Lazily split `text`. Clone the returned iterator to restart it.
    pub fn split<'a>(&self, text: &'a str) -> Result<Spans<'a>, SplitError> {
        if text.trim().is_empty() {
            return Err(SplitError::EmptyText);
        }

        Ok(Spans {
            text,
            chunk_size: self.chunk_size,
            step: self.step(),
            start_byte: 0,
            start_char: 0,
            index: 0,
            done: false,
        })
    }

    /// Split `text` from `source` into owned chunks with record ids.
    pub fn split_document(&self, source: &Path, text: &str) -> Result<Vec<Chunk>, SplitError> {
        Ok(self
            .split(text)?
            .map(|span| Chunk::new(source, span.index, span.start, span.end, span.text.to_string()))
            .collect())
    }

    /// Number of chunks produced for a text of `len` characters.
    pub fn expected_chunk_count(&self, len: usize) -> usize {
        if len <= self.chunk_size {
            return 1;
        }
        (len - self.overlap).div_ceil(self.step())
    }
}

/// A window of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan<'a> {
    pub index: usize,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
    pub text: &'a str,
}

/// Iterator over the windows of one text.
///
/// Walks the text one window at a time; nothing is indexed up front.
#[derive(Debug, Clone)]
pub struct Spans<'a> {
    text: &'a str,
    chunk_size: usize,
    step: usize,
    start_byte: usize,
    start_char: usize,
    index: usize,
    done: bool,
}

impl<'a> Iterator for Spans<'a> {
    type Item = TextSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = &self.text[self.start_byte..];
        let start = self.start_char;

        // Byte offset (relative to `rest`) of the char just past this window.
        let Some(end_rel) = rest.char_indices().nth(self.chunk_size).map(|(i, _)| i) else {
            self.done = true;
            return Some(TextSpan {
                index: self.index,
                start,
                end: start + rest.chars().count(),
                text: rest,
            });
        };

        let span = TextSpan {
            index: self.index,
            start,
            end: start + self.chunk_size,
            text: &rest[..end_rel],
        };

        // step <= chunk_size, so the next start lies inside this window.
        let next_rel = rest
            .char_indices()
            .nth(self.step)
            .map_or(end_rel, |(i, _)| i);
        self.start_byte += next_rel;
        self.start_char += self.step;
        self.index += 1;

        Some(span)
    }
}
