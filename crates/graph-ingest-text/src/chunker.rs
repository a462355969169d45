use std::{collections::BTreeMap, fmt};

use error_stack::{ensure, Context, Report, Result};

/// Configuration for [`TextChunker`], following §4.3.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Target chunk size, in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in characters. Must be `< chunk_size`.
    pub overlap: usize,
    /// Snap chunk ends to the last sentence terminator within the window.
    pub respect_sentences: bool,
    /// Prefer a blank-line boundary over a sentence boundary, when both are enabled.
    pub respect_paragraphs: bool,
    /// A chunk's snapped length must not fall below this, or the original
    /// (unsnapped) window end is used instead. `None` disables the guard.
    pub min_chunk_size: Option<usize>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 100,
            respect_sentences: true,
            respect_paragraphs: true,
            min_chunk_size: None,
        }
    }
}

/// Raised synchronously, before any chunking is attempted, when the
/// configuration cannot possibly produce valid chunks.
#[derive(Debug)]
pub struct ChunkerConfigError;

impl fmt::Display for ChunkerConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid text chunker configuration")
    }
}

impl Context for ChunkerConfigError {}

/// A contiguous substring of an input document, bounded by character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub index: usize,
    pub metadata: BTreeMap<String, String>,
}

/// Deterministic text segmentation with overlap and boundary respect (§4.3).
///
/// Chunks are restartable: a [`Chunk`]'s `start`/`end` are character offsets
/// into the *original* text, so a caller can always recompute `chunk.text`
/// from the source plus those offsets instead of holding the chunk text
/// itself.
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Result<Self, ChunkerConfigError> {
        ensure!(
            config.overlap < config.chunk_size,
            Report::new(ChunkerConfigError)
                .attach_printable("overlap must be strictly less than chunk_size")
        );
        ensure!(
            config.chunk_size > 0,
            Report::new(ChunkerConfigError).attach_printable("chunk_size must be positive")
        );
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk `text`, attaching a clone of `metadata` to every emitted chunk.
    #[must_use]
    #[tracing::instrument(level = "debug", skip(self, text, metadata), fields(len = text.len()))]
    pub fn chunk(&self, text: &str, metadata: &BTreeMap<String, String>) -> Vec<Chunk> {
        let boundaries = char_byte_boundaries(text);
        let total_chars = boundaries.len().saturating_sub(1);

        if total_chars == 0 {
            return Vec::new();
        }

        if total_chars <= self.config.chunk_size {
            return vec![Chunk {
                text: text.to_owned(),
                start: 0,
                end: total_chars,
                index: 0,
                metadata: metadata.clone(),
            }];
        }

        let step = self.config.chunk_size - self.config.overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0usize;

        while start < total_chars {
            let window_end = (start + self.config.chunk_size).min(total_chars);
            let slice = &text[boundaries[start]..boundaries[window_end]];

            let mut end = window_end;
            if window_end < total_chars {
                if self.config.respect_paragraphs {
                    if let Some(offset) = last_paragraph_boundary(slice) {
                        end = start + offset;
                    } else if self.config.respect_sentences {
                        if let Some(offset) = last_sentence_boundary(slice) {
                            end = start + offset;
                        }
                    }
                } else if self.config.respect_sentences {
                    if let Some(offset) = last_sentence_boundary(slice) {
                        end = start + offset;
                    }
                }
            }

            if let Some(min_size) = self.config.min_chunk_size {
                if end.saturating_sub(start) < min_size {
                    end = window_end;
                }
            }
            // Snapping must never walk the boundary backwards onto or before
            // `start` - that would produce an empty or negative-length chunk.
            if end <= start {
                end = window_end;
            }

            chunks.push(Chunk {
                text: text[boundaries[start]..boundaries[end]].to_owned(),
                start,
                end,
                index,
                metadata: metadata.clone(),
            });
            index += 1;

            if end >= total_chars {
                break;
            }

            let next_start = end.saturating_sub(self.config.overlap);
            // Guarantee forward progress even if overlap snapping would
            // otherwise produce the same start twice.
            start = if next_start > start { next_start } else { start + step.max(1) };
        }

        chunks
    }
}

fn char_byte_boundaries(text: &str) -> Vec<usize> {
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    boundaries
}

/// The character offset, within `slice`, just after the last sentence
/// terminator (`.`, `!`, `?`) that is followed by whitespace or end-of-slice.
fn last_sentence_boundary(slice: &str) -> Option<usize> {
    let chars: Vec<char> = slice.chars().collect();
    for i in (0..chars.len()).rev() {
        if matches!(chars[i], '.' | '!' | '?') {
            let next_is_boundary = chars.get(i + 1).map_or(true, |c| c.is_whitespace());
            if next_is_boundary {
                return Some(i + 1);
            }
        }
    }
    None
}

/// The character offset, within `slice`, just after the last `\n\n`
/// (or `\r\n\r\n`) paragraph break.
fn last_paragraph_boundary(slice: &str) -> Option<usize> {
    let chars: Vec<char> = slice.chars().collect();
    for i in (1..chars.len()).rev() {
        if chars[i] == '\n' && chars[i - 1] == '\n' {
            return Some(i + 1);
        }
    }
    None
}
