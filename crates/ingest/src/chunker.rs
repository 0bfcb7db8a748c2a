use crate::chunk::Chunk;
use crate::error::ChunkError;

/// Smallest window the chunker will use, whatever the caller asks for.
pub const MIN_CHUNK_WORDS: usize = 800;
/// Smallest overlap between consecutive windows.
pub const MIN_OVERLAP_WORDS: usize = 200;

/// Requested window sizes, in whitespace-delimited words. Values below
/// [`MIN_CHUNK_WORDS`] / [`MIN_OVERLAP_WORDS`] are raised to the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub max_words: usize,
    pub overlap_words: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_words: 500,
            overlap_words: 100,
        }
    }
}

/// Splits text into overlapping word windows.
#[derive(Debug, Clone)]
pub struct Chunker {
    max_words: usize,
    overlap_words: usize,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self, ChunkError> {
        let max_words = config.max_words.max(MIN_CHUNK_WORDS);
        let overlap_words = config.overlap_words.max(MIN_OVERLAP_WORDS);

        // A zero stride would never advance
        if overlap_words >= max_words {
            return Err(ChunkError::InvalidWindow {
                max: max_words,
                overlap: overlap_words,
            });
        }

        Ok(Self {
            max_words,
            overlap_words,
        })
    }

    pub fn effective_max_words(&self) -> usize {
        self.max_words
    }

    pub fn effective_overlap_words(&self) -> usize {
        self.overlap_words
    }

    /// Distance in words between the starts of consecutive windows.
    pub fn stride(&self) -> usize {
        self.max_words - self.overlap_words
    }

    /// Lazily iterate the windows of `text`. Calling this again on the same
    /// text restarts the sequence from the first window.
    pub fn windows<'a>(&self, text: &'a str) -> ChunkWindows<'a> {
        ChunkWindows {
            words: text.split_whitespace().collect(),
            max_words: self.max_words,
            stride: self.stride(),
            next_start: 0,
            index: 0,
        }
    }

    pub fn chunk_text(&self, doc_id: &str, text: &str, source: &str) -> Vec<Chunk> {
        self.windows(text)
            .map(|window| {
                Chunk::new(
                    doc_id.to_string(),
                    window.index,
                    window.text,
                    source.to_string(),
                    (window.start_word, window.end_word),
                )
            })
            .collect()
    }
}

/// One window produced by [`ChunkWindows`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub index: usize,
    pub start_word: usize,
    pub end_word: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ChunkWindows<'a> {
    words: Vec<&'a str>,
    max_words: usize,
    stride: usize,
    next_start: usize,
    index: usize,
}

impl Iterator for ChunkWindows<'_> {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.next_start >= self.words.len() {
            return None;
        }

        let start = self.next_start;
        let end = (start + self.max_words).min(self.words.len());
        let window = Window {
            index: self.index,
            start_word: start,
            end_word: end,
            text: self.words[start..end].join(" "),
        };

        self.next_start += self.stride;
        self.index += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .words
            .len()
            .saturating_sub(self.next_start)
            .div_ceil(self.stride);
        (remaining, Some(remaining))
    }
}
