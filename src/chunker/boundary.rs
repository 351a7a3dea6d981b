//! Boundary-aware character chunking

use super::{ChunkerConfig, Chunker};
use crate::error::Result;
use crate::index::{Metadata, Passage};

/// Kinds of cut points, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BoundaryKind {
    Paragraph,
    Sentence,
}

/// Chunker that cuts near the target length, snapping to the closest
/// paragraph or sentence break within the tolerance window
pub struct BoundaryChunker {
    config: ChunkerConfig,
}

impl BoundaryChunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Pick the end of the passage starting at `start`.
    ///
    /// Candidates must lie beyond `start + overlap` so the next passage
    /// always begins after this one.
    fn cut_point(&self, chars: &[char], start: usize, target_end: usize) -> usize {
        let tolerance = self.config.tolerance_chars();
        let lo = target_end
            .saturating_sub(tolerance)
            .max(start.saturating_add(self.config.overlap_chars()).saturating_add(1));
        let hi = target_end.saturating_add(tolerance).min(chars.len() - 1);

        let mut best: Option<(BoundaryKind, usize, usize)> = None;
        for pos in lo..=hi {
            let Some(kind) = boundary_at(chars, pos) else {
                continue;
            };
            let candidate = (kind, pos.abs_diff(target_end), pos);
            if best.map_or(true, |b| candidate < b) {
                best = Some(candidate);
            }
        }

        best.map(|(_, _, pos)| pos).unwrap_or(target_end)
    }
}

impl Chunker for BoundaryChunker {
    fn chunk(&self, document_id: &str, text: &str) -> Vec<Passage> {
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let mut passages = Vec::new();

        if n == 0 {
            return passages;
        }

        // Byte offset of every char index, plus the end of the text
        let byte_at: Vec<usize> = text
            .char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(text.len()))
            .collect();

        let target = self.config.target_chars();
        let overlap = self.config.overlap_chars();
        let mut start: usize = 0;

        loop {
            let end = if start.saturating_add(target) >= n {
                n
            } else {
                self.cut_point(&chars, start, start + target)
            };

            let seq = passages.len();
            let mut metadata = Metadata::new();
            metadata.insert("chunk_index".to_string(), serde_json::json!(seq));

            passages.push(Passage {
                id: Passage::make_id(document_id, seq),
                document_id: document_id.to_string(),
                seq,
                start,
                end,
                text: text[byte_at[start]..byte_at[end]].to_string(),
                metadata,
            });

            if end >= n {
                break;
            }

            // Step back by the overlap, never before this passage's start
            start = end.saturating_sub(overlap).max(start + 1);
        }

        passages
    }
}

/// Classify a cut placed just before `chars[pos]`
fn boundary_at(chars: &[char], pos: usize) -> Option<BoundaryKind> {
    if pos < 2 || pos >= chars.len() || chars[pos].is_whitespace() {
        return None;
    }

    if chars[pos - 1] == '\n' && chars[pos - 2] == '\n' {
        return Some(BoundaryKind::Paragraph);
    }

    if !chars[pos - 1].is_whitespace() {
        return None;
    }

    // Walk back over the whitespace run and any closing quotes/brackets
    let mut i = pos - 1;
    while i > 0 && chars[i].is_whitespace() {
        i -= 1;
    }
    while i > 0 && matches!(chars[i], '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}') {
        i -= 1;
    }

    matches!(chars[i], '.' | '!' | '?').then_some(BoundaryKind::Sentence)
}
