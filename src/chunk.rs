//! Overlapping text chunker.
//!
//! Splits extracted units into chunks bounded by a character budget, with a
//! fixed overlap carried between consecutive chunks so retrieval does not
//! lose meaning at a cut boundary. Cut points are chosen hierarchically:
//! the latest paragraph break inside the budget wins, then a line break,
//! then a sentence end, then a word gap, then a hard cut.
//!
//! Identical input text and parameters always yield identical boundaries.

use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, TextUnit};

/// Split one unit's text into overlapping pieces.
///
/// Each piece is at most `chunk_size` bytes. After a cut, the next piece
/// begins `overlap` bytes before the cut (snapped to a UTF-8 boundary), so
/// the trailing `overlap` characters of one piece open the next.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    debug_assert!(overlap < chunk_size);

    if text.trim().is_empty() {
        return Vec::new();
    }
    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;

    loop {
        if text.len() - start <= chunk_size {
            let tail = &text[start..];
            if !tail.trim().is_empty() {
                pieces.push(tail.to_string());
            }
            break;
        }

        let hard_end = floor_char_boundary(text, start + chunk_size);
        let window = &text[start..hard_end];
        let cut_end = start + pick_cut(window, overlap);

        let piece = &text[start..cut_end];
        if !piece.trim().is_empty() {
            pieces.push(piece.to_string());
        }

        start = ceil_char_boundary(text, cut_end - overlap);
    }

    pieces
}

/// Latest boundary inside the window, preferring coarser separators.
/// A cut must land past the overlap region or the window would never
/// advance; when a separator can't, the next finer one is tried.
fn pick_cut(window: &str, overlap: usize) -> usize {
    for sep in ["\n\n", "\n", ". ", " "] {
        if let Some(pos) = window.rfind(sep) {
            let end = pos + sep.len();
            if end > overlap {
                return end;
            }
        }
    }
    window.len()
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Chunk an ordered sequence of units. Provenance metadata propagates
/// unchanged from each unit to every chunk derived from it; indices are
/// contiguous across the whole sequence.
pub fn chunk_units(units: &[TextUnit], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut index: i64 = 0;

    for unit in units {
        for piece in split_text(&unit.text, config.chunk_size, config.chunk_overlap) {
            chunks.push(Chunk {
                id: Uuid::new_v4().to_string(),
                conversation_id: unit.conversation_id.clone(),
                source: unit.source.clone(),
                chunk_index: index,
                text: piece,
            });
            index += 1;
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str) -> TextUnit {
        TextUnit {
            text: text.to_string(),
            source: "notes.txt".to_string(),
            conversation_id: "c1".to_string(),
        }
    }

    #[test]
    fn small_text_single_piece() {
        let pieces = split_text("Hello, world!", 100, 10);
        assert_eq!(pieces, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn empty_text_no_pieces() {
        assert!(split_text("", 100, 10).is_empty());
        assert!(split_text("   \n  ", 100, 10).is_empty());
    }

    #[test]
    fn deterministic_boundaries() {
        let text = (0..200)
            .map(|i| format!("Sentence number {} ends here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let a = split_text(&text, 300, 40);
        let b = split_text(&text, 300, 40);
        assert_eq!(a, b);
        assert!(a.len() > 1);
    }

    #[test]
    fn pieces_respect_budget() {
        let text = "word ".repeat(500);
        for piece in split_text(&text, 120, 20) {
            assert!(piece.len() <= 120, "piece of {} bytes", piece.len());
        }
    }

    #[test]
    fn consecutive_pieces_share_overlap() {
        let text = (0..300)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let overlap = 20;
        let pieces = split_text(&text, 100, overlap);
        assert!(pieces.len() > 2);
        for pair in pieces.windows(2) {
            let tail = &pair[0][pair[0].len() - overlap..];
            assert!(
                pair[1].starts_with(tail),
                "expected {:?} to open with {:?}",
                &pair[1][..overlap.min(pair[1].len())],
                tail
            );
        }
    }

    #[test]
    fn paragraph_break_preferred_over_hard_cut() {
        let text = format!("{}\n\n{}", "a".repeat(80), "b".repeat(80));
        let pieces = split_text(&text, 100, 10);
        assert!(pieces[0].ends_with("\n\n"));
        assert!(!pieces[0].contains('b'));
    }

    #[test]
    fn sentence_break_used_when_no_newlines() {
        let text = format!("{}. {}", "a".repeat(70), "b".repeat(70));
        let pieces = split_text(&text, 100, 10);
        assert_eq!(pieces[0], format!("{}. ", "a".repeat(70)));
    }

    #[test]
    fn hard_cut_on_unbroken_text() {
        let text = "x".repeat(250);
        let pieces = split_text(&text, 100, 10);
        assert_eq!(pieces[0].len(), 100);
        assert!(pieces.len() >= 3);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "é".repeat(300);
        let pieces = split_text(&text, 101, 10);
        for piece in &pieces {
            assert!(piece.chars().all(|c| c == 'é'));
        }
    }

    #[test]
    fn metadata_propagates_and_indices_are_contiguous() {
        let units = vec![unit(&"alpha ".repeat(50)), unit(&"beta ".repeat(50))];
        let config = ChunkingConfig {
            chunk_size: 80,
            chunk_overlap: 10,
        };
        let chunks = chunk_units(&units, &config);
        assert!(chunks.len() > 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as i64);
            assert_eq!(chunk.source, "notes.txt");
            assert_eq!(chunk.conversation_id, "c1");
        }
    }
}
