//! Recursive character splitter for documents without legal headings
//!
//! Splits on the longest separator present, greedily merges the resulting
//! pieces up to the target chunk size, carries a character overlap between
//! consecutive chunks, and recurses into oversized pieces with the
//! remaining separators. Sizes are measured in characters (Persian text is
//! multi-byte); offsets are byte positions into the source text.

use std::collections::VecDeque;

/// Separator preference order: paragraph, line, then Persian and Latin
/// sentence/phrase punctuation, then single spaces.
pub const DEFAULT_SEPARATORS: [&str; 11] =
    ["\n\n", "\n", "۔", ".", "!", "؟", "?", ";", "،", ",", " "];

/// One chunk of split text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk content, trimmed
    pub text: String,
    /// Byte offset of the trimmed content in the source text
    pub start: usize,
}

/// A contiguous piece of the source produced by one separator pass
#[derive(Debug, Clone, Copy)]
struct Piece<'a> {
    text: &'a str,
    start: usize,
    chars: usize,
}

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_separators(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
    ) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators,
        }
    }

    /// Split text into overlapping chunks no larger than the configured
    /// size (a single unsplittable piece may still exceed it)
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let mut out = Vec::new();
        if !text.is_empty() {
            self.split_inner(text, 0, &self.separators, &mut out);
        }
        out
    }

    fn split_inner(&self, text: &str, base: usize, separators: &[String], out: &mut Vec<TextChunk>) {
        // Longest separator actually present wins; the ones after it are
        // kept for recursion into oversized pieces.
        let mut chosen = None;
        for (i, sep) in separators.iter().enumerate() {
            if text.contains(sep.as_str()) {
                chosen = Some(i);
                break;
            }
        }
        let (separator, rest): (&str, &[String]) = match chosen {
            Some(i) => (&separators[i], &separators[i + 1..]),
            None => match separators.last() {
                Some(last) => (last.as_str(), &[]),
                None => {
                    emit_piece(
                        Piece {
                            text,
                            start: base,
                            chars: text.chars().count(),
                        },
                        out,
                    );
                    return;
                }
            },
        };

        let pieces = split_pieces(text, base, separator);
        let mut run: Vec<Piece> = Vec::new();
        for piece in pieces {
            if piece.chars < self.chunk_size {
                run.push(piece);
                continue;
            }
            if !run.is_empty() {
                self.merge_pieces(&run, out);
                run.clear();
            }
            if rest.is_empty() {
                // No finer separator left; keep the oversized piece whole
                emit_piece(piece, out);
            } else {
                self.split_inner(piece.text, piece.start, rest, out);
            }
        }
        if !run.is_empty() {
            self.merge_pieces(&run, out);
        }
    }

    /// Greedy merge of undersized pieces into chunks, carrying up to
    /// `chunk_overlap` trailing characters into the next chunk
    fn merge_pieces(&self, pieces: &[Piece], out: &mut Vec<TextChunk>) {
        let mut current: VecDeque<Piece> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            if total + piece.chars > self.chunk_size && !current.is_empty() {
                emit_run(&current, out);
                while total > self.chunk_overlap
                    || (total + piece.chars > self.chunk_size && total > 0)
                {
                    match current.pop_front() {
                        Some(front) => total -= front.chars,
                        None => break,
                    }
                }
            }
            current.push_back(*piece);
            total += piece.chars;
        }
        if !current.is_empty() {
            emit_run(&current, out);
        }
    }
}

/// Split on a separator, attaching each occurrence to the start of the
/// following piece so that piece concatenation reproduces the input
fn split_pieces<'a>(text: &'a str, base: usize, separator: &str) -> Vec<Piece<'a>> {
    let mut bounds = vec![0usize];
    if !separator.is_empty() {
        bounds.extend(text.match_indices(separator).map(|(pos, _)| pos));
    }
    bounds.push(text.len());

    let mut pieces = Vec::new();
    for window in bounds.windows(2) {
        let (start, end) = (window[0], window[1]);
        if start >= end {
            continue;
        }
        let slice = &text[start..end];
        pieces.push(Piece {
            text: slice,
            start: base + start,
            chars: slice.chars().count(),
        });
    }
    pieces
}

fn emit_piece(piece: Piece, out: &mut Vec<TextChunk>) {
    let trimmed = piece.text.trim();
    if trimmed.is_empty() {
        return;
    }
    let leading = piece.text.len() - piece.text.trim_start().len();
    out.push(TextChunk {
        text: trimmed.to_string(),
        start: piece.start + leading,
    });
}

fn emit_run(current: &VecDeque<Piece>, out: &mut Vec<TextChunk>) {
    let joined: String = current.iter().map(|p| p.text).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        return;
    }
    let leading = joined.len() - joined.trim_start().len();
    let start = current.front().map(|p| p.start).unwrap_or(0) + leading;
    out.push(TextChunk {
        text: trimmed.to_string(),
        start,
    });
}
