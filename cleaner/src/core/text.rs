//! Line-level classification of infected script files.

use crate::core::signatures::SignatureSet;

/// Content written over a file whose lines are mostly infected.
pub const REMEDIATED_NOTICE: &str = "# This file was cleaned of problematic code by maya cleaner\n\
# The original content was saved to the cleaner backup directory\n";

/// Classification of a text file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextVerdict {
    /// No file-level signature present; leave the file alone.
    Clean,
    /// Infected lines are at most half of the file; keep the rest.
    Partial {
        /// Surviving lines joined with `\n`.
        content: String,
        removed: usize,
        kept: usize,
    },
    /// Infected lines outnumber clean ones; replace with [`REMEDIATED_NOTICE`].
    Heavy { infected: usize, clean: usize },
}

impl TextVerdict {
    /// Content that should replace the file, or `None` when it is clean.
    pub fn replacement(&self) -> Option<&str> {
        match self {
            TextVerdict::Clean => None,
            TextVerdict::Partial { content, .. } => Some(content),
            TextVerdict::Heavy { .. } => Some(REMEDIATED_NOTICE),
        }
    }
}

/// Classify script content against `signatures`.
///
/// - `Clean` if no file-level token occurs anywhere.
/// - `Heavy` if flagged lines strictly outnumber the remaining lines.
/// - `Partial` otherwise, with the unflagged lines in original order.
pub fn classify_text(content: &str, signatures: &SignatureSet) -> TextVerdict {
    if !signatures.matches_file(content) {
        return TextVerdict::Clean;
    }

    let (infected, clean): (Vec<&str>, Vec<&str>) = content
        .lines()
        .partition(|line| signatures.matches_line(line));

    if infected.len() > clean.len() {
        TextVerdict::Heavy {
            infected: infected.len(),
            clean: clean.len(),
        }
    } else {
        TextVerdict::Partial {
            content: clean.join("\n"),
            removed: infected.len(),
            kept: clean.len(),
        }
    }
}
