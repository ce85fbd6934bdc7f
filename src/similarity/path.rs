//! Path matching across build roots.
//!
//! The same library or object file is usually built from a different
//! enlistment in each build (`p:\os\src\...` vs `w:\dd\root2\src\...`), so
//! exact path comparison is useless. A match requires the filenames to agree
//! and then any of three checks to accept:
//!
//! 1. aligning both paths from the end, enough characters agree;
//! 2. the whole paths are close in edit distance;
//! 3. the directories differ in exactly one segment.

use once_cell::sync::Lazy;
use tracing::trace;

use crate::config::PathSimilarityConfig;

static DEFAULT_PATH_SIMILARITY: Lazy<PathSimilarity> =
    Lazy::new(|| PathSimilarity::new(PathSimilarityConfig::default()));

/// True if `first` and `second` very likely name the same artifact, using
/// default thresholds.
pub fn paths_are_very_similar(first: &str, second: &str) -> bool {
    DEFAULT_PATH_SIMILARITY.are_very_similar(first, second)
}

fn is_separator(c: char) -> bool {
    c == '\\' || c == '/'
}

fn file_name(path: &str) -> &str {
    path.rsplit(is_separator).next().unwrap_or(path)
}

/// Path comparator with configurable thresholds.
#[derive(Debug, Clone, Default)]
pub struct PathSimilarity {
    config: PathSimilarityConfig,
}

impl PathSimilarity {
    pub fn new(config: PathSimilarityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PathSimilarityConfig {
        &self.config
    }

    pub fn are_very_similar(&self, first: &str, second: &str) -> bool {
        let first_file = file_name(first);
        let second_file = file_name(second);
        if first_file.to_lowercase() != second_file.to_lowercase() {
            return false;
        }

        let first = first.to_lowercase();
        let second = second.to_lowercase();
        let file_len = first_file.chars().count();

        let backward = backward_alignment_score(&first, &second, file_len);
        if backward >= self.config.backward_match_threshold {
            trace!(first = %first, second = %second, score = backward, "paths match by suffix");
            return true;
        }

        let edit = edit_similarity(&first, &second);
        if edit >= self.config.edit_similarity_threshold {
            trace!(first = %first, second = %second, score = edit, "paths match by edit distance");
            return true;
        }

        if self.config.accept_single_segment_difference && differ_in_one_segment(&first, &second) {
            trace!(first = %first, second = %second, "paths differ in a single directory");
            return true;
        }

        false
    }
}

/// Fraction of agreeing characters when both paths are aligned on their
/// filename and walked backward. The filename itself counts as agreeing.
///
/// The walk starts at the separator before the filename and stops before
/// either path's first character.
pub fn backward_alignment_score(first: &str, second: &str, file_name_len: usize) -> f64 {
    let first: Vec<char> = first.chars().collect();
    let second: Vec<char> = second.chars().collect();

    let mut same = file_name_len;
    let mut different = 0usize;

    let (Some(mut i), Some(mut j)) = (
        first.len().checked_sub(file_name_len + 1),
        second.len().checked_sub(file_name_len + 1),
    ) else {
        return 1.0;
    };

    while i > 0 && j > 0 {
        if first[i] == second[j] {
            same += 1;
        } else {
            different += 1;
        }
        i -= 1;
        j -= 1;
    }

    if same + different == 0 {
        return 1.0;
    }
    same as f64 / (same + different) as f64
}

/// `1 - levenshtein(first, second) / max(len)`, or 0 when either is empty.
pub fn edit_similarity(first: &str, second: &str) -> f64 {
    if first.is_empty() || second.is_empty() {
        return 0.0;
    }
    if first == second {
        return 1.0;
    }

    let max_len = first.chars().count().max(second.chars().count());
    let distance = strsim::levenshtein(first, second);
    1.0 - distance as f64 / max_len as f64
}

/// True if both paths have the same number of segments and exactly one
/// directory segment differs.
fn differ_in_one_segment(first: &str, second: &str) -> bool {
    let first: Vec<&str> = first.split(is_separator).collect();
    let second: Vec<&str> = second.split(is_separator).collect();
    if first.len() != second.len() || first.len() < 2 {
        return false;
    }

    first.iter().zip(&second).filter(|(a, b)| a != b).count() == 1
}
