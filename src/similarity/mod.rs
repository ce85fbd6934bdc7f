//! Similarity heuristics used when pairing entities across two builds.

pub mod path;

pub use path::{paths_are_very_similar, PathSimilarity};
