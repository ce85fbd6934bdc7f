use sizediff::config::*;
use sizediff::core::DEFAULT_MAX_PADDING;
use sizediff::similarity::PathSimilarity;
use std::io::Write;

#[test]
fn test_diff_config_defaults() {
    let config = DiffConfig::default();

    assert_eq!(config.path_similarity.backward_match_threshold, 0.80);
    assert_eq!(config.path_similarity.edit_similarity_threshold, 0.85);
    assert!(config.path_similarity.accept_single_segment_difference);
    assert_eq!(config.ranges.section_max_padding, DEFAULT_MAX_PADDING);
    assert_eq!(config.progress.entity_interval, 5);
    assert_eq!(config.progress.symbol_interval, 100);
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "path_similarity": {{ "accept_single_segment_difference": false }},
             "progress": {{ "symbol_interval": 1000 }} }}"#
    )
    .unwrap();

    let config = DiffConfig::from_file(file.path()).unwrap();
    assert!(!config.path_similarity.accept_single_segment_difference);
    assert_eq!(config.progress.symbol_interval, 1000);
    assert_eq!(config.progress.entity_interval, 5);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DiffConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, sizediff::DiffError::Io(_)));
}

#[test]
fn test_disabling_segment_rule_changes_matching() {
    let before = r"c:\x\y\before\foo.lib";
    let after = r"c:\x\y\after\foo.lib";
    assert!(PathSimilarity::new(PathSimilarityConfig::default()).are_very_similar(before, after));

    let strict = PathSimilarityConfig {
        accept_single_segment_difference: false,
        ..Default::default()
    };
    assert!(!PathSimilarity::new(strict).are_very_similar(before, after));
}
