//! Integration tests for CLI functionality

#[cfg(feature = "cli")]
mod cli_integration_tests {
    use std::fs;
    use tempfile::TempDir;

    use chartcache::cli::args::{CacheArgs, KindArg};
    use chartcache::cli::commands::cmd_fingerprint;
    use chartcache::cli::detect::{detect_kind, DetectionMethod};
    use chartcache::{CacheConfig, RequestKind};

    #[test]
    fn test_detect_derived_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        let chart_path = temp_dir.path().join("sales.vl.json");
        let text = r#"{"marks": []}"#;
        fs::write(&chart_path, text).unwrap();

        // Extension outranks content
        let detection = detect_kind(&chart_path, text, None);
        assert_eq!(detection.kind, RequestKind::Derived);
        assert_eq!(detection.method, DetectionMethod::Extension);
    }

    #[test]
    fn test_detect_by_content() {
        let temp_dir = TempDir::new().unwrap();
        let chart_path = temp_dir.path().join("chart.json");
        let text = r#"{"vconcat": [{"mark": "bar"}, {"mark": "line"}]}"#;
        fs::write(&chart_path, text).unwrap();

        let detection = detect_kind(&chart_path, text, None);
        assert_eq!(detection.kind, RequestKind::Derived);
        assert_eq!(detection.method, DetectionMethod::Content);
    }

    #[test]
    fn test_user_specified_kind_override() {
        let temp_dir = TempDir::new().unwrap();
        let chart_path = temp_dir.path().join("chart.vl.json");
        fs::write(&chart_path, "{}").unwrap();

        let detection = detect_kind(&chart_path, "{}", Some(KindArg::Vega.into()));
        assert_eq!(detection.kind, RequestKind::Primary);
        assert_eq!(detection.method, DetectionMethod::UserSpecified);
    }

    #[test]
    fn test_fingerprint_command_reads_file() {
        let temp_dir = TempDir::new().unwrap();
        let chart_path = temp_dir.path().join("chart.vg.json");
        fs::write(&chart_path, r#"{"marks": []}"#).unwrap();

        assert!(cmd_fingerprint(&chart_path, None).is_ok());
        assert!(cmd_fingerprint(&temp_dir.path().join("missing.json"), None).is_err());
    }

    #[test]
    fn test_empty_cache_args_keep_defaults() {
        assert_eq!(CacheArgs::default().to_config(), CacheConfig::default());
    }
}
