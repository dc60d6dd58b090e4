//! Chart kind auto-detection

use crate::fingerprint::RequestKind;
use serde_json::Value;
use std::path::Path;

/// Detected kind plus how it was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDetection {
    /// Detected or specified kind
    pub kind: RequestKind,
    /// Detection method used
    pub method: DetectionMethod,
}

/// Method used to detect the chart kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    /// User explicitly specified
    UserSpecified,
    /// File extension (`.vl.json`, `.vg.json`)
    Extension,
    /// `$schema` URL or top-level keys
    Content,
    /// Nothing matched; assumed primary
    Fallback,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserSpecified => write!(f, "user specified"),
            Self::Extension => write!(f, "heuristic (file extension)"),
            Self::Content => write!(f, "heuristic (content analysis)"),
            Self::Fallback => write!(f, "default"),
        }
    }
}

/// Detect the kind of the chart stored at `path` with contents `text`
pub fn detect_kind(path: &Path, text: &str, user_kind: Option<RequestKind>) -> KindDetection {
    let found = |kind, method| KindDetection { kind, method };

    if let Some(kind) = user_kind {
        return found(kind, DetectionMethod::UserSpecified);
    }
    if let Some(kind) = detect_from_extension(path) {
        return found(kind, DetectionMethod::Extension);
    }
    if let Some(kind) = detect_from_content(text) {
        return found(kind, DetectionMethod::Content);
    }
    found(RequestKind::Primary, DetectionMethod::Fallback)
}

fn detect_from_extension(path: &Path) -> Option<RequestKind> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();

    if name.ends_with(".vl.json") || name.ends_with(".vl") || name.ends_with(".vegalite") {
        Some(RequestKind::Derived)
    } else if name.ends_with(".vg.json") || name.ends_with(".vg") || name.ends_with(".vega") {
        Some(RequestKind::Primary)
    } else {
        None
    }
}

fn detect_from_content(text: &str) -> Option<RequestKind> {
    let spec: Value = serde_json::from_str(text).ok()?;
    let object = spec.as_object()?;

    if let Some(schema) = object.get("$schema").and_then(Value::as_str) {
        if schema.contains("vega-lite") {
            return Some(RequestKind::Derived);
        }
        if schema.contains("vega") {
            return Some(RequestKind::Primary);
        }
    }

    // Derived specs describe a single mark or a composition; primary specs
    // list their marks.
    const DERIVED_KEYS: [&str; 7] = ["mark", "layer", "concat", "hconcat", "vconcat", "facet", "repeat"];
    if DERIVED_KEYS.iter().any(|key| object.contains_key(*key)) {
        return Some(RequestKind::Derived);
    }
    if object.contains_key("marks") {
        return Some(RequestKind::Primary);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_kind_wins() {
        let detection = detect_kind(Path::new("a.vl.json"), "{}", Some(RequestKind::Primary));
        assert_eq!(detection.kind, RequestKind::Primary);
        assert_eq!(detection.method, DetectionMethod::UserSpecified);
    }

    #[test]
    fn test_extension() {
        let derived = detect_kind(Path::new("charts/Sales.VL.JSON"), "{}", None);
        assert_eq!(derived.kind, RequestKind::Derived);
        assert_eq!(derived.method, DetectionMethod::Extension);

        let primary = detect_kind(Path::new("sales.vg.json"), r#"{"mark":"bar"}"#, None);
        assert_eq!(primary.kind, RequestKind::Primary);
    }

    #[test]
    fn test_schema_url() {
        let text = r#"{"$schema": "https://vega.github.io/schema/vega-lite/v5.json"}"#;
        let detection = detect_kind(Path::new("chart.json"), text, None);
        assert_eq!(detection.kind, RequestKind::Derived);
        assert_eq!(detection.method, DetectionMethod::Content);

        let text = r#"{"$schema": "https://vega.github.io/schema/vega/v5.json"}"#;
        assert_eq!(detect_kind(Path::new("chart.json"), text, None).kind, RequestKind::Primary);
    }

    #[test]
    fn test_top_level_keys() {
        let derived = detect_kind(Path::new("chart.json"), r#"{"layer": []}"#, None);
        assert_eq!(derived.kind, RequestKind::Derived);

        let primary = detect_kind(Path::new("chart.json"), r#"{"marks": []}"#, None);
        assert_eq!(primary.kind, RequestKind::Primary);
        assert_eq!(primary.method, DetectionMethod::Content);
    }

    #[test]
    fn test_fallback_for_unrecognized_text() {
        let detection = detect_kind(Path::new("chart.txt"), "not json", None);
        assert_eq!(detection.kind, RequestKind::Primary);
        assert_eq!(detection.method, DetectionMethod::Fallback);
    }
}
