//! Content fingerprints for render requests.
//!
//! A [`Fingerprint`] is a pure function of the request kind and the exact
//! source text. The hash input is framed as
//!
//! ```text
//! ┌──────────────────────┬──────────┬──────────────────┬───────────────┐
//! │ FINGERPRINT_VERSION  │ kind tag │ text length (LE) │ text bytes    │
//! │ (fixed bytes)        │ (1 byte) │ (8 bytes)        │ (len bytes)   │
//! └──────────────────────┴──────────┴──────────────────┴───────────────┘
//! ```
//!
//! so two different `(kind, text)` pairs never produce the same hash input.
//! Bumping [`FINGERPRINT_VERSION`] invalidates every previously cached entry.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Versioned prefix folded into every fingerprint.
pub const FINGERPRINT_VERSION: &[u8] = b"chartcache/render/v1\0";

/// Which chart dialect a request is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestKind {
    /// Low-level grammar (e.g. Vega), rendered directly.
    Primary,
    /// High-level grammar (e.g. Vega-Lite), compiled to [`RequestKind::Primary`] first.
    Derived,
}

impl RequestKind {
    /// Tag byte folded into the fingerprint.
    #[inline]
    const fn tag(self) -> u8 {
        match self {
            RequestKind::Primary => 0x01,
            RequestKind::Derived => 0x02,
        }
    }

    /// Canonical fence name for this dialect.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Primary => "vega",
            RequestKind::Derived => "vega-lite",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a fence tag names no known dialect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown chart kind: {0}")]
pub struct ParseKindError(pub String);

impl FromStr for RequestKind {
    type Err = ParseKindError;

    /// Parses a code fence tag.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chartcache::RequestKind;
    ///
    /// assert_eq!("vega".parse(), Ok(RequestKind::Primary));
    /// assert_eq!("Vega-Lite".parse(), Ok(RequestKind::Derived));
    /// assert!("mermaid".parse::<RequestKind>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vega" | "primary" => Ok(RequestKind::Primary),
            "vega-lite" | "vegalite" | "derived" => Ok(RequestKind::Derived),
            _ => Err(ParseKindError(s.to_string())),
        }
    }
}

/// Opaque 32-byte identifier of a render request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Raw digest bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First eight hex digits, used in log lines.
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

/// Computes the fingerprint of a request.
///
/// # Examples
///
/// ```rust
/// use chartcache::{fingerprint, RequestKind};
///
/// let text = r#"{"mark":"bar"}"#;
/// let a = fingerprint(RequestKind::Primary, text);
///
/// assert_eq!(a, fingerprint(RequestKind::Primary, text));
/// assert_ne!(a, fingerprint(RequestKind::Derived, text));
/// ```
pub fn fingerprint(kind: RequestKind, text: &str) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(FINGERPRINT_VERSION);
    hasher.update(&[kind.tag()]);
    hasher.update(&(text.len() as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    Fingerprint(*hasher.finalize().as_bytes())
}
