//! Identity types for Stockyard agents
//!
//! A fleet agent is addressed by a tenant plus a slash-delimited path.
//! `Tenant`, `AgentPath`, and `OwnerKey` are the only identity currencies in
//! the workspace: registries, storage rows, and peer calls all key on the
//! canonical `OwnerKey` string, never on pointers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Maximum length of a single path segment (and of a SKU).
pub const MAX_SEGMENT_LEN: usize = 32;

/// Maximum length of a SKU string.
pub const MAX_SKU_LEN: usize = 50;

/// Tenant used when a request carries no tenant information.
pub const DEFAULT_TENANT: &str = "demo";

// ============================================================================
// TENANT
// ============================================================================

/// An opaque tenant key. Never empty; used verbatim in owner keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tenant(String);

impl Tenant {
    /// Create a tenant from a raw string, falling back to [`DEFAULT_TENANT`]
    /// when the input is empty or whitespace.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self(DEFAULT_TENANT.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Tenant {
    fn default() -> Self {
        Self(DEFAULT_TENANT.to_string())
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Tenant {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// SEGMENT VALIDATION
// ============================================================================

/// Check whether `c` is allowed inside a path segment or SKU.
fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == ' ' || c == '_' || c == '-'
}

/// Validate a single path segment: trimmed, non-empty, `[A-Za-z0-9 _\-]`,
/// at most [`MAX_SEGMENT_LEN`] characters.
pub fn validate_segment(raw: &str) -> Result<String, ValidationError> {
    let segment = raw.trim();
    if segment.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "segment".to_string(),
        });
    }
    if segment.len() > MAX_SEGMENT_LEN {
        return Err(ValidationError::TooLong {
            field: "segment".to_string(),
            max: MAX_SEGMENT_LEN,
            got: segment.len(),
        });
    }
    if !segment.chars().all(is_segment_char) {
        return Err(ValidationError::InvalidCharacters {
            field: "segment".to_string(),
            value: segment.to_string(),
        });
    }
    Ok(segment.to_string())
}

/// Validate a SKU: trimmed, non-empty, same character class as segments,
/// at most [`MAX_SKU_LEN`] characters.
pub fn validate_sku(raw: &str) -> Result<String, ValidationError> {
    let sku = raw.trim();
    if sku.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "sku".to_string(),
        });
    }
    if sku.len() > MAX_SKU_LEN {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: MAX_SKU_LEN,
            got: sku.len(),
        });
    }
    if !sku.chars().all(is_segment_char) {
        return Err(ValidationError::InvalidCharacters {
            field: "sku".to_string(),
            value: sku.to_string(),
        });
    }
    Ok(sku.to_string())
}

/// Percent-decode a URL path segment.
///
/// Malformed escapes (`%` not followed by two hex digits) are passed through
/// literally; segment validation rejects them afterwards because `%` is not
/// in the allowed character class.
pub fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(hex) = bytes.get(i + 1..i + 3) {
                if let Some(byte) = std::str::from_utf8(hex)
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ============================================================================
// AGENT PATH
// ============================================================================

/// A hierarchical agent location within a tenant.
///
/// Root is the empty segment list; the canonical string form is `/` for root
/// and `/a/b/c` otherwise. Segments are stored percent-decoded; encoding is
/// only applied when constructing URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AgentPath {
    segments: Vec<String>,
}

impl AgentPath {
    /// The root path `/`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash-delimited path, percent-decoding and validating every
    /// segment. `/a/b` and `/a/b/` parse to the same path.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let mut segments = Vec::new();
        for part in raw.split('/') {
            if part.is_empty() {
                continue;
            }
            let decoded = percent_decode(part);
            segments.push(validate_segment(&decoded)?);
        }
        Ok(Self { segments })
    }

    /// Build a path from already-validated segments.
    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The last segment, or `None` at the root.
    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The parent path, or `None` at the root.
    pub fn parent(&self) -> Option<AgentPath> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }

    /// The direct child path under `segment`. The segment is validated.
    pub fn child(&self, segment: &str) -> Result<AgentPath, ValidationError> {
        let segment = validate_segment(segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    /// Canonical string form: `/` for root, `/a/b/c` otherwise.
    pub fn canonical(&self) -> String {
        if self.segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.segments.join("/"))
        }
    }
}

impl fmt::Display for AgentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl FromStr for AgentPath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for AgentPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for AgentPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// OWNER KEY
// ============================================================================

/// The routing and storage key for one agent: `(tenant, canonical path)`.
///
/// The registry guarantees at most one live agent per owner key. The
/// canonical string form is `<tenant>:<canonical-path>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerKey {
    pub tenant: Tenant,
    pub path: AgentPath,
}

impl OwnerKey {
    pub fn new(tenant: Tenant, path: AgentPath) -> Self {
        Self { tenant, path }
    }

    /// Canonical registry/storage key string.
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.tenant, self.path.canonical())
    }

    /// The owner key of the parent agent, or `None` at the root.
    pub fn parent(&self) -> Option<OwnerKey> {
        self.path
            .parent()
            .map(|path| OwnerKey::new(self.tenant.clone(), path))
    }

    /// The owner key of a direct child.
    pub fn child(&self, segment: &str) -> Result<OwnerKey, ValidationError> {
        Ok(OwnerKey::new(self.tenant.clone(), self.path.child(segment)?))
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_path_canonical() {
        let path = AgentPath::parse("/").unwrap();
        assert!(path.is_root());
        assert_eq!(path.canonical(), "/");
        assert_eq!(AgentPath::parse("").unwrap(), path);
    }

    #[test]
    fn test_trailing_slash_is_canonicalized() {
        let a = AgentPath::parse("/a/b").unwrap();
        let b = AgentPath::parse("/a/b/").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.canonical(), "/a/b");
    }

    #[test]
    fn test_segment_length_boundary() {
        let ok = "a".repeat(32);
        let too_long = "a".repeat(33);
        assert!(validate_segment(&ok).is_ok());
        assert!(validate_segment(&too_long).is_err());
    }

    #[test]
    fn test_segment_charset() {
        assert!(validate_segment("warehouse-ny_2 south").is_ok());
        assert!(validate_segment("a.b").is_err());
        assert!(validate_segment("a/b").is_err());
        assert!(validate_segment("").is_err());
        assert!(validate_segment("   ").is_err());
    }

    #[test]
    fn test_percent_decoding() {
        assert_eq!(percent_decode("warehouse%20ny"), "warehouse ny");
        assert_eq!(percent_decode("a%2Db"), "a-b");
        assert_eq!(percent_decode("plain"), "plain");
        // Malformed escapes pass through and fail segment validation.
        assert!(AgentPath::parse("/bad%2").is_err());
    }

    #[test]
    fn test_parent_and_child() {
        let path = AgentPath::parse("/org/store").unwrap();
        assert_eq!(path.parent().unwrap().canonical(), "/org");
        assert_eq!(path.parent().unwrap().parent().unwrap().canonical(), "/");
        assert!(path.parent().unwrap().parent().unwrap().parent().is_none());
        assert_eq!(path.child("aisle-3").unwrap().canonical(), "/org/store/aisle-3");
    }

    #[test]
    fn test_owner_key_canonical() {
        let key = OwnerKey::new(Tenant::new("acme"), AgentPath::parse("/a/b").unwrap());
        assert_eq!(key.canonical(), "acme:/a/b");
        let root = OwnerKey::new(Tenant::default(), AgentPath::root());
        assert_eq!(root.canonical(), "demo:/");
    }

    #[test]
    fn test_tenant_defaults_when_blank() {
        assert_eq!(Tenant::new("").as_str(), "demo");
        assert_eq!(Tenant::new("  ").as_str(), "demo");
        assert_eq!(Tenant::new(" acme ").as_str(), "acme");
    }

    #[test]
    fn test_sku_validation() {
        assert!(validate_sku("SKU-1").is_ok());
        assert!(validate_sku(&"s".repeat(50)).is_ok());
        assert!(validate_sku(&"s".repeat(51)).is_err());
        assert!(validate_sku("SKU/1").is_err());
    }
}
