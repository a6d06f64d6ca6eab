//! Internal implementation of identifier types.
//!
//! This module contains the implementation details for component and object identifiers used
//! throughout the package builder and validator.

use crate::{UuidError, UuidResult};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Prefix that turns a component identifier into a valid XML `ID` value.
const XML_ID_PREFIX: &str = "uuid-";

/// A component identifier (hyphenated, uppercase hexadecimal UUID).
///
/// This wrapper type guarantees that once constructed, the contained UUID is displayed in the
/// canonical component form. It is used for every internal cross-section link inside the
/// generated XML documents.
///
/// # Construction
/// - [`AipUuid::new`] generates a fresh random identifier.
/// - [`AipUuid::parse`] validates an externally supplied identifier.
///
/// # Errors
/// [`AipUuid::parse`] returns [`UuidError::InvalidInput`] if the input is not already canonical.
///
/// # Display format
/// `550E8400-E29B-41D4-A716-446655440000`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AipUuid(Uuid);

impl Default for AipUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl AipUuid {
    /// Generates a new random component identifier (RFC 4122 version 4).
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a component identifier that must already be canonical.
    ///
    /// Lowercase, simple (unhyphenated) and braced forms are rejected.
    ///
    /// # Arguments
    ///
    /// * `input` - Identifier string to validate. Must be 36 characters, hyphenated, uppercase.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "identifier must be a hyphenated uppercase UUID, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("invalid UUID '{}': {}", input, e)))
    }

    /// Parses an XML `ID` value of the form `uuid-<canonical>`.
    pub fn from_xml_id(input: &str) -> UuidResult<Self> {
        match input.strip_prefix(XML_ID_PREFIX) {
            Some(rest) => Self::parse(rest),
            None => Err(UuidError::InvalidInput(format!(
                "XML identifier must start with '{}', got: '{}'",
                XML_ID_PREFIX, input
            ))),
        }
    }

    /// Returns true if `input` is a hyphenated uppercase UUID.
    ///
    /// Purely syntactic: 36 bytes, hyphens at positions 8, 13, 18 and 23, and `0-9`/`A-F`
    /// everywhere else.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 36
            && input.bytes().enumerate().all(|(i, b)| match i {
                8 | 13 | 18 | 23 => b == b'-',
                _ => matches!(b, b'0'..=b'9' | b'A'..=b'F'),
            })
    }

    /// Returns the underlying `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns the identifier as an XML `ID` attribute value (`uuid-<canonical>`).
    pub fn xml_id(&self) -> String {
        format!("{}{}", XML_ID_PREFIX, self)
    }
}

impl fmt::Display for AipUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0.hyphenated())
    }
}

impl FromStr for AipUuid {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AipUuid::parse(s)
    }
}

/// A URN-wrapped object identifier naming a whole package.
///
/// Format:
/// - `urn:uuid:550e8400-e29b-41d4-a716-446655440000`
/// - `urn:HTJSC:uuid:550e8400-e29b-41d4-a716-446655440000`
///
/// The optional agency code is restricted to ASCII letters, digits, `-` and `.` so that the
/// URN stays unambiguous when split on `:`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId {
    agency: Option<String>,
    uuid: Uuid,
}

impl ObjectId {
    /// Generates a new object identifier, optionally scoped by an agency code.
    ///
    /// A blank agency code is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if the agency code contains characters outside
    /// `[A-Za-z0-9.-]`.
    pub fn new(agency: Option<&str>) -> UuidResult<Self> {
        Self::with_uuid(agency, Uuid::new_v4())
    }

    /// Builds an object identifier from an existing UUID.
    pub fn with_uuid(agency: Option<&str>, uuid: Uuid) -> UuidResult<Self> {
        let agency = match agency.map(str::trim) {
            None | Some("") => None,
            Some(code) => {
                Self::validate_agency(code)?;
                Some(code.to_owned())
            }
        };
        Ok(Self { agency, uuid })
    }

    /// Parses a `urn:uuid:<uuid>` or `urn:<agency>:uuid:<uuid>` string.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if the string does not follow either form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        let invalid = || UuidError::InvalidInput(format!("not a package URN: '{}'", input));

        let parts: Vec<&str> = input.split(':').collect();
        let (agency, raw) = match parts.as_slice() {
            ["urn", "uuid", raw] => (None, *raw),
            ["urn", agency, "uuid", raw] => (Some(*agency), *raw),
            _ => return Err(invalid()),
        };
        let uuid = Uuid::parse_str(raw).map_err(|_| invalid())?;
        Self::with_uuid(agency, uuid)
    }

    /// Returns the agency code, if any.
    pub fn agency(&self) -> Option<&str> {
        self.agency.as_deref()
    }

    /// Returns the UUID wrapped by this URN.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns a form of the identifier that is safe to use as a directory or file name.
    ///
    /// `:` (and any other character outside `[A-Za-z0-9._-]`) becomes `_`, for example
    /// `urn_HTJSC_uuid_550e8400-e29b-41d4-a716-446655440000`.
    pub fn filesystem_name(&self) -> String {
        self.to_string()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    fn validate_agency(code: &str) -> UuidResult<()> {
        let valid = code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.'));
        if !valid || code.eq_ignore_ascii_case("uuid") {
            return Err(UuidError::InvalidInput(format!(
                "agency code may only contain letters, digits, '-' and '.', got: '{}'",
                code
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.agency {
            Some(agency) => write!(f, "urn:{}:uuid:{}", agency, self.uuid.hyphenated()),
            None => write!(f, "urn:uuid:{}", self.uuid.hyphenated()),
        }
    }
}

impl FromStr for ObjectId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse(s)
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    use super::{AipUuid, ObjectId};

    impl serde::Serialize for AipUuid {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> serde::Deserialize<'de> for AipUuid {
        fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            AipUuid::parse(&s).map_err(serde::de::Error::custom)
        }
    }

    impl serde::Serialize for ObjectId {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> serde::Deserialize<'de> for ObjectId {
        fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            ObjectId::parse(&s).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_canonical_uuid() {
        let id = AipUuid::new();
        let text = id.to_string();

        assert_eq!(text.len(), 36);
        assert!(AipUuid::is_canonical(&text));
    }

    #[test]
    fn test_new_generates_distinct_values() {
        assert_ne!(AipUuid::new(), AipUuid::new());
    }

    #[test]
    fn test_parse_valid_canonical_uuid() {
        let canonical = "550E8400-E29B-41D4-A716-446655440000";
        let parsed = AipUuid::parse(canonical).unwrap();

        assert_eq!(parsed.to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_lowercase_uuid() {
        let result = AipUuid::parse("550e8400-e29b-41d4-a716-446655440000");

        match result {
            Err(UuidError::InvalidInput(msg)) => assert!(msg.contains("uppercase")),
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_simple_form() {
        assert!(AipUuid::parse("550E8400E29B41D4A716446655440000").is_err());
    }

    #[test]
    fn test_parse_rejects_misplaced_hyphen() {
        assert!(AipUuid::parse("550E840-0E29B-41D4-A716-446655440000").is_err());
    }

    #[test]
    fn test_xml_id_roundtrips() {
        let id = AipUuid::new();
        let xml_id = id.xml_id();

        assert!(xml_id.starts_with("uuid-"));
        assert_eq!(AipUuid::from_xml_id(&xml_id).unwrap(), id);
    }

    #[test]
    fn test_from_xml_id_requires_prefix() {
        assert!(AipUuid::from_xml_id("550E8400-E29B-41D4-A716-446655440000").is_err());
    }

    #[test]
    fn test_object_id_without_agency() {
        let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let id = ObjectId::with_uuid(None, uuid).unwrap();

        assert_eq!(id.to_string(), "urn:uuid:550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(id.agency(), None);
    }

    #[test]
    fn test_object_id_with_agency() {
        let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let id = ObjectId::with_uuid(Some("HTJSC"), uuid).unwrap();

        assert_eq!(
            id.to_string(),
            "urn:HTJSC:uuid:550e8400-e29b-41d4-a716-446655440000"
        );
        assert_eq!(
            id.filesystem_name(),
            "urn_HTJSC_uuid_550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn test_object_id_blank_agency_is_absent() {
        let id = ObjectId::new(Some("   ")).unwrap();
        assert!(id.to_string().starts_with("urn:uuid:"));
    }

    #[test]
    fn test_object_id_rejects_agency_with_colon() {
        assert!(ObjectId::new(Some("A:B")).is_err());
        assert!(ObjectId::new(Some("uuid")).is_err());
    }

    #[test]
    fn test_object_id_parse_roundtrip() {
        let id = ObjectId::new(Some("HTJSC")).unwrap();
        let parsed: ObjectId = id.to_string().parse().unwrap();

        assert_eq!(parsed, id);
    }

    #[test]
    fn test_object_id_parse_rejects_garbage() {
        assert!(ObjectId::parse("uuid:550e8400-e29b-41d4-a716-446655440000").is_err());
        assert!(ObjectId::parse("urn:uuid:not-a-uuid").is_err());
        assert!(ObjectId::parse("urn:a:b:uuid:550e8400-e29b-41d4-a716-446655440000").is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = AipUuid::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: AipUuid = serde_json::from_str(&json).unwrap();

        assert_eq!(back, id);
    }
}
