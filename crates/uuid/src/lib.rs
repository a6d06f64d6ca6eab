//! Identifier utilities for archival packages.
//!
//! Every package carries two kinds of identifier:
//!
//! - **Object identifiers** ([`ObjectId`]): URN-wrapped UUIDs that name a package as a whole.
//!   They appear as the `OBJID` of the structural document, as the `eadid` of the descriptive
//!   document and (with `:` replaced) as the package directory name.
//! - **Component identifiers** ([`AipUuid`]): raw UUIDs used to link sections of the generated
//!   XML documents to each other (`dmdSec`, `amdSec`, `file`, `div`, PREMIS objects and events).
//!
//! ## Component identifier form
//! - Hyphenated, uppercase hexadecimal
//! - Example: `550E8400-E29B-41D4-A716-446655440000`
//! - Rendered as an XML `ID` attribute with a `uuid-` prefix so the value is a valid NCName:
//!   `uuid-550E8400-E29B-41D4-A716-446655440000`
//!
//! ## Object identifier form
//! - `urn:uuid:<uuid>` when no agency code is configured
//! - `urn:<agency>:uuid:<uuid>` otherwise
//!
//! The UUID inside an object identifier is lowercase and hyphenated.
//!
//! Identifiers are generated once and then reused verbatim. Nothing in this crate derives an
//! identifier from content, so regenerating one would break every cross-reference that
//! already points at it.

mod service;

pub use service::{AipUuid, ObjectId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
