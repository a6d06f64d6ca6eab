//! Records, items and their identifier slots.
//!
//! A [`Record`] is built from manifest data with no items; the grouper later attaches one
//! [`Item`] per content file found in the record's folder, and the package builder fills in each
//! item's [`ContentFacts`] after copying. Identifiers are allocated at construction and are
//! never touched afterwards.

mod identifiers;
mod item;
mod record;

pub use identifiers::{ItemIdentifiers, RecordIdentifiers};
pub use item::{ContentFacts, Item, ItemDescription};
pub use record::{Record, RecordDescription};
