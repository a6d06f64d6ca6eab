//! Identifier slots for generated XML components.
//!
//! Each slot names exactly one producer (the element that carries the `ID`) and is referenced by
//! the elements that must point at it. Slots are filled once when the owning record or item is
//! constructed and are never regenerated.

use aip_uuid::AipUuid;

/// Identifier slots owned by a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIdentifiers {
    // Root structural document
    pub mets_hdr: AipUuid,
    pub dmd_sec: AipUuid,
    pub amd_sec: AipUuid,
    pub digiprov_md: AipUuid,
    pub file_sec: AipUuid,
    pub schemas_file_grp: AipUuid,
    pub rep_file_grp: AipUuid,
    pub rep_mets_file: AipUuid,
    pub struct_map: AipUuid,
    pub root_div: AipUuid,
    pub metadata_div: AipUuid,
    pub schemas_div: AipUuid,
    pub rep_div: AipUuid,
    pub schema_files: [AipUuid; 3],

    // Representation structural document
    pub rep_mets: AipUuid,
    pub rep_mets_hdr: AipUuid,
    pub rep_amd_sec: AipUuid,
    pub rep_digiprov_md: AipUuid,
    pub rep_file_sec: AipUuid,
    pub rep_data_file_grp: AipUuid,
    pub rep_struct_map: AipUuid,
    pub rep_root_div: AipUuid,
    pub rep_metadata_div: AipUuid,
    pub rep_data_div: AipUuid,

    // Preservation documents
    pub premis_package_object: AipUuid,
    pub premis_rep_object: AipUuid,
    pub premis_ingest_event: AipUuid,
    pub premis_validation_event: AipUuid,
    pub premis_rep_creation_event: AipUuid,
    pub premis_software_agent: AipUuid,
    pub premis_organization_agent: AipUuid,
}

impl RecordIdentifiers {
    pub fn generate() -> Self {
        Self {
            mets_hdr: AipUuid::new(),
            dmd_sec: AipUuid::new(),
            amd_sec: AipUuid::new(),
            digiprov_md: AipUuid::new(),
            file_sec: AipUuid::new(),
            schemas_file_grp: AipUuid::new(),
            rep_file_grp: AipUuid::new(),
            rep_mets_file: AipUuid::new(),
            struct_map: AipUuid::new(),
            root_div: AipUuid::new(),
            metadata_div: AipUuid::new(),
            schemas_div: AipUuid::new(),
            rep_div: AipUuid::new(),
            schema_files: [AipUuid::new(), AipUuid::new(), AipUuid::new()],
            rep_mets: AipUuid::new(),
            rep_mets_hdr: AipUuid::new(),
            rep_amd_sec: AipUuid::new(),
            rep_digiprov_md: AipUuid::new(),
            rep_file_sec: AipUuid::new(),
            rep_data_file_grp: AipUuid::new(),
            rep_struct_map: AipUuid::new(),
            rep_root_div: AipUuid::new(),
            rep_metadata_div: AipUuid::new(),
            rep_data_div: AipUuid::new(),
            premis_package_object: AipUuid::new(),
            premis_rep_object: AipUuid::new(),
            premis_ingest_event: AipUuid::new(),
            premis_validation_event: AipUuid::new(),
            premis_rep_creation_event: AipUuid::new(),
            premis_software_agent: AipUuid::new(),
            premis_organization_agent: AipUuid::new(),
        }
    }

    /// Every slot, in declaration order.
    pub fn all(&self) -> Vec<AipUuid> {
        let mut ids = vec![
            self.mets_hdr,
            self.dmd_sec,
            self.amd_sec,
            self.digiprov_md,
            self.file_sec,
            self.schemas_file_grp,
            self.rep_file_grp,
            self.rep_mets_file,
            self.struct_map,
            self.root_div,
            self.metadata_div,
            self.schemas_div,
            self.rep_div,
        ];
        ids.extend_from_slice(&self.schema_files);
        ids.extend_from_slice(&[
            self.rep_mets,
            self.rep_mets_hdr,
            self.rep_amd_sec,
            self.rep_digiprov_md,
            self.rep_file_sec,
            self.rep_data_file_grp,
            self.rep_struct_map,
            self.rep_root_div,
            self.rep_metadata_div,
            self.rep_data_div,
            self.premis_package_object,
            self.premis_rep_object,
            self.premis_ingest_event,
            self.premis_validation_event,
            self.premis_rep_creation_event,
            self.premis_software_agent,
            self.premis_organization_agent,
        ]);
        ids
    }
}

/// Identifier slots owned by an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemIdentifiers {
    /// Identity of the item, independent of its sequence number
    pub item_id: AipUuid,
    /// `file` element in both structural documents
    pub file: AipUuid,
    /// `dmdSec` pointing at the item's descriptive document
    pub dmd_sec: AipUuid,
    /// PREMIS file object
    pub premis_object: AipUuid,
}

impl ItemIdentifiers {
    pub fn generate() -> Self {
        Self {
            item_id: AipUuid::new(),
            file: AipUuid::new(),
            dmd_sec: AipUuid::new(),
            premis_object: AipUuid::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_record_slots_are_distinct() {
        let ids = RecordIdentifiers::generate();
        let all = ids.all();
        let unique: HashSet<_> = all.iter().collect();

        assert_eq!(all.len(), 33);
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_clone_preserves_slots() {
        let ids = RecordIdentifiers::generate();
        assert_eq!(ids.clone(), ids);
    }
}
