//! Built-in XML renderer.
//!
//! Every document is a tree of serde structs written with `quick_xml::se`. Fields renamed with
//! an `@` prefix become attributes, `$text` becomes element text and every other field becomes a
//! child element. Attribute fields are declared ahead of element fields.

use super::placeholders::Placeholder;
use super::{DocumentKind, DocumentRenderer, ItemContext, PackageContext};
use crate::constants::{
    CHECKSUM_TYPE, CONTENT_FORMAT_NAME, CONTENT_HREF_PREFIX, CONTENT_MEDIA_TYPE, CSIP_NS,
    CSIP_PROFILE, EAD_NS, PACKAGE_CONTENT_TYPE, PREMIS_NS, PREMIS_VERSION, REP_METS_PATH,
    REPRESENTATION_NAME, ROOT_EAD_PATH, ROOT_PREMIS_PATH, SCHEMAS_DIR, METS_NS, XLINK_NS, XSI_NS,
};
use crate::model::Record;
use crate::{AipError, AipResult};
use quick_xml::se::to_string_with_root;
use quick_xml::DeError;
use serde::Serialize;

/// Renders every document from in-code document models.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlTemplates;

impl DocumentRenderer for XmlTemplates {
    fn render_package(&self, kind: DocumentKind, context: &PackageContext<'_>) -> AipResult<String> {
        let rendered = match kind {
            DocumentKind::RootMets => to_xml("mets:mets", &root_mets(context)),
            DocumentKind::RepresentationMets => {
                to_xml("mets:mets", &representation_mets(context))
            }
            DocumentKind::PackageEad => to_xml("ead", &package_ead(context)),
            DocumentKind::PackagePremis => to_xml("premis:premis", &package_premis(context)),
            DocumentKind::RepresentationPremis => {
                to_xml("premis:premis", &representation_premis(context))
            }
        };
        rendered.map_err(|e| AipError::Render {
            document: kind.to_string(),
            reason: e.to_string(),
        })
    }

    fn render_item(&self, context: &ItemContext<'_>) -> AipResult<String> {
        to_xml("ead", &item_ead(context)).map_err(|e| AipError::Render {
            document: context.item.doc_descriptor_filename().to_owned(),
            reason: e.to_string(),
        })
    }
}

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

fn to_xml<T: Serialize>(root: &str, document: &T) -> Result<String, DeError> {
    let body = to_string_with_root(root, document)?;
    Ok(format!("{}\n{}\n", XML_DECL, body))
}

fn opt(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

// ---------------------------------------------------------------------------
// Structural documents
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Mets {
    #[serde(rename = "@xmlns:mets")]
    xmlns_mets: &'static str,
    #[serde(rename = "@xmlns:csip")]
    xmlns_csip: &'static str,
    #[serde(rename = "@xmlns:xlink")]
    xmlns_xlink: &'static str,
    #[serde(rename = "@xmlns:xsi")]
    xmlns_xsi: &'static str,
    #[serde(rename = "@xsi:schemaLocation")]
    schema_location: String,
    #[serde(rename = "@OBJID")]
    objid: String,
    #[serde(rename = "@LABEL")]
    label: String,
    #[serde(rename = "@TYPE")]
    content_type: &'static str,
    #[serde(rename = "@csip:CONTENTINFORMATIONTYPE")]
    content_information_type: &'static str,
    #[serde(rename = "@PROFILE")]
    profile: &'static str,
    #[serde(rename = "@csip:OAISPACKAGETYPE")]
    package_type: &'static str,

    #[serde(rename = "mets:metsHdr")]
    header: MetsHeader,
    #[serde(rename = "mets:dmdSec")]
    dmd_secs: Vec<MdSec>,
    #[serde(rename = "mets:amdSec")]
    amd_sec: AmdSec,
    #[serde(rename = "mets:fileSec")]
    file_sec: FileSec,
    #[serde(rename = "mets:structMap")]
    struct_map: StructMap,
}

#[derive(Debug, Serialize)]
struct MetsHeader {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "@CREATEDATE")]
    created: String,
    #[serde(rename = "@LASTMODDATE")]
    modified: String,
    #[serde(rename = "@RECORDSTATUS")]
    status: &'static str,
    #[serde(rename = "@csip:OAISPACKAGETYPE")]
    package_type: &'static str,
    #[serde(rename = "mets:agent")]
    agents: Vec<MetsAgent>,
}

#[derive(Debug, Serialize)]
struct MetsAgent {
    #[serde(rename = "@ROLE")]
    role: &'static str,
    #[serde(rename = "@TYPE")]
    kind: &'static str,
    #[serde(rename = "@OTHERTYPE", skip_serializing_if = "Option::is_none")]
    other_type: Option<&'static str>,
    #[serde(rename = "mets:name")]
    name: String,
    #[serde(rename = "mets:note", skip_serializing_if = "Option::is_none")]
    note: Option<MetsNote>,
}

#[derive(Debug, Serialize)]
struct MetsNote {
    #[serde(rename = "@csip:NOTETYPE")]
    note_type: &'static str,
    #[serde(rename = "$text")]
    text: String,
}

/// `dmdSec` and `digiprovMD` share one shape.
#[derive(Debug, Serialize)]
struct MdSec {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "@CREATED")]
    created: String,
    #[serde(rename = "@STATUS")]
    status: &'static str,
    #[serde(rename = "mets:mdRef")]
    md_ref: MdRef,
}

#[derive(Debug, Serialize)]
struct MdRef {
    #[serde(rename = "@LOCTYPE")]
    loctype: &'static str,
    #[serde(rename = "@MDTYPE")]
    mdtype: &'static str,
    #[serde(rename = "@MIMETYPE")]
    mimetype: &'static str,
    #[serde(rename = "@xlink:type")]
    link_type: &'static str,
    #[serde(rename = "@xlink:href")]
    href: String,
    #[serde(rename = "@SIZE")]
    size: String,
    #[serde(rename = "@CREATED")]
    created: String,
    #[serde(rename = "@CHECKSUM")]
    checksum: String,
    #[serde(rename = "@CHECKSUMTYPE")]
    checksum_type: &'static str,
}

#[derive(Debug, Serialize)]
struct AmdSec {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "mets:digiprovMD")]
    digiprov: MdSec,
}

#[derive(Debug, Serialize)]
struct FileSec {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "mets:fileGrp")]
    groups: Vec<FileGrp>,
}

#[derive(Debug, Serialize)]
struct FileGrp {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "@USE")]
    usage: String,
    #[serde(rename = "mets:file")]
    files: Vec<MetsFile>,
}

#[derive(Debug, Serialize)]
struct MetsFile {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "@MIMETYPE")]
    mimetype: &'static str,
    #[serde(rename = "@SIZE")]
    size: String,
    #[serde(rename = "@CREATED")]
    created: String,
    #[serde(rename = "@CHECKSUM")]
    checksum: String,
    #[serde(rename = "@CHECKSUMTYPE")]
    checksum_type: &'static str,
    #[serde(rename = "@DMDID", skip_serializing_if = "Option::is_none")]
    dmdid: Option<String>,
    #[serde(rename = "@SEQ", skip_serializing_if = "Option::is_none")]
    seq: Option<u32>,
    #[serde(rename = "mets:FLocat")]
    location: FLocat,
}

#[derive(Debug, Serialize)]
struct FLocat {
    #[serde(rename = "@LOCTYPE")]
    loctype: &'static str,
    #[serde(rename = "@xlink:type")]
    link_type: &'static str,
    #[serde(rename = "@xlink:href")]
    href: String,
}

impl FLocat {
    fn url(href: String) -> Self {
        Self {
            loctype: "URL",
            link_type: "simple",
            href,
        }
    }
}

#[derive(Debug, Serialize)]
struct StructMap {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "@TYPE")]
    kind: &'static str,
    #[serde(rename = "@LABEL")]
    label: &'static str,
    #[serde(rename = "mets:div")]
    root: Div,
}

#[derive(Debug, Default, Serialize)]
struct Div {
    #[serde(rename = "@ID", skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "@LABEL")]
    label: String,
    #[serde(rename = "@ORDER", skip_serializing_if = "Option::is_none")]
    order: Option<u32>,
    #[serde(rename = "@DMDID", skip_serializing_if = "Option::is_none")]
    dmdid: Option<String>,
    #[serde(rename = "@ADMID", skip_serializing_if = "Option::is_none")]
    admid: Option<String>,
    #[serde(rename = "mets:mptr", skip_serializing_if = "Option::is_none")]
    mptr: Option<Mptr>,
    #[serde(rename = "mets:fptr")]
    fptrs: Vec<Fptr>,
    #[serde(rename = "mets:div")]
    divs: Vec<Div>,
}

impl Div {
    fn new(id: String, label: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            label: label.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct Mptr {
    #[serde(rename = "@LOCTYPE")]
    loctype: &'static str,
    #[serde(rename = "@xlink:type")]
    link_type: &'static str,
    #[serde(rename = "@xlink:href")]
    href: &'static str,
    #[serde(rename = "@xlink:title")]
    title: String,
}

#[derive(Debug, Serialize)]
struct Fptr {
    #[serde(rename = "@FILEID")]
    file_id: String,
}

impl Mets {
    #[allow(clippy::too_many_arguments)]
    fn new(
        objid: String,
        label: String,
        schema_prefix: &str,
        header: MetsHeader,
        dmd_secs: Vec<MdSec>,
        amd_sec: AmdSec,
        file_sec: FileSec,
        struct_map: StructMap,
    ) -> Self {
        Self {
            xmlns_mets: METS_NS,
            xmlns_csip: CSIP_NS,
            xmlns_xlink: XLINK_NS,
            xmlns_xsi: XSI_NS,
            schema_location: format!("{} {}{}/mets.xsd", METS_NS, schema_prefix, SCHEMAS_DIR),
            objid,
            label,
            content_type: PACKAGE_CONTENT_TYPE,
            content_information_type: "MIXED",
            profile: CSIP_PROFILE,
            package_type: "AIP",
            header,
            dmd_secs,
            amd_sec,
            file_sec,
            struct_map,
        }
    }
}

fn mets_header(id: String, context: &PackageContext<'_>) -> MetsHeader {
    let ts = context.timestamp();
    let organization = context
        .record
        .effective_organization(context.config.organization_name());
    MetsHeader {
        id,
        created: ts.clone(),
        modified: ts,
        status: "NEW",
        package_type: "AIP",
        agents: vec![
            MetsAgent {
                role: "CREATOR",
                kind: "OTHER",
                other_type: Some("SOFTWARE"),
                name: context.config.agent_name().to_owned(),
                note: Some(MetsNote {
                    note_type: "SOFTWARE VERSION",
                    text: context.config.agent_version().to_owned(),
                }),
            },
            MetsAgent {
                role: "ARCHIVIST",
                kind: "ORGANIZATION",
                other_type: None,
                name: organization.to_owned(),
                note: None,
            },
        ],
    }
}

/// Metadata section pointing at a document whose size and digest are backfilled later.
fn md_sec(
    id: String,
    created: &str,
    mdtype: &'static str,
    href: String,
    placeholder: Placeholder,
) -> MdSec {
    MdSec {
        id,
        created: created.to_owned(),
        status: "CURRENT",
        md_ref: MdRef {
            loctype: "URL",
            mdtype,
            mimetype: "text/xml",
            link_type: "simple",
            href,
            size: placeholder.size_token(),
            created: created.to_owned(),
            checksum: placeholder.checksum_token(),
            checksum_type: CHECKSUM_TYPE,
        },
    }
}

fn root_mets(context: &PackageContext<'_>) -> Mets {
    let record = context.record;
    let ids = record.identifiers();
    let objid = record.object_id().to_string();
    let ts = context.timestamp();

    let schema_files = context
        .schemas
        .iter()
        .zip(ids.schema_files.iter())
        .map(|(schema, id)| MetsFile {
            id: id.xml_id(),
            mimetype: "application/xml",
            size: schema.size_bytes.to_string(),
            created: ts.clone(),
            checksum: schema.sha256.to_string(),
            checksum_type: CHECKSUM_TYPE,
            dmdid: None,
            seq: None,
            location: FLocat::url(format!("{}/{}", SCHEMAS_DIR, schema.filename)),
        })
        .collect();

    let mut rep_files = vec![MetsFile {
        id: ids.rep_mets_file.xml_id(),
        mimetype: "text/xml",
        size: Placeholder::RepresentationMets.size_token(),
        created: ts.clone(),
        checksum: Placeholder::RepresentationMets.checksum_token(),
        checksum_type: CHECKSUM_TYPE,
        dmdid: None,
        seq: None,
        location: FLocat::url(REP_METS_PATH.to_owned()),
    }];
    rep_files.extend(context.copied_items().map(|(item, facts)| MetsFile {
        id: item.identifiers().file.xml_id(),
        mimetype: CONTENT_MEDIA_TYPE,
        size: facts.size_bytes.to_string(),
        created: ts.clone(),
        checksum: facts.sha256.to_string(),
        checksum_type: CHECKSUM_TYPE,
        dmdid: None,
        seq: None,
        location: FLocat::url(format!("{}{}", CONTENT_HREF_PREFIX, facts.final_filename)),
    }));

    let mut schemas_div = Div::new(ids.schemas_div.xml_id(), "Schemas");
    schemas_div.fptrs = ids
        .schema_files
        .iter()
        .take(context.schemas.len())
        .map(|id| Fptr { file_id: id.xml_id() })
        .collect();

    let mut rep_div = Div::new(
        ids.rep_div.xml_id(),
        format!("Representations/{}", REPRESENTATION_NAME),
    );
    rep_div.mptr = Some(Mptr {
        loctype: "URL",
        link_type: "simple",
        href: REP_METS_PATH,
        title: ids.rep_mets_file.xml_id(),
    });
    rep_div.fptrs = context
        .copied_items()
        .map(|(item, _)| Fptr {
            file_id: item.identifiers().file.xml_id(),
        })
        .collect();

    let mut metadata_div = Div::new(ids.metadata_div.xml_id(), "Metadata");
    metadata_div.dmdid = Some(ids.dmd_sec.xml_id());
    metadata_div.admid = Some(ids.amd_sec.xml_id());

    let mut root_div = Div::new(ids.root_div.xml_id(), objid.clone());
    root_div.divs = vec![metadata_div, schemas_div, rep_div];

    Mets::new(
        objid,
        record.effective_title(),
        "",
        mets_header(ids.mets_hdr.xml_id(), context),
        vec![md_sec(
            ids.dmd_sec.xml_id(),
            &ts,
            "EAD",
            ROOT_EAD_PATH.to_owned(),
            Placeholder::PackageEad,
        )],
        AmdSec {
            id: ids.amd_sec.xml_id(),
            digiprov: md_sec(
                ids.digiprov_md.xml_id(),
                &ts,
                "PREMIS",
                ROOT_PREMIS_PATH.to_owned(),
                Placeholder::PackagePremis,
            ),
        },
        FileSec {
            id: ids.file_sec.xml_id(),
            groups: vec![
                FileGrp {
                    id: ids.schemas_file_grp.xml_id(),
                    usage: "Schemas".into(),
                    files: schema_files,
                },
                FileGrp {
                    id: ids.rep_file_grp.xml_id(),
                    usage: format!("Representations/{}", REPRESENTATION_NAME),
                    files: rep_files,
                },
            ],
        },
        StructMap {
            id: ids.struct_map.xml_id(),
            kind: "PHYSICAL",
            label: "CSIP",
            root: root_div,
        },
    )
}

fn representation_mets(context: &PackageContext<'_>) -> Mets {
    let record = context.record;
    let ids = record.identifiers();
    let objid = format!("{}_{}", record.object_id(), REPRESENTATION_NAME);
    let ts = context.timestamp();

    let dmd_secs = context
        .copied_items()
        .map(|(item, _)| {
            md_sec(
                item.identifiers().dmd_sec.xml_id(),
                &ts,
                "EAD",
                format!("metadata/descriptive/{}", item.doc_descriptor_filename()),
                Placeholder::ItemEad(item.sequence_number()),
            )
        })
        .collect();

    let data_files = context
        .copied_items()
        .map(|(item, facts)| MetsFile {
            id: item.identifiers().file.xml_id(),
            mimetype: CONTENT_MEDIA_TYPE,
            size: facts.size_bytes.to_string(),
            created: ts.clone(),
            checksum: facts.sha256.to_string(),
            checksum_type: CHECKSUM_TYPE,
            dmdid: Some(item.identifiers().dmd_sec.xml_id()),
            seq: Some(item.sequence_number()),
            location: FLocat::url(format!("data/{}", facts.final_filename)),
        })
        .collect();

    let mut metadata_div = Div::new(ids.rep_metadata_div.xml_id(), "Metadata");
    metadata_div.admid = Some(ids.rep_amd_sec.xml_id());

    let mut data_div = Div::new(ids.rep_data_div.xml_id(), "Data");
    data_div.divs = context
        .copied_items()
        .map(|(item, _)| Div {
            label: item.effective_title(),
            order: Some(item.sequence_number()),
            dmdid: Some(item.identifiers().dmd_sec.xml_id()),
            fptrs: vec![Fptr {
                file_id: item.identifiers().file.xml_id(),
            }],
            ..Div::default()
        })
        .collect();

    let mut root_div = Div::new(ids.rep_root_div.xml_id(), objid.clone());
    root_div.divs = vec![metadata_div, data_div];

    Mets::new(
        objid,
        record.effective_title(),
        "../../",
        mets_header(ids.rep_mets_hdr.xml_id(), context),
        dmd_secs,
        AmdSec {
            id: ids.rep_amd_sec.xml_id(),
            digiprov: md_sec(
                ids.rep_digiprov_md.xml_id(),
                &ts,
                "PREMIS",
                "metadata/preservation/PREMIS_rep1.xml".to_owned(),
                Placeholder::RepresentationPremis,
            ),
        },
        FileSec {
            id: ids.rep_file_sec.xml_id(),
            groups: vec![FileGrp {
                id: ids.rep_data_file_grp.xml_id(),
                usage: "Data".into(),
                files: data_files,
            }],
        },
        StructMap {
            id: ids.rep_struct_map.xml_id(),
            kind: "PHYSICAL",
            label: "CSIP",
            root: root_div,
        },
    )
}

// ---------------------------------------------------------------------------
// Descriptive documents
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Ead {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@xmlns:xlink")]
    xmlns_xlink: &'static str,
    #[serde(rename = "@xmlns:xsi")]
    xmlns_xsi: &'static str,
    #[serde(rename = "@xsi:schemaLocation")]
    schema_location: String,
    eadheader: EadHeader,
    archdesc: ArchDesc,
}

impl Ead {
    fn new(schema_prefix: &str, eadheader: EadHeader, archdesc: ArchDesc) -> Self {
        Self {
            xmlns: EAD_NS,
            xmlns_xlink: XLINK_NS,
            xmlns_xsi: XSI_NS,
            schema_location: format!("{} {}{}/ead.xsd", EAD_NS, schema_prefix, SCHEMAS_DIR),
            eadheader,
            archdesc,
        }
    }
}

#[derive(Debug, Serialize)]
struct EadHeader {
    #[serde(rename = "@countryencoding")]
    country_encoding: &'static str,
    #[serde(rename = "@dateencoding")]
    date_encoding: &'static str,
    #[serde(rename = "@langencoding")]
    lang_encoding: &'static str,
    #[serde(rename = "@repositoryencoding")]
    repository_encoding: &'static str,
    eadid: EadId,
    filedesc: FileDesc,
    profiledesc: ProfileDesc,
}

#[derive(Debug, Serialize)]
struct EadId {
    #[serde(rename = "@countrycode")]
    country_code: &'static str,
    #[serde(rename = "@mainagencycode")]
    agency_code: String,
    #[serde(rename = "@identifier")]
    identifier: String,
    #[serde(rename = "$text")]
    text: String,
}

#[derive(Debug, Serialize)]
struct FileDesc {
    titlestmt: TitleStmt,
    publicationstmt: PublicationStmt,
}

#[derive(Debug, Serialize)]
struct TitleStmt {
    titleproper: String,
}

#[derive(Debug, Serialize)]
struct PublicationStmt {
    publisher: String,
}

#[derive(Debug, Serialize)]
struct ProfileDesc {
    creation: String,
    langusage: LangUsage,
}

#[derive(Debug, Serialize)]
struct LangUsage {
    language: Language,
}

#[derive(Debug, Serialize)]
struct LangMaterial {
    language: Language,
}

#[derive(Debug, Serialize)]
struct Language {
    #[serde(rename = "@langcode")]
    code: String,
    #[serde(rename = "$text")]
    text: String,
}

impl Language {
    fn new(code: &str) -> Self {
        Self {
            code: code.to_owned(),
            text: code.to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ArchDesc {
    #[serde(rename = "@level")]
    level: &'static str,
    did: Did,
    scopecontent: Para,
    #[serde(skip_serializing_if = "Option::is_none")]
    accessrestrict: Option<Para>,
    #[serde(skip_serializing_if = "Option::is_none")]
    appraisal: Option<Para>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custodhist: Option<Para>,
    #[serde(skip_serializing_if = "Option::is_none")]
    descrules: Option<Para>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processinfo: Option<Para>,
    #[serde(skip_serializing_if = "Option::is_none")]
    controlaccess: Option<ControlAccess>,
    #[serde(skip_serializing_if = "Option::is_none")]
    relatedmaterial: Option<RelatedMaterial>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dsc: Option<Dsc>,
}

#[derive(Debug, Default, Serialize)]
struct Did {
    unittitle: String,
    unitid: UnitId,
    #[serde(skip_serializing_if = "Option::is_none")]
    unitdate: Option<UnitDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    langmaterial: Option<LangMaterial>,
    #[serde(skip_serializing_if = "Option::is_none")]
    physdesc: Option<PhysDesc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    origination: Option<Origination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repository: Option<Repository>,
    container: Vec<Container>,
    #[serde(skip_serializing_if = "Option::is_none")]
    materialspec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dao: Option<Dao>,
}

#[derive(Debug, Default, Serialize)]
struct UnitId {
    #[serde(rename = "@countrycode", skip_serializing_if = "Option::is_none")]
    country_code: Option<&'static str>,
    #[serde(rename = "@repositorycode", skip_serializing_if = "Option::is_none")]
    repository_code: Option<String>,
    #[serde(rename = "$text")]
    text: String,
}

#[derive(Debug, Default, Serialize)]
struct UnitDate {
    #[serde(rename = "@normal", skip_serializing_if = "Option::is_none")]
    normal: Option<String>,
    #[serde(rename = "@era", skip_serializing_if = "Option::is_none")]
    era: Option<&'static str>,
    #[serde(rename = "@calendar", skip_serializing_if = "Option::is_none")]
    calendar: Option<&'static str>,
    #[serde(rename = "$text")]
    text: String,
}

impl UnitDate {
    fn undated() -> Self {
        Self {
            text: "undated".into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct PhysDesc {
    extent: Vec<Extent>,
    physfacet: Vec<PhysFacet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    genreform: Option<String>,
}

#[derive(Debug, Serialize)]
struct Extent {
    #[serde(rename = "@unit")]
    unit: &'static str,
    #[serde(rename = "$text")]
    value: u64,
}

#[derive(Debug, Serialize)]
struct PhysFacet {
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(rename = "$text")]
    text: String,
}

#[derive(Debug, Default, Serialize)]
struct Origination {
    #[serde(skip_serializing_if = "Option::is_none")]
    corpname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    persname: Option<String>,
}

#[derive(Debug, Serialize)]
struct Repository {
    corpname: String,
}

#[derive(Debug, Serialize)]
struct Container {
    #[serde(rename = "@type")]
    kind: &'static str,
    #[serde(rename = "$text")]
    text: String,
}

#[derive(Debug, Serialize)]
struct Dao {
    #[serde(rename = "@xlink:type")]
    link_type: &'static str,
    #[serde(rename = "@xlink:href")]
    href: String,
    #[serde(rename = "@xlink:title", skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

#[derive(Debug, Serialize)]
struct Para {
    p: String,
}

impl Para {
    fn new(text: impl Into<String>) -> Self {
        Self { p: text.into() }
    }
}

#[derive(Debug, Serialize)]
struct ControlAccess {
    subject: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RelatedMaterial {
    p: RefPara,
}

#[derive(Debug, Serialize)]
struct RefPara {
    #[serde(rename = "ref")]
    reference: Ref,
}

#[derive(Debug, Serialize)]
struct Ref {
    #[serde(rename = "@target")]
    target: String,
    #[serde(rename = "$text")]
    text: String,
}

#[derive(Debug, Serialize)]
struct Dsc {
    #[serde(rename = "@type")]
    kind: &'static str,
    c: Vec<Component>,
}

#[derive(Debug, Serialize)]
struct Component {
    #[serde(rename = "@level")]
    level: &'static str,
    #[serde(rename = "@id")]
    id: String,
    did: Did,
}

struct HeaderFacts<'a> {
    eadid: String,
    title: String,
    publisher: &'a str,
    agent: &'a str,
    version: &'a str,
    timestamp: String,
}

fn ead_header(record: &Record, facts: HeaderFacts<'_>) -> EadHeader {
    let agency = record
        .description()
        .organization_code
        .as_deref()
        .unwrap_or(facts.publisher)
        .to_owned();
    let language = record.effective_language();
    EadHeader {
        country_encoding: "iso3166-1",
        date_encoding: "iso8601",
        lang_encoding: "iso639-2b",
        repository_encoding: "iso15511",
        eadid: EadId {
            country_code: "VN",
            agency_code: agency,
            identifier: facts.eadid.clone(),
            text: facts.eadid,
        },
        filedesc: FileDesc {
            titlestmt: TitleStmt {
                titleproper: facts.title,
            },
            publicationstmt: PublicationStmt {
                publisher: facts.publisher.to_owned(),
            },
        },
        profiledesc: ProfileDesc {
            creation: format!("{} {}, {}", facts.agent, facts.version, facts.timestamp),
            langusage: LangUsage {
                language: Language::new(language),
            },
        },
    }
}

fn package_ead(context: &PackageContext<'_>) -> Ead {
    let record = context.record;
    let d = record.description();
    let objid = record.object_id().to_string();
    let title = record.effective_title();
    let organization = record.effective_organization(context.config.organization_name());

    let mut physdesc = PhysDesc::default();
    physdesc.extent.push(Extent {
        unit: "items",
        value: context.copied_items().count() as u64,
    });
    if let Some(pages) = record.total_pages() {
        physdesc.extent.push(Extent {
            unit: "pages",
            value: u64::from(pages),
        });
    }
    if let Some(sheets) = d.sheet_count {
        physdesc.extent.push(Extent {
            unit: "sheets",
            value: u64::from(sheets),
        });
    }
    if let Some(condition) = opt(&d.physical_condition) {
        physdesc.physfacet.push(PhysFacet {
            kind: Some("condition"),
            text: condition,
        });
    }
    if let Some(characteristics) = opt(&d.physical_characteristics) {
        physdesc.physfacet.push(PhysFacet {
            kind: None,
            text: characteristics,
        });
    }

    let mut container = Vec::new();
    if let Some(box_code) = opt(&d.box_code) {
        container.push(Container { kind: "box", text: box_code });
    }
    if let Some(file_code) = opt(&d.file_code) {
        container.push(Container { kind: "folder", text: file_code });
    }

    let unitdate = match record.date_range() {
        Some(range) => UnitDate {
            normal: Some(range.clone()),
            era: Some("ce"),
            calendar: Some("gregorian"),
            text: range,
        },
        None => UnitDate::undated(),
    };

    let did = Did {
        unittitle: title.clone(),
        unitid: UnitId {
            country_code: Some("VN"),
            repository_code: Some(
                d.organization_code
                    .as_deref()
                    .unwrap_or(organization)
                    .to_owned(),
            ),
            text: record.paper_file_code().to_owned(),
        },
        unitdate: Some(unitdate),
        langmaterial: Some(LangMaterial {
            language: Language::new(record.effective_language()),
        }),
        physdesc: Some(physdesc),
        origination: Some(Origination {
            corpname: Some(opt(&d.creator).unwrap_or_else(|| organization.to_owned())),
            persname: None,
        }),
        repository: Some(Repository {
            corpname: organization.to_owned(),
        }),
        container,
        materialspec: opt(&d.script),
        dao: None,
    };

    let processinfo = match (opt(&d.digitization_date), opt(&d.digitized_by)) {
        (None, None) => None,
        (date, by) => {
            let mut text = String::from("Digitized");
            if let Some(date) = date {
                text.push(' ');
                text.push_str(&date);
            }
            if let Some(by) = by {
                text.push_str(" by ");
                text.push_str(&by);
            }
            Some(Para::new(text))
        }
    };

    let controlaccess = opt(&d.keywords).map(|keywords| ControlAccess {
        subject: keywords
            .split([',', ';'])
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_owned)
            .collect(),
    });

    let components = context
        .copied_items()
        .map(|(item, facts)| Component {
            level: "item",
            id: item.identifiers().item_id.xml_id(),
            did: Did {
                unittitle: item.effective_title(),
                unitid: UnitId {
                    text: item.sequence_number().to_string(),
                    ..UnitId::default()
                },
                dao: Some(Dao {
                    link_type: "simple",
                    href: format!("../../{}{}", CONTENT_HREF_PREFIX, facts.final_filename),
                    title: None,
                }),
                ..Did::default()
            },
        })
        .collect();

    let header = ead_header(
        record,
        HeaderFacts {
            eadid: objid,
            title: title.clone(),
            publisher: organization,
            agent: context.config.agent_name(),
            version: context.config.agent_version(),
            timestamp: context.timestamp(),
        },
    );

    Ead::new(
        "../../",
        header,
        ArchDesc {
            level: "file",
            did,
            scopecontent: Para::new(opt(&d.notes).unwrap_or(title)),
            accessrestrict: opt(&d.access_condition).map(Para::new),
            appraisal: opt(&d.retention_class).map(Para::new),
            custodhist: opt(&d.provenance).map(Para::new),
            descrules: opt(&d.rules).map(Para::new),
            processinfo,
            controlaccess,
            relatedmaterial: None,
            dsc: Some(Dsc {
                kind: "combined",
                c: components,
            }),
        },
    )
}

fn item_ead(context: &ItemContext<'_>) -> Ead {
    let record = context.record;
    let item = context.item;
    let d = item.description();
    let organization = record.effective_organization(context.config.organization_name());
    let title = item.effective_title();
    let language = opt(&d.language).unwrap_or_else(|| record.effective_language().to_owned());

    let mut physdesc = PhysDesc::default();
    physdesc.extent.push(Extent {
        unit: "bytes",
        value: context.facts.size_bytes,
    });
    if let Some(pages) = item.page_count() {
        physdesc.extent.push(Extent {
            unit: "pages",
            value: u64::from(pages),
        });
    }
    physdesc.genreform = opt(&d.document_type);

    let unitdate = match opt(&d.document_date).or_else(|| record.date_range()) {
        Some(date) => UnitDate {
            normal: Some(date.clone()),
            text: date,
            ..UnitDate::default()
        },
        None => UnitDate::undated(),
    };

    let did = Did {
        unittitle: title.clone(),
        unitid: UnitId {
            text: opt(&d.document_code).unwrap_or_else(|| item.sequence_number().to_string()),
            ..UnitId::default()
        },
        unitdate: Some(unitdate),
        langmaterial: Some(LangMaterial {
            language: Language::new(&language),
        }),
        physdesc: Some(physdesc),
        origination: opt(&d.author).map(|author| Origination {
            corpname: None,
            persname: Some(author),
        }),
        dao: Some(Dao {
            link_type: "simple",
            href: format!("../../data/{}", context.facts.final_filename),
            title: Some(context.facts.sha256.to_string()),
        }),
        ..Did::default()
    };

    let header = ead_header(
        record,
        HeaderFacts {
            eadid: format!("{}_{}", record.object_id(), item.identifiers().item_id),
            title: title.clone(),
            publisher: organization,
            agent: context.config.agent_name(),
            version: context.config.agent_version(),
            timestamp: context
                .created_at
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        },
    );

    Ead::new(
        "../../../../",
        header,
        ArchDesc {
            level: "item",
            did,
            scopecontent: Para::new(opt(&d.notes).unwrap_or(title)),
            accessrestrict: None,
            appraisal: None,
            custodhist: None,
            descrules: None,
            processinfo: None,
            controlaccess: None,
            relatedmaterial: Some(RelatedMaterial {
                p: RefPara {
                    reference: Ref {
                        target: record.object_id().to_string(),
                        text: record.effective_title(),
                    },
                },
            }),
            dsc: None,
        },
    )
}

// ---------------------------------------------------------------------------
// Preservation documents
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Premis {
    #[serde(rename = "@xmlns:premis")]
    xmlns_premis: &'static str,
    #[serde(rename = "@xmlns:xlink")]
    xmlns_xlink: &'static str,
    #[serde(rename = "@xmlns:xsi")]
    xmlns_xsi: &'static str,
    #[serde(rename = "@version")]
    version: &'static str,
    #[serde(rename = "@xsi:schemaLocation")]
    schema_location: String,
    #[serde(rename = "premis:object")]
    objects: Vec<PremisObject>,
    #[serde(rename = "premis:event")]
    events: Vec<PremisEvent>,
    #[serde(rename = "premis:agent")]
    agents: Vec<PremisAgent>,
}

impl Premis {
    fn new(
        schema_prefix: &str,
        objects: Vec<PremisObject>,
        events: Vec<PremisEvent>,
        agents: Vec<PremisAgent>,
    ) -> Self {
        Self {
            xmlns_premis: PREMIS_NS,
            xmlns_xlink: XLINK_NS,
            xmlns_xsi: XSI_NS,
            version: PREMIS_VERSION,
            schema_location: format!("{} {}{}/premis.xsd", PREMIS_NS, schema_prefix, SCHEMAS_DIR),
            objects,
            events,
            agents,
        }
    }
}

#[derive(Debug, Serialize)]
struct PremisObject {
    #[serde(rename = "@xsi:type")]
    kind: &'static str,
    #[serde(rename = "premis:objectIdentifier")]
    identifier: ObjectIdentifier,
    #[serde(rename = "premis:objectCategory")]
    category: &'static str,
    #[serde(
        rename = "premis:objectCharacteristics",
        skip_serializing_if = "Option::is_none"
    )]
    characteristics: Option<ObjectCharacteristics>,
    #[serde(rename = "premis:originalName", skip_serializing_if = "Option::is_none")]
    original_name: Option<String>,
    #[serde(rename = "premis:storage", skip_serializing_if = "Option::is_none")]
    storage: Option<Storage>,
    #[serde(rename = "premis:relationship", skip_serializing_if = "Option::is_none")]
    relationship: Option<Relationship>,
}

#[derive(Debug, Serialize)]
struct ObjectIdentifier {
    #[serde(rename = "premis:objectIdentifierType")]
    kind: &'static str,
    #[serde(rename = "premis:objectIdentifierValue")]
    value: String,
}

#[derive(Debug, Serialize)]
struct ObjectCharacteristics {
    #[serde(rename = "premis:compositionLevel")]
    composition_level: u32,
    #[serde(rename = "premis:fixity")]
    fixity: Fixity,
    #[serde(rename = "premis:size")]
    size: u64,
    #[serde(rename = "premis:format")]
    format: Format,
}

#[derive(Debug, Serialize)]
struct Fixity {
    #[serde(rename = "premis:messageDigestAlgorithm")]
    algorithm: &'static str,
    #[serde(rename = "premis:messageDigest")]
    digest: String,
    #[serde(rename = "premis:messageDigestOriginator")]
    originator: String,
}

#[derive(Debug, Serialize)]
struct Format {
    #[serde(rename = "premis:formatDesignation")]
    designation: FormatDesignation,
}

#[derive(Debug, Serialize)]
struct FormatDesignation {
    #[serde(rename = "premis:formatName")]
    name: &'static str,
}

#[derive(Debug, Serialize)]
struct Storage {
    #[serde(rename = "premis:contentLocation")]
    location: ContentLocation,
}

#[derive(Debug, Serialize)]
struct ContentLocation {
    #[serde(rename = "premis:contentLocationType")]
    kind: &'static str,
    #[serde(rename = "premis:contentLocationValue")]
    value: String,
}

#[derive(Debug, Serialize)]
struct Relationship {
    #[serde(rename = "premis:relationshipType")]
    kind: &'static str,
    #[serde(rename = "premis:relationshipSubType")]
    sub_type: &'static str,
    #[serde(rename = "premis:relatedObjectIdentifier")]
    related: RelatedObjectIdentifier,
}

#[derive(Debug, Serialize)]
struct RelatedObjectIdentifier {
    #[serde(rename = "premis:relatedObjectIdentifierType")]
    kind: &'static str,
    #[serde(rename = "premis:relatedObjectIdentifierValue")]
    value: String,
}

#[derive(Debug, Serialize)]
struct PremisEvent {
    #[serde(rename = "premis:eventIdentifier")]
    identifier: EventIdentifier,
    #[serde(rename = "premis:eventType")]
    kind: &'static str,
    #[serde(rename = "premis:eventDateTime")]
    date_time: String,
    #[serde(rename = "premis:eventDetailInformation")]
    detail: EventDetailInformation,
    #[serde(rename = "premis:eventOutcomeInformation")]
    outcome: EventOutcomeInformation,
    #[serde(rename = "premis:linkingAgentIdentifier")]
    agent: LinkingAgentIdentifier,
    #[serde(rename = "premis:linkingObjectIdentifier")]
    object: LinkingObjectIdentifier,
}

#[derive(Debug, Serialize)]
struct EventIdentifier {
    #[serde(rename = "premis:eventIdentifierType")]
    kind: &'static str,
    #[serde(rename = "premis:eventIdentifierValue")]
    value: String,
}

#[derive(Debug, Serialize)]
struct EventDetailInformation {
    #[serde(rename = "premis:eventDetail")]
    detail: String,
}

#[derive(Debug, Serialize)]
struct EventOutcomeInformation {
    #[serde(rename = "premis:eventOutcome")]
    outcome: &'static str,
}

#[derive(Debug, Serialize)]
struct LinkingAgentIdentifier {
    #[serde(rename = "premis:linkingAgentIdentifierType")]
    kind: &'static str,
    #[serde(rename = "premis:linkingAgentIdentifierValue")]
    value: String,
    #[serde(rename = "premis:linkingAgentRole")]
    role: &'static str,
}

#[derive(Debug, Serialize)]
struct LinkingObjectIdentifier {
    #[serde(rename = "premis:linkingObjectIdentifierType")]
    kind: &'static str,
    #[serde(rename = "premis:linkingObjectIdentifierValue")]
    value: String,
}

#[derive(Debug, Serialize)]
struct PremisAgent {
    #[serde(rename = "premis:agentIdentifier")]
    identifier: AgentIdentifier,
    #[serde(rename = "premis:agentName")]
    name: String,
    #[serde(rename = "premis:agentType")]
    kind: &'static str,
    #[serde(rename = "premis:agentVersion", skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

#[derive(Debug, Serialize)]
struct AgentIdentifier {
    #[serde(rename = "premis:agentIdentifierType")]
    kind: &'static str,
    #[serde(rename = "premis:agentIdentifierValue")]
    value: String,
}

fn representation_object(context: &PackageContext<'_>) -> PremisObject {
    PremisObject {
        kind: "premis:representation",
        identifier: ObjectIdentifier {
            kind: "UUID",
            value: context.record.identifiers().premis_rep_object.to_string(),
        },
        category: "representation",
        characteristics: None,
        original_name: Some(REPRESENTATION_NAME.to_owned()),
        storage: None,
        relationship: None,
    }
}

/// File objects. `location_prefix` is prepended to each final filename.
fn file_objects(context: &PackageContext<'_>, location_prefix: &str) -> Vec<PremisObject> {
    let rep_id = context.record.identifiers().premis_rep_object.to_string();
    context
        .copied_items()
        .map(|(item, facts)| PremisObject {
            kind: "premis:file",
            identifier: ObjectIdentifier {
                kind: "UUID",
                value: item.identifiers().premis_object.to_string(),
            },
            category: "file",
            characteristics: Some(ObjectCharacteristics {
                composition_level: 0,
                fixity: Fixity {
                    algorithm: CHECKSUM_TYPE,
                    digest: facts.sha256.to_string(),
                    originator: context.config.agent_name().to_owned(),
                },
                size: facts.size_bytes,
                format: Format {
                    designation: FormatDesignation {
                        name: CONTENT_FORMAT_NAME,
                    },
                },
            }),
            original_name: Some(item.source_filename()),
            storage: Some(Storage {
                location: ContentLocation {
                    kind: "URI",
                    value: format!("{}{}", location_prefix, facts.final_filename),
                },
            }),
            relationship: Some(Relationship {
                kind: "structural",
                sub_type: "is included in",
                related: RelatedObjectIdentifier {
                    kind: "UUID",
                    value: rep_id.clone(),
                },
            }),
        })
        .collect()
}

fn event(
    id: String,
    kind: &'static str,
    context: &PackageContext<'_>,
    detail: String,
    object: LinkingObjectIdentifier,
) -> PremisEvent {
    PremisEvent {
        identifier: EventIdentifier { kind: "UUID", value: id },
        kind,
        date_time: context.timestamp(),
        detail: EventDetailInformation { detail },
        outcome: EventOutcomeInformation { outcome: "success" },
        agent: LinkingAgentIdentifier {
            kind: "UUID",
            value: context.record.identifiers().premis_software_agent.to_string(),
            role: "executing program",
        },
        object,
    }
}

fn agents(context: &PackageContext<'_>) -> Vec<PremisAgent> {
    let ids = context.record.identifiers();
    let organization = context
        .record
        .effective_organization(context.config.organization_name());
    vec![
        PremisAgent {
            identifier: AgentIdentifier {
                kind: "UUID",
                value: ids.premis_software_agent.to_string(),
            },
            name: context.config.agent_name().to_owned(),
            kind: "software",
            version: Some(context.config.agent_version().to_owned()),
        },
        PremisAgent {
            identifier: AgentIdentifier {
                kind: "UUID",
                value: ids.premis_organization_agent.to_string(),
            },
            name: organization.to_owned(),
            kind: "organization",
            version: None,
        },
    ]
}

fn package_premis(context: &PackageContext<'_>) -> Premis {
    let ids = context.record.identifiers();
    let objid = context.record.object_id().to_string();
    let copied = context.copied_items().count();

    let mut objects = vec![
        PremisObject {
            kind: "premis:intellectualEntity",
            identifier: ObjectIdentifier {
                kind: "URN",
                value: objid.clone(),
            },
            category: "intellectual entity",
            characteristics: None,
            original_name: None,
            storage: None,
            relationship: None,
        },
        representation_object(context),
    ];
    objects.extend(file_objects(context, CONTENT_HREF_PREFIX));

    let package_object = || LinkingObjectIdentifier {
        kind: "URN",
        value: objid.clone(),
    };
    let events = vec![
        event(
            ids.premis_ingest_event.to_string(),
            "ingestion",
            context,
            format!("Package assembled from {} content files", copied),
            package_object(),
        ),
        event(
            ids.premis_validation_event.to_string(),
            "message digest calculation",
            context,
            format!("{} digests computed for {} content files", CHECKSUM_TYPE, copied),
            package_object(),
        ),
    ];

    Premis::new("../../", objects, events, agents(context))
}

fn representation_premis(context: &PackageContext<'_>) -> Premis {
    let ids = context.record.identifiers();

    let mut objects = vec![representation_object(context)];
    objects.extend(file_objects(context, "data/"));

    let events = vec![event(
        ids.premis_rep_creation_event.to_string(),
        "creation",
        context,
        format!(
            "Representation {} created with {} content files",
            REPRESENTATION_NAME,
            context.copied_items().count()
        ),
        LinkingObjectIdentifier {
            kind: "UUID",
            value: ids.premis_rep_object.to_string(),
        },
    )];

    Premis::new("../../../../", objects, events, agents(context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AipConfig;
    use crate::model::{ContentFacts, Item, ItemDescription, RecordDescription};
    use crate::xml::XmlDocument;
    use aip_files::sha256_bytes;
    use chrono::Utc;

    fn record_with_items() -> Record {
        let description = RecordDescription {
            title: Some("Hồ sơ <đặc biệt> & khác".into()),
            date_range_start: Some("2019-01-01".into()),
            date_range_end: Some("2019-12-31".into()),
            keywords: Some("đất đai; cấp phép".into()),
            ..RecordDescription::default()
        };
        let mut record = Record::new("1", Some("CODE123"), description, Some("HTJSC")).unwrap();
        let items = (1..=2)
            .map(|seq| {
                Item::new(
                    seq,
                    format!("hoso/CODE123.{}.pdf", seq),
                    ItemDescription::default(),
                )
                .unwrap()
            })
            .collect();
        record.attach_items(items).unwrap();
        let facts = ContentFacts {
            final_filename: "CODE123.1.pdf".into(),
            size_bytes: 42,
            sha256: sha256_bytes(b"one"),
            page_count: Some(2),
        };
        record.items_mut()[0].record_content(facts);
        record
    }

    fn render(kind: DocumentKind, record: &Record, config: &AipConfig) -> String {
        let context = PackageContext {
            record,
            config,
            created_at: Utc::now(),
            schemas: &[],
        };
        XmlTemplates.render_package(kind, &context).unwrap()
    }

    #[test]
    fn test_every_package_document_is_well_formed() {
        let record = record_with_items();
        let config = AipConfig::new("Org", Some("HTJSC".into())).unwrap();

        for kind in DocumentKind::GENERATION_ORDER {
            let text = render(kind, &record, &config);
            let doc = XmlDocument::parse(&text)
                .unwrap_or_else(|e| panic!("{kind} is not well formed: {e}"));
            assert!(doc.declares(XLINK_NS), "{kind}");
        }
    }

    #[test]
    fn test_root_mets_lists_only_copied_items() {
        let record = record_with_items();
        let config = AipConfig::new("Org", None).unwrap();
        let text = render(DocumentKind::RootMets, &record, &config);
        let doc = XmlDocument::parse(&text).unwrap();

        let hrefs: Vec<&str> = doc
            .root
            .find_all(METS_NS, "FLocat")
            .into_iter()
            .filter_map(|f| f.attr_ns(XLINK_NS, "href"))
            .collect();
        assert!(hrefs.contains(&"representations/rep1/data/CODE123.1.pdf"));
        assert!(!hrefs.iter().any(|h| h.ends_with("CODE123.2.pdf")));
        assert!(text.contains("PLACEHOLDER_EAD_CHECKSUM"));
        assert!(text.contains("PLACEHOLDER_REP_METS_SIZE"));
        assert_eq!(doc.root.attr("OBJID"), Some(record.object_id().to_string().as_str()));
    }

    #[test]
    fn test_representation_mets_references_item_documents() {
        let record = record_with_items();
        let config = AipConfig::new("Org", None).unwrap();
        let text = render(DocumentKind::RepresentationMets, &record, &config);

        assert!(text.contains("metadata/descriptive/EAD_doc_File1.xml"));
        assert!(text.contains("PLACEHOLDER_EAD_DOC_1_SIZE"));
        assert!(!text.contains("EAD_doc_File2.xml"));
        assert!(text.contains("PLACEHOLDER_PREMIS_REP_CHECKSUM"));
    }

    #[test]
    fn test_representation_struct_map_links_items() {
        let record = record_with_items();
        let config = AipConfig::new("Org", None).unwrap();
        let text = render(DocumentKind::RepresentationMets, &record, &config);
        let doc = XmlDocument::parse(&text).unwrap();
        let item = &record.items()[0];

        let md_ref = doc.root.find(METS_NS, "mdRef").unwrap();
        assert_eq!(md_ref.attr("SIZE"), Some("PLACEHOLDER_EAD_DOC_1_SIZE"));
        assert_eq!(md_ref.attr("CHECKSUMTYPE"), Some(CHECKSUM_TYPE));

        let file = doc.root.find(METS_NS, "file").unwrap();
        assert_eq!(file.attr("SEQ"), Some("1"));
        assert_eq!(file.attr("CHECKSUM"), Some(sha256_bytes(b"one").as_str()));

        let item_div = doc
            .root
            .find_all(METS_NS, "div")
            .into_iter()
            .find(|div| div.attr("ORDER") == Some("1"))
            .unwrap();
        assert_eq!(item_div.attr("LABEL"), Some(item.effective_title().as_str()));
        let fptr = item_div.find(METS_NS, "fptr").unwrap();
        assert_eq!(
            fptr.attr("FILEID"),
            Some(item.identifiers().file.xml_id().as_str())
        );

        let note = doc.root.find(METS_NS, "note").unwrap();
        assert_eq!(note.attr_ns(CSIP_NS, "NOTETYPE"), Some("SOFTWARE VERSION"));
    }

    #[test]
    fn test_premis_records_fixity() {
        let record = record_with_items();
        let config = AipConfig::new("Org", None).unwrap();
        let text = render(DocumentKind::PackagePremis, &record, &config);
        let doc = XmlDocument::parse(&text).unwrap();

        assert_eq!(doc.root.attr("version"), Some(PREMIS_VERSION));
        assert_eq!(
            doc.root.find_text(PREMIS_NS, "messageDigest"),
            Some(sha256_bytes(b"one").as_str())
        );
        assert_eq!(
            doc.root.find_text(PREMIS_NS, "contentLocationValue"),
            Some("representations/rep1/data/CODE123.1.pdf")
        );
    }

    #[test]
    fn test_package_ead_escapes_and_describes() {
        let record = record_with_items();
        let config = AipConfig::new("Org", None).unwrap();
        let text = render(DocumentKind::PackageEad, &record, &config);
        let doc = XmlDocument::parse(&text).unwrap();

        assert_eq!(
            doc.root.find_text(EAD_NS, "unittitle"),
            Some("Hồ sơ <đặc biệt> & khác")
        );
        assert_eq!(
            doc.root.find_text(EAD_NS, "unitdate"),
            record.date_range().as_deref()
        );
        assert_eq!(doc.root.find_all(EAD_NS, "subject").len(), 2);
    }

    #[test]
    fn test_item_ead() {
        let record = record_with_items();
        let config = AipConfig::new("Org", None).unwrap();
        let item = &record.items()[0];
        let context = ItemContext {
            record: &record,
            item,
            facts: item.content().unwrap(),
            config: &config,
            created_at: Utc::now(),
        };
        let text = XmlTemplates.render_item(&context).unwrap();
        let doc = XmlDocument::parse(&text).unwrap();

        let dao = doc.root.find(EAD_NS, "dao").unwrap();
        assert_eq!(dao.attr_ns(XLINK_NS, "href"), Some("../../data/CODE123.1.pdf"));
        assert_eq!(doc.root.find(EAD_NS, "archdesc").unwrap().attr("level"), Some("item"));
    }
}
