//! Raw parser output model
//!
//! Mirrors the intermediate JSON the parse engine writes: a document body of
//! `{"$ref": "#/texts/0"}`-style references into flat `texts` / `tables` /
//! `pictures` arrays, each item carrying provenance (`page_no`, `bbox`).
//! The report assembler resolves this graph into the canonical report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of item a `$ref` points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Texts,
    Tables,
    Pictures,
    Groups,
}

/// A JSON-pointer style reference, e.g. `#/texts/3`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawRef {
    #[serde(rename = "$ref")]
    pub reference: String,
}

impl RawRef {
    pub fn texts(index: usize) -> Self {
        Self {
            reference: format!("#/texts/{}", index),
        }
    }

    pub fn tables(index: usize) -> Self {
        Self {
            reference: format!("#/tables/{}", index),
        }
    }

    pub fn pictures(index: usize) -> Self {
        Self {
            reference: format!("#/pictures/{}", index),
        }
    }

    /// Resolve the reference into (kind, index)
    pub fn target(&self) -> Option<(RefKind, usize)> {
        let mut segments = self.reference.rsplit('/');
        let index: usize = segments.next()?.parse().ok()?;
        let kind = match segments.next()? {
            "texts" => RefKind::Texts,
            "tables" => RefKind::Tables,
            "pictures" => RefKind::Pictures,
            "groups" => RefKind::Groups,
            _ => return None,
        };
        Some((kind, index))
    }
}

/// Bounding box in page coordinates
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RawBBox {
    pub l: f64,
    pub t: f64,
    pub r: f64,
    pub b: f64,
}

/// Provenance of an item: the page it appears on and where
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProv {
    pub page_no: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<RawBBox>,
}

/// A labelled text item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawText {
    pub self_ref: String,
    pub label: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig: Option<String>,
    #[serde(default)]
    pub prov: Vec<RawProv>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumerated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

/// One table cell
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCell {
    #[serde(default)]
    pub text: String,
}

/// Table payload: dimensions plus the full cell grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTableData {
    pub num_rows: u32,
    pub num_cols: u32,
    #[serde(default)]
    pub grid: Vec<Vec<RawCell>>,
}

/// A detected table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTable {
    pub self_ref: String,
    #[serde(default)]
    pub prov: Vec<RawProv>,
    pub data: RawTableData,
}

/// A detected picture with nested text (captions etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPicture {
    pub self_ref: String,
    #[serde(default)]
    pub prov: Vec<RawProv>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawRef>,
}

/// A group of sibling items (lists, key-value areas)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub children: Vec<RawRef>,
}

/// Document body: ordered references into the flat item arrays
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBody {
    #[serde(default)]
    pub children: Vec<RawRef>,
}

/// Where the document came from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOrigin {
    #[serde(default)]
    pub filename: String,
}

/// The complete raw parser output for one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub origin: RawOrigin,
    /// Page map keyed by page number (only its size matters downstream)
    #[serde(default)]
    pub pages: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub texts: Vec<RawText>,
    #[serde(default)]
    pub tables: Vec<RawTable>,
    #[serde(default)]
    pub pictures: Vec<RawPicture>,
    #[serde(default)]
    pub groups: Vec<RawGroup>,
    #[serde(default)]
    pub body: RawBody,
}

impl RawDocument {
    /// Parse the index out of a `#/texts/N` self reference
    pub fn self_ref_index(self_ref: &str) -> Option<usize> {
        self_ref.rsplit('/').next()?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_target() {
        let r = RawRef::texts(3);
        assert_eq!(r.reference, "#/texts/3");
        assert_eq!(r.target(), Some((RefKind::Texts, 3)));

        let g = RawRef {
            reference: "#/groups/0".to_string(),
        };
        assert_eq!(g.target(), Some((RefKind::Groups, 0)));

        let bad = RawRef {
            reference: "#/nope/0".to_string(),
        };
        assert_eq!(bad.target(), None);
    }

    #[test]
    fn test_self_ref_index() {
        assert_eq!(RawDocument::self_ref_index("#/tables/7"), Some(7));
        assert_eq!(RawDocument::self_ref_index("#/tables/x"), None);
    }

    #[test]
    fn test_document_roundtrip() {
        let json = r##"{
            "origin": {"filename": "doc.pdf"},
            "pages": {"1": {}},
            "texts": [
                {"self_ref": "#/texts/0", "label": "section_header",
                 "text": "Intro", "prov": [{"page_no": 1, "bbox": {"l":0,"t":10,"r":100,"b":0}}]}
            ],
            "tables": [],
            "pictures": [],
            "body": {"children": [{"$ref": "#/texts/0"}]}
        }"##;
        let doc: RawDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.origin.filename, "doc.pdf");
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.texts[0].label, "section_header");
        assert_eq!(doc.body.children[0].target(), Some((RefKind::Texts, 0)));

        let round = serde_json::to_string(&doc).unwrap();
        let doc2: RawDocument = serde_json::from_str(&round).unwrap();
        assert_eq!(doc2.texts[0].text, "Intro");
    }
}
