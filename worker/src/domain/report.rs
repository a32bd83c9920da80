//! Canonical processed report and its assembler
//!
//! The assembler resolves the raw parser output graph (body refs → texts /
//! tables / pictures, with group expansion) into an ordered page structure,
//! renders tables to markdown, and computes document statistics. Fan-in
//! merging concatenates partial reports and rebases page numbers so the
//! merged report is indistinguishable from a single-pass parse.

use serde::{Deserialize, Serialize};

use super::raw::{RawBBox, RawDocument, RawRef, RawTableData, RefKind};

/// Content block type for detected tables
pub const BLOCK_TABLE: &str = "table";
/// Content block type for detected pictures
pub const BLOCK_PICTURE: &str = "picture";
/// Text label counted as a footnote in metainfo
pub const LABEL_FOOTNOTE: &str = "footnote";
/// Text label counted as an equation in metainfo
pub const LABEL_FORMULA: &str = "formula";

/// Document statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetaInfo {
    pub sha1_name: String,
    pub pages_amount: usize,
    pub text_blocks_amount: usize,
    pub tables_amount: usize,
    pub pictures_amount: usize,
    pub equations_amount: usize,
    pub footnotes_amount: usize,
}

/// One block of page content
///
/// Text blocks carry `text`/`text_id`; table and picture blocks carry only
/// their id. Optional group fields record the list/key-value group a text
/// block was lifted out of.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumerated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_id: Option<usize>,
}

impl ContentBlock {
    /// Whether this block contributes to `text_blocks_amount`
    pub fn is_text_block(&self) -> bool {
        self.text.is_some() || self.text_id.is_some()
    }
}

/// One page of ordered content blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPage {
    pub page: u32,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_dimensions: Option<RawBBox>,
}

impl ReportPage {
    /// Placeholder for a page the parser produced nothing for
    pub fn empty(page: u32) -> Self {
        Self {
            page,
            content: Vec::new(),
            page_dimensions: None,
        }
    }
}

/// A table with its markdown rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTable {
    pub table_id: usize,
    pub page: u32,
    pub bbox: [f64; 4],
    #[serde(rename = "#-rows")]
    pub num_rows: u32,
    #[serde(rename = "#-cols")]
    pub num_cols: u32,
    pub markdown: String,
}

/// A picture with its nested text (captions etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPicture {
    pub picture_id: usize,
    pub page: u32,
    pub bbox: [f64; 4],
    pub children: Vec<ContentBlock>,
}

/// The canonical processed report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessedReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metainfo: Option<MetaInfo>,
    #[serde(default)]
    pub content: Vec<ReportPage>,
    #[serde(default)]
    pub tables: Vec<ReportTable>,
    #[serde(default)]
    pub pictures: Vec<ReportPicture>,
}

/// Assembles canonical reports from raw parser output
pub struct ReportAssembler;

impl ReportAssembler {
    /// Build the canonical report for one raw parser output
    pub fn assemble(raw: &RawDocument) -> ProcessedReport {
        let mut report = ProcessedReport {
            metainfo: Some(Self::assemble_metainfo(raw)),
            content: Self::assemble_content(raw),
            tables: Self::assemble_tables(raw),
            pictures: Self::assemble_pictures(raw),
        };
        normalize_page_sequence(&mut report);
        report
    }

    fn assemble_metainfo(raw: &RawDocument) -> MetaInfo {
        let sha1_name = raw
            .origin
            .filename
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| raw.origin.filename.clone());

        MetaInfo {
            sha1_name,
            pages_amount: raw.pages.len(),
            text_blocks_amount: raw.texts.len(),
            tables_amount: raw.tables.len(),
            pictures_amount: raw.pictures.len(),
            equations_amount: raw
                .texts
                .iter()
                .filter(|t| t.label == LABEL_FORMULA)
                .count(),
            footnotes_amount: raw
                .texts
                .iter()
                .filter(|t| t.label == LABEL_FOOTNOTE)
                .count(),
        }
    }

    /// Expand group references into their children, tagging each child with
    /// the group it came from
    fn expand_groups(raw: &RawDocument) -> Vec<(RawRef, Option<usize>)> {
        let mut expanded = Vec::new();
        for child in &raw.body.children {
            match child.target() {
                Some((RefKind::Groups, group_id)) => {
                    if let Some(group) = raw.groups.get(group_id) {
                        for member in &group.children {
                            expanded.push((member.clone(), Some(group_id)));
                        }
                    }
                }
                _ => expanded.push((child.clone(), None)),
            }
        }
        expanded
    }

    fn assemble_content(raw: &RawDocument) -> Vec<ReportPage> {
        let mut pages: std::collections::BTreeMap<u32, ReportPage> =
            std::collections::BTreeMap::new();

        let mut push_block = |page_no: u32, bbox: Option<RawBBox>, block: ContentBlock| {
            let page = pages.entry(page_no).or_insert_with(|| ReportPage {
                page: page_no,
                content: Vec::new(),
                page_dimensions: bbox,
            });
            page.content.push(block);
        };

        for (item, group_id) in Self::expand_groups(raw) {
            match item.target() {
                Some((RefKind::Texts, index)) => {
                    Self::collect_text_blocks(raw, index, group_id, &mut push_block);
                }
                Some((RefKind::Tables, index)) => {
                    let Some(table) = raw.tables.get(index) else {
                        continue;
                    };
                    let (page_no, bbox) = prov_page(&table.prov);
                    push_block(
                        page_no,
                        bbox,
                        ContentBlock {
                            block_type: BLOCK_TABLE.to_string(),
                            table_id: Some(index),
                            ..Default::default()
                        },
                    );
                }
                Some((RefKind::Pictures, index)) => {
                    let Some(picture) = raw.pictures.get(index) else {
                        continue;
                    };
                    let (page_no, bbox) = prov_page(&picture.prov);
                    push_block(
                        page_no,
                        bbox,
                        ContentBlock {
                            block_type: BLOCK_PICTURE.to_string(),
                            picture_id: Some(index),
                            ..Default::default()
                        },
                    );
                }
                _ => {}
            }
        }

        pages.into_values().collect()
    }

    /// Emit the text item and, depth-first, every text child under it
    fn collect_text_blocks(
        raw: &RawDocument,
        index: usize,
        group_id: Option<usize>,
        push_block: &mut impl FnMut(u32, Option<RawBBox>, ContentBlock),
    ) {
        let Some(text_item) = raw.texts.get(index) else {
            return;
        };

        let (page_no, bbox) = prov_page(&text_item.prov);
        let mut block = ContentBlock {
            block_type: text_item.label.clone(),
            text: Some(text_item.text.clone()),
            text_id: Some(index),
            enumerated: text_item.enumerated,
            marker: text_item.marker.clone(),
            ..Default::default()
        };
        // Keep the original rendering only when it differs
        if let Some(orig) = &text_item.orig {
            if *orig != text_item.text {
                block.orig = Some(orig.clone());
            }
        }
        if let Some(group_id) = group_id {
            block.group_id = Some(group_id);
            if let Some(group) = raw.groups.get(group_id) {
                block.group_name = Some(group.name.clone());
                block.group_label = Some(group.label.clone());
            }
        }
        push_block(page_no, bbox, block);

        for child in &text_item.children {
            if let Some((RefKind::Texts, child_index)) = child.target() {
                Self::collect_text_blocks(raw, child_index, group_id, push_block);
            }
        }
    }

    fn assemble_tables(raw: &RawDocument) -> Vec<ReportTable> {
        raw.tables
            .iter()
            .map(|table| {
                let (page_no, bbox) = prov_page(&table.prov);
                let table_id = RawDocument::self_ref_index(&table.self_ref).unwrap_or(0);
                ReportTable {
                    table_id,
                    page: page_no,
                    bbox: bbox_array(bbox),
                    num_rows: table.data.num_rows,
                    num_cols: table.data.num_cols,
                    markdown: table_to_markdown(&table.data),
                }
            })
            .collect()
    }

    fn assemble_pictures(raw: &RawDocument) -> Vec<ReportPicture> {
        raw.pictures
            .iter()
            .map(|picture| {
                let (page_no, bbox) = prov_page(&picture.prov);
                let picture_id = RawDocument::self_ref_index(&picture.self_ref).unwrap_or(0);

                let mut children = Vec::new();
                for child in &picture.children {
                    if let Some((RefKind::Texts, index)) = child.target() {
                        if let Some(text_item) = raw.texts.get(index) {
                            children.push(ContentBlock {
                                block_type: text_item.label.clone(),
                                text: Some(text_item.text.clone()),
                                text_id: Some(index),
                                ..Default::default()
                            });
                        }
                    }
                }

                ReportPicture {
                    picture_id,
                    page: page_no,
                    bbox: bbox_array(bbox),
                    children,
                }
            })
            .collect()
    }
}

/// Page number and bbox of an item; items without provenance land on page 1
fn prov_page(prov: &[super::raw::RawProv]) -> (u32, Option<RawBBox>) {
    match prov.first() {
        Some(p) => (p.page_no, p.bbox),
        None => (1, None),
    }
}

fn bbox_array(bbox: Option<RawBBox>) -> [f64; 4] {
    match bbox {
        Some(b) => [b.l, b.t, b.r, b.b],
        None => [0.0, 0.0, 0.0, 0.0],
    }
}

/// Render a cell grid as a GitHub-flavored markdown table
pub fn table_to_markdown(data: &RawTableData) -> String {
    let rows: Vec<Vec<String>> = data
        .grid
        .iter()
        .map(|row| row.iter().map(|cell| cell.text.replace('|', "\\|")).collect())
        .collect();

    if rows.is_empty() {
        return String::new();
    }

    let columns = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut lines = Vec::new();

    let render_row = |row: &[String]| {
        let mut padded: Vec<&str> = row.iter().map(|s| s.as_str()).collect();
        padded.resize(columns, "");
        format!("| {} |", padded.join(" | "))
    };

    if rows.len() > 1 {
        lines.push(render_row(&rows[0]));
        lines.push(format!("|{}|", vec![" --- "; columns].join("|")));
        for row in &rows[1..] {
            lines.push(render_row(row));
        }
    } else {
        lines.push(render_row(&rows[0]));
    }

    lines.join("\n")
}

/// Fill page gaps with empty pages so numbering is contiguous 1..max
pub fn normalize_page_sequence(report: &mut ProcessedReport) {
    let Some(max_page) = report.content.iter().map(|p| p.page).max() else {
        return;
    };

    let mut by_page: std::collections::BTreeMap<u32, ReportPage> = report
        .content
        .drain(..)
        .map(|page| (page.page, page))
        .collect();

    report.content = (1..=max_page)
        .map(|n| by_page.remove(&n).unwrap_or_else(|| ReportPage::empty(n)))
        .collect();
}

/// Merge ordered partial reports into one canonical report (fan-in)
pub fn merge_reports(parts: Vec<ProcessedReport>) -> ProcessedReport {
    let mut merged = ProcessedReport::default();
    let mut metainfo = parts
        .iter()
        .find_map(|p| p.metainfo.clone())
        .unwrap_or_default();

    let mut page_offset: u32 = 0;
    for part in parts {
        let part_pages = part.content.len() as u32;

        for mut page in part.content {
            page.page = merged.content.len() as u32 + 1;
            merged.content.push(page);
        }

        for mut table in part.tables {
            table.page += page_offset;
            merged.tables.push(table);
        }
        for mut picture in part.pictures {
            picture.page += page_offset;
            merged.pictures.push(picture);
        }

        page_offset += part_pages;
    }

    metainfo.pages_amount = merged.content.len();
    metainfo.tables_amount = merged.tables.len();
    metainfo.pictures_amount = merged.pictures.len();
    metainfo.text_blocks_amount = merged
        .content
        .iter()
        .flat_map(|p| p.content.iter())
        .filter(|b| b.is_text_block())
        .count();
    metainfo.footnotes_amount = merged
        .content
        .iter()
        .flat_map(|p| p.content.iter())
        .filter(|b| b.block_type == LABEL_FOOTNOTE)
        .count();
    metainfo.equations_amount = merged
        .content
        .iter()
        .flat_map(|p| p.content.iter())
        .filter(|b| b.block_type == LABEL_FORMULA)
        .count();

    merged.metainfo = Some(metainfo);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::raw::{RawCell, RawOrigin, RawProv, RawText};

    fn text_item(index: usize, label: &str, text: &str, page_no: u32) -> RawText {
        RawText {
            self_ref: format!("#/texts/{}", index),
            label: label.to_string(),
            text: text.to_string(),
            orig: None,
            prov: vec![RawProv {
                page_no,
                bbox: None,
            }],
            children: Vec::new(),
            enumerated: None,
            marker: None,
        }
    }

    fn raw_two_pages() -> RawDocument {
        let mut raw = RawDocument {
            origin: RawOrigin {
                filename: "doc.pdf".to_string(),
            },
            ..Default::default()
        };
        raw.pages.insert("1".to_string(), serde_json::json!({}));
        raw.pages.insert("2".to_string(), serde_json::json!({}));
        raw.texts.push(text_item(0, "section_header", "Intro", 1));
        raw.texts.push(text_item(1, "paragraph", "Body text", 2));
        raw.body.children.push(RawRef::texts(0));
        raw.body.children.push(RawRef::texts(1));
        raw
    }

    #[test]
    fn test_assemble_basic() {
        let report = ReportAssembler::assemble(&raw_two_pages());
        let metainfo = report.metainfo.unwrap();
        assert_eq!(metainfo.sha1_name, "doc");
        assert_eq!(metainfo.pages_amount, 2);
        assert_eq!(metainfo.text_blocks_amount, 2);

        assert_eq!(report.content.len(), 2);
        assert_eq!(report.content[0].page, 1);
        assert_eq!(report.content[0].content[0].text.as_deref(), Some("Intro"));
        assert_eq!(report.content[1].content[0].text_id, Some(1));
    }

    #[test]
    fn test_assemble_fills_page_gaps() {
        let mut raw = raw_two_pages();
        // Move the second text to page 4, leaving pages 2 and 3 empty
        raw.texts[1].prov[0].page_no = 4;

        let report = ReportAssembler::assemble(&raw);
        let page_numbers: Vec<u32> = report.content.iter().map(|p| p.page).collect();
        assert_eq!(page_numbers, vec![1, 2, 3, 4]);
        assert!(report.content[1].content.is_empty());
        assert!(report.content[2].content.is_empty());
    }

    #[test]
    fn test_assemble_table_and_picture_refs() {
        let mut raw = raw_two_pages();
        raw.tables.push(crate::domain::raw::RawTable {
            self_ref: "#/tables/0".to_string(),
            prov: vec![RawProv {
                page_no: 2,
                bbox: None,
            }],
            data: RawTableData {
                num_rows: 2,
                num_cols: 2,
                grid: vec![
                    vec![
                        RawCell {
                            text: "h1".to_string(),
                        },
                        RawCell {
                            text: "h2".to_string(),
                        },
                    ],
                    vec![
                        RawCell {
                            text: "a".to_string(),
                        },
                        RawCell {
                            text: "b".to_string(),
                        },
                    ],
                ],
            },
        });
        raw.body.children.push(RawRef::tables(0));

        let report = ReportAssembler::assemble(&raw);
        assert_eq!(report.tables.len(), 1);
        assert_eq!(report.tables[0].page, 2);
        assert!(report.tables[0].markdown.contains("| h1 | h2 |"));
        assert!(report.tables[0].markdown.contains("| --- | --- |"));

        let page2_blocks = &report.content[1].content;
        assert!(page2_blocks.iter().any(|b| b.block_type == BLOCK_TABLE));
    }

    #[test]
    fn test_group_expansion_tags_children() {
        let mut raw = RawDocument {
            origin: RawOrigin {
                filename: "doc.pdf".to_string(),
            },
            ..Default::default()
        };
        raw.texts.push(text_item(0, "list_item", "First", 1));
        raw.texts.push(text_item(1, "list_item", "Second", 1));
        raw.groups.push(crate::domain::raw::RawGroup {
            name: "list".to_string(),
            label: "list".to_string(),
            children: vec![RawRef::texts(0), RawRef::texts(1)],
        });
        raw.body.children.push(RawRef {
            reference: "#/groups/0".to_string(),
        });

        let report = ReportAssembler::assemble(&raw);
        let blocks = &report.content[0].content;
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].group_id, Some(0));
        assert_eq!(blocks[0].group_label.as_deref(), Some("list"));
    }

    #[test]
    fn test_nested_text_children_collected() {
        let mut raw = RawDocument::default();
        let mut parent = text_item(0, "section_header", "Parent", 1);
        parent.children.push(RawRef::texts(1));
        raw.texts.push(parent);
        raw.texts.push(text_item(1, "text", "Nested", 1));
        raw.body.children.push(RawRef::texts(0));

        let report = ReportAssembler::assemble(&raw);
        let blocks = &report.content[0].content;
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].text.as_deref(), Some("Nested"));
    }

    #[test]
    fn test_table_to_markdown_single_row() {
        let data = RawTableData {
            num_rows: 1,
            num_cols: 2,
            grid: vec![vec![
                RawCell {
                    text: "only".to_string(),
                },
                RawCell {
                    text: "row".to_string(),
                },
            ]],
        };
        assert_eq!(table_to_markdown(&data), "| only | row |");
    }

    #[test]
    fn test_merge_rebases_pages() {
        let part = |pages: u32, table_page: Option<u32>| {
            let mut report = ProcessedReport {
                metainfo: Some(MetaInfo {
                    sha1_name: "doc".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            };
            for n in 1..=pages {
                let mut page = ReportPage::empty(n);
                page.content.push(ContentBlock {
                    block_type: "paragraph".to_string(),
                    text: Some(format!("p{}", n)),
                    text_id: Some(n as usize),
                    ..Default::default()
                });
                report.content.push(page);
            }
            if let Some(tp) = table_page {
                report.tables.push(ReportTable {
                    table_id: 0,
                    page: tp,
                    bbox: [0.0; 4],
                    num_rows: 1,
                    num_cols: 1,
                    markdown: String::new(),
                });
            }
            report
        };

        let merged = merge_reports(vec![part(10, None), part(10, Some(3)), part(5, None)]);

        assert_eq!(merged.content.len(), 25);
        let page_numbers: Vec<u32> = merged.content.iter().map(|p| p.page).collect();
        assert_eq!(page_numbers, (1..=25).collect::<Vec<u32>>());

        // Table on page 3 of the second part lands on merged page 13
        assert_eq!(merged.tables[0].page, 13);

        let metainfo = merged.metainfo.unwrap();
        assert_eq!(metainfo.pages_amount, 25);
        assert_eq!(metainfo.tables_amount, 1);
        assert_eq!(metainfo.text_blocks_amount, 25);
    }

    #[test]
    fn test_merge_empty_parts() {
        let merged = merge_reports(vec![]);
        assert!(merged.content.is_empty());
        assert_eq!(merged.metainfo.unwrap().pages_amount, 0);
    }

    #[test]
    fn test_normalize_noop_when_contiguous() {
        let mut report = ProcessedReport::default();
        report.content.push(ReportPage::empty(1));
        report.content.push(ReportPage::empty(2));
        normalize_page_sequence(&mut report);
        assert_eq!(report.content.len(), 2);
    }
}
