//! Page text preparation and markdown rendering
//!
//! Turns the block structure of a processed report into clean page text:
//! header levels by position, tables and lists grouped with their colon-ended
//! lead-ins and trailing footnotes, code fences, checkbox markers, and font
//! glyph artifact cleanup left behind by PDF text extraction.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::report::{ContentBlock, ProcessedReport};

/// Block types dropped before rendering
const IGNORED_TYPES: [&str; 2] = ["page_footer", "picture"];

static SLASH_COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"/(zero|one|two|three|four|five|six|seven|eight|nine|period|comma|colon|hyphen|percent|dollar|space|plus|minus|slash|asterisk|lparen|rparen|parenright|parenleft)(\.pl\.tnum|\.tnum\.pl|\.pl|\.tnum|\.case|\.sups)",
    )
    .expect("valid slash command regex")
});

static GLYPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"glyph<[^>]*>").expect("valid glyph regex"));

static CAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([A-Z])\.cap").expect("valid cap regex"));

fn slash_replacement(command: &str) -> &'static str {
    match command {
        "zero" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "period" => ".",
        "comma" => ",",
        "colon" => ":",
        "hyphen" | "minus" => "-",
        "percent" => "%",
        "dollar" => "$",
        "space" => " ",
        "plus" => "+",
        "slash" => "/",
        "asterisk" => "*",
        "lparen" | "parenleft" => "(",
        "rparen" | "parenright" => ")",
        _ => "",
    }
}

/// Replace extraction artifacts, returning the cleaned text and the number
/// of corrections made
pub fn clean_text(text: &str) -> (String, usize) {
    let mut corrections = 0;

    let cleaned = SLASH_COMMAND_RE.replace_all(text, |caps: &regex::Captures| {
        corrections += 1;
        slash_replacement(&caps[1]).to_string()
    });
    let cleaned = GLYPH_RE.replace_all(&cleaned, |_: &regex::Captures| {
        corrections += 1;
        String::new()
    });
    let cleaned = CAP_RE.replace_all(&cleaned, |caps: &regex::Captures| {
        corrections += 1;
        caps[1].to_string()
    });

    (cleaned.into_owned(), corrections)
}

/// One page reduced to prepared text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedPage {
    pub page: u32,
    pub text: String,
}

/// Chunk emitted by the text splitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    #[serde(rename = "type")]
    pub chunk_type: String,
    pub page: u32,
    pub length_tokens: usize,
    pub text: String,
}

/// Prepared report: page texts, later extended with chunks by the splitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedReport {
    pub chunks: Option<Vec<Chunk>>,
    pub pages: Vec<PreparedPage>,
}

/// Cleans and formats report pages for chunking and markdown export
pub struct PageTextPreparation<'a> {
    report: &'a ProcessedReport,
}

impl<'a> PageTextPreparation<'a> {
    pub fn new(report: &'a ProcessedReport) -> Self {
        Self { report }
    }

    /// Process the whole report into prepared page texts
    pub fn process_report(&self) -> PreparedReport {
        let mut pages = Vec::new();
        let mut total_corrections = 0;

        for page in &self.report.content {
            let page_text = self.prepare_page_text(page.page);
            let (cleaned, corrections) = clean_text(&page_text);
            total_corrections += corrections;
            pages.push(PreparedPage {
                page: page.page,
                text: cleaned,
            });
        }

        if total_corrections > 0 {
            let name = self
                .report
                .metainfo
                .as_ref()
                .map(|m| m.sha1_name.as_str())
                .unwrap_or("<unknown>");
            tracing::debug!(
                document = name,
                corrections = total_corrections,
                "Fixed glyph artifacts in extracted text"
            );
        }

        PreparedReport {
            chunks: None,
            pages,
        }
    }

    /// Assemble the prepared text of a single page
    pub fn prepare_page_text(&self, page_number: u32) -> String {
        let Some(page) = self.report.content.iter().find(|p| p.page == page_number) else {
            return String::new();
        };

        let blocks: Vec<&ContentBlock> = page
            .content
            .iter()
            .filter(|b| !IGNORED_TYPES.contains(&b.block_type.as_str()))
            .collect();

        let mut rendered = self.apply_formatting_rules(&blocks);

        if let Some(first) = rendered.first_mut() {
            *first = first.trim_start().to_string();
        }
        if let Some(last) = rendered.last_mut() {
            *last = last.trim_end().to_string();
        }

        rendered.join("\n")
    }

    fn block_text(block: &ContentBlock) -> &str {
        block.text.as_deref().unwrap_or("").trim()
    }

    fn ends_with_colon(block: &ContentBlock) -> bool {
        matches!(
            block.block_type.as_str(),
            "text" | "caption" | "section_header" | "paragraph"
        ) && Self::block_text(block).ends_with(':')
    }

    fn apply_formatting_rules(&self, blocks: &[&ContentBlock]) -> Vec<String> {
        let page_header_in_first_3 = blocks
            .iter()
            .take(3)
            .any(|b| b.block_type == "page_header");

        let mut rendered = Vec::new();
        let mut section_headers_seen = 0usize;

        let n = blocks.len();
        let mut i = 0;
        while i < n {
            let block = blocks[i];
            let text = Self::block_text(block);

            match block.block_type.as_str() {
                "page_header" => {
                    let prefix = if i < 3 { "\n# " } else { "\n## " };
                    rendered.push(format!("{}{}\n", prefix, text));
                    i += 1;
                }
                "section_header" => {
                    section_headers_seen += 1;
                    let prefix =
                        if section_headers_seen == 1 && i < 3 && !page_header_in_first_3 {
                            "\n# "
                        } else {
                            "\n## "
                        };
                    rendered.push(format!("{}{}\n", prefix, text));
                    i += 1;
                }
                "paragraph"
                    if !(Self::ends_with_colon(block)
                        && i + 1 < n
                        && matches!(blocks[i + 1].block_type.as_str(), "table" | "list_item")) =>
                {
                    rendered.push(format!("\n### {}\n", text));
                    i += 1;
                }
                "table" => {
                    i = self.render_table_group(blocks, i, None, &mut rendered);
                }
                _ if Self::ends_with_colon(block)
                    && i + 1 < n
                    && blocks[i + 1].block_type == "table" =>
                {
                    i = self.render_table_group(blocks, i + 1, Some(block), &mut rendered);
                }
                "list_item" => {
                    i = Self::render_list_group(blocks, i, None, &mut rendered);
                }
                _ if Self::ends_with_colon(block)
                    && i + 1 < n
                    && blocks[i + 1].block_type == "list_item" =>
                {
                    i = Self::render_list_group(blocks, i + 1, Some(block), &mut rendered);
                }
                "code" => {
                    rendered.push(format!("\n```\n{}\n```\n", text));
                    i += 1;
                }
                _ => {
                    if !text.is_empty() {
                        rendered.push(format!("{}\n", text));
                    }
                    i += 1;
                }
            }
        }

        rendered
    }

    /// Render a table with its optional lead-in and trailing footnotes;
    /// returns the index after the consumed group
    fn render_table_group(
        &self,
        blocks: &[&ContentBlock],
        table_index: usize,
        header: Option<&ContentBlock>,
        rendered: &mut Vec<String>,
    ) -> usize {
        let n = blocks.len();
        let mut chunk = Vec::new();

        if let Some(header) = header {
            chunk.push(format!("{}\n", Self::block_text(header)));
        }

        if let Some(table_id) = blocks[table_index].table_id {
            if let Some(markdown) = self.table_markdown(table_id) {
                chunk.push(format!("{}\n", markdown));
            }
        }
        let mut i = table_index + 1;

        // A single text block is pulled in when footnotes follow it
        if i < n
            && blocks[i].block_type == "text"
            && i + 1 < n
            && blocks[i + 1].block_type == "footnote"
        {
            chunk.push(format!("{}\n", Self::block_text(blocks[i])));
            i += 1;
        }
        while i < n && blocks[i].block_type == "footnote" {
            chunk.push(format!("{}\n", Self::block_text(blocks[i])));
            i += 1;
        }

        rendered.push(format!("\n{}\n", chunk.concat()));
        i
    }

    /// Render a run of list items with its optional lead-in and trailing
    /// footnotes; returns the index after the consumed group
    fn render_list_group(
        blocks: &[&ContentBlock],
        first_item: usize,
        header: Option<&ContentBlock>,
        rendered: &mut Vec<String>,
    ) -> usize {
        let n = blocks.len();
        let mut chunk = Vec::new();

        if let Some(header) = header {
            chunk.push(format!("{}\n", Self::block_text(header)));
        }

        let mut i = first_item;
        while i < n {
            let text = Self::block_text(blocks[i]);
            match blocks[i].block_type.as_str() {
                "list_item" => chunk.push(format!("- {}\n", text)),
                "checkbox_selected" => chunk.push(format!("[x] {}\n", text)),
                "checkbox_unselected" => chunk.push(format!("[ ] {}\n", text)),
                _ => break,
            }
            i += 1;
        }

        if i < n
            && blocks[i].block_type == "text"
            && i + 1 < n
            && blocks[i + 1].block_type == "footnote"
        {
            chunk.push(format!("{}\n", Self::block_text(blocks[i])));
            i += 1;
        }
        while i < n && blocks[i].block_type == "footnote" {
            chunk.push(format!("{}\n", Self::block_text(blocks[i])));
            i += 1;
        }

        rendered.push(format!("\n{}\n", chunk.concat()));
        i
    }

    fn table_markdown(&self, table_id: usize) -> Option<&str> {
        self.report
            .tables
            .iter()
            .find(|t| t.table_id == table_id)
            .map(|t| t.markdown.as_str())
    }
}

/// Render the whole report as a markdown document (the `.parsed.md` artifact)
pub fn render_markdown(report: &ProcessedReport) -> String {
    let mut parts = Vec::new();

    if let Some(metainfo) = &report.metainfo {
        parts.push(format!("# {}\n", metainfo.sha1_name));
    }

    let preparation = PageTextPreparation::new(report);
    for page in &report.content {
        parts.push(format!("\n---\n\n## Page {}\n", page.page));
        let page_text = preparation.prepare_page_text(page.page);
        if !page_text.is_empty() {
            let (cleaned, _) = clean_text(&page_text);
            parts.push(cleaned);
        }
    }

    parts.join("\n")
}
