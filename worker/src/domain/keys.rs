//! Artifact key derivation
//!
//! Every artifact of a document is addressed by a key derived from the root
//! upload key `K`:
//!
//! - `K.part{i}`              raw bytes of PDF batch i (fan-out only)
//! - `K.part{i}.parsed.json`  partial report for batch i
//! - `K.parsed.json`          canonical report
//! - `K.parsed.md`            markdown rendering
//! - `K.chunked.json`         chunked representation for indexing
//!
//! Progress records reuse the same scheme: `K.parsing`, `K.chunking`,
//! `K.parts_progress`.

const PARSED_JSON_SUFFIX: &str = ".parsed.json";
const PARSED_MD_SUFFIX: &str = ".parsed.md";
const CHUNKED_JSON_SUFFIX: &str = ".chunked.json";
const PART_INFIX: &str = ".part";

/// Key set for one document, derived from its root key
#[derive(Debug, Clone)]
pub struct DocumentKeys {
    root: String,
}

impl DocumentKeys {
    pub fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn parsed_json(&self) -> String {
        format!("{}{}", self.root, PARSED_JSON_SUFFIX)
    }

    pub fn parsed_md(&self) -> String {
        format!("{}{}", self.root, PARSED_MD_SUFFIX)
    }

    pub fn chunked_json(&self) -> String {
        format!("{}{}", self.root, CHUNKED_JSON_SUFFIX)
    }

    pub fn part(&self, index: u32) -> String {
        format!("{}{}{}", self.root, PART_INFIX, index)
    }

    pub fn part_parsed_json(&self, index: u32) -> String {
        format!("{}{}{}{}", self.root, PART_INFIX, index, PARSED_JSON_SUFFIX)
    }

    /// Prefix matching every part artifact (raw bytes and partial reports)
    pub fn part_prefix(&self) -> String {
        format!("{}{}", self.root, PART_INFIX)
    }

    pub fn parsing_progress(&self) -> String {
        format!("{}.parsing", self.root)
    }

    pub fn chunking_progress(&self) -> String {
        format!("{}.chunking", self.root)
    }

    pub fn parts_progress(&self) -> String {
        format!("{}.parts_progress", self.root)
    }
}

/// Whether a listed part key is a partial report rather than raw batch bytes
pub fn is_parsed_part_key(key: &str) -> bool {
    key.ends_with(PARSED_JSON_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_keys() {
        let keys = DocumentKeys::new("u/doc.pdf");
        assert_eq!(keys.parsed_json(), "u/doc.pdf.parsed.json");
        assert_eq!(keys.parsed_md(), "u/doc.pdf.parsed.md");
        assert_eq!(keys.chunked_json(), "u/doc.pdf.chunked.json");
        assert_eq!(keys.part(0), "u/doc.pdf.part0");
        assert_eq!(keys.part_parsed_json(2), "u/doc.pdf.part2.parsed.json");
        assert_eq!(keys.part_prefix(), "u/doc.pdf.part");
    }

    #[test]
    fn test_progress_keys() {
        let keys = DocumentKeys::new("u/doc.pdf");
        assert_eq!(keys.parsing_progress(), "u/doc.pdf.parsing");
        assert_eq!(keys.chunking_progress(), "u/doc.pdf.chunking");
        assert_eq!(keys.parts_progress(), "u/doc.pdf.parts_progress");
    }

    #[test]
    fn test_is_parsed_part_key() {
        assert!(is_parsed_part_key("u/doc.pdf.part0.parsed.json"));
        assert!(!is_parsed_part_key("u/doc.pdf.part0"));
    }
}
