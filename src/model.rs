//! Canonical data model for a generated book.
//!
//! The generator fills this shape chapter by chapter; the EPUB writer consumes it.
//! It also serializes to the `.content.json` sidecar used for checkpointing and
//! `--resume`.

use serde::{Deserialize, Serialize};

/// One generated book: title, topic, authors, language, raw TOC reply, sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    /// Topic the book was requested for. Checked on `--resume`.
    pub topic: String,
    pub authors: Vec<String>,
    /// 2-letter ISO 639-1 code (EPUB dc:language).
    pub language: String,
    /// Raw table-of-contents reply from the chat service, kept for the sidecar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toc: Option<String>,
    pub sections: Vec<Section>,
}

/// One top-level TOC entry. Either carries its own body (leaf section) or
/// subsections that each carry a body; never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    /// None until generated, and always None when the section has subsections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsections: Vec<Subsection>,
}

/// One second-level TOC entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subsection {
    pub title: String,
    /// None until generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Section {
    pub fn leaf(title: impl Into<String>) -> Self {
        Section {
            title: title.into(),
            body: None,
            subsections: Vec::new(),
        }
    }
}

impl Book {
    /// Number of chapter bodies the book needs (leaf sections plus subsections).
    pub fn chapter_count(&self) -> u32 {
        self.sections
            .iter()
            .map(|s| {
                if s.subsections.is_empty() {
                    1
                } else {
                    s.subsections.len() as u32
                }
            })
            .sum()
    }

    /// True once every leaf section and subsection has a body.
    pub fn is_complete(&self) -> bool {
        !self.sections.is_empty()
            && self.sections.iter().all(|s| {
                if s.subsections.is_empty() {
                    s.body.is_some()
                } else {
                    s.subsections.iter().all(|sub| sub.body.is_some())
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn sample_book() -> Book {
        Book {
            title: "A Field Guide to Sourdough".to_string(),
            topic: "sourdough baking".to_string(),
            authors: vec!["Jo Baker".to_string()],
            language: "en".to_string(),
            toc: Some("1. Starters\n2. Baking\n".to_string()),
            sections: vec![
                Section {
                    title: "Starters".to_string(),
                    body: Some("Flour and water.\n\nWait a week.".to_string()),
                    subsections: Vec::new(),
                },
                Section {
                    title: "Baking".to_string(),
                    body: None,
                    subsections: vec![
                        Subsection {
                            title: "Shaping".to_string(),
                            body: Some("Fold gently.".to_string()),
                        },
                        Subsection {
                            title: "Scoring".to_string(),
                            body: Some("One confident cut.".to_string()),
                        },
                    ],
                },
            ],
        }
    }

    #[test]
    fn chapter_count_counts_leaves_and_subsections() {
        assert_eq!(sample_book().chapter_count(), 3);
    }

    #[test]
    fn is_complete_when_all_bodies_present() {
        assert!(sample_book().is_complete());
    }

    #[test]
    fn is_complete_false_with_missing_leaf_body() {
        let mut book = sample_book();
        book.sections[0].body = None;
        assert!(!book.is_complete());
    }

    #[test]
    fn is_complete_false_with_missing_subsection_body() {
        let mut book = sample_book();
        book.sections[1].subsections[1].body = None;
        assert!(!book.is_complete());
    }

    #[test]
    fn is_complete_false_with_no_sections() {
        let mut book = sample_book();
        book.sections.clear();
        assert!(!book.is_complete());
    }

    #[test]
    fn round_trips_through_content_json() -> Result<(), Box<dyn Error>> {
        let book = sample_book();
        let json = serde_json::to_string(&book)?;
        assert!(json.contains("\"title\":\"A Field Guide to Sourdough\""));
        assert!(json.contains("\"topic\":\"sourdough baking\""));
        let loaded: Book = serde_json::from_str(&json)?;
        assert_eq!(loaded.title, book.title);
        assert_eq!(loaded.sections.len(), 2);
        assert_eq!(loaded.sections[1].subsections.len(), 2);
        assert_eq!(
            loaded.sections[1].subsections[0].body.as_deref(),
            Some("Fold gently.")
        );
        Ok(())
    }

    #[test]
    fn missing_body_deserializes_as_none() -> Result<(), Box<dyn Error>> {
        let json = r#"{
            "title": "T", "topic": "t", "authors": ["a"], "language": "en",
            "sections": [{"title": "One"}]
        }"#;
        let book: Book = serde_json::from_str(json)?;
        assert!(book.sections[0].body.is_none());
        assert!(book.sections[0].subsections.is_empty());
        assert!(!book.is_complete());
        Ok(())
    }
}
