//! Conversation-driven book generation: priming, title, table of contents,
//! then chapter bodies, all in one chat session.

mod client;
mod error;

pub mod extract;
pub mod prompt;

pub use client::{ChatClient, ChatClientBuilder};
pub use error::GeneratorError;

use crate::lang::Language;
use crate::model::Book;

/// What to generate: topic plus the fixed metadata the user supplied.
#[derive(Debug, Clone)]
pub struct BookRequest {
    pub topic: String,
    /// Custom title. When set, title generation is skipped.
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub language: Language,
}

/// Options for a generation run: progress callback, checkpoint callback,
/// resume state, and outline-only mode.
pub struct GenerateOptions<'a> {
    pub progress: Option<&'a dyn Fn(u32, u32)>,
    /// Called with the partial book after each generated chapter body.
    pub on_checkpoint: Option<&'a dyn Fn(&Book)>,
    /// Previously checkpointed book; only missing bodies are generated.
    pub initial_book: Option<&'a Book>,
    /// Stop after the table of contents (used by --dry-run).
    pub outline_only: bool,
}

impl Default for GenerateOptions<'_> {
    fn default() -> Self {
        GenerateOptions {
            progress: None,
            on_checkpoint: None,
            initial_book: None,
            outline_only: false,
        }
    }
}

/// Run the full generation pipeline and return the completed book.
///
/// One conversation end to end: the priming prompt fixes topic and language,
/// then each stage builds on the replies before it. With `initial_book`,
/// already-present title/TOC/bodies are kept and only the gaps are filled.
pub fn generate_book(
    client: &mut ChatClient,
    request: &BookRequest,
    options: &GenerateOptions<'_>,
) -> Result<Book, GeneratorError> {
    client.ask(&prompt::priming(&request.topic, &request.language.name))?;

    let mut book: Book = match options.initial_book {
        Some(init) => init.clone(),
        None => Book {
            title: String::new(),
            topic: request.topic.clone(),
            authors: request.authors.clone(),
            language: request.language.code.clone(),
            toc: None,
            sections: Vec::new(),
        },
    };

    if let Some(ref custom) = request.title {
        book.title = custom.clone();
    } else if book.title.trim().is_empty() {
        let reply = client.ask(&prompt::title_options(&request.topic))?;
        book.title = extract::extract_first_option(&reply).ok_or(GeneratorError::TitleNotFound)?;
    }

    if book.sections.is_empty() {
        let reply = client.ask(&prompt::table_of_contents(&book.title))?;
        book.sections = extract::parse_outline(&reply)?;
        book.toc = Some(reply);
    }

    if options.outline_only {
        return Ok(book);
    }

    let total = book.chapter_count();
    let mut done = 0u32;
    for si in 0..book.sections.len() {
        if book.sections[si].subsections.is_empty() {
            done += 1;
            if book.sections[si].body.is_some() {
                continue;
            }
            if let Some(ref p) = options.progress {
                p(done, total);
            }
            let section_title = book.sections[si].title.clone();
            let reply = client.ask(&prompt::section_body(&section_title))?;
            let body = extract::extract_central_text(&reply);
            if body.trim().is_empty() {
                return Err(GeneratorError::EmptyReply {
                    context: format!("chapter '{}'", section_title),
                });
            }
            book.sections[si].body = Some(body);
            if let Some(ref cb) = options.on_checkpoint {
                cb(&book);
            }
        } else {
            for ti in 0..book.sections[si].subsections.len() {
                done += 1;
                if book.sections[si].subsections[ti].body.is_some() {
                    continue;
                }
                if let Some(ref p) = options.progress {
                    p(done, total);
                }
                let section_title = book.sections[si].title.clone();
                let sub_title = book.sections[si].subsections[ti].title.clone();
                let reply = client.ask(&prompt::subsection_body(&section_title, &sub_title))?;
                let body = extract::extract_central_text(&reply);
                if body.trim().is_empty() {
                    return Err(GeneratorError::EmptyReply {
                        context: format!("subsection '{}' of '{}'", sub_title, section_title),
                    });
                }
                book.sections[si].subsections[ti].body = Some(body);
                if let Some(ref cb) = options.on_checkpoint {
                    cb(&book);
                }
            }
        }
    }

    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang;
    use crate::model::Section;

    fn request() -> BookRequest {
        BookRequest {
            topic: "sourdough baking".to_string(),
            title: None,
            authors: vec!["[UNKNOWN]".to_string()],
            language: lang::Language::english(),
        }
    }

    #[test]
    fn default_options_have_no_callbacks() {
        let options = GenerateOptions::default();
        assert!(options.progress.is_none());
        assert!(options.on_checkpoint.is_none());
        assert!(options.initial_book.is_none());
        assert!(!options.outline_only);
    }

    #[test]
    fn request_carries_language_for_prompts() {
        let r = request();
        let p = prompt::priming(&r.topic, &r.language.name);
        assert!(p.contains("sourdough baking"));
        assert!(p.contains("English"));
    }

    #[test]
    fn resumed_book_counts_remaining_chapters() {
        let book = Book {
            title: "T".to_string(),
            topic: "sourdough baking".to_string(),
            authors: vec!["a".to_string()],
            language: "en".to_string(),
            toc: None,
            sections: vec![
                Section {
                    title: "Done".to_string(),
                    body: Some("text".to_string()),
                    subsections: Vec::new(),
                },
                Section::leaf("Pending"),
            ],
        };
        assert_eq!(book.chapter_count(), 2);
        assert!(!book.is_complete());
    }
}
