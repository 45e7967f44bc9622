//! bookforge: CLI that drives a conversational AI chat service to draft a book
//! on a topic, outputting EPUB.

pub mod cli;
pub mod config;
pub mod epub;
pub mod generator;
pub mod lang;
pub mod model;
pub mod render;

// Re-exports for CLI and consumers.
pub use epub::{write_epub, EpubError};
pub use generator::{
    generate_book, BookRequest, ChatClient, ChatClientBuilder, GenerateOptions, GeneratorError,
};
pub use model::{Book, Section, Subsection};
