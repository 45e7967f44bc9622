//! CLI parsing and orchestration. Parses args, runs login -> generation ->
//! EPUB, writes the content JSON sidecar, and maps errors to exit codes.

use crate::config;
use crate::epub::{write_epub, EpubError};
use crate::generator::{generate_book, BookRequest, ChatClient, GenerateOptions, GeneratorError};
use crate::lang::{self, Language};
use crate::model::Book;
use clap::Parser;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Generator(#[from] GeneratorError),

    #[error("{0}")]
    Epub(#[from] EpubError),

    #[error("{0}")]
    Output(String),

    #[error("{0}")]
    Validation(String),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Generator(_) => 2,
            CliRunError::Epub(_) | CliRunError::Output(_) | CliRunError::Validation(_) => 3,
        }
    }
}

/// Run epubcheck on the given EPUB path. Requires epubcheck on PATH.
fn validate_epub(path: &PathBuf) -> Result<(), CliRunError> {
    let output = std::process::Command::new("epubcheck")
        .arg(path)
        .output()
        .map_err(|e| {
            CliRunError::Validation(format!(
                "Could not run epubcheck: {}. Is epubcheck installed and on PATH?",
                e
            ))
        })?;
    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let msg = if stderr.is_empty() { stdout } else { stderr };
        Err(CliRunError::Validation(format!(
            "epubcheck reported errors:\n{}",
            msg.trim()
        )))
    }
}

#[derive(Parser, Debug)]
#[command(name = "bookforge")]
#[command(about = "Drive a chat service to draft a book on a topic and write it as EPUB")]
#[command(
    after_help = "Credentials are read from ./config.json (or ~/.config/bookforge/config.json): \
                  a JSON object with \"email\", \"password\", and \"isMicrosoftLogin\". Settings \
                  file keys (output_dir, base_url, user_agent, request_delay_secs, timeout_secs, \
                  retry_count, retry_backoff_secs, toc_page) live in ./bookforge.toml. CLI flags \
                  override settings."
)]
pub struct Args {
    /// Topic of the desired book.
    #[arg(long)]
    pub topic: String,

    /// Filename to save the EPUB book as.
    #[arg(long, default_value = "book.epub")]
    pub fname: PathBuf,

    /// Directory to save books in. Default: settings output_dir, else the current directory.
    #[arg(long)]
    pub directory: Option<PathBuf>,

    /// Names of book authors (repeatable).
    #[arg(long, num_args = 1.., default_value = "[UNKNOWN]")]
    pub authors: Vec<String>,

    /// Language to write the book in (full name or 2-letter code). Unknown values fall back to English.
    #[arg(long, default_value = "English")]
    pub language: String,

    /// Custom book title. If not specified, a title will be generated.
    #[arg(long)]
    pub title: Option<String>,

    /// Path to the JSON credentials file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Reload the content JSON sidecar from a previous run and only generate missing chapters.
    #[arg(long)]
    pub resume: bool,

    /// Generate title and table of contents only; print the planned outline and write nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Include toc.ncx for legacy readers.
    #[arg(long)]
    pub ncx: bool,

    /// After writing the EPUB, run epubcheck to validate it (epubcheck must be on PATH).
    #[arg(long)]
    pub validate: bool,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Print verbose error chain.
    #[arg(long)]
    pub verbose: bool,

    /// Delay between chat requests in seconds (overrides settings; default 2).
    #[arg(long)]
    pub delay: Option<u64>,

    /// Request timeout in seconds (overrides settings; default 120).
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Resolve the requested language, falling back to English with a warning.
fn resolve_language(input: &str, quiet: bool) -> Language {
    match lang::resolve(input) {
        Some(language) => language,
        None => {
            if !quiet {
                eprintln!(
                    "Language '{}' is not supported; defaulting to English.",
                    input
                );
            }
            Language::english()
        }
    }
}

/// Sidecar path for the content JSON: fname with a trailing ".epub" replaced
/// by ".content.json" (appended when fname has a different extension).
fn content_json_fname(fname: &Path) -> PathBuf {
    let name = fname.to_string_lossy();
    match name.strip_suffix(".epub") {
        Some(stem) => PathBuf::from(format!("{}.content.json", stem)),
        None => PathBuf::from(format!("{}.content.json", name)),
    }
}

/// Ensure output path parent exists; return path.
fn validate_output_path(path: &Path) -> Result<(), CliRunError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                path.display()
            )));
        }
    }
    Ok(())
}

fn print_outline(book: &Book) {
    eprintln!("Title: {}", book.title);
    for (i, section) in book.sections.iter().enumerate() {
        eprintln!("  {}. {}", i + 1, section.title);
        for sub in &section.subsections {
            eprintln!("     - {}", sub.title);
        }
    }
    eprintln!("Chapters: {}", book.chapter_count());
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    if args.topic.trim().is_empty() {
        return Err(CliRunError::InvalidInput(
            "Topic is empty. Pass --topic with the subject of the book.".to_string(),
        ));
    }

    let language = resolve_language(&args.language, args.quiet);
    let settings = config::load_settings().map_err(CliRunError::InvalidInput)?;
    let credentials =
        config::load_credentials(args.config.as_deref()).map_err(CliRunError::InvalidInput)?;

    let effective_output_dir: PathBuf = args
        .directory
        .clone()
        .or_else(|| settings.as_ref().and_then(|s| s.output_dir.clone()))
        .unwrap_or_else(|| PathBuf::from("."));

    const DEFAULT_DELAY_SECS: u64 = 2;
    const DEFAULT_TIMEOUT_SECS: u64 = 120;
    const DEFAULT_RETRY_COUNT: u32 = 3;
    let delay_secs = args
        .delay
        .or_else(|| settings.as_ref().and_then(|s| s.request_delay_secs))
        .unwrap_or(DEFAULT_DELAY_SECS);
    let timeout_secs = args
        .timeout
        .or_else(|| settings.as_ref().and_then(|s| s.timeout_secs))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let retry_count = settings
        .as_ref()
        .and_then(|s| s.retry_count)
        .unwrap_or(DEFAULT_RETRY_COUNT)
        .max(1);
    let retry_backoff_secs = settings
        .as_ref()
        .and_then(|s| s.retry_backoff_secs.clone())
        .unwrap_or_else(|| vec![1, 2, 4]);

    let mut builder = ChatClient::builder()
        .delay_secs(delay_secs)
        .timeout_secs(timeout_secs)
        .retry_count(retry_count)
        .retry_backoff_secs(retry_backoff_secs);
    if let Some(base_url) = settings.as_ref().and_then(|s| s.base_url.clone()) {
        builder = builder.base_url(base_url);
    }
    if let Some(ua) = settings.as_ref().and_then(|s| s.user_agent.clone()) {
        builder = builder.user_agent(ua);
    }
    let mut client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let output_path = effective_output_dir.join(&args.fname);
    let sidecar_path = effective_output_dir.join(content_json_fname(&args.fname));
    validate_output_path(&output_path)?;

    client.login(&credentials)?;

    let initial_book: Option<Book> = if args.resume {
        match std::fs::File::open(&sidecar_path) {
            Ok(f) => {
                let loaded: Book = serde_json::from_reader(f).map_err(|e| {
                    CliRunError::InvalidInput(format!(
                        "Invalid content file {}: {}",
                        sidecar_path.display(),
                        e
                    ))
                })?;
                if loaded.topic.trim() != args.topic.trim() {
                    return Err(CliRunError::InvalidInput(format!(
                        "Content file is for a different topic ({}). Use the same --topic as the original run ({}).",
                        loaded.topic, args.topic
                    )));
                }
                Some(loaded)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(CliRunError::InvalidInput(format!(
                    "Cannot read content file {}: {}",
                    sidecar_path.display(),
                    e
                )))
            }
        }
    } else {
        None
    };
    let initial_book_ref = initial_book.as_ref();

    let request = BookRequest {
        topic: args.topic.clone(),
        title: args.title.clone(),
        authors: args.authors.clone(),
        language,
    };

    if args.dry_run {
        let dry_run_opts = GenerateOptions {
            progress: None,
            on_checkpoint: None,
            initial_book: None,
            outline_only: true,
        };
        let book = generate_book(&mut client, &request, &dry_run_opts)?;
        print_outline(&book);
        eprintln!("Output: {}", output_path.display());
        return Ok(());
    }

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |n: u32, total: u32| {
        if total == 0 {
            return;
        }
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new(total as u64);
            bar.set_style(
                indicatif::ProgressStyle::default_bar()
                    .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
                    .unwrap()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                    .progress_chars("█▉▊▋▌▍▎▏ "),
            );
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_position(n as u64);
        pb.set_message(format!("Writing chapter {}/{}", n, total));
    };
    let progress: Option<&dyn Fn(u32, u32)> = if args.quiet { None } else { Some(&progress_cb) };

    let checkpoint_path = sidecar_path.clone();
    let checkpoint_cb = |book: &Book| {
        if let Err(e) = std::fs::File::create(&checkpoint_path).and_then(|f| {
            serde_json::to_writer(f, book)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        }) {
            eprintln!(
                "Warning: could not write content file {}: {}",
                checkpoint_path.display(),
                e
            );
        }
    };

    let generate_opts = GenerateOptions {
        progress,
        on_checkpoint: Some(&checkpoint_cb),
        initial_book: initial_book_ref,
        outline_only: false,
    };
    let book = generate_book(&mut client, &request, &generate_opts)?;

    if let Some(pb) = progress_state.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }

    // Final content JSON: authoritative copy of what went into the EPUB.
    let f = std::fs::File::create(&sidecar_path).map_err(|e| {
        CliRunError::Output(format!(
            "Failed to write content file {}: {}",
            sidecar_path.display(),
            e
        ))
    })?;
    serde_json::to_writer(f, &book).map_err(|e| {
        CliRunError::Output(format!(
            "Failed to write content file {}: {}",
            sidecar_path.display(),
            e
        ))
    })?;

    let include_toc_page = settings.as_ref().and_then(|s| s.toc_page).unwrap_or(true);
    write_epub(&book, &output_path, args.ncx, include_toc_page)?;
    if args.validate {
        validate_epub(&output_path)?;
    }

    if !args.quiet {
        eprintln!("Wrote {}", output_path.display());
    }
    Ok(())
}
