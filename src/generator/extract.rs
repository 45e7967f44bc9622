//! Reply parsing: pulling one option out of a numbered list, trimming chat
//! filler paragraphs, and turning a table-of-contents reply into an outline.

use crate::generator::error::GeneratorError;
use crate::model::{Section, Subsection};

/// Pick the first option from a reply that lists options.
///
/// A single non-empty line is taken as-is. Otherwise the first line starting
/// with `1.` or `1)` wins. Returns None when no option can be found.
pub fn extract_first_option(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() == 1 {
        return Some(clean_entry(lines[0]));
    }
    for line in lines {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("1.").or_else(|| trimmed.strip_prefix("1)")) {
            let option = rest.trim();
            if !option.is_empty() {
                return Some(clean_entry(option));
            }
        }
    }
    None
}

/// Drop the leading (and trailing) filler paragraph a chat reply tends to wrap
/// the content in. One block passes through; two blocks keep the second; three
/// or more keep everything between the first and last.
pub fn extract_central_text(text: &str) -> String {
    let blocks: Vec<&str> = text.split("\n\n").collect();
    match blocks.len() {
        0 => String::new(),
        1 => blocks[0].to_string(),
        2 => blocks[1].to_string(),
        _ => blocks[1..blocks.len() - 1].join("\n\n"),
    }
}

/// Parse a table-of-contents reply into ordered sections with optional
/// subsections.
///
/// Top-level entries are `N.` / `N)` numbered lines (or `Chapter N:` lines).
/// Subsections are `N.M` numbered lines or indented `-` / `*` bullets under
/// the current section. Prose lines are ignored.
pub fn parse_outline(text: &str) -> Result<Vec<Section>, GeneratorError> {
    let mut sections: Vec<Section> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(title) = parse_subsection_entry(line) {
            match sections.last_mut() {
                Some(section) => section.subsections.push(Subsection {
                    title,
                    body: None,
                }),
                None => {
                    return Err(GeneratorError::OutlineParse {
                        reason: format!("subsection before any chapter: {:?}", trimmed),
                    })
                }
            }
            continue;
        }
        if let Some(title) = parse_section_entry(trimmed) {
            sections.push(Section::leaf(title));
        }
        // Anything else is prose around the list; ignore it.
    }
    if sections.is_empty() {
        return Err(GeneratorError::EmptyOutline);
    }
    Ok(sections)
}

/// Match a top-level entry: "3. Title", "3) Title", or "Chapter 3: Title".
fn parse_section_entry(trimmed: &str) -> Option<String> {
    if let Some(rest) = strip_number_prefix(trimmed) {
        // "3.1 Title" is a subsection, not a section.
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        let title = clean_entry(rest);
        return (!title.is_empty()).then_some(title);
    }
    let lower = trimmed.to_lowercase();
    if lower.starts_with("chapter ") {
        let after = &trimmed["chapter ".len()..];
        let rest = after.trim_start_matches(|c: char| c.is_ascii_digit());
        if rest.len() < after.len() {
            let title = clean_entry(rest.trim_start_matches([':', '.', '-']).trim());
            return (!title.is_empty()).then_some(title);
        }
    }
    None
}

/// Match a second-level entry: indented "- Title" / "* Title", or "3.1 Title"
/// at any indentation.
fn parse_subsection_entry(line: &str) -> Option<String> {
    let indented = line.starts_with(' ') || line.starts_with('\t');
    let trimmed = line.trim();
    if indented {
        if let Some(rest) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            let title = clean_entry(rest);
            return (!title.is_empty()).then_some(title);
        }
    }
    // "3.1 Title" or "3.1. Title"
    if let Some(rest) = strip_number_prefix(trimmed) {
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            let rest = rest.strip_prefix(['.', ')']).unwrap_or(rest);
            let title = clean_entry(rest.trim());
            return (!title.is_empty()).then_some(title);
        }
    }
    None
}

/// Strip a leading "N." or "N)" (digits then separator) and return the rest.
fn strip_number_prefix(s: &str) -> Option<&str> {
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &s[digits..];
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .map(|r| r.trim_start())
}

/// Trim whitespace, surrounding markdown emphasis, quotes, and a trailing colon.
fn clean_entry(s: &str) -> String {
    s.trim()
        .trim_matches(['*', '"', '\u{201c}', '\u{201d}'])
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_string()
}
