//! Chapter HTML preparation: heading tags, code-fence conversion, paragraph
//! wrapping, and slug filenames. The EPUB writer consumes the output as-is.

use thiserror::Error;

/// HTML tag for a section header.
const SECTION_TAG: &str = "h1";
/// HTML tag for a subsection header.
const SUBSECTION_TAG: &str = "h2";

/// Errors from chapter rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Chapter '{chapter}' has an odd number of ``` code fences.")]
    UnbalancedCodeFences { chapter: String },
}

/// Convert a chapter name to a safe base filename: lowercase, spaces to
/// underscores, punctuation removed.
pub fn chapter_filename(chapter_name: &str) -> String {
    const REMOVE_CHARS: &str = "!@#$%^&*()+?=,.<>/\\:;'\"";
    chapter_name
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c == ' ' {
                Some('_')
            } else if REMOVE_CHARS.contains(c) {
                None
            } else {
                Some(c)
            }
        })
        .collect()
}

/// Render a chapter body to XHTML: triple-backtick fences become `<code>`
/// blocks and blank-line-separated text becomes `<p>` paragraphs, with all
/// text escaped.
///
/// Fences and paragraphs are handled in one pass so a fenced block containing
/// blank lines stays one `<code>` element instead of being split. The fence
/// count must be even; `chapter` names the chapter in the error.
pub fn body_html(text: &str, chapter: &str) -> Result<String, RenderError> {
    const FENCE: &str = "```";
    if text.matches(FENCE).count() % 2 != 0 {
        return Err(RenderError::UnbalancedCodeFences {
            chapter: chapter.to_string(),
        });
    }
    let mut blocks: Vec<String> = Vec::new();
    for (i, segment) in text.split(FENCE).enumerate() {
        if i % 2 == 1 {
            // Inside a fence pair: one code block, blank lines and all.
            blocks.push(format!(
                "<code>{}</code>",
                escape_text(segment.trim_matches('\n'))
            ));
        } else {
            for paragraph in segment.split("\n\n") {
                let paragraph = paragraph.trim();
                if !paragraph.is_empty() {
                    blocks.push(format!("<p>{}</p>", escape_text(paragraph)));
                }
            }
        }
    }
    Ok(blocks.join("\n"))
}

/// Build chapter body HTML for a leaf section or a subsection.
///
/// A section chapter gets an `<h1>` header; a subsection chapter gets an
/// `<h2>`, and the first subsection of a section also carries the section
/// `<h1>` above it.
pub fn chapter_content(
    section: &str,
    subsection: Option<(&str, usize)>,
    body: &str,
) -> Result<String, RenderError> {
    let mut content = String::new();
    let chapter_name = match subsection {
        Some((sub, index)) => {
            if index == 0 {
                content.push_str(&format!(
                    "<{tag}>{}</{tag}>\n",
                    escape_text(section),
                    tag = SECTION_TAG
                ));
            }
            content.push_str(&format!(
                "<{tag}>{}</{tag}>",
                escape_text(sub),
                tag = SUBSECTION_TAG
            ));
            sub
        }
        None => {
            content.push_str(&format!(
                "<{tag}>{}</{tag}>",
                escape_text(section),
                tag = SECTION_TAG
            ));
            section
        }
    };

    let body = body_html(body, chapter_name)?;
    content.push('\n');
    content.push_str(&body);
    Ok(content)
}

pub(crate) fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
