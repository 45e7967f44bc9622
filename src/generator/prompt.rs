//! Prompt builders for each stage of the conversation. The priming prompt
//! establishes topic and language; later prompts rely on the conversation
//! history, so they stay short.

/// Opening message: primes the conversation for book writing.
pub fn priming(topic: &str, language: &str) -> String {
    format!(
        "You are helping me write a non-fiction book about the following topic: \
         {topic}. Write all of your answers in {language}, and answer only with \
         the requested content, without commentary. Reply OK if you understand."
    )
}

/// Ask for title candidates as a numbered list; the first option is used.
pub fn title_options(topic: &str) -> String {
    format!(
        "Suggest 5 possible titles for a book about {topic}. Reply with a \
         numbered list (1. ... 2. ...) and nothing else."
    )
}

/// Ask for the table of contents. Numbered chapters, optional indented
/// subsections, matching what the outline parser accepts.
pub fn table_of_contents(title: &str) -> String {
    format!(
        "Write the table of contents for the book \"{title}\". Reply with a \
         numbered list of chapter titles (1. ... 2. ...). If a chapter has \
         subsections, list them under it as indented lines starting with \"-\". \
         Do not include any other text."
    )
}

/// Ask for the body of a chapter with no subsections.
pub fn section_body(section: &str) -> String {
    format!(
        "Write the chapter \"{section}\" of the book. Separate paragraphs with \
         blank lines and wrap any code in triple backticks. Do not repeat the \
         chapter title."
    )
}

/// Ask for the body of one subsection of a chapter.
pub fn subsection_body(section: &str, subsection: &str) -> String {
    format!(
        "Write the subsection \"{subsection}\" of the chapter \"{section}\". \
         Separate paragraphs with blank lines and wrap any code in triple \
         backticks. Do not repeat the subsection title."
    )
}
