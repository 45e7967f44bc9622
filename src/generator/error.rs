//! Shared error type for the content generator: login, HTTP, and reply parsing.

use thiserror::Error;

/// Generator error covering authentication, transport, and reply-parsing cases.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Login failed (HTTP {status}). Check email/password in the credentials file.")]
    AuthFailed { status: u16 },

    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from chat service at {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("Chat service returned an empty reply for {context}.")]
    EmptyReply { context: String },

    #[error("Could not pick a title from the reply. Pass --title to set one explicitly.")]
    TitleNotFound,

    #[error("Could not parse table of contents: {reason}")]
    OutlineParse { reason: String },

    #[error("Table of contents reply contained no chapters.")]
    EmptyOutline,
}
