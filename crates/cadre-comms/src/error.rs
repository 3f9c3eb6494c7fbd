//! Error types for directive parsing and message dispatch.
//!
//! Uses `thiserror` for typed errors. Suppression outcomes (duplicate,
//! cooldown, unresolvable target) are not errors; they are reported through
//! the dispatch report and logged, never propagated.

/// Errors that can occur while parsing a single send directive line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    /// The `at HH:MM` clause is missing or malformed.
    #[error("bad time clause: {0}")]
    BadTime(String),

    /// The `to <target>` clause is missing.
    #[error("missing 'to' clause in: {0}")]
    MissingTarget(String),

    /// No `: ` separator between addressing and content.
    #[error("missing content separator in: {0}")]
    MissingContent(String),

    /// An email directive without a `subject | body` split.
    #[error("email directive missing subject separator: {0}")]
    MissingSubject(String),

    /// A reply directive whose `[message-id]` is not a valid UUID.
    #[error("bad reply message id: {0}")]
    BadReplyId(String),
}

/// Errors that can occur in the communication hub or delivery backend.
#[derive(Debug, thiserror::Error)]
pub enum CommsError {
    /// A directive line failed to parse.
    #[error(transparent)]
    Directive(#[from] DirectiveError),

    /// The delivery collaborator rejected or failed a send.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// HTTP transport failure while talking to the delivery collaborator.
    #[error("delivery transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The delivery collaborator returned a response we could not decode.
    #[error("delivery response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}
