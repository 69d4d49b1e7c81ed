/// Errors surfaced by registry and data-web-service operations.
///
/// The registry distinguishes between mandatory and optional back-references:
/// a missing mandatory target (for example a unit of measurement) fails with
/// [`Error::UnresolvedReference`], while optional classifications degrade to
/// empty values without erroring. Transport failures propagate immediately;
/// the client never retries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Non-success HTTP status from the registry or the data web service.
    #[error("request failed: HTTP {status} {reason} for url ({url})")]
    Transport {
        status: u16,
        reason: String,
        url: String,
    },

    /// Connection-level failure before any status line was received.
    #[error("could not reach service: {0}")]
    Http(#[from] reqwest::Error),

    /// A payload that was not the JSON the endpoint documents.
    #[error("failed to parse JSON ({context}): {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// An item code with fewer than two colon-delimited segments.
    #[error("malformed identifier {0:?}: expected at least `platform:item`")]
    MalformedIdentifier(String),

    /// A mandatory UUID back-reference that is missing from the response tree.
    #[error("unresolved reference {uuid} for {context}")]
    UnresolvedReference { uuid: String, context: &'static str },

    /// An identifier value that is neither a string code nor an integer id.
    #[error("invalid identifier: {0} (provide item urn or item ID)")]
    InvalidIdentifierType(String),

    /// A code lookup that matched no registry record.
    #[error("no record found for {url}")]
    EmptyResult { url: String },

    /// A response record missing a field the operation depends on.
    #[error("missing field {field:?} in {context}")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },

    /// Missing client configuration.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// Login succeeded at the HTTP level but returned no session token.
    #[error("login failed: {0}")]
    Auth(String),

    /// An invalid data-service query (no sensors, unknown aggregate, ...).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A tab-separated data payload that could not be parsed.
    #[error("failed to parse TSV payload: {0}")]
    Tsv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
