/// Errors from external analysis and verification calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("provider rate limit exceeded")]
    RateLimited,

    /// The provider answered but produced no content.
    #[error("provider returned no content")]
    EmptyResponse,

    /// The content did not match the expected schema.
    #[error("response does not match schema: {0}")]
    Schema(String),

    /// Client construction or configuration failure.
    #[error("client configuration error: {0}")]
    Config(String),
}
