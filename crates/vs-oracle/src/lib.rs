//! External collaborators of the VicShield cache layer.
//!
//! The cache never talks to an AI provider directly. It holds an
//! [`Analyzer`] and an [`IdentityVerifier`], both returning the provider's raw
//! text, and validates that text with [`parse_analysis`] /
//! [`parse_verification`] before anything is stored.
//!
//! [`OpenAiAnalyzer`] and [`OpenAiIdentityVerifier`] talk to any
//! OpenAI-compatible `chat/completions` endpoint.

pub mod error;
pub mod openai;
pub mod prompt;
pub mod schema;
pub mod traits;

pub use error::OracleError;
pub use openai::{OpenAiAnalyzer, OpenAiClient, OpenAiIdentityVerifier};
pub use schema::{parse_analysis, parse_verification};
pub use traits::{Analyzer, IdentityVerifier};
