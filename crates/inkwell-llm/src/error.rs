//! Error type for `inkwell-llm`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The provider answered with a non-success status.
  #[error("provider returned {status}: {message}")]
  Api { status: u16, message: String },

  #[error("malformed provider response: {0}")]
  Parse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
