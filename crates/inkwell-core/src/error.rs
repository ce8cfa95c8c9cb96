//! Error types for `inkwell-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown message role: {0:?}")]
  UnknownRole(String),

  #[error("unknown subscription status: {0:?}")]
  UnknownStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
