//! Core types and trait definitions for the Inkwell writing workspace.
//!
//! No HTTP and no database here; every other crate builds on these types.
//! Besides the data model this crate holds the two pieces of real logic:
//! system-prompt assembly and subscription reconciliation.

pub mod document;
pub mod email;
pub mod error;
pub mod prompt;
pub mod reconcile;
pub mod store;
pub mod subscription;
pub mod user;

pub use error::{Error, Result};
