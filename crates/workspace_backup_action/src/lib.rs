//! AWS-oriented adapters and handlers for the workspace backup action.
//!
//! This crate owns runtime integration details (identity exchange, object
//! storage, archiving, scratch space) and the handlers that sequence them.
//! Domain rules come from `workspace_backup_core` through the `domain` module.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod handlers;

#[cfg(test)]
pub(crate) mod test_helpers;
