//! Shared workspace backup domain primitives.
//!
//! This crate owns input validation, archive naming, retention planning, and
//! multipart upload planning.
//! AWS SDK and runtime concerns live in `workspace_backup_action`.

pub mod archive_naming;
pub mod credentials;
pub mod inputs;
pub mod retention;
pub mod upload_parts;
