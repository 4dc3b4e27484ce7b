pub use workspace_backup_core::{archive_naming, credentials, inputs, retention, upload_parts};
