use std::path::Path;

use crate::domain::credentials::SessionCredentials;
use crate::domain::retention::RemoteObject;

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub objects: Vec<RemoteObject>,
    /// Present when more pages follow.
    pub next_continuation_token: Option<String>,
}

/// Blocking access to the single bucket a run writes to.
pub trait BackupStore {
    fn bucket(&self) -> &str;

    fn upload_file(&self, key: &str, path: &Path) -> Result<(), String>;

    fn list_objects_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage, String>;

    fn delete_objects(&self, keys: &[String]) -> Result<(), String>;
}

/// Builds a store authenticated with the credentials of the current run.
pub trait StoreConnector {
    type Store: BackupStore;

    fn connect(
        &self,
        bucket: &str,
        region: &str,
        credentials: &SessionCredentials,
    ) -> Result<Self::Store, String>;
}
