use crate::adapters::object_store::BackupStore;
use crate::domain::retention::{delete_batches, plan_retention, RemoteObject};
use crate::error::BackupError;

/// Deletes every archive under `prefix` except the newest `keep_versions`.
///
/// Returns the number of deleted objects. Nothing is deleted, and no delete
/// request is sent, when the prefix holds `keep_versions` objects or fewer.
pub fn prune(
    store: &impl BackupStore,
    prefix: &str,
    keep_versions: usize,
) -> Result<usize, BackupError> {
    tracing::info!(
        component = "retention",
        event = "prune_started",
        bucket = store.bucket(),
        prefix,
        keep_versions,
    );

    let objects = list_all_objects(store, prefix)?;
    let listed = objects.len();
    let plan = plan_retention(objects, keep_versions);

    if plan.expired.is_empty() {
        tracing::info!(
            component = "retention",
            event = "prune_skipped",
            listed,
            keep_versions,
        );
        return Ok(0);
    }

    let expired_keys = plan.expired_keys();
    tracing::info!(
        component = "retention",
        event = "deleting_expired_archives",
        count = expired_keys.len(),
    );
    for batch in delete_batches(&expired_keys) {
        store.delete_objects(batch).map_err(BackupError::Storage)?;
    }

    tracing::info!(
        component = "retention",
        event = "prune_completed",
        deleted = expired_keys.len(),
        retained = plan.retained.len(),
    );
    Ok(expired_keys.len())
}

/// Follows continuation tokens until the listing is exhausted.
pub fn list_all_objects(
    store: &impl BackupStore,
    prefix: &str,
) -> Result<Vec<RemoteObject>, BackupError> {
    let mut objects = Vec::new();
    let mut continuation_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store
            .list_objects_page(prefix, continuation_token.as_deref())
            .map_err(BackupError::Storage)?;
        pages += 1;
        objects.extend(page.objects);

        match page.next_continuation_token {
            Some(next) if continuation_token.as_deref() == Some(next.as_str()) => {
                return Err(BackupError::Storage(format!(
                    "listing of {prefix} repeated continuation token {next}"
                )));
            }
            Some(next) => continuation_token = Some(next),
            None => break,
        }
    }

    tracing::debug!(
        component = "retention",
        event = "listing_completed",
        prefix,
        pages,
        objects = objects.len(),
    );
    Ok(objects)
}
