use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on keys accepted by a single S3 `DeleteObjects` request.
pub const DELETE_BATCH_LIMIT: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RetentionPlan {
    /// Newest first.
    pub retained: Vec<RemoteObject>,
    /// Newest first, i.e. the oldest object is last.
    pub expired: Vec<RemoteObject>,
}

impl RetentionPlan {
    pub fn expired_keys(&self) -> Vec<String> {
        self.expired.iter().map(|object| object.key.clone()).collect()
    }
}

/// Orders `objects` newest first and splits off everything past the newest
/// `keep_versions`.
///
/// The sort is stable: objects with equal timestamps keep the order in which
/// the listing returned them.
pub fn plan_retention(mut objects: Vec<RemoteObject>, keep_versions: usize) -> RetentionPlan {
    objects.sort_by(|left, right| right.last_modified.cmp(&left.last_modified));

    if objects.len() <= keep_versions {
        return RetentionPlan {
            retained: objects,
            expired: Vec::new(),
        };
    }

    let expired = objects.split_off(keep_versions);
    RetentionPlan {
        retained: objects,
        expired,
    }
}

pub fn delete_batches(keys: &[String]) -> impl Iterator<Item = &[String]> {
    keys.chunks(DELETE_BATCH_LIMIT)
}
