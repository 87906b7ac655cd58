//! Inbox listing entry

use chrono::{DateTime, Utc};

/// Object-store entry as seen by the orchestrator
///
/// Identity is `name`; `version_tag` changes whenever the content changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub name: String,
    pub version_tag: String,
    pub last_modified: DateTime<Utc>,
}

impl BlobRef {
    pub fn new(
        name: impl Into<String>,
        version_tag: impl Into<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            version_tag: version_tag.into(),
            last_modified,
        }
    }
}
