//! Job kinds and their taxonomy paths.

use serde::{Deserialize, Serialize};

use storesync_core::StoreId;

use crate::audit::snake_case;

/// Number of leading taxonomy segments that form the crate namespace and are
/// left out of log message keys.
pub const NAMESPACE_DEPTH: usize = 2;

/// Job kind for routing, lock keys and log keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Refresh shop details and requested counters for one store.
    UpdateStore,
}

impl JobKind {
    pub const ALL: [JobKind; 1] = [JobKind::UpdateStore];

    /// Fully qualified taxonomy path of the kind.
    pub fn taxonomy_path(&self) -> &'static [&'static str] {
        match self {
            JobKind::UpdateStore => &["Storesync", "Jobs", "UpdateStore"],
        }
    }

    /// Short name, e.g. `UpdateStore`.
    pub fn name(&self) -> &'static str {
        self.taxonomy_path().last().copied().unwrap_or_default()
    }

    /// Snake-cased path below the namespace prefix, used in log message keys.
    pub fn log_segments(&self) -> Vec<String> {
        self.taxonomy_path()
            .iter()
            .skip(NAMESPACE_DEPTH)
            .map(|s| snake_case(s))
            .collect()
    }

    /// Cache key of the advisory lock for `store_id`: `<path>|<id>`.
    pub fn lock_key(&self, store_id: StoreId) -> String {
        format!("{}|{}", self.taxonomy_path().join("::"), store_id)
    }
}

impl core::fmt::Display for JobKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
