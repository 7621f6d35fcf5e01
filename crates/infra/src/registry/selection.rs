//! Batch selection filters.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, TimeZone, Utc};

use storesync_core::{Store, StoreId};

/// Selection parse error. Raised before any chunk is read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("invalid store ids `{0}`: expected `any` or a comma-separated list of integers")]
    InvalidStoreIds(String),
    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),
}

/// Store id allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StoreIds {
    #[default]
    Any,
    Only(BTreeSet<StoreId>),
}

impl StoreIds {
    pub fn only(ids: impl IntoIterator<Item = impl Into<StoreId>>) -> Self {
        StoreIds::Only(ids.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, id: StoreId) -> bool {
        match self {
            StoreIds::Any => true,
            StoreIds::Only(ids) => ids.contains(&id),
        }
    }
}

impl FromStr for StoreIds {
    type Err = SelectionError;

    /// `any` (or blank) selects every store; otherwise `1,2,3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("any") {
            return Ok(StoreIds::Any);
        }

        trimmed
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                part.parse::<StoreId>()
                    .map_err(|_| SelectionError::InvalidStoreIds(s.to_string()))
            })
            .collect::<Result<BTreeSet<_>, _>>()
            .map(StoreIds::Only)
    }
}

/// Which stores a batch run visits. Uninstalled stores are never selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSelection {
    pub store_ids: StoreIds,
    /// Inclusive lower bound on `updated_at`, second precision.
    pub updated_at_min: Option<DateTime<Utc>>,
}

impl StoreSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_store_ids(mut self, store_ids: StoreIds) -> Self {
        self.store_ids = store_ids;
        self
    }

    pub fn with_updated_at_min(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at_min = Some(at.trunc_subsecs(0));
        self
    }

    /// Parse the raw console filters.
    pub fn parse(store_ids: Option<&str>, updated_at_min: Option<&str>) -> Result<Self, SelectionError> {
        let store_ids = match store_ids {
            Some(raw) => raw.parse()?,
            None => StoreIds::Any,
        };
        let updated_at_min = updated_at_min
            .filter(|raw| !raw.trim().is_empty())
            .map(parse_timestamp)
            .transpose()?;

        Ok(Self {
            store_ids,
            updated_at_min,
        })
    }

    pub fn matches(&self, store: &Store) -> bool {
        store.installed
            && self.store_ids.contains(store.id)
            && self
                .updated_at_min
                .map_or(true, |min| store.updated_at >= min)
    }
}

/// Normalise a user-supplied timestamp to UTC, truncated to whole seconds.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` (both read
/// as UTC) and a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SelectionError> {
    let raw = raw.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc).trunc_subsecs(0));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive).trunc_subsecs(0));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| SelectionError::InvalidTimestamp(raw.to_string()))
}

/// `YYYY-MM-DD HH:MM:SS`, as stored and compared by the registry.
pub fn canonical_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
