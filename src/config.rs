//! Reconciler configuration.
//!
//! The only tunable is the wall-clock budget handed to the differ. The
//! serialized form uses camelCase field names and expresses durations as
//! fractional seconds:
//!
//! ```json
//! { "maxDiffDuration": 60.0 }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algo::DEFAULT_MAX_DIFF_DURATION;

/// Configuration for [`Reconciler`](crate::Reconciler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconcileConfig {
    /// Maximum time spent refining one diff before falling back to a
    /// coarse (but still valid) edit script.
    /// Default: 60s
    #[serde(with = "duration_secs")]
    pub max_diff_duration: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_diff_duration: DEFAULT_MAX_DIFF_DURATION,
        }
    }
}

impl ReconcileConfig {
    /// Create config with a custom diff budget.
    pub fn new(max_diff_duration: Duration) -> Self {
        Self { max_diff_duration }
    }

    /// Short budget for interactive use (editor save hooks).
    pub fn fast() -> Self {
        Self::new(Duration::from_secs(1))
    }

    /// Long budget for batch jobs over large documents.
    pub fn thorough() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

/// Durations as fractional seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
