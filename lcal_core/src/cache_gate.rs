//! Decides whether an output calendar has to be generated again.

use std::{
    fs,
    path::Path,
    time::{Duration, SystemTime},
};

/// The regeneration policy for an output file.
///
/// By default an existing file is never regenerated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheGate {
    /// Regenerate even if the file exists.
    pub force: bool,
    /// Regenerate a file that was last modified longer ago than this.
    pub max_age: Option<Duration>,
}

/// Why a calendar is (not) generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Forced,
    Missing,
    Stale,
    Fresh,
}

impl Decision {
    pub fn should_generate(self) -> bool {
        self != Decision::Fresh
    }
}

impl CacheGate {
    pub fn check(&self, path: &Path, now: SystemTime) -> Decision {
        if self.force {
            return Decision::Forced;
        }
        let Ok(metadata) = fs::metadata(path) else {
            return Decision::Missing;
        };
        let Some(max_age) = self.max_age else {
            return Decision::Fresh;
        };
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age > max_age {
            Decision::Stale
        } else {
            Decision::Fresh
        }
    }
}
