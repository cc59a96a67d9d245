use std::str::FromStr;

use log::debug;

use crate::client::StaService;
use crate::errors::Result;

/// When to check the target for an already-migrated record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateCheck {
    /// Check every record. Safe under overlapping runs, one extra lookup per
    /// record.
    Always,
    /// Stop checking once one record of the run is observed not to
    /// pre-exist. Records arrive in ascending key order and previously
    /// migrated data forms a prefix of that order, so past the first miss the
    /// remaining keys cannot have been migrated by a *finished* earlier run.
    /// A run overlapping in time can still slip duplicates through this
    /// window; production usage is single-writer.
    AfterFirstMiss,
}

impl FromStr for DuplicateCheck {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "always" => Ok(DuplicateCheck::Always),
            "after-first-miss" => Ok(DuplicateCheck::AfterFirstMiss),
            other => Err(format!(
                "unknown duplicate-check mode '{other}' (expected 'always' or 'after-first-miss')"
            )),
        }
    }
}

/// Existence check for a record's group, keyed on the record's natural key.
/// Owned by the run loop; the frontier state is per run, never global.
#[derive(Debug)]
pub struct DuplicateGuard {
    mode: DuplicateCheck,
    past_frontier: bool,
}

impl DuplicateGuard {
    pub fn new(mode: DuplicateCheck) -> Self {
        Self {
            mode,
            past_frontier: false,
        }
    }

    /// Whether a group with this natural key already exists on the target.
    pub async fn already_loaded(&mut self, service: &dyn StaService, key: &str) -> Result<bool> {
        if self.mode == DuplicateCheck::AfterFirstMiss && self.past_frontier {
            return Ok(false);
        }
        let exists = service.find_id("Groups", "name", key).await?.is_some();
        if exists {
            debug!("record {key} already migrated");
        } else {
            self.past_frontier = true;
        }
        Ok(exists)
    }
}
