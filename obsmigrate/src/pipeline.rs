//! The migration loop: page, map, guard, build, checkpoint.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use pnfetcher::{MapOutcome, ObservationCursor, ObservationSource};
use serde::{Deserialize, Serialize};
use staloader::graph;
use staloader::model::PreparedRecord;
use staloader::resolve::{self, CommonEntities};
use staloader::{DuplicateCheck, DuplicateGuard, StaService};
use tracing::{error, info};

pub struct MigrationSettings {
    pub start_key: String,
    pub page_size: usize,
    /// Ceiling on cumulatively written records, checked between pages.
    pub limit: u64,
    /// Public mirror URL image ids are appended to.
    pub media_root: String,
    pub duplicate_check: DuplicateCheck,
    /// When set, job state is checkpointed here after every page and read
    /// back on the next start, overriding `start_key`.
    pub state_file: Option<PathBuf>,
}

/// Resumable job state, one checkpoint per processed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    /// Highest source key of the last fully processed page.
    pub watermark: String,
    /// Records written across all runs sharing this state.
    pub accepted: u64,
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Records written by this run.
    pub written: u64,
    /// Records excluded by filtering or already present on the target.
    pub skipped: u64,
    /// Records abandoned on a record-scoped error.
    pub failed: u64,
    pub watermark: String,
}

enum RecordResult {
    Written,
    AlreadyMigrated,
}

async fn process_record(
    service: &dyn StaService,
    common: &CommonEntities,
    guard: &mut DuplicateGuard,
    record: &PreparedRecord,
) -> staloader::Result<RecordResult> {
    if guard.already_loaded(service, &record.key).await? {
        return Ok(RecordResult::AlreadyMigrated);
    }
    let streams = resolve::resolve_author(service, common, record).await?;
    graph::build_graph(service, record, &streams).await?;
    Ok(RecordResult::Written)
}

fn load_state(settings: &MigrationSettings) -> anyhow::Result<Option<JobState>> {
    let Some(path) = &settings.state_file else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading state file {}", path.display()))?;
    let state: JobState = serde_json::from_str(&contents)
        .with_context(|| format!("parsing state file {}", path.display()))?;
    Ok(Some(state))
}

fn checkpoint(settings: &MigrationSettings, state: &JobState) -> anyhow::Result<()> {
    let Some(path) = &settings.state_file else {
        return Ok(());
    };
    let contents = serde_json::to_string_pretty(state)?;
    fs::write(path, contents).with_context(|| format!("writing state file {}", path.display()))
}

/// Runs the migration until the source is exhausted or the configured
/// record ceiling is reached.
///
/// Per-record anomalies (data defects, shape mismatches, corrupt datastream
/// sets) are logged with the record's key and contained; remote failures end
/// the run, reporting the watermark to resume from. Nothing created for an
/// abandoned record is deleted again: the target offers no cross-call
/// transaction, and re-runs suppress duplicates by natural key.
pub async fn run_migration(
    source: Arc<dyn ObservationSource>,
    service: Arc<dyn StaService>,
    settings: &MigrationSettings,
) -> anyhow::Result<MigrationReport> {
    let resumed = load_state(settings)?;
    let (start_key, mut accepted_total) = match resumed {
        Some(state) => {
            info!(
                "resuming from checkpoint: watermark {}, {} written so far",
                state.watermark, state.accepted
            );
            (state.watermark, state.accepted)
        }
        None => (settings.start_key.clone(), 0),
    };

    let common = CommonEntities::bootstrap(service.as_ref())
        .await
        .context("resolving shared reference entities")?;

    let mut guard = DuplicateGuard::new(settings.duplicate_check);
    let mut cursor = ObservationCursor::new(source, &start_key, settings.page_size);
    let mut report = MigrationReport {
        watermark: start_key.clone(),
        ..MigrationReport::default()
    };

    while accepted_total < settings.limit {
        let page = cursor
            .next_page()
            .await
            .with_context(|| format!("fetching page after key {}", report.watermark))?;
        if page.is_empty() {
            info!("source exhausted at watermark {}", report.watermark);
            break;
        }
        info!("writing {} records", page.len());

        for raw in &page {
            let record = match pnfetcher::map_record(raw, &settings.media_root) {
                MapOutcome::Ready(record) => record,
                MapOutcome::Skipped { .. } => {
                    report.skipped += 1;
                    continue;
                }
            };
            match process_record(service.as_ref(), &common, &mut guard, &record).await {
                Ok(RecordResult::Written) => {
                    accepted_total += 1;
                    report.written += 1;
                }
                Ok(RecordResult::AlreadyMigrated) => report.skipped += 1,
                Err(err) if err.is_record_scoped() => {
                    error!("obs {} abandoned: {err}", record.key);
                    report.failed += 1;
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err).context(format!(
                        "run aborted mid-page; resume from watermark {}",
                        report.watermark
                    )));
                }
            }
        }

        report.watermark = cursor.watermark().to_string();
        let state = JobState {
            watermark: report.watermark.clone(),
            accepted: accepted_total,
        };
        checkpoint(settings, &state)?;
        info!(
            "new watermark: {} ({} written total)",
            state.watermark, state.accepted
        );
    }

    Ok(report)
}
