//! Append-only JSON-lines audit trail.
//!
//! Each run writes a `run_started` header (run id, seed, policy, plan), one
//! `stage_drawn` line per stage and a closing `run_finished` line. Together
//! with the seed, the stage lines are enough to reconstruct and re-verify a
//! run after the fact.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use draw_engine::{DrawObserver, DrawPlan, SamplingPolicy, StageReport};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

/// How winners were handled for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Winners persisted to the database.
    Draw,
    /// Winners drawn and logged but not persisted.
    DryRun,
    /// Weights read from a file; results printed only.
    Simulation,
}

/// Identity and parameters of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunHeader {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub seed: u64,
    pub policy: SamplingPolicy,
    pub mode: RunMode,
}

impl RunHeader {
    pub fn new(seed: u64, policy: SamplingPolicy, mode: RunMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            seed,
            policy,
            mode,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum AuditEvent<'a> {
    RunStarted {
        #[serde(flatten)]
        header: &'a RunHeader,
        plan: &'a DrawPlan,
    },
    StageDrawn {
        run_id: Uuid,
        at: DateTime<Utc>,
        shortfall: bool,
        #[serde(flatten)]
        report: &'a StageReport,
    },
    RunFinished {
        run_id: Uuid,
        at: DateTime<Utc>,
        total_winners: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<&'a str>,
    },
}

/// [`DrawObserver`] appending to a JSON-lines file.
pub struct JsonlAuditLog {
    path: PathBuf,
    run_id: Uuid,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlAuditLog {
    /// Open (creating parent directories) and write the run header.
    pub fn open(path: &Path, header: &RunHeader, plan: &DrawPlan) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open audit log {}", path.display()))?;

        let log = Self {
            path: path.to_path_buf(),
            run_id: header.run_id,
            writer: Mutex::new(BufWriter::new(file)),
        };
        log.write(&AuditEvent::RunStarted { header, plan })?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the closing record.
    pub fn finish(&self, total_winners: usize, error: Option<&str>) -> Result<()> {
        self.write(&AuditEvent::RunFinished {
            run_id: self.run_id,
            at: Utc::now(),
            total_winners,
            error,
        })
    }

    fn write(&self, event: &AuditEvent<'_>) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("audit log writer poisoned"))?;
        serde_json::to_writer(&mut *writer, event).context("Failed to encode audit record")?;
        writer.write_all(b"\n")?;
        writer.flush().context("Failed to flush audit log")?;
        Ok(())
    }
}

impl DrawObserver for JsonlAuditLog {
    fn record(&self, report: &StageReport) {
        let event = AuditEvent::StageDrawn {
            run_id: self.run_id,
            at: Utc::now(),
            shortfall: report.is_short(),
            report,
        };
        if let Err(e) = self.write(&event) {
            warn!(path = %self.path.display(), error = %e, "failed to append audit record");
        }
    }
}
