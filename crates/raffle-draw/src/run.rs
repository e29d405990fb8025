//! Wires configuration, storage, audit trail and engine into one run.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use draw_engine::{
    CascadeEngine, CascadeOutcome, DrawError, MemorySink, ObserverSet, ResultSink, StageReport,
    TracingObserver, WeightSource, WinnerBatch,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::audit::{JsonlAuditLog, RunHeader, RunMode};
use crate::config::{DrawConfig, StorageConfig};
use crate::store::{existing_winner_count, PgStore, TicketWeights, WinnerTable};
use crate::weights_file::JsonWeightsFile;

/// Per-invocation switches for [`execute_draw`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawOptions {
    /// Overrides the configured seed.
    pub seed: Option<u64>,
    /// Read weights and draw, but write no winner rows.
    pub dry_run: bool,
    /// Draw even when the winners table already has rows.
    pub force: bool,
}

/// Result of one run, as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub header: RunHeader,
    pub total_winners: usize,
    pub stages: Vec<StageReport>,
}

impl RunSummary {
    fn new(header: RunHeader, outcome: CascadeOutcome) -> Self {
        Self {
            header,
            total_winners: outcome.total_winners(),
            stages: outcome.stages,
        }
    }
}

/// Seed precedence: flag, then config/env, then a fresh random seed.
pub fn resolve_seed(flag: Option<u64>, config: &DrawConfig) -> u64 {
    flag.or(config.draw.seed).unwrap_or_else(rand::random)
}

/// Whether `err` is an input or plan error raised before any stage drew.
pub fn is_rejected_input(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DrawError>()
        .is_some_and(DrawError::is_input_error)
}

/// Run the full cascade against the configured database.
pub async fn execute_draw(config: &DrawConfig, options: DrawOptions) -> Result<RunSummary> {
    let engine = CascadeEngine::new(config.plan.clone(), config.draw.policy)?;
    let mode = if options.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Draw
    };
    let header = RunHeader::new(resolve_seed(options.seed, config), engine.policy(), mode);
    info!(
        run_id = %header.run_id,
        seed = header.seed,
        policy = %header.policy,
        mode = ?header.mode,
        "draw starting"
    );

    let mut store = PgStore::connect(&config.database).await?;
    let result = draw_with_store(&mut store, &engine, &header, config, options).await;
    store.close().await;

    let outcome = result?;
    info!(
        run_id = %header.run_id,
        total_winners = outcome.total_winners(),
        "draw finished"
    );
    Ok(RunSummary::new(header, outcome))
}

async fn draw_with_store(
    store: &mut PgStore,
    engine: &CascadeEngine,
    header: &RunHeader,
    config: &DrawConfig,
    options: DrawOptions,
) -> Result<CascadeOutcome> {
    let storage = &config.storage;
    let audit = config.audit.path.as_deref();
    let seed = header.seed;

    let existing = existing_winner_count(store.client(), storage).await?;
    check_existing(existing, options, &storage.winners())?;

    if options.dry_run {
        let client = store.client();
        return audited(engine, header, audit, move |observers| async move {
            let mut source = TicketWeights::new(client, storage);
            let mut sink = MemorySink::new();
            draw_stages(engine, seed, observers, &mut source, &mut sink).await
        })
        .await;
    }

    if storage.single_transaction {
        audited(engine, header, audit, move |observers| {
            draw_in_transaction(store, storage, engine, seed, observers)
        })
        .await
    } else {
        let client = store.client();
        audited(engine, header, audit, move |observers| async move {
            let mut source = TicketWeights::new(client, storage);
            let mut sink = WinnerTable::new(client, storage);
            draw_stages(engine, seed, observers, &mut source, &mut sink).await
        })
        .await
    }
}

/// Already-drawn guard: a populated winners table aborts the run unless the
/// caller forces it or nothing will be written.
fn check_existing(existing: i64, options: DrawOptions, table: &str) -> Result<()> {
    if existing == 0 {
        return Ok(());
    }
    if !(options.force || options.dry_run) {
        bail!("{table} already holds {existing} winner rows; pass --force to draw again");
    }
    warn!(existing, table, "winners table is not empty");
    Ok(())
}

/// Every stage is written inside one transaction; nothing is kept unless the
/// commit succeeds.
async fn draw_in_transaction(
    store: &mut PgStore,
    storage: &StorageConfig,
    engine: &CascadeEngine,
    seed: u64,
    observers: ObserverSet,
) -> Result<CascadeOutcome> {
    let tx = store.transaction().await?;
    let outcome = {
        let mut source = TicketWeights::new(&tx, storage);
        let mut sink = WinnerTable::new(&tx, storage);
        draw_stages(engine, seed, observers, &mut source, &mut sink).await?
    };
    tx.commit().await.context("Failed to commit winners")?;
    Ok(outcome)
}

/// Draw from a JSON weights file without touching the database.
pub async fn simulate(
    config: &DrawConfig,
    weights: &Path,
    seed: Option<u64>,
) -> Result<(RunSummary, Vec<WinnerBatch>)> {
    let engine = CascadeEngine::new(config.plan.clone(), config.draw.policy)?;
    let header = RunHeader::new(resolve_seed(seed, config), engine.policy(), RunMode::Simulation);
    info!(
        run_id = %header.run_id,
        seed = header.seed,
        weights = %weights.display(),
        "simulation starting"
    );

    let mut source = JsonWeightsFile::new(weights);
    let mut sink = MemorySink::new();
    let outcome = {
        let (engine, source, sink, seed) = (&engine, &mut source, &mut sink, header.seed);
        audited(engine, &header, config.audit.path.as_deref(), move |observers| {
            draw_stages(engine, seed, observers, source, sink)
        })
        .await?
    };
    Ok((RunSummary::new(header, outcome), sink.into_batches()))
}

/// Opens the audit log, hands the observers to `body`, and writes the closing
/// record once `body` has finished, including any commit it performs.
async fn audited<F, Fut>(
    engine: &CascadeEngine,
    header: &RunHeader,
    audit_path: Option<&Path>,
    body: F,
) -> Result<CascadeOutcome>
where
    F: FnOnce(ObserverSet) -> Fut,
    Fut: Future<Output = Result<CascadeOutcome>>,
{
    let audit = audit_path
        .map(|path| JsonlAuditLog::open(path, header, engine.plan()).map(Arc::new))
        .transpose()?;

    let mut observers = ObserverSet::new().with(TracingObserver);
    if let Some(log) = &audit {
        observers.push(Box::new(Arc::clone(log)));
    }

    let result = body(observers).await;

    if let Some(log) = &audit {
        let finished = match &result {
            Ok(outcome) => log.finish(outcome.total_winners(), None),
            Err(e) => log.finish(0, Some(&format!("{e:#}"))),
        };
        if let Err(e) = finished {
            warn!(path = %log.path().display(), error = %e, "failed to close audit log");
        }
    }
    result
}

async fn draw_stages<W, S>(
    engine: &CascadeEngine,
    seed: u64,
    observers: ObserverSet,
    source: &mut W,
    sink: &mut S,
) -> Result<CascadeOutcome>
where
    W: WeightSource + ?Sized,
    S: ResultSink + ?Sized,
{
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Ok(engine.run_from(source, sink, &observers, &mut rng).await?)
}
