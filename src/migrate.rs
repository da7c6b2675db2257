use anyhow::{ensure, Context, Result};
use std::time::Instant;
use tracing::info;

use crate::record::MisRecord;
use crate::store::MisStore;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct MigrateOptions {
    pub batch_size: usize,
    /// Empty `mis_long` before loading.
    pub replace: bool,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            replace: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    pub source_rows: u64,
    pub inserted_rows: u64,
    pub batches: usize,
    pub rows_before: u64,
    pub rows_after: u64,
    pub elapsed_secs: f64,
}

/// Load `records` into `store` in batches and verify the resulting row count.
///
/// The table must end with exactly `rows_before + records.len()` rows, where
/// `rows_before` is zero when `replace` is set.
#[tracing::instrument(level = "info", skip(store, records), fields(backend = %store.backend(), rows = records.len()))]
pub async fn migrate(
    store: &dyn MisStore,
    records: &[MisRecord],
    options: &MigrateOptions,
) -> Result<MigrationReport> {
    ensure!(options.batch_size > 0, "batch size must be positive");
    let start = Instant::now();

    store.ensure_schema().await.context("preparing mis_long")?;
    if options.replace {
        store.clear().await.context("clearing mis_long")?;
    }
    let rows_before = store.row_count().await?;

    let total_batches = records.len().div_ceil(options.batch_size);
    let mut inserted_rows = 0u64;
    for (i, batch) in records.chunks(options.batch_size).enumerate() {
        let n = store
            .insert_batch(batch)
            .await
            .with_context(|| format!("batch {} of {} failed", i + 1, total_batches))?;
        inserted_rows += n;
        info!(
            batch = i + 1,
            total_batches,
            inserted_rows,
            "migrated batch"
        );
    }

    let rows_after = store.row_count().await?;
    let source_rows = records.len() as u64;
    ensure!(
        rows_after == rows_before + source_rows,
        "row count mismatch after migration: table has {} rows, expected {} ({} before + {} from source)",
        rows_after,
        rows_before + source_rows,
        rows_before,
        source_rows
    );

    Ok(MigrationReport {
        source_rows,
        inserted_rows,
        batches: total_batches,
        rows_before,
        rows_after,
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}
