use anyhow::{Context, Result};
use clap::Parser;
use mis_analytics::{
    config::Config,
    migrate::{migrate, MigrateOptions, DEFAULT_BATCH_SIZE},
    process::read_long_csv,
    store::{self, Backend},
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Load the long-format MIS CSV into a SQL backend.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Target database (`neon` is accepted for postgres)
    #[arg(short, long, value_enum, default_value_t = Backend::Postgres)]
    backend: Backend,

    /// Long CSV produced by `mis-analytics`
    #[arg(short, long, default_value = "clean_mis_long.csv")]
    input: PathBuf,

    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Delete existing rows first
    #[arg(long)]
    replace: bool,
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env();

    let records = read_long_csv(&args.input)
        .with_context(|| format!("loading {}", args.input.display()))?;
    info!(rows = records.len(), "loaded source CSV");

    let store = store::connect(&config, args.backend).await?;
    println!("Migrating {} rows to {}", records.len(), args.backend.label());

    let opts = MigrateOptions {
        batch_size: args.batch_size,
        replace: args.replace,
    };
    let report = migrate(store.as_ref(), &records, &opts).await?;

    println!(
        "Migrated {} rows in {} batches ({:.1}s)",
        report.inserted_rows, report.batches, report.elapsed_secs
    );
    println!(
        "Verified: {} rows in mis_long ({} before)",
        report.rows_after, report.rows_before
    );

    let sample = store
        .query("SELECT store_name, parameter, month, value FROM mis_long LIMIT 5")
        .await;
    match sample {
        Ok(rows) => println!("\nSample records:\n{}", rows.render_table()),
        Err(e) => info!("sample query unavailable: {:#}", e),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env).with_writer(std::io::stderr).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
