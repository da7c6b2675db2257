use anyhow::{bail, Result};
use clap::Parser;
use mis_analytics::process::{self, write_duckdb_load_script, write_long_csv, write_parquet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Reshape the cross-tab store MIS export into the long `mis_long` table.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Cross-tab CSV exported from the MIS workbook
    #[arg(short, long)]
    input: PathBuf,

    /// Long-format CSV to write
    #[arg(short, long)]
    output: PathBuf,

    /// Print a summary of the melted table
    #[arg(short, long)]
    verbose: bool,

    /// Also write the table as Parquet
    #[arg(long)]
    parquet: Option<PathBuf>,
}

fn run(args: &Args) -> Result<()> {
    if !args.input.exists() {
        bail!("Input file '{}' not found", args.input.display());
    }
    let start = Instant::now();

    let table = process::load_cross_tab(&args.input)?;
    info!(
        header_row = table.header_row,
        columns = table.column_count(),
        rows = table.rows.len(),
        "loaded cross-tab"
    );
    let melted = process::melt(&table)?;
    write_long_csv(&args.output, &melted.records)?;
    println!(
        "Wrote {} rows to {}",
        melted.records.len(),
        args.output.display()
    );

    let out_dir = args
        .output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let script = write_duckdb_load_script(out_dir, &args.output)?;
    println!("DuckDB loader: {}", script.display());

    if let Some(pq) = &args.parquet {
        let bytes = write_parquet(pq, &melted.records)?;
        println!("Parquet: {} ({} bytes)", pq.display(), bytes);
    }

    if args.verbose {
        let s = melted.summary();
        println!();
        println!("Rows:        {}", s.rows);
        println!("Stores:      {}", s.unique_stores);
        println!("Parameters:  {}", s.parameters.len());
        for p in &s.parameters {
            println!("  - {p}");
        }
        if let (Some(first), Some(last)) = (s.first_month, s.last_month) {
            println!("Month range: {} to {}", first, last);
        }
        println!("Month columns detected: {}", melted.month_columns.len());
    }

    info!("done in {:.3}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
