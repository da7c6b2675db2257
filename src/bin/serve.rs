use anyhow::Result;
use clap::Parser;
use mis_analytics::{
    config::Config,
    llm::OpenAiAdapter,
    query::{Dialect, NlToSql},
    store::{self, Backend},
    summarize::LocalSummarizer,
    web::{self, AppState},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Web UI for asking questions about the MIS data.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(short, long, value_enum, default_value_t = Backend::Postgres)]
    backend: Backend,

    /// Overrides PORT
    #[arg(short, long)]
    port: Option<u16>,
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env();
    let store = store::connect(&config, args.backend).await?;

    let (nl, llm_error) = match OpenAiAdapter::from_config(&config) {
        Ok(adapter) => {
            let nl = NlToSql::new(Arc::new(adapter), Dialect::from(args.backend));
            (Some(Arc::new(nl)), None)
        }
        Err(e) => {
            warn!("LLM disabled: {}", e);
            (None, Some(e.to_string()))
        }
    };

    let summarizer = match LocalSummarizer::from_config(&config) {
        Ok(s) => {
            if s.is_available().await {
                info!(backend = %s.backend(), model = s.model(), "local LLM available");
            } else {
                warn!(backend = %s.backend(), "local LLM not reachable yet");
            }
            Some(Arc::new(s))
        }
        Err(e) => {
            warn!("summaries disabled: {:#}", e);
            None
        }
    };

    let state = AppState {
        store,
        nl,
        llm_error,
        summarizer,
    };
    web::serve(state, args.port.unwrap_or(config.port)).await;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env).init();

    info!("Starting MIS analytics web UI");
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
