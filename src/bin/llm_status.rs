use anyhow::Result;
use clap::Parser;
use mis_analytics::{
    config::Config,
    summarize::{LocalBackend, LocalSummarizer},
};
use tracing_subscriber::{fmt, EnvFilter};

/// Check whether the local summarisation model is reachable.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Overrides LOCAL_LLM_BACKEND
    #[arg(short, long, value_enum)]
    backend: Option<LocalBackend>,

    /// Overrides LOCAL_LLM_MODEL
    #[arg(short, long)]
    model: Option<String>,
}

async fn run(args: Args) -> Result<bool> {
    let mut config = Config::from_env();
    if let Some(b) = args.backend {
        config.local_llm_backend = b.to_string();
    }
    if let Some(m) = args.model {
        config.local_llm_model = m;
    }
    let summarizer = LocalSummarizer::from_config(&config)?;

    if !summarizer.is_available().await {
        println!("{} is not running.", summarizer.backend());
        if summarizer.backend() == LocalBackend::Ollama {
            println!("Install Ollama: https://ollama.ai");
            println!("Then run: ollama pull {}", summarizer.model());
        }
        return Ok(false);
    }

    println!("{} is running", summarizer.backend());
    match summarizer.list_models().await {
        Ok(models) if models.is_empty() => println!("No models installed."),
        Ok(models) => {
            println!("Available models:");
            for m in &models {
                let marker = if m == summarizer.model() { " (configured)" } else { "" };
                println!("  - {m}{marker}");
            }
        }
        Err(e) => println!("Could not list models: {:#}", e),
    }
    Ok(true)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(env).with_writer(std::io::stderr).init();

    match run(Args::parse()).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            std::process::exit(1);
        }
    }
}
