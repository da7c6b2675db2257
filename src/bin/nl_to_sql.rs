use anyhow::{bail, Result};
use clap::Parser;
use mis_analytics::{
    config::Config,
    llm::OpenAiAdapter,
    query::{self, Dialect, NlToSql},
    store::{self, Backend, MisStore},
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

/// Turn a question about store performance into SQL and run it.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    after_help = "Examples:\n  nl_to_sql \"What are the top 10 stores by revenue in 2024?\"\n  nl_to_sql \"Show me monthly transaction trends\" --backend duckdb\n  nl_to_sql --interactive"
)]
struct Args {
    /// Natural language question about the data
    query: Option<String>,

    #[arg(short, long, value_enum, default_value_t = Backend::Duckdb)]
    backend: Backend,

    /// Only generate SQL, don't execute it
    #[arg(short, long)]
    sql_only: bool,

    /// Ask questions in a loop
    #[arg(short, long)]
    interactive: bool,

    /// OpenAI API key (or set OPENAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,
}

fn rule() -> String {
    "-".repeat(50)
}

async fn answer(nl: &NlToSql, store: Option<&dyn MisStore>, question: &str) -> Result<()> {
    println!("Converting query: '{}'", question);
    let sql = nl.generate_sql(question).await?;
    println!("Generated SQL query:\n{}\n{}\n{}", rule(), sql, rule());

    let Some(store) = store else {
        println!("SQL query generated (not executed)");
        return Ok(());
    };
    let outcome = query::execute(store, &sql).await?;
    println!("Query Results:\n{}\n{}", "=".repeat(50), outcome.render());
    Ok(())
}

fn prompt_line(label: &str) -> Result<Option<String>> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

async fn interactive(nl: &NlToSql, store: Option<&dyn MisStore>) -> Result<()> {
    println!("MIS Analytics - interactive SQL generator ({})", nl.dialect().label());
    println!("Type 'quit', 'exit' or 'q' to leave.");
    loop {
        let Some(question) = prompt_line("\nQuestion: ")? else {
            break;
        };
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }
        let sql = match nl.generate_sql(&question).await {
            Ok(sql) => sql,
            Err(e) => {
                eprintln!("ERROR: {:#}", e);
                continue;
            }
        };
        println!("{}\n{}\n{}", rule(), sql, rule());

        let Some(store) = store else { continue };
        let confirm = prompt_line("Execute this query? (y/n): ")?.unwrap_or_default();
        if !matches!(confirm.to_lowercase().as_str(), "y" | "yes") {
            continue;
        }
        match query::execute(store, &sql).await {
            Ok(outcome) => println!("{}", outcome.render()),
            Err(e) => eprintln!("ERROR: {:#}", e),
        }
    }
    println!("Goodbye!");
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(key) = args.api_key.clone() {
        config.openai_api_key = Some(key);
    }

    let provider = Arc::new(OpenAiAdapter::from_config(&config)?);
    let nl = NlToSql::new(provider, Dialect::from(args.backend));

    let store: Option<Arc<dyn MisStore>> = if args.sql_only {
        None
    } else {
        Some(store::connect(&config, args.backend).await?)
    };

    if args.interactive {
        return interactive(&nl, store.as_deref()).await;
    }
    let Some(question) = args.query.as_deref() else {
        bail!("a question is required unless --interactive is given");
    };
    answer(&nl, store.as_deref(), question).await
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(env).with_writer(io::stderr).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
