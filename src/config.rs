use std::env;
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_DUCKDB_PATH: &str = "mis.duckdb";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_LOCAL_LLM_URL: &str = "http://localhost:8000/v1/chat/completions";
pub const DEFAULT_LOCAL_LLM_MODEL: &str = "llama3.2:3b";
pub const DEFAULT_PORT: u16 = 8080;

/// Settings shared by the binaries, read from the environment after `.env`
/// has been loaded.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub duckdb_path: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub local_llm_backend: String,
    pub local_llm_url: String,
    pub local_llm_model: String,
    pub ollama_url: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            supabase_url: None,
            supabase_anon_key: None,
            duckdb_path: PathBuf::from(DEFAULT_DUCKDB_PATH),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            local_llm_backend: "ollama".to_string(),
            local_llm_url: DEFAULT_LOCAL_LLM_URL.to_string(),
            local_llm_model: DEFAULT_LOCAL_LLM_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let d = Config::default();
        Self {
            database_url: get("DATABASE_URL"),
            supabase_url: get("SUPABASE_URL"),
            supabase_anon_key: get("SUPABASE_ANON_KEY"),
            duckdb_path: get("DUCKDB_PATH").map(PathBuf::from).unwrap_or(d.duckdb_path),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(d.openai_base_url),
            openai_model: get("OPENAI_MODEL").unwrap_or(d.openai_model),
            local_llm_backend: get("LOCAL_LLM_BACKEND").unwrap_or(d.local_llm_backend),
            local_llm_url: get("LOCAL_LLM_URL").unwrap_or(d.local_llm_url),
            local_llm_model: get("LOCAL_LLM_MODEL").unwrap_or(d.local_llm_model),
            ollama_url: get("OLLAMA_URL").unwrap_or(d.ollama_url),
            port: get("PORT").map_or(d.port, |p| parse_port(&p, d.port)),
        }
    }
}

/// `raw` as a port number, or `default` with a warning when it is not one.
fn parse_port(raw: &str, default: u16) -> u16 {
    match raw.parse() {
        Ok(port) => port,
        Err(e) => {
            warn!(value = raw, default, "ignoring invalid PORT: {}", e);
            default
        }
    }
}
