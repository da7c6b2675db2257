//! Thin web UI and JSON API over the NL-to-SQL pipeline.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use warp::{http::StatusCode, reject::Rejection, reply::Reply, Filter};

use crate::query::{self, prompt::EXAMPLE_QUESTIONS, NlToSql};
use crate::store::MisStore;
use crate::summarize::LocalSummarizer;

/// Shared across requests; everything inside is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MisStore>,
    /// `None` when the LLM client could not be built; `llm_error` says why.
    pub nl: Option<Arc<NlToSql>>,
    pub llm_error: Option<String>,
    pub summarizer: Option<Arc<LocalSummarizer>>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub sql: String,
    /// Rendered text table or the `results` object from `/api/query`.
    #[serde(default)]
    pub results: serde_json::Value,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn error_reply(error: impl Into<String>, details: Option<String>) -> warp::reply::Json {
    warp::reply::json(&ErrorResponse {
        success: false,
        error: error.into(),
        details,
    })
}

/// Text handed to the summariser: strings pass through, structured results
/// are rendered back into a table.
pub fn results_text(results: &serde_json::Value) -> String {
    match results {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Object(map) => match map.get("text").and_then(|t| t.as_str()) {
            Some(text) => text.to_string(),
            None => serde_json::to_string_pretty(results).unwrap_or_default(),
        },
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

async fn health_check() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "service": "mis-analytics"
    })))
}

async fn index(state: AppState) -> Result<impl Reply, Infallible> {
    let banner = match &state.llm_error {
        None => String::new(),
        Some(e) => format!(
            "<p class=\"warn\">OpenAI API not connected: {}</p>",
            html_escape(e)
        ),
    };
    let page = INDEX_HTML
        .replace("{{banner}}", &banner)
        .replace("{{backend}}", state.store.backend().label());
    Ok(warp::reply::html(page))
}

async fn examples() -> Result<impl Reply, Infallible> {
    let items: String = EXAMPLE_QUESTIONS
        .iter()
        .map(|q| format!("<li><a href=\"/?q={}\">{}</a></li>", url_encode(q), html_escape(q)))
        .collect();
    Ok(warp::reply::html(EXAMPLES_HTML.replace("{{items}}", &items)))
}

async fn api_status(state: AppState) -> Result<impl Reply, Infallible> {
    let local_llm_available = match &state.summarizer {
        Some(s) => s.is_available().await,
        None => false,
    };
    Ok(warp::reply::json(&json!({
        "api_connected": state.nl.is_some(),
        "local_llm_available": local_llm_available,
        "backend": state.store.backend().as_str(),
        "error": state.llm_error,
    })))
}

async fn api_query(req: QueryRequest, state: AppState) -> Result<impl Reply, Infallible> {
    let Some(nl) = state.nl.clone() else {
        return Ok(error_reply(
            "OpenAI API not connected. Please check your API key.",
            state.llm_error.clone(),
        ));
    };
    let question = req.query.trim();
    if question.is_empty() {
        return Ok(error_reply("Please enter a question.", None));
    }

    let start = Instant::now();
    let sql = match nl.generate_sql(question).await {
        Ok(sql) => sql,
        Err(e) => {
            warn!("sql generation failed: {:#}", e);
            return Ok(error_reply(format!("{:#}", e), None));
        }
    };
    match query::execute(state.store.as_ref(), &sql).await {
        Ok(outcome) => {
            info!(
                rows = outcome.result.row_count(),
                elapsed = start.elapsed().as_secs_f64(),
                "answered question"
            );
            let text = outcome.render();
            Ok(warp::reply::json(&json!({
                "success": true,
                "query": question,
                "sql_query": sql,
                "results": {
                    "sql": outcome.sql,
                    "columns": outcome.result.columns,
                    "rows": outcome.result.rows,
                    "total_rows": outcome.total_rows,
                    "truncated": outcome.truncated,
                    "text": text,
                },
            })))
        }
        Err(e) => {
            warn!("query failed: {:#}", e);
            Ok(error_reply(format!("{:#}", e), Some(sql)))
        }
    }
}

async fn api_summarize(req: SummarizeRequest, state: AppState) -> Result<impl Reply, Infallible> {
    let Some(summarizer) = state.summarizer.clone() else {
        return Ok(error_reply(
            "Local LLM not available. Please ensure Ollama is running.",
            None,
        ));
    };
    let results = results_text(&req.results);
    if req.query.trim().is_empty() || req.sql.trim().is_empty() || results.is_empty() {
        return Ok(error_reply(
            "Missing required data: query, sql, or results",
            None,
        ));
    }
    match summarizer.summarize(&req.query, &req.sql, &results).await {
        Ok(summary) => Ok(warp::reply::json(&json!({
            "success": true,
            "summary": summary,
        }))),
        Err(e) => Ok(error_reply(format!("{:#}", e), None)),
    }
}

async fn api_models(state: AppState) -> Result<impl Reply, Infallible> {
    let Some(summarizer) = state.summarizer.clone() else {
        return Ok(error_reply("Local LLM not configured", None));
    };
    match summarizer.list_models().await {
        Ok(models) => Ok(warp::reply::json(&json!({
            "success": true,
            "models": models,
        }))),
        Err(e) => Ok(error_reply(format!("{:#}", e), None)),
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("invalid JSON body: {e}"))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:?}"))
    };
    Ok(warp::reply::with_status(error_reply(message, None), status))
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Every route of the UI and API.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(index);
    let examples = warp::path("examples")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(examples);
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let status = warp::path!("api" / "status")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(api_status);
    let query = warp::path!("api" / "query")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(api_query);
    let summarize = warp::path!("api" / "summarize")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(api_summarize);
    let models = warp::path!("api" / "models")
        .and(warp::get())
        .and(with_state(state))
        .and_then(api_models);

    index
        .or(examples)
        .or(health)
        .or(status)
        .or(query)
        .or(summarize)
        .or(models)
        .recover(handle_rejection)
}

pub async fn serve(state: AppState, port: u16) {
    info!("Server starting on port {}", port);
    info!("Open http://localhost:{}/ in a browser", port);
    warp::serve(routes(state)).run(([0, 0, 0, 0], port)).await;
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn url_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>MIS Analytics</title>
<style>
body { font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; }
textarea { width: 100%; height: 4rem; }
pre { background: #f4f4f4; padding: .75rem; overflow-x: auto; }
.warn { color: #a40; }
.muted { color: #666; }
</style>
</head>
<body>
<h1>MIS Analytics</h1>
<p class="muted">Ask a question about store performance. Backend: {{backend}}. <a href="/examples">Examples</a></p>
{{banner}}
<textarea id="q" placeholder="What are the top 10 stores by revenue in 2024?"></textarea>
<p><button id="ask">Ask</button> <button id="sum" disabled>Summarize</button></p>
<div id="out"></div>
<script>
const out = document.getElementById('out');
const sum = document.getElementById('sum');
const q = document.getElementById('q');
let last = null;
const pre = (t) => { const p = document.createElement('pre'); p.textContent = t; return p; };
const params = new URLSearchParams(location.search);
if (params.get('q')) q.value = params.get('q');
document.getElementById('ask').onclick = async () => {
  out.replaceChildren(pre('Generating SQL...'));
  sum.disabled = true;
  const r = await fetch('/api/query', {method: 'POST', headers: {'Content-Type': 'application/json'}, body: JSON.stringify({query: q.value})});
  const d = await r.json();
  if (!d.success) { out.replaceChildren(pre('Error: ' + d.error)); return; }
  last = d;
  out.replaceChildren(pre(d.sql_query), pre(d.results.text));
  sum.disabled = false;
};
sum.onclick = async () => {
  if (!last) return;
  out.appendChild(pre('Summarizing...'));
  const r = await fetch('/api/summarize', {method: 'POST', headers: {'Content-Type': 'application/json'}, body: JSON.stringify({query: last.query, sql: last.sql_query, results: last.results.text})});
  const d = await r.json();
  out.lastChild.textContent = d.success ? d.summary : 'Error: ' + d.error;
};
</script>
</body>
</html>
"#;

const EXAMPLES_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>MIS Analytics examples</title></head>
<body style="font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto;">
<h1>Example questions</h1>
<ul>
{{items}}
</ul>
<p><a href="/">Back</a></p>
</body>
</html>
"#;
