pub mod config;
pub mod duck;
pub mod llm;
pub mod migrate;
pub mod process;
pub mod query;
pub mod record;
pub mod store;
pub mod summarize;
pub mod web;
