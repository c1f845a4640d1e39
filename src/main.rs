//!
//! strandworks server binary
//! -------------------------
//! Command-line entry point for starting the strandworks HTTP server.
//! Supports configuration via CLI flags and environment variables.

use anyhow::Result;
use std::env;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use strandworks::identity::DEFAULT_TTL_SECS;

fn parse_port_env(name: &str) -> Option<u16> {
    match env::var(name) {
        Ok(val) => val.parse::<u16>().ok(),
        Err(_) => None,
    }
}

fn parse_arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!(
            "strandworks server\n\nUSAGE:\n  strandworks [--http-port N] [--data-folder PATH] [--session-ttl-secs N]\n\nOPTIONS:\n  --http-port N          HTTP API port (env: STRANDWORKS_HTTP_PORT, default 7878)\n  --data-folder PATH     Data root folder (env: STRANDWORKS_DATA_FOLDER, default data)\n  --session-ttl-secs N   Session lifetime in seconds (env: STRANDWORKS_SESSION_TTL_SECS, default 86400)\n"
        );
        return Ok(());
    }

    // Defaults
    let default_http: u16 = 7878;
    let default_root: &str = "data";

    // Environment variables
    let env_http = parse_port_env("STRANDWORKS_HTTP_PORT");
    let env_root = env::var("STRANDWORKS_DATA_FOLDER").ok();
    let env_ttl = env::var("STRANDWORKS_SESSION_TTL_SECS")
        .ok()
        .and_then(|s| s.parse::<i64>().ok());

    // CLI arguments override environment
    let arg_http = parse_arg_value(&args, "--http-port").and_then(|s| s.parse::<u16>().ok());
    let arg_root = parse_arg_value(&args, "--data-folder");
    let arg_ttl = parse_arg_value(&args, "--session-ttl-secs").and_then(|s| s.parse::<i64>().ok());

    let http_port = arg_http.or(env_http).unwrap_or(default_http);
    let data_root = arg_root.or(env_root).unwrap_or_else(|| default_root.to_string());
    let session_ttl_secs = arg_ttl.or(env_ttl).unwrap_or(DEFAULT_TTL_SECS);

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "strandworks",
        "strandworks starting: RUST_LOG='{}', http_port={}, data_root='{}', session_ttl_secs={}",
        rust_log, http_port, data_root, session_ttl_secs
    );

    strandworks::server::run_with_ports(http_port, &data_root, session_ttl_secs).await
}
