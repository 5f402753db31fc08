//! Concept Tracker RPC Server: JSON-RPC over stdin/stdout for a UI process.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"demo.view", "params":{"id":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//!
//! Logs go to stderr; stdout carries only protocol lines.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Mutex;

use concept_tracker::app::App;
use concept_tracker::rpc_handler::handle_method;
use concept_tracker::services::config_loader::{ConfigLoader, ConfigLoaderTrait};

use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn emit(line: &Value) {
    let mut out = io::stdout().lock();
    if writeln!(out, "{}", line).and_then(|_| out.flush()).is_err() {
        error!("stdout closed");
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = match ConfigLoader::new(None).load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            emit(&json!({"event": "config_error", "error": e.to_string()}));
            return ExitCode::FAILURE;
        }
    };

    let mut app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "backend unavailable");
            emit(&json!({"event": "backend_error", "error": e.to_string()}));
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = runtime.block_on(app.startup()) {
        error!(error = %e, "backend verification failed");
        emit(&json!({"event": "backend_error", "error": e.to_string()}));
        return ExitCode::FAILURE;
    }

    let app = Mutex::new(app);
    emit(&json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                emit(&json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or(json!({}));

        let response = match handle_method(&app, method, &params) {
            Ok(val) => json!({"id": id, "result": val}),
            Err(err) => json!({"id": id, "error": err}),
        };
        emit(&response);
    }

    if let Ok(mut a) = app.lock() {
        a.shutdown();
    }
    info!("stdin closed, exiting");
    ExitCode::SUCCESS
}
