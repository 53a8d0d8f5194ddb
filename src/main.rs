mod cache;
mod clients;
mod config;
mod net;
#[cfg(test)]
mod test_support;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cache::{CacheSource, SqliteStorage};
use clients::ClientHub;
use net::{Destination, HttpFetcher, Request};
use worker::{ControlMessage, ServiceWorker};

#[derive(Parser, Debug)]
#[command(name = "beidou-sw")]
#[command(about = "Offline caching worker for the Beidou education front-end")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/beidou-sw/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Prefetch the static manifest and activate the current generation
  Install,
  /// Send a request through the worker
  Fetch {
    /// Absolute url or path relative to the configured origin
    url: String,
    #[arg(short, long, default_value = "GET")]
    method: String,
    /// Treat the request as a page navigation
    #[arg(long)]
    document: bool,
    /// Request body, sent as-is
    #[arg(short, long)]
    data: Option<String>,
  },
  /// Cache question sets for one subject, or every subject with "all"
  Preload { subject: Option<String> },
  /// Show entry counts per namespace
  Status,
  /// Delete every cache namespace
  Clear,
  /// Deliver a push message, optionally clicking one of its actions
  Push {
    /// Push data, e.g. '{"title":"New quiz","body":"...","url":"/quiz"}'
    #[arg(default_value = "")]
    payload: String,
    /// Simulate a click: "open", "close", or "body"
    #[arg(long)]
    click: Option<String>,
  },
  /// Fire a background sync event
  Sync { tag: String },
}

/// Initialize the tracing subscriber for logging
///
/// Use RUST_LOG to control the level (e.g., RUST_LOG=debug).
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

  match log_file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
      let name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
      let appender = tracing_appender::rolling::never(dir, name);
      let (writer, guard) = tracing_appender::non_blocking(appender);

      tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
      Ok(None)
    }
  }
}

fn source_label(source: CacheSource) -> &'static str {
  match source {
    CacheSource::Network => "network",
    CacheSource::Cache => "cache",
    CacheSource::Offline => "offline cache",
    CacheSource::Synthesized => "offline fallback",
  }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_tracing(args.log_file.as_deref())?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let worker_config = Arc::new(config::WorkerConfig::from_config(&config)?);

  let storage = Arc::new(SqliteStorage::open(&config.database_path()?)?);
  let fetcher = Arc::new(HttpFetcher::new(worker_config.fetch_timeout)?);
  let worker = ServiceWorker::new(worker_config.clone(), storage, fetcher, ClientHub::new());
  info!(generation = %worker_config.generation, "worker ready");

  match args.command {
    Command::Install => {
      let deleted = worker.start().await?;
      print_json(&json!({
        "state": format!("{:?}", worker.lifecycle().state()),
        "skip_waiting": worker.lifecycle().skip_waiting(),
        "claimed": worker.clients().is_claimed(),
        "removed": deleted,
        "status": worker.status()?,
      }))?;
    }
    Command::Fetch {
      url,
      method,
      document,
      data,
    } => {
      let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|e| eyre!("Invalid method '{}': {}", method, e))?;
      let destination = if document {
        Destination::Document
      } else {
        Destination::Other
      };
      let mut request = Request::get(worker_config.resolve(&url)?)
        .with_method(method)
        .with_destination(destination);
      if let Some(data) = data {
        request = request.with_body(data.into_bytes());
      }

      let result = worker.handle_fetch(&request).await?;
      eprintln!(
        "{} {} [{}]{}",
        result.data.status,
        source_label(result.source),
        result.data.header("content-type").unwrap_or("-"),
        result
          .cached_at
          .map(|t| format!(" (cached {})", t.to_rfc3339()))
          .unwrap_or_default()
      );
      println!("{}", String::from_utf8_lossy(&result.data.body));
    }
    Command::Preload { subject } => {
      let report = worker
        .questions()
        .preload(subject.as_deref().unwrap_or(worker::ALL_SUBJECTS))
        .await;
      print_json(&serde_json::to_value(&report)?)?;
    }
    Command::Status => {
      let status = worker.request_status().await?;
      print_json(&serde_json::to_value(&status)?)?;
    }
    Command::Clear => {
      worker.on_message(ControlMessage::ClearCache, None).await?;
      print_json(&serde_json::to_value(worker.status()?)?)?;
    }
    Command::Push { payload, click } => {
      let mut page = worker.clients().subscribe();
      let notification = worker.on_push_data(payload.as_bytes());
      if let (Some(notification), Some(action)) = (&notification, click) {
        let action = (action != "body").then_some(action.as_str());
        worker.on_notification_click(notification, action);
      }
      while let Ok(event) = page.try_recv() {
        println!("{:?}", event);
      }
    }
    Command::Sync { tag } => {
      worker.on_sync(&tag).await;
    }
  }

  // Cache hits refresh in the background; let them land before the runtime stops
  worker.settle().await;
  Ok(())
}
