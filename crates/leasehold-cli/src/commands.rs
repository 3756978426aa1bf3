//! Command execution
//!
//! Each command writes its result to `out` and returns the process exit
//! code: 0 on success, 1 when the lease or value was not available, 2 when
//! the command failed.

use std::io::Write;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use leasehold_lock::{
    AcquireOptions, Clock, LeaseKeepAlive, LockError, LockManager, LockManagerConfig,
};
use serde_json::{Value, json};
use tokio::process::Command as ProcessCommand;
use tracing::{error, info, warn};

use crate::cli::{CacheCommand, Cli, Command, LeaseArgs};
use crate::store::SharedRocksDbStore;

pub const EXIT_OK: u8 = 0;
pub const EXIT_UNAVAILABLE: u8 = 1;
pub const EXIT_FAILURE: u8 = 2;

/// Load the manager configuration and apply command line overrides
pub fn manager_config(cli: &Cli) -> anyhow::Result<LockManagerConfig> {
    let mut config = LockManagerConfig::load(cli.config.as_deref())?;
    if let Some(namespace) = &cli.namespace {
        config = config.with_namespace(namespace);
    }
    if let Some(worker_id) = &cli.worker_id {
        config = config.with_worker_id(worker_id);
    }
    // Leases must outlive one invocation, so the owner id has to be stable
    if config.worker_id.is_none()
        && let Some(host) = hostname::get().ok().and_then(|h| h.into_string().ok())
    {
        config = config.with_worker_id(host);
    }
    config.validate()?;
    Ok(config)
}

fn open_manager(cli: &Cli) -> anyhow::Result<LockManager> {
    let config = manager_config(cli)?;
    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("Failed to create data dir {}", cli.data_dir.display()))?;
    let store = SharedRocksDbStore::new(&cli.data_dir);
    Ok(LockManager::new(Arc::new(store), config)?)
}

fn parse_json(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Run `cli` and turn any error into `EXIT_FAILURE`, reported on stderr
pub async fn execute(cli: Cli, out: &mut dyn Write) -> u8 {
    match run(cli, out).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {e:#}");
            EXIT_FAILURE
        }
    }
}

pub async fn run(cli: Cli, out: &mut dyn Write) -> anyhow::Result<u8> {
    let manager = open_manager(&cli)?;

    match cli.command {
        Command::Acquire {
            key,
            lease,
            wait,
            interval_ms,
        } => {
            let mut options =
                lease_options(&lease).with_retry_interval(Duration::from_millis(interval_ms));
            if wait {
                options.max_attempts = None;
            }
            acquire(&manager, &key, &options, out).await
        }
        Command::Extend { key, token, ttl } => {
            let handle = manager.resume(key, token);
            match handle.extend(ttl).await {
                Ok(()) => Ok(EXIT_OK),
                Err(LockError::Extend { .. }) => {
                    writeln!(out, "lost")?;
                    Ok(EXIT_UNAVAILABLE)
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::Release { key, token } => {
            let released = manager.resume(key, token).release().await?;
            writeln!(out, "{}", if released { "released" } else { "not-held" })?;
            Ok(EXIT_OK)
        }
        Command::Status { key } => status(&manager, &key, out).await,
        Command::Exec {
            key,
            lease,
            command,
        } => exec(&manager, &key, &lease, &command).await,
        Command::Cache(CacheCommand::Put { key, value, ttl }) => {
            manager
                .value_cache()
                .store(&key, parse_json(&value), ttl)
                .await?;
            Ok(EXIT_OK)
        }
        Command::Cache(CacheCommand::Get {
            key,
            default,
            ignore_ttl,
        }) => {
            let default = default.as_deref().map(parse_json);
            match manager.value_cache().fetch(&key, default, ignore_ttl).await? {
                Some(value) => {
                    writeln!(out, "{value}")?;
                    Ok(EXIT_OK)
                }
                None => Ok(EXIT_UNAVAILABLE),
            }
        }
    }
}

fn lease_options(lease: &LeaseArgs) -> AcquireOptions {
    let mut options = AcquireOptions::default();
    if let Some(ttl) = lease.ttl {
        options = options.with_ttl(ttl);
    }
    if let Some(max_attempts) = lease.max_attempts {
        options = options.with_max_attempts(max_attempts);
    }
    options
}

async fn acquire(
    manager: &LockManager,
    key: &str,
    options: &AcquireOptions,
    out: &mut dyn Write,
) -> anyhow::Result<u8> {
    match manager.acquire_with_retry(key, options).await {
        Ok(handle) => {
            writeln!(out, "{}", handle.token())?;
            Ok(EXIT_OK)
        }
        Err(e) if e.is_contention() => {
            info!(key = %key, "Lease is held by another owner");
            Ok(EXIT_UNAVAILABLE)
        }
        Err(e) => Err(e.into()),
    }
}

async fn status(manager: &LockManager, key: &str, out: &mut dyn Write) -> anyhow::Result<u8> {
    let now = manager.clock().now();
    let report = match manager.lease_info(key).await? {
        Some(lease) => json!({
            "key": key,
            "owner": lease.owner,
            "token": lease.token,
            "expiry": lease.expiry,
            "valid": lease.is_valid_at(now),
        }),
        None => json!({
            "key": key,
            "owner": null,
            "token": null,
            "expiry": null,
            "valid": false,
        }),
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(EXIT_OK)
}

/// Run `command` under the lease on `key`
///
/// The child is killed when the keep-alive reports the lease lost. Its exit
/// code becomes ours; a child ended by a signal maps to 1.
async fn exec(
    manager: &LockManager,
    key: &str,
    lease: &LeaseArgs,
    command: &[String],
) -> anyhow::Result<u8> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow!("exec needs a command to run"))?;
    let ttl = lease.ttl;

    let result: anyhow::Result<ExitStatus> = manager
        .with_lease(key, &lease_options(lease), |handle| async move {
            let mut keepalive = LeaseKeepAlive::start(handle, ttl);
            let mut child = ProcessCommand::new(program)
                .args(args)
                .spawn()
                .with_context(|| format!("Failed to spawn {program}"))?;

            let status = tokio::select! {
                status = child.wait() => Some(status?),
                _ = keepalive.lost() => None,
            };

            match status {
                Some(status) => {
                    keepalive.stop().await;
                    Ok(status)
                }
                None => {
                    warn!(key = %key, "Lease lost, killing child process");
                    child.kill().await?;
                    Err(anyhow!("lease on '{key}' was lost while running {program}"))
                }
            }
        })
        .await;

    match result {
        Ok(status) => Ok(status.code().map_or(EXIT_UNAVAILABLE, |code| code as u8)),
        Err(e) if e.downcast_ref::<LockError>().is_some_and(LockError::is_contention) => {
            info!(key = %key, "Lease is held by another owner, command not run");
            Ok(EXIT_UNAVAILABLE)
        }
        Err(e) => Err(e),
    }
}
