// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, future::Future, process::ExitCode, sync::Arc};

use tokio::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use log_processor_common::config::{normalize_log_level, DEFAULT_LOG_LEVEL, LOG_LEVEL_VAR};
use log_processor_common::worker::{ForwardingProcessor, Worker};
use log_processor_common::ProcessorContext;

/// Pause after a receive that kept failing, before polling again.
const RECEIVE_FAILURE_PAUSE: Duration = Duration::from_secs(5);

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var(LOG_LEVEL_VAR)
        .map(|val| normalize_log_level(&val))
        .unwrap_or(DEFAULT_LOG_LEVEL.to_string());

    if let Err(e) = init_logging(&log_level) {
        eprintln!("could not set up logging: {e}");
        return ExitCode::FAILURE;
    }
    debug!("Logging subsystem enabled");

    let ctx = match ProcessorContext::from_env().await {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!("Error creating processor context on startup: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Polling {} with a {} long-poll wait",
        ctx.config().sqs_queue_url,
        ctx.wait_time()
    );

    let worker = Worker::new(ctx, ForwardingProcessor);
    match run(&worker).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Log processor stopped: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(log_level: &str) -> anyhow::Result<()> {
    let env_filter = format!(
        "h2=off,hyper=off,rustls=off,aws_smithy_runtime=warn,aws_config=warn,{log_level}"
    );

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_new(env_filter)?)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(worker: &Worker<ForwardingProcessor>) -> anyhow::Result<()> {
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let polled = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping");
                return Ok(());
            }
            polled = worker.poll_once() => polled,
        };

        match polled {
            Ok(summary) => debug!("Poll cycle done: {summary:?}"),
            Err(e) if e.is_exhausted() => {
                error!("{e}, pausing before the next poll");
                if pause_unless_shutdown(&mut shutdown, RECEIVE_FAILURE_PAUSE).await {
                    info!("Shutdown requested, stopping");
                    return Ok(());
                }
            }
            Err(e) => return Err(anyhow::Error::new(e).context("queue receive rejected")),
        }
    }
}

/// Sleeps for `pause`, returning early with `true` if `shutdown` completes first.
async fn pause_unless_shutdown<S>(shutdown: &mut S, pause: Duration) -> bool
where
    S: Future + Unpin,
{
    tokio::select! {
        _ = shutdown => true,
        _ = tokio::time::sleep(pause) => false,
    }
}
