// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod args;

use clap::Parser;
use std::{env, future::Future, process, sync::Arc};
use tokio::{io::AsyncRead, task::JoinHandle};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use cloudwatch_logs_sink::{
    cloudwatch::CloudWatchLogsDestination,
    config::SinkConfig,
    destination::LogDestination,
    errors::SinkError,
    input::forward_lines,
    sink_service::{SinkEvent, SinkService},
};

use crate::args::{Args, USAGE};

const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

enum Outcome {
    EndOfInput(Result<std::io::Result<u64>, tokio::task::JoinError>),
    SinkFailed(SinkError),
    SinkClosed,
    Interrupted,
}

#[tokio::main]
pub async fn main() {
    let options = match Args::parse().resolve() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            process::exit(EXIT_FAILURE);
        }
    };

    let log_level = env::var("CLOUDWATCHLOGS_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!(
        "h2=off,hyper=off,rustls=off,aws_smithy_runtime=off,aws_config=off,{log_level}"
    );

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(false)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let destination = Arc::new(CloudWatchLogsDestination::from_config(&options.client).await);
    let code = run(
        destination,
        options.sink,
        tokio::io::stdin(),
        tokio::signal::ctrl_c(),
    )
    .await;

    // stdin is read on a blocking thread the runtime cannot reclaim, so leave
    // through process::exit instead of returning.
    process::exit(code);
}

/// Ships `reader` line by line until it ends, the sink fails, or `interrupt`
/// resolves. Returns the process exit code.
async fn run<R, S>(
    destination: Arc<dyn LogDestination>,
    config: SinkConfig,
    reader: R,
    interrupt: S,
) -> i32
where
    R: AsyncRead + Unpin + Send + 'static,
    S: Future<Output = std::io::Result<()>>,
{
    info!(
        "Shipping standard input to {}/{}",
        config.log_group_name, config.log_stream_name
    );

    let (service, handle, mut events) = SinkService::new(destination, config);
    let service_task = tokio::spawn(service.run());

    let mut input: JoinHandle<std::io::Result<u64>> = {
        let handle = handle.clone();
        tokio::spawn(async move { forward_lines(reader, &handle).await })
    };
    tokio::pin!(interrupt);

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SinkEvent::Ready) => debug!("Sink ready"),
                Some(SinkEvent::Error(e)) if e.is_fatal() => break Outcome::SinkFailed(e),
                Some(SinkEvent::Error(e)) => warn!("Will retry: {e}"),
                Some(SinkEvent::Closed) | None => break Outcome::SinkClosed,
            },
            result = &mut input => break Outcome::EndOfInput(result),
            _ = &mut interrupt => break Outcome::Interrupted,
        }
    };

    let code = match outcome {
        Outcome::EndOfInput(Ok(Ok(records))) => {
            info!("Read {records} records, flushing remaining events");
            match handle.flush().await {
                Ok(()) => 0,
                Err(e) => {
                    error!("Final flush failed: {e}");
                    EXIT_FAILURE
                }
            }
        }
        Outcome::EndOfInput(Ok(Err(e))) => {
            error!("Failed to read standard input: {e}");
            handle.destroy(Some(format!("input error: {e}")));
            EXIT_FAILURE
        }
        Outcome::EndOfInput(Err(e)) => {
            error!("Input task failed: {e}");
            EXIT_FAILURE
        }
        Outcome::SinkFailed(e) => {
            error!("Giving up: {e}");
            input.abort();
            EXIT_FAILURE
        }
        Outcome::SinkClosed => EXIT_FAILURE,
        Outcome::Interrupted => {
            warn!("Interrupted, discarding buffered events");
            input.abort();
            EXIT_INTERRUPTED
        }
    };

    if let Ok(buffered) = handle.buffered().await {
        if buffered > 0 {
            warn!("Exiting with {buffered} unsent events");
        }
    }
    handle.destroy(None);
    if let Err(e) = service_task.await {
        error!("Sink task failed: {e}");
    }

    code
}
