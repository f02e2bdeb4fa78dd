// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use std::time::Duration;

use cloudwatch_logs_sink::cloudwatch::{ClientConfig, StaticCredentials};
use cloudwatch_logs_sink::config::SinkConfig;

pub const USAGE: &str = "Usage: cloudwatchlogs [-a ACCESS_KEY] [-s SECRET_KEY]
                      [-r REGION] [-g GROUP_NAME] [-t STREAM_NAME]
                      [-b BULK_INDEX] [-o TIMEOUT]";

/// Ship lines read from standard input to a CloudWatch Logs stream
#[derive(Parser, Debug)]
#[command(name = "cloudwatchlogs", version, about, long_about = None)]
pub struct Args {
    /// AWS access key id (defaults to the standard credentials chain)
    #[arg(short = 'a', long, alias = "accessKeyId")]
    pub access_key_id: Option<String>,

    /// AWS secret access key
    #[arg(short = 's', long, alias = "secretAccessKey")]
    pub secret_access_key: Option<String>,

    /// AWS region
    #[arg(short = 'r', long)]
    pub region: Option<String>,

    /// Log group to write to, created if missing
    #[arg(short = 'g', long, alias = "logGroupName")]
    pub log_group_name: Option<String>,

    /// Log stream to write to, created if missing
    #[arg(short = 't', long, alias = "logStreamName")]
    pub log_stream_name: Option<String>,

    /// Flush once more than this many lines are buffered
    #[arg(short = 'b', long, alias = "bulkIndex")]
    pub bulk_index: Option<usize>,

    /// Flush buffered lines every this many seconds
    #[arg(short = 'o', long)]
    pub timeout: Option<u64>,

    /// Override the CloudWatch Logs endpoint
    #[arg(long)]
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("No destination given")]
    NoDestination,

    #[error("Missing log group name")]
    MissingLogGroup,

    #[error("Missing log stream name")]
    MissingLogStream,

    #[error("Access key id and secret access key must be given together")]
    PartialCredentials,

    #[error("Bulk index must be greater than 0")]
    ZeroBulkIndex,

    #[error("Timeout must be greater than 0")]
    ZeroTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub sink: SinkConfig,
    pub client: ClientConfig,
}

impl Args {
    fn identifies_destination(&self) -> bool {
        self.access_key_id.is_some()
            || self.secret_access_key.is_some()
            || self.region.is_some()
            || self.log_group_name.is_some()
            || self.log_stream_name.is_some()
    }

    /// Validates the flags before anything touches the network.
    pub fn resolve(self) -> Result<Options, UsageError> {
        if !self.identifies_destination() {
            return Err(UsageError::NoDestination);
        }

        let group = self.log_group_name.ok_or(UsageError::MissingLogGroup)?;
        let stream = self.log_stream_name.ok_or(UsageError::MissingLogStream)?;

        let credentials = match (self.access_key_id, self.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
                access_key_id,
                secret_access_key,
            }),
            (None, None) => None,
            _ => return Err(UsageError::PartialCredentials),
        };

        let mut sink = SinkConfig::new(group, stream);
        match self.bulk_index {
            Some(0) => return Err(UsageError::ZeroBulkIndex),
            Some(batch_size) => sink = sink.with_batch_size(batch_size),
            None => {}
        }
        match self.timeout {
            Some(0) => return Err(UsageError::ZeroTimeout),
            Some(secs) => sink = sink.with_flush_interval(Duration::from_secs(secs)),
            None => {}
        }

        Ok(Options {
            sink,
            client: ClientConfig {
                region: self.region,
                credentials,
                endpoint_url: self.endpoint_url,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(argv: &[&str]) -> Result<Options, UsageError> {
        Args::try_parse_from(std::iter::once("cloudwatchlogs").chain(argv.iter().copied()))
            .expect("arguments should parse")
            .resolve()
    }

    #[test]
    fn test_no_flags_is_a_usage_error() {
        assert_eq!(resolve(&[]), Err(UsageError::NoDestination));
        assert_eq!(resolve(&["-b", "10"]), Err(UsageError::NoDestination));
    }

    #[test]
    fn test_short_flags_resolve_full_options() {
        let options = resolve(&[
            "-a", "AKID", "-s", "secret", "-r", "eu-west-1", "-g", "app", "-t", "web-1", "-b",
            "100", "-o", "5",
        ])
        .expect("valid flags");

        assert_eq!(
            options.sink,
            SinkConfig::new("app", "web-1")
                .with_batch_size(100)
                .with_flush_interval(Duration::from_secs(5))
        );
        assert_eq!(options.client.region.as_deref(), Some("eu-west-1"));
        assert_eq!(
            options.client.credentials,
            Some(StaticCredentials {
                access_key_id: "AKID".to_string(),
                secret_access_key: "secret".to_string(),
            })
        );
    }

    #[test]
    fn test_without_batching_flags_sink_is_immediate() {
        let options = resolve(&["--log-group-name", "app", "--log-stream-name", "web-1"])
            .expect("valid flags");
        assert!(options.sink.is_immediate());
        assert_eq!(options.client.credentials, None);
    }

    #[test]
    fn test_legacy_camel_case_aliases() {
        let options = resolve(&["--logGroupName", "app", "--logStreamName", "web-1", "--bulkIndex", "2"])
            .expect("valid flags");
        assert_eq!(options.sink.batch_size, Some(2));
    }

    #[test]
    fn test_incomplete_destination_is_rejected() {
        assert_eq!(resolve(&["-g", "app"]), Err(UsageError::MissingLogStream));
        assert_eq!(resolve(&["-t", "web-1"]), Err(UsageError::MissingLogGroup));
        assert_eq!(
            resolve(&["-g", "app", "-t", "web-1", "-a", "AKID"]),
            Err(UsageError::PartialCredentials)
        );
        assert_eq!(
            resolve(&["-g", "app", "-t", "web-1", "-b", "0"]),
            Err(UsageError::ZeroBulkIndex)
        );
        assert_eq!(
            resolve(&["-g", "app", "-t", "web-1", "-o", "0"]),
            Err(UsageError::ZeroTimeout)
        );
    }
}
