// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! [`LogDestination`] backed by the AWS CloudWatch Logs API.

use async_trait::async_trait;
use aws_config::{meta::region::RegionProviderChain, BehaviorVersion, Region};
use aws_sdk_cloudwatchlogs::config::Credentials;
use aws_sdk_cloudwatchlogs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudwatchlogs::types::{InputLogEvent, RejectedLogEventsInfo};
use aws_sdk_cloudwatchlogs::Client;
use std::fmt;
use tracing::{debug, info, warn};

use crate::destination::{DestinationError, LogDestination, SequenceToken};
use crate::event::LogEvent;

pub const DEFAULT_REGION: &str = "us-east-1";

const CREDENTIALS_PROVIDER_NAME: &str = "cloudwatchlogs-static";

#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// How to reach and authenticate against CloudWatch Logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Falls back to the default provider chain, then [`DEFAULT_REGION`].
    pub region: Option<String>,
    /// Falls back to the default credentials chain.
    pub credentials: Option<StaticCredentials>,
    pub endpoint_url: Option<String>,
}

pub async fn create_client(config: &ClientConfig) -> Client {
    let region_provider = RegionProviderChain::first_try(config.region.clone().map(Region::new))
        .or_default_provider()
        .or_else(Region::new(DEFAULT_REGION));

    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);

    if let Some(credentials) = &config.credentials {
        loader = loader.credentials_provider(Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        ));
    }
    if let Some(endpoint_url) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }

    let shared_config = loader.load().await;
    info!(
        "CLOUDWATCH | Client configured for region {}",
        shared_config
            .region()
            .map_or("<unknown>", |region| region.as_ref())
    );
    Client::new(&shared_config)
}

/// Index ranges of a batch that CloudWatch accepted the call for but did not
/// store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectedRanges {
    /// Events before this index were older than the retention window allows.
    pub too_old_end: Option<usize>,
    /// Events before this index had already expired.
    pub expired_end: Option<usize>,
    /// Events from this index on were too far in the future.
    pub too_new_start: Option<usize>,
}

impl RejectedRanges {
    fn from_info(info: &RejectedLogEventsInfo) -> Self {
        let index = |value: Option<i32>| value.and_then(|i| usize::try_from(i).ok());
        Self {
            too_old_end: index(info.too_old_log_event_end_index()),
            expired_end: index(info.expired_log_event_end_index()),
            too_new_start: index(info.too_new_log_event_start_index()),
        }
    }

    /// Number of events out of a batch of `batch_len` that were dropped.
    #[must_use]
    pub fn lost(&self, batch_len: usize) -> usize {
        let head = self
            .too_old_end
            .max(self.expired_end)
            .unwrap_or(0)
            .min(batch_len);
        let tail_start = self.too_new_start.unwrap_or(batch_len).clamp(head, batch_len);
        head + (batch_len - tail_start)
    }
}

#[derive(Clone, Debug)]
pub struct CloudWatchLogsDestination {
    client: Client,
}

impl CloudWatchLogsDestination {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn from_config(config: &ClientConfig) -> Self {
        Self::new(create_client(config).await)
    }

    async fn upload_sequence_token(
        &self,
        group: &str,
        stream: &str,
    ) -> Result<SequenceToken, DestinationError> {
        let output = self
            .client
            .describe_log_streams()
            .log_group_name(group)
            .log_stream_name_prefix(stream)
            .send()
            .await
            .map_err(|e| destination_error(&e))?;

        output
            .log_streams()
            .iter()
            .find(|candidate| candidate.log_stream_name() == Some(stream))
            .map(|found| SequenceToken::from(found.upload_sequence_token().map(str::to_string)))
            .ok_or_else(|| {
                DestinationError::InvalidRequest(format!(
                    "log stream {stream} not found in log group {group}"
                ))
            })
    }
}

#[async_trait]
impl LogDestination for CloudWatchLogsDestination {
    async fn ensure_group(&self, group: &str) -> Result<(), DestinationError> {
        match self
            .client
            .create_log_group()
            .log_group_name(group)
            .send()
            .await
        {
            Ok(_) => {
                info!("CLOUDWATCH | Created log group {group}");
                Ok(())
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|e| e.is_resource_already_exists_exception()) =>
            {
                debug!("CLOUDWATCH | Log group {group} already exists");
                Ok(())
            }
            Err(e) => Err(destination_error(&e)),
        }
    }

    async fn ensure_stream(
        &self,
        group: &str,
        stream: &str,
    ) -> Result<SequenceToken, DestinationError> {
        match self
            .client
            .create_log_stream()
            .log_group_name(group)
            .log_stream_name(stream)
            .send()
            .await
        {
            Ok(_) => {
                info!("CLOUDWATCH | Created log stream {stream} in {group}");
                Ok(SequenceToken::absent())
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|e| e.is_resource_already_exists_exception()) =>
            {
                debug!("CLOUDWATCH | Log stream {stream} already exists, looking up its token");
                self.upload_sequence_token(group, stream).await
            }
            Err(e) => Err(destination_error(&e)),
        }
    }

    async fn put_events(
        &self,
        group: &str,
        stream: &str,
        token: &SequenceToken,
        events: &[LogEvent],
    ) -> Result<SequenceToken, DestinationError> {
        let log_events = events
            .iter()
            .map(|event| {
                InputLogEvent::builder()
                    .message(event.message.as_str())
                    .timestamp(event.timestamp)
                    .build()
                    .map_err(|e| DestinationError::InvalidRequest(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .put_log_events()
            .log_group_name(group)
            .log_stream_name(stream)
            .set_sequence_token(token.as_str().map(str::to_string))
            .set_log_events(Some(log_events))
            .send()
            .await
            .map_err(|e| destination_error(&e))?;

        if let Some(info) = output.rejected_log_events_info() {
            let ranges = RejectedRanges::from_info(info);
            warn!(
                rejected = ranges.lost(events.len()),
                batch = events.len(),
                too_old_end = ?ranges.too_old_end,
                expired_end = ?ranges.expired_end,
                too_new_start = ?ranges.too_new_start,
                "CLOUDWATCH | Events were rejected by {group}/{stream}"
            );
        }

        Ok(SequenceToken::from(
            output.next_sequence_token().map(str::to_string),
        ))
    }
}

fn destination_error<E, R>(error: &SdkError<E, R>) -> DestinationError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    match error {
        SdkError::ServiceError(_) => DestinationError::Service {
            code: error.code().unwrap_or("Unknown").to_string(),
            message: error.message().unwrap_or_default().to_string(),
        },
        _ => DestinationError::Transport(DisplayErrorContext(error).to_string()),
    }
}
