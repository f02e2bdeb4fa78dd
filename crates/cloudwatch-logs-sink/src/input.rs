// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Adapter feeding a byte stream into a sink, one record per line.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

use crate::sink_service::SinkHandle;

/// Reads `reader` to EOF and accepts every non-empty line into `sink`.
///
/// Line terminators are stripped and invalid UTF-8 is replaced. A final line
/// without a terminator is still forwarded. Returns the number of records
/// accepted.
pub async fn forward_lines<R>(reader: R, sink: &SinkHandle) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut forwarded = 0;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        let record = trim_line_ending(&line);
        if record.is_empty() {
            continue;
        }
        sink.accept(String::from_utf8_lossy(record).into_owned());
        forwarded += 1;
    }

    debug!("INPUT | Reached end of input after {forwarded} records");
    Ok(forwarded)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
