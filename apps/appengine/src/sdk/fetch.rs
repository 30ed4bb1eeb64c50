//! Archive fetching.
//!
//! A zip archive keeps its directory of entries at the end of the file, so
//! extraction needs random access. Remote archives are therefore buffered in
//! memory in full before they are handed to the installer; local archives
//! are opened directly.
//!
//! Buffering is fine for SDK-sized archives (a few hundred MB at most).
//! Streaming extraction over ranged HTTP reads would be needed for anything
//! much larger.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::time::Instant;

use anyhow::Result;
use futures_util::StreamExt;
use rand::Rng;
use reqwest::{StatusCode, Url};

use super::config::HttpSettings;
use super::source::ResolvedSource;
use crate::errors::SdkError;

/// Maximum number of download attempts.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Minimum interval between progress updates in milliseconds.
const PROGRESS_INTERVAL_MS: u128 = 250;

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// A seekable view of an archive, either in memory or on disk.
///
/// Dropping the stream releases the buffer or closes the file.
#[derive(Debug)]
pub enum ArchiveStream {
    /// A downloaded archive held in memory.
    Memory(Cursor<Vec<u8>>),
    /// An archive read straight from disk.
    File(File),
}

impl Read for ArchiveStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Memory(cursor) => cursor.read(buf),
            Self::File(file) => file.read(buf),
        }
    }
}

impl Seek for ArchiveStream {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            Self::Memory(cursor) => cursor.seek(pos),
            Self::File(file) => file.seek(pos),
        }
    }
}

/// Opens a resolved source for reading.
///
/// # Errors
///
/// Returns [`SdkError::FetchError`] if the download fails or ends with a
/// non-success status, or if the local file is missing or unreadable.
pub async fn open(source: &ResolvedSource, http: &HttpSettings) -> Result<ArchiveStream> {
    match source {
        ResolvedSource::Remote { url, .. } => {
            let bytes = download(url, http).await?;
            Ok(ArchiveStream::Memory(Cursor::new(bytes)))
        }
        ResolvedSource::Local(path) => {
            tracing::debug!(path = %path.display(), "opening local archive");
            let file = File::open(path).map_err(|e| {
                let message = if e.kind() == std::io::ErrorKind::NotFound {
                    format!("archive not found: {}", path.display())
                } else {
                    format!("failed to open archive: {}", path.display())
                };
                SdkError::fetch_with_source(message, e)
            })?;
            Ok(ArchiveStream::File(file))
        }
    }
}

/// Outcome of one download attempt.
enum Attempt {
    Done(Vec<u8>),
    /// Worth trying again: transport errors and server-side failures.
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

/// Downloads `url` into memory, retrying transient failures.
async fn download(url: &Url, http: &HttpSettings) -> Result<Vec<u8>> {
    let client = http.client()?;
    let mut last_error = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            let delay = calculate_retry_delay(attempt);
            println!("Retrying download (attempt {}/{MAX_RETRIES})...", attempt + 1);
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        match download_once(&client, url).await {
            Attempt::Done(bytes) => return Ok(bytes),
            Attempt::Fatal(e) => return Err(e),
            Attempt::Transient(e) => {
                tracing::warn!(%url, attempt = attempt + 1, error = %e, "download attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        SdkError::fetch(format!("download failed after {MAX_RETRIES} attempts: {url}")).into()
    }))
}

async fn download_once(client: &reqwest::Client, url: &Url) -> Attempt {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            return Attempt::Transient(
                SdkError::fetch_with_source(format!("failed to connect to {url}"), e).into(),
            );
        }
    };

    let status = response.status();
    if !status.is_success() {
        let err = http_error(status, url);
        return if status.is_server_error() {
            Attempt::Transient(err)
        } else {
            Attempt::Fatal(err)
        };
    }

    let total = response.content_length().unwrap_or(0);
    let mut buffer = Vec::with_capacity(initial_capacity(total));
    let mut stream = response.bytes_stream();
    let start_time = Instant::now();
    let mut last_update = Instant::now();
    let mut progress_shown = false;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                if progress_shown {
                    println!();
                }
                return Attempt::Transient(
                    SdkError::fetch_with_source(format!("failed to read body of {url}"), e).into(),
                );
            }
        };
        buffer.extend_from_slice(&chunk);

        let now = Instant::now();
        if now.duration_since(last_update).as_millis() >= PROGRESS_INTERVAL_MS {
            print_progress(buffer.len() as u64, total, start_time.elapsed().as_secs_f64());
            last_update = now;
            progress_shown = true;
        }
    }

    print_progress(buffer.len() as u64, total, start_time.elapsed().as_secs_f64());
    println!();
    tracing::info!(%url, bytes = buffer.len(), "downloaded archive");

    Attempt::Done(buffer)
}

/// Buffer size to reserve for a body the server claims is `total` bytes.
fn initial_capacity(total: u64) -> usize {
    usize::try_from(total.min(MAX_PREALLOCATION)).unwrap_or(0)
}

/// Maps a non-success status to a fetch error.
fn http_error(status: StatusCode, url: &Url) -> anyhow::Error {
    let message = match status.as_u16() {
        404 => format!("archive not found at {url}"),
        code if code >= 500 => format!("server error ({code}): {url}"),
        code => format!("HTTP error {code}: {url}"),
    };
    SdkError::fetch(message).into()
}

/// Prints a simple text-based progress line.
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn print_progress(downloaded: u64, total: u64, elapsed_secs: f64) {
    let percent = if total > 0 {
        (downloaded as f64 / total as f64 * 100.0).min(100.0) as u8
    } else {
        0
    };
    let speed = if elapsed_secs > 0.0 {
        downloaded as f64 / elapsed_secs
    } else {
        0.0
    };

    print!(
        "\r{}/{} ({percent}%) {}/s     ",
        format_bytes(downloaded),
        format_bytes(total),
        format_bytes(speed as u64)
    );
    let _ = std::io::stdout().flush();
}

/// Formats bytes into a human-readable string (KB, MB, GB).
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Calculates the retry delay with exponential backoff and jitter.
///
/// The delay doubles with each attempt (1s, 2s, 4s) with +/- 25% jitter.
fn calculate_retry_delay(attempt: u32) -> u64 {
    let base_delay = BASE_RETRY_DELAY_MS * 2u64.pow(attempt - 1);
    let jitter_range = base_delay / 4;
    let jitter = rand::rng().random_range(0..=jitter_range * 2);
    base_delay - jitter_range + jitter
}
