//! Source reader: streams URL rows from the input file into the URL queue.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::error::{Error, RecordError, Result};
use crate::metrics::Metrics;
use crate::shutdown::ShutdownContext;

/// Counters reported by [`SourceReader::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Rows accepted and counted as URLs
    pub records: u64,
    /// Rows skipped as malformed
    pub skipped: u64,
}

/// An opened input file, ready to be streamed into the URL queue
///
/// Opening is separate from running so that an unreadable input fails the
/// whole pipeline before any stage is started.
pub struct SourceReader {
    path: PathBuf,
    lines: tokio::io::Split<BufReader<tokio::fs::File>>,
}

impl SourceReader {
    /// Open the input file. This is the only fatal error of the reader.
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| Error::PathIo {
                action: "open input file",
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).split(b'\n'),
        })
    }

    /// Stream every valid row into `urls` until end of input or shutdown
    ///
    /// The first non-blank row is a header and is discarded; if the header itself
    /// is malformed nothing is read. Rows with a field count other than one, or
    /// that fail to parse, are logged and skipped. Each accepted row is counted in
    /// `metrics` before it is sent. The queue closes when `urls` is dropped on return.
    pub async fn run(
        mut self,
        urls: mpsc::Sender<String>,
        metrics: &Metrics,
        shutdown: &ShutdownContext,
    ) -> SourceStats {
        let mut stats = SourceStats::default();
        let mut header_seen = false;
        let mut line_number: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::warn!("Stage 1: shutdown initiated, stopping file read");
                    break;
                }
                next = self.lines.next_segment() => next,
            };

            let raw = match next {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    if !header_seen {
                        tracing::error!(path = %self.path.display(), "Failed to read header row: input is empty");
                    }
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        path = %self.path.display(),
                        line = line_number + 1,
                        error = %e,
                        "Failed to read input file, stopping"
                    );
                    break;
                }
            };
            line_number += 1;

            let record = decode_line(raw).and_then(|line| {
                if line.is_empty() {
                    Ok(None)
                } else {
                    parse_record(&line).map(Some)
                }
            });

            if !header_seen {
                match record {
                    Ok(None) => continue,
                    Ok(Some(fields)) if fields.len() == 1 => {
                        tracing::debug!(header = %fields[0], "Skipping header row");
                        header_seen = true;
                        continue;
                    }
                    Ok(Some(fields)) => {
                        let err = RecordError::FieldCount {
                            found: fields.len(),
                        };
                        tracing::error!(line = line_number, error = %err, "Failed to read header row");
                        return stats;
                    }
                    Err(err) => {
                        tracing::error!(line = line_number, error = %err, "Failed to read header row");
                        return stats;
                    }
                }
            }

            let url = match record {
                Ok(None) => continue,
                Ok(Some(mut fields)) if fields.len() == 1 => {
                    let field = fields.swap_remove(0);
                    field.trim().to_string()
                }
                Ok(Some(fields)) => {
                    let err = RecordError::FieldCount {
                        found: fields.len(),
                    };
                    tracing::warn!(line = line_number, error = %err, "Skipping invalid row");
                    stats.skipped += 1;
                    continue;
                }
                Err(err) => {
                    tracing::warn!(line = line_number, error = %err, "Skipping invalid row");
                    stats.skipped += 1;
                    continue;
                }
            };

            metrics.record_url();
            stats.records += 1;

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::warn!("Stage 1: shutdown initiated, stopping file read");
                    break;
                }
                sent = urls.send(url) => {
                    if sent.is_err() {
                        tracing::warn!("URL queue closed by download stage, stopping file read");
                        break;
                    }
                }
            }
        }

        stats
    }
}

/// Turn a raw line (without `\n`) into text, dropping a trailing `\r`
fn decode_line(mut raw: Vec<u8>) -> std::result::Result<String, RecordError> {
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    String::from_utf8(raw).map_err(|_| RecordError::InvalidUtf8)
}

/// Split one line into comma-separated fields
///
/// Fields may be wrapped in double quotes; inside quotes a comma is literal and
/// `""` stands for one `"`. A quote inside an unquoted field, text after a
/// closing quote, or a missing closing quote is an error. Quoted fields cannot
/// span lines.
pub fn parse_record(line: &str) -> std::result::Result<Vec<String>, RecordError> {
    let mut fields = Vec::new();
    let mut chars = line.char_indices().peekable();

    loop {
        let mut field = String::new();

        if let Some((_, '"')) = chars.peek() {
            chars.next();
            loop {
                match chars.next() {
                    None => return Err(RecordError::UnterminatedQuote),
                    Some((_, '"')) => {
                        if let Some((_, '"')) = chars.peek() {
                            chars.next();
                            field.push('"');
                        } else {
                            break;
                        }
                    }
                    Some((_, c)) => field.push(c),
                }
            }

            match chars.next() {
                None => {
                    fields.push(field);
                    return Ok(fields);
                }
                Some((_, ',')) => fields.push(field),
                Some((i, _)) => return Err(RecordError::TrailingQuote { column: i + 1 }),
            }
        } else {
            loop {
                match chars.next() {
                    None => {
                        fields.push(field);
                        return Ok(fields);
                    }
                    Some((_, ',')) => {
                        fields.push(field);
                        break;
                    }
                    Some((i, '"')) => return Err(RecordError::BareQuote { column: i + 1 }),
                    Some((_, c)) => field.push(c),
                }
            }
        }
    }
}
