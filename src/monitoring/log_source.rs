//! Followed log file
//!
//! [`FileLogSource`] behaves like `tail -f`: it yields complete lines as they
//! are appended and reports `None` when nothing new is available, leaving the
//! waiting to the caller.

use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info, warn};

/// Supplier of raw log lines
#[async_trait]
pub trait LogSource: Send {
    /// Next complete line, or `None` when no new data is available yet
    async fn next_line(&mut self) -> AppResult<Option<String>>;
}

/// Where reading starts when the file is first opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// Skip content that existed at startup
    #[default]
    End,
    Beginning,
}

/// Follows a single file on disk
pub struct FileLogSource {
    path: PathBuf,
    start: StartPosition,
    reader: Option<BufReader<File>>,
    /// Bytes of the current, not yet terminated line
    partial: Vec<u8>,
    /// Bytes consumed so far, used to resume after reopening
    offset: u64,
    opened_once: bool,
    /// File was missing on the first attempt; all of its content is new
    appeared_late: bool,
    waiting_logged: bool,
}

impl FileLogSource {
    pub fn new(path: impl Into<PathBuf>, start: StartPosition) -> Self {
        Self {
            path: path.into(),
            start,
            reader: None,
            partial: Vec::new(),
            offset: 0,
            opened_once: false,
            appeared_late: false,
            waiting_logged: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Open the file if it exists; `Ok(false)` while it does not
    async fn ensure_open(&mut self) -> AppResult<bool> {
        if self.reader.is_some() {
            return Ok(true);
        }

        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if !self.opened_once {
                    self.appeared_late = true;
                }
                if !self.waiting_logged {
                    info!(path = %self.path.display(), "Waiting for log file to appear");
                    self.waiting_logged = true;
                }
                return Ok(false);
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        let len = file.metadata().await?.len();
        let position = if self.opened_once {
            self.offset.min(len)
        } else {
            match self.start {
                StartPosition::End if !self.appeared_late => len,
                _ => 0,
            }
        };
        self.offset = file.seek(SeekFrom::Start(position)).await?;

        info!(
            path = %self.path.display(),
            position = self.offset,
            "Following log file"
        );

        self.reader = Some(BufReader::new(file));
        self.opened_once = true;
        self.waiting_logged = false;
        Ok(true)
    }
}

#[async_trait]
impl LogSource for FileLogSource {
    async fn next_line(&mut self) -> AppResult<Option<String>> {
        if !self.ensure_open().await? {
            return Ok(None);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        match read_line(reader, &mut self.partial, &mut self.offset).await {
            Ok(line) => Ok(line),
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Failed to read log file, reopening");
                self.reader = None;
                Ok(None)
            }
        }
    }
}

/// Read the next complete line from `reader`, buffering an unterminated tail
///
/// `offset` advances only by bytes that stay in `partial` or are returned.
/// On error `partial` is rolled back, so after a reopen at `offset` those
/// bytes are read once more instead of being duplicated.
async fn read_line<R>(
    reader: &mut R,
    partial: &mut Vec<u8>,
    offset: &mut u64,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let buffered = partial.len();
    let n = match reader.read_until(b'\n', partial).await {
        Ok(n) => n,
        Err(e) => {
            partial.truncate(buffered);
            return Err(e);
        }
    };
    if n == 0 {
        return Ok(None);
    }

    *offset += n as u64;
    if partial.last() != Some(&b'\n') {
        debug!(buffered = partial.len(), "Incomplete line, waiting for more data");
        return Ok(None);
    }

    let mut bytes = std::mem::take(partial);
    bytes.pop();
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}
