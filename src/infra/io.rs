use memchr::memchr;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::ops::Deref;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::core::model::{ErrorReason, TextEncoding};

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB
const CHUNK_SIZE: usize = 64 * 1024;
const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// Read limits applied to every source file
#[derive(Debug, Clone, Copy)]
pub struct ReadPolicy {
    /// Best-effort deadline for a whole file read
    pub deadline: Duration,
    /// Pause before the single retry of a transient failure
    pub retry_backoff: Duration,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(5_000),
            retry_backoff: Duration::from_millis(50),
        }
    }
}

impl ReadPolicy {
    pub fn with_timeout_ms(ms: u64) -> Self {
        Self {
            deadline: Duration::from_millis(ms),
            ..Self::default()
        }
    }
}

/// Decoded file text plus what we learned while reading it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub text: String,
    pub encoding: TextEncoding,
    pub byte_size: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadError {
    #[error("{0}")]
    Encoding(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Io(String),
}

impl ReadError {
    pub fn reason(&self) -> ErrorReason {
        match self {
            ReadError::Encoding(_) => ErrorReason::EncodingError,
            ReadError::PermissionDenied(_) => ErrorReason::PermissionDenied,
            ReadError::Io(_) => ErrorReason::IoError,
        }
    }

    fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            ErrorKind::PermissionDenied => ReadError::PermissionDenied(err.to_string()),
            _ => ReadError::Io(err.to_string()),
        }
    }
}

enum RawBytes {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl Deref for RawBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            RawBytes::Mapped(m) => m,
            RawBytes::Buffered(v) => v,
        }
    }
}

/// Read and decode one source file. Transient failures are
/// retried once after `policy.retry_backoff`.
pub fn read_source(path: &Path, policy: &ReadPolicy) -> Result<SourceText, ReadError> {
    let raw = retry_once(policy.retry_backoff, || read_raw(path, policy))
        .map_err(|e| ReadError::from_io(&e))?;

    let byte_size = raw.len() as u64;
    let (text, encoding) = decode(&raw)?;

    Ok(SourceText {
        text,
        encoding,
        byte_size,
    })
}

/// Run `op`; on a transient failure wait `backoff` and run it once more
pub fn retry_once<T>(backoff: Duration, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    match op() {
        Err(e) if is_transient(&e) => {
            tracing::debug!(error = %e, "transient I/O failure, retrying");
            std::thread::sleep(backoff);
            op()
        }
        other => other,
    }
}

/// Failures worth a single retry after a short pause
fn is_transient(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock)
}

fn read_raw(path: &Path, policy: &ReadPolicy) -> io::Result<RawBytes> {
    let started = Instant::now();

    // Opening a FIFO or device can block forever, and the deadline
    // is only checked between reads
    let meta = std::fs::metadata(path)?;
    if !meta.is_file() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }

    let mut file = File::open(path)?;
    let len = meta.len();

    if len > MMAP_THRESHOLD {
        // Safety: read-only mapping; the file is not modified by us
        let mmap = unsafe { Mmap::map(&file) }?;
        return Ok(RawBytes::Mapped(mmap));
    }

    let mut buf = Vec::with_capacity(len as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        if started.elapsed() > policy.deadline {
            return Err(io::Error::new(
                ErrorKind::TimedOut,
                format!(
                    "read deadline of {}ms exceeded",
                    policy.deadline.as_millis()
                ),
            ));
        }
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(RawBytes::Buffered(buf))
}

/// Detect the encoding and decode to an owned String
pub fn decode(bytes: &[u8]) -> Result<(String, TextEncoding), ReadError> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        let text = utf8(rest, 3)?;
        return Ok((text, TextEncoding::Utf8Bom));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return Ok((utf16(rest, u16::from_le_bytes)?, TextEncoding::Utf16Le));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return Ok((utf16(rest, u16::from_be_bytes)?, TextEncoding::Utf16Be));
    }

    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    if let Some(pos) = memchr(0, sniff) {
        return Err(ReadError::Encoding(format!(
            "binary content (NUL byte at offset {pos})"
        )));
    }

    Ok((utf8(bytes, 0)?, TextEncoding::Utf8))
}

fn utf8(bytes: &[u8], offset: usize) -> Result<String, ReadError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| {
            ReadError::Encoding(format!(
                "invalid UTF-8 at byte offset {}",
                e.valid_up_to() + offset
            ))
        })
}

fn utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, ReadError> {
    if bytes.len() % 2 != 0 {
        return Err(ReadError::Encoding(
            "truncated UTF-16 content (odd byte length)".to_string(),
        ));
    }
    let units = bytes.chunks_exact(2).map(|c| unit([c[0], c[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| {
            ReadError::Encoding(format!(
                "unpaired UTF-16 surrogate 0x{:04X}",
                e.unpaired_surrogate()
            ))
        })
}
