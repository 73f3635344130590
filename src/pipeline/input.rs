//! Input resolution: a path, URL or byte buffer → a local PDF file.
//!
//! pdfium opens files by path, so URLs and in-memory reports are first
//! written into a `TempDir` owned by [`ResolvedInput`]; the directory is
//! removed when the resolved input is dropped. The `%PDF` magic bytes are
//! checked up front so a wrong upload fails with [`Form1004Error::NotAPdf`]
//! instead of a pdfium load error.

use crate::error::Form1004Error;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF on local disk, possibly backed by a temp directory.
#[derive(Debug)]
pub enum ResolvedInput {
    Local(PathBuf),
    /// Downloaded or written from memory; `_temp_dir` keeps the file alive.
    Temporary { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Temporary { path, .. } => path,
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or an HTTP(S) URL.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Form1004Error> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.trim().is_empty() {
        Err(Form1004Error::InvalidInput {
            input: input.to_string(),
        })
    } else {
        resolve_local(input)
    }
}

/// Write an in-memory report to a managed temp file.
pub async fn resolve_bytes(bytes: &[u8]) -> Result<ResolvedInput, Form1004Error> {
    let temp_dir = TempDir::new().map_err(|e| Form1004Error::Internal(e.to_string()))?;
    let path = temp_dir.path().join("report.pdf");
    check_magic(&path, bytes)?;
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| Form1004Error::Internal(format!("Failed to write temp file: {e}")))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(ResolvedInput::Temporary {
        path,
        _temp_dir: temp_dir,
    })
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, Form1004Error> {
    let path = PathBuf::from(path_str);
    if !path.exists() {
        return Err(Form1004Error::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != PDF_MAGIC {
                return Err(Form1004Error::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Form1004Error::PermissionDenied { path });
        }
        Err(e) => {
            return Err(Form1004Error::ReadFailed { path, source: e });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Form1004Error> {
    info!("Downloading PDF from: {}", url);
    let failed = |reason: String| Form1004Error::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Form1004Error::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| Form1004Error::Internal(e.to_string()))?;
    let path = temp_dir.path().join(filename_from_url(url));
    check_magic(&path, &bytes)?;
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| Form1004Error::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), path.display());
    Ok(ResolvedInput::Temporary {
        path,
        _temp_dir: temp_dir,
    })
}

fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), Form1004Error> {
    match bytes.get(..4) {
        Some(head) if head != PDF_MAGIC => {
            let mut magic = [0u8; 4];
            magic.copy_from_slice(head);
            Err(Form1004Error::NotAPdf {
                path: path.to_path_buf(),
                magic,
            })
        }
        Some(_) => Ok(()),
        None => Err(Form1004Error::CorruptPdf {
            path: path.to_path_buf(),
            detail: format!("only {} bytes", bytes.len()),
        }),
    }
}

/// Last URL path segment when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/report.pdf"));
        assert!(is_url("http://example.com/report.pdf"));
        assert!(!is_url("/tmp/report.pdf"));
        assert!(!is_url("report.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_falls_back() {
        assert_eq!(filename_from_url("https://x.test/files/1004.pdf"), "1004.pdf");
        assert_eq!(filename_from_url("https://x.test/download"), "downloaded.pdf");
        assert_eq!(filename_from_url("https://x.test/"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, Form1004Error::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = resolve_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, Form1004Error::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn non_pdf_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.csv");
        std::fs::write(&path, "a,b,c\n").unwrap();
        let err = resolve_input(path.to_str().unwrap(), 5).await.unwrap_err();
        match err {
            Form1004Error::NotAPdf { magic, .. } => assert_eq!(&magic, b"a,b,"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn bytes_are_written_to_temp_file() {
        let resolved = resolve_bytes(b"%PDF-1.7\n%%EOF").await.unwrap();
        assert!(resolved.path().exists());
        let err = resolve_bytes(b"PK\x03\x04").await.unwrap_err();
        assert!(matches!(err, Form1004Error::NotAPdf { .. }));
    }
}
