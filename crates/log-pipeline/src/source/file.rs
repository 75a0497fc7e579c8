//! 파일 tail 소스
//!
//! 바이트 오프셋부터 파일을 읽어 완성된 라인만 반환합니다.
//!
//! - 첫 폴링은 파일의 기존 내용을 처음부터 읽습니다.
//! - 파일 크기가 오프셋보다 작아지면(truncation) 처음부터 다시 읽습니다.
//! - inode가 바뀌면(logrotate 등, Unix 전용) 처음부터 다시 읽습니다.
//! - 줄바꿈으로 끝나지 않은 마지막 조각은 다음 폴링까지 보관합니다.
//! - `max_line_length`를 넘는 라인은 통째로 건너뜁니다.

use std::io::SeekFrom;
use std::path::PathBuf;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use wafscope_core::pipeline::BoxFuture;

use super::LogSource;
use crate::error::LogPipelineError;

/// 한 번의 폴링에서 읽는 최대 바이트 수 (나머지는 다음 폴링에서)
const MAX_READ_PER_POLL: u64 = 8 * 1024 * 1024;

const SOURCE_TYPE: &str = "file";

/// 로컬 파일 tail 소스
pub struct FileTailSource {
    path: PathBuf,
    name: String,
    /// 다음에 읽을 바이트 위치
    offset: u64,
    /// 마지막으로 본 inode
    inode: Option<u64>,
    /// 아직 줄바꿈을 만나지 못한 조각
    pending: Vec<u8>,
    /// 너무 긴 라인을 버리는 중인지 여부
    skipping: bool,
    max_line_length: usize,
}

impl FileTailSource {
    /// 새 파일 tail 소스를 생성합니다. 파일이 아직 없어도 됩니다.
    pub fn new(path: impl Into<PathBuf>, max_line_length: usize) -> Self {
        let path = path.into();
        Self {
            name: format!("file:{}", path.display()),
            path,
            offset: 0,
            inode: None,
            pending: Vec::new(),
            skipping: false,
            max_line_length,
        }
    }

    /// 현재 읽기 오프셋을 반환합니다.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn reset(&mut self) {
        self.offset = 0;
        self.pending.clear();
        self.skipping = false;
    }

    fn unavailable(&self, err: &std::io::Error) -> LogPipelineError {
        LogPipelineError::unavailable(SOURCE_TYPE, format!("{}: {err}", self.path.display()))
    }

    async fn read_new_lines(&mut self) -> Result<Vec<String>, LogPipelineError> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| self.unavailable(&e))?;

        let inode = file_inode(&meta);
        if self.inode.is_some() && inode != self.inode {
            tracing::info!(path = %self.path.display(), "log file rotated, reading from start");
            self.reset();
        } else if meta.len() < self.offset {
            tracing::info!(
                path = %self.path.display(),
                size = meta.len(),
                offset = self.offset,
                "log file truncated, reading from start"
            );
            self.reset();
        }
        self.inode = inode;

        if meta.len() == self.offset {
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| self.unavailable(&e))?;
        file.seek(SeekFrom::Start(self.offset)).await?;

        let mut buf = Vec::new();
        let read = file.take(MAX_READ_PER_POLL).read_to_end(&mut buf).await?;
        self.offset += u64::try_from(read).unwrap_or(u64::MAX);

        Ok(self.split_lines(&buf))
    }

    /// 읽은 바이트를 완성된 라인으로 나눕니다.
    fn split_lines(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.skipping {
                self.skipping = false;
                continue;
            }

            self.pending.extend_from_slice(head);
            let line = std::mem::take(&mut self.pending);
            if line.len() > self.max_line_length {
                tracing::warn!(
                    path = %self.path.display(),
                    len = line.len(),
                    max = self.max_line_length,
                    "skipping oversized log line"
                );
                continue;
            }

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches('\r');
            if !text.is_empty() {
                lines.push(text.to_owned());
            }
        }

        if !self.skipping {
            self.pending.extend_from_slice(rest);
            if self.pending.len() > self.max_line_length {
                tracing::warn!(
                    path = %self.path.display(),
                    max = self.max_line_length,
                    "partial log line exceeds maximum length, discarding"
                );
                self.pending.clear();
                self.skipping = true;
            }
        }

        lines
    }
}

impl LogSource for FileTailSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self) -> BoxFuture<'_, Result<Vec<String>, LogPipelineError>> {
        Box::pin(self.read_new_lines())
    }
}

#[cfg(unix)]
fn file_inode(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn file_inode(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}
