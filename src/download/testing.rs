use crate::download::error::TransportError;
use crate::download::source::{RemoteFile, RemoteSource};
use crate::types::period::PeriodRef;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory archive for tests.
#[derive(Default)]
pub(crate) struct MemorySource {
    files: HashMap<String, Vec<u8>>,
    failures_left: Mutex<HashMap<String, u32>>,
    short: HashSet<String>,
    stalling: HashSet<String>,
    modified: Mutex<HashMap<String, DateTime<Utc>>>,
    pub requests: AtomicUsize,
}

impl MemorySource {
    pub fn content_for(remote_path: &str) -> Vec<u8> {
        format!("payload of {remote_path}").into_bytes()
    }

    /// Serves a generated payload for every period.
    pub fn with_files(periods: &[PeriodRef]) -> Self {
        let files = periods
            .iter()
            .map(|p| (p.remote_path.clone(), Self::content_for(&p.remote_path)))
            .collect();
        Self {
            files,
            ..Default::default()
        }
    }

    /// Serves the given bytes at `remote_path`.
    pub fn with_file(mut self, remote_path: &str, data: Vec<u8>) -> Self {
        self.files.insert(remote_path.to_string(), data);
        self
    }

    pub fn without(mut self, remote_path: &str) -> Self {
        self.files.remove(remote_path);
        self
    }

    /// Fails the first `times` requests for `remote_path` with a timeout.
    pub fn flaky(self, remote_path: &str, times: u32) -> Self {
        if let Ok(mut failures) = self.failures_left.lock() {
            failures.insert(remote_path.to_string(), times);
        }
        self
    }

    /// Announces more bytes than it sends.
    pub fn short(mut self, remote_path: &str) -> Self {
        self.short.insert(remote_path.to_string());
        self
    }

    /// Sends one chunk and then never finishes.
    pub fn stalling(mut self, remote_path: &str) -> Self {
        self.stalling.insert(remote_path.to_string());
        self
    }

    /// Announces `time` as the modification time of `remote_path`.
    pub fn modified_at(self, remote_path: &str, time: DateTime<Utc>) -> Self {
        self.set_modified(remote_path, time);
        self
    }

    /// Changes the announced modification time of a file already being served.
    pub fn set_modified(&self, remote_path: &str, time: DateTime<Utc>) {
        if let Ok(mut modified) = self.modified.lock() {
            modified.insert(remote_path.to_string(), time);
        }
    }

    fn modified(&self, remote_path: &str) -> Option<DateTime<Utc>> {
        self.modified
            .lock()
            .ok()
            .and_then(|modified| modified.get(remote_path).copied())
    }

    fn take_failure(&self, remote_path: &str) -> bool {
        let Ok(mut failures) = self.failures_left.lock() else {
            return false;
        };
        match failures.get_mut(remote_path) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl RemoteSource for MemorySource {
    fn url(&self, remote_path: &str) -> String {
        format!("memory://{remote_path}")
    }

    async fn fetch(&self, remote_path: &str) -> Result<RemoteFile, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.take_failure(remote_path) {
            return Err(TransportError::Body(
                self.url(remote_path),
                std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
            ));
        }
        let data = self
            .files
            .get(remote_path)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(self.url(remote_path)))?;

        let mut content_length = Some(data.len() as u64);
        if self.short.contains(remote_path) {
            content_length = content_length.map(|len| len + 10);
        }
        let chunks: Vec<Result<Bytes, std::io::Error>> = data
            .chunks(7)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        let body = if self.stalling.contains(remote_path) {
            stream::iter(chunks.into_iter().take(1))
                .chain(stream::pending())
                .boxed()
        } else {
            stream::iter(chunks).boxed()
        };
        Ok(RemoteFile {
            content_length,
            last_modified: self.modified(remote_path),
            body,
        })
    }

    async fn exists(&self, remote_path: &str) -> Result<bool, TransportError> {
        Ok(self.files.contains_key(remote_path))
    }

    async fn last_modified(
        &self,
        remote_path: &str,
    ) -> Result<Option<DateTime<Utc>>, TransportError> {
        if !self.files.contains_key(remote_path) {
            return Err(TransportError::NotFound(self.url(remote_path)));
        }
        Ok(self.modified(remote_path))
    }
}
