//! Dated JSON-lines fallback log.

use crate::audit::{
    domain::{AuditEvent, SinkKind},
    ports::{AuditStoreError, AuditStoreResult, FallbackSink, FallbackSinkError},
};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::{Dir, OpenOptions};
use chrono::{DateTime, SecondsFormat, Utc};
use fs2::FileExt;
use mockable::Clock;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;

const LINE_MESSAGE: &str = "Audit event written to fallback log";
const LINE_SOURCE: &str = "audit_fallback";

/// Appends one JSON line per event to `<directory>/<prefix>-YYYY-MM-DD.log`.
///
/// The directory is created on first use. Each append holds an exclusive
/// advisory lock for the duration of a single `write_all`, so concurrent
/// writers never interleave partial lines.
#[derive(Debug, Clone)]
pub struct FileSink<C> {
    directory: Utf8PathBuf,
    file_prefix: String,
    clock: Arc<C>,
}

impl<C> FileSink<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates a sink writing under `directory`.
    #[must_use]
    pub fn new(
        directory: impl Into<Utf8PathBuf>,
        file_prefix: impl Into<String>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            directory: directory.into(),
            file_prefix: file_prefix.into(),
            clock,
        }
    }

    /// Returns the directory holding the log files.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    /// Returns the file name used for writes made at `at`.
    #[must_use]
    pub fn file_name_for(&self, at: DateTime<Utc>) -> String {
        format!("{}-{}.log", self.file_prefix, at.format("%Y-%m-%d"))
    }

    /// Returns the full path used for writes made at `at`.
    #[must_use]
    pub fn path_for(&self, at: DateTime<Utc>) -> Utf8PathBuf {
        self.directory.join(self.file_name_for(at))
    }

    fn render_line(
        event: &AuditEvent,
        original_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> AuditStoreResult<String> {
        let line = json!({
            "timestamp": now.to_rfc3339_opts(SecondsFormat::Micros, true),
            "level": "warning",
            "message": LINE_MESSAGE,
            "context": {
                "entity_id": event.entity_id(),
                "action": event.action().as_str(),
                "payload": {
                    "event": event,
                    "original_error": original_error,
                },
                "source": LINE_SOURCE,
            },
        });
        let mut rendered = serde_json::to_string(&line)
            .map_err(|err| AuditStoreError::serialization(err.to_string()))?;
        rendered.push('\n');
        Ok(rendered)
    }

    async fn append(
        &self,
        event: &AuditEvent,
        original_error: Option<&str>,
    ) -> AuditStoreResult<()> {
        let now = self.clock.utc();
        let line = Self::render_line(event, original_error, now)?;
        let directory = self.directory.clone();
        let file_name = self.file_name_for(now);

        tokio::task::spawn_blocking(move || append_locked(&directory, &file_name, &line))
            .await
            .map_err(|err| AuditStoreError::io(std::io::Error::other(err.to_string())))?
    }
}

fn append_locked(directory: &Utf8Path, file_name: &str, line: &str) -> AuditStoreResult<()> {
    Dir::create_ambient_dir_all(directory, ambient_authority()).map_err(AuditStoreError::io)?;
    let dir = Dir::open_ambient_dir(directory, ambient_authority()).map_err(AuditStoreError::io)?;
    let mut options = OpenOptions::new();
    options.append(true).create(true);
    let mut file = dir
        .open_with(file_name, &options)
        .map_err(AuditStoreError::io)?
        .into_std();

    FileExt::lock_exclusive(&file).map_err(AuditStoreError::io)?;
    let written = file.write_all(line.as_bytes()).and_then(|()| file.flush());
    let unlocked = FileExt::unlock(&file);
    written.map_err(AuditStoreError::io)?;
    unlocked.map_err(AuditStoreError::io)
}

#[async_trait]
impl<C> FallbackSink for FileSink<C>
where
    C: Clock + Send + Sync + 'static,
{
    fn kind(&self) -> SinkKind {
        SinkKind::FallbackFile
    }

    async fn accept(
        &self,
        event: &AuditEvent,
        original_error: Option<&str>,
    ) -> Result<(), FallbackSinkError> {
        self.append(event, original_error)
            .await
            .map_err(|err| FallbackSinkError::new(self.kind(), err))
    }
}
