//! In-memory wiring of the full task and audit stack.

use crate::test_helpers::{FixedClock, SharedBuffer};
use camino::Utf8PathBuf;
use mockable::Clock;
use std::sync::Arc;
use tasktrail::audit::{
    adapters::{
        FileSink, ProcessErrorSink,
        memory::{InMemoryAuditStore, InMemoryFallbackTable},
    },
    ports::FallbackSink,
    services::{AuditQueryService, FallbackChain, RetryingWriter},
};
use tasktrail::config::{AuditConfig, AuditConfigHandle};
use tasktrail::task::{adapters::memory::InMemoryTaskRepository, services::TaskLifecycleService};
use tempfile::TempDir;

/// Writer used by the in-memory stack.
pub type Writer = RetryingWriter<InMemoryAuditStore<FixedClock>, FixedClock>;

/// Task service recording through the retrying writer.
pub type TaskService = TaskLifecycleService<InMemoryTaskRepository, Writer, FixedClock>;

/// Read side over the in-memory stores.
pub type QueryService = AuditQueryService<
    InMemoryAuditStore<FixedClock>,
    InMemoryFallbackTable<FixedClock>,
    FixedClock,
>;

/// Every component of the in-memory stack, exposed for failure injection.
pub struct Stack {
    pub clock: Arc<FixedClock>,
    pub config: AuditConfigHandle,
    pub primary: Arc<InMemoryAuditStore<FixedClock>>,
    pub table: Arc<InMemoryFallbackTable<FixedClock>>,
    pub file_sink: Arc<FileSink<FixedClock>>,
    pub stderr: SharedBuffer,
    pub tasks: TaskService,
    pub queries: QueryService,
    _log_dir: TempDir,
}

impl Stack {
    /// Builds the stack with test-friendly configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary log directory cannot be created.
    pub fn new() -> eyre::Result<Self> {
        Self::with_config(AuditConfig::fast())
    }

    /// Builds the stack with `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary log directory cannot be created or
    /// the configuration is invalid.
    pub fn with_config(mut config: AuditConfig) -> eyre::Result<Self> {
        let log_dir = tempfile::tempdir()?;
        config.file_sink.directory = Utf8PathBuf::try_from(log_dir.path().join("logs"))?;
        let file_sink = config.file_sink.clone();
        let handle = AuditConfigHandle::new(config)?;

        let clock = Arc::new(FixedClock::frozen());
        let primary = Arc::new(InMemoryAuditStore::new().with_clock(Arc::clone(&clock)));
        let table = Arc::new(InMemoryFallbackTable::new().with_clock(Arc::clone(&clock)));
        let file_sink = Arc::new(file_sink.build_sink(Arc::clone(&clock)));
        let stderr = SharedBuffer::default();

        let chain = FallbackChain::new(
            Arc::clone(&table) as Arc<dyn FallbackSink>,
            Arc::clone(&file_sink) as Arc<dyn FallbackSink>,
            Arc::new(ProcessErrorSink::with_writer(stderr.clone()).with_clock(Arc::clone(&clock))),
            Arc::clone(&clock),
        );
        let writer = Arc::new(RetryingWriter::new(
            Arc::clone(&primary),
            chain,
            handle.clone(),
            Arc::clone(&clock),
        ));
        let tasks = TaskLifecycleService::new(
            Arc::new(InMemoryTaskRepository::new()),
            writer,
            Arc::clone(&clock),
        )
        .with_config(handle.clone());
        let queries = AuditQueryService::new(
            Arc::clone(&primary),
            Arc::clone(&table),
            handle.clone(),
            Arc::clone(&clock),
        );

        Ok(Self {
            clock,
            config: handle,
            primary,
            table,
            file_sink,
            stderr,
            tasks,
            queries,
            _log_dir: log_dir,
        })
    }

    /// Returns the lines written to today's fallback log file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn fallback_log_lines(&self) -> eyre::Result<Vec<serde_json::Value>> {
        let path = self.file_sink.path_for(self.clock.utc());
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(path)?;
        contents
            .lines()
            .map(|line| serde_json::from_str(line).map_err(eyre::Report::from))
            .collect()
    }
}
