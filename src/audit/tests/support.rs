//! Shared fixtures for audit unit tests.

use crate::audit::{
    adapters::{
        ProcessErrorSink,
        memory::{InMemoryAuditStore, InMemoryFallbackTable},
    },
    domain::{AuditAction, AuditActor, AuditEvent, RequestContext, SinkKind, StateMap},
    ports::{AuditStoreError, FallbackSink, FallbackSinkError},
    services::{AuditEventBuilder, FallbackChain, RetryingWriter},
};
use crate::config::{AuditConfig, AuditConfigHandle};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use serde_json::{Value, json};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Clock frozen at an instant that tests may move.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().expect("clock lock");
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

pub fn fixed_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0)
        .single()
        .expect("valid instant")
}

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::at(fixed_instant()))
}

pub fn state(value: Value) -> StateMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn task_state(title: &str, status: &str) -> StateMap {
    state(json!({
        "id": 42,
        "title": title,
        "status": status,
        "priority": "medium",
        "due_date": null,
        "assigned_to": null,
    }))
}

pub fn created_event(clock: &Arc<FixedClock>, entity_id: i64) -> AuditEvent {
    AuditEventBuilder::new(Arc::clone(clock)).build_from_activity(
        entity_id,
        AuditAction::Created,
        StateMap::new(),
        task_state("Write report", "pending"),
        AuditActor::new(7, "Ada"),
        RequestContext::empty().with_request_id("req-1"),
    )
}

/// Writer whose every write fails, standing in for a broken stderr.
#[derive(Debug, Default)]
pub struct BrokenWriter;

impl Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stderr closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stderr closed"))
    }
}

/// Writer collecting everything written into a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().expect("buffer lock");
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink that always refuses, used to stand in for an unwritable file sink.
#[derive(Debug)]
pub struct RefusingSink(pub SinkKind);

#[async_trait]
impl FallbackSink for RefusingSink {
    fn kind(&self) -> SinkKind {
        self.0
    }

    async fn accept(
        &self,
        _event: &AuditEvent,
        _original_error: Option<&str>,
    ) -> Result<(), FallbackSinkError> {
        Err(FallbackSinkError::new(
            self.0,
            AuditStoreError::io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "permission denied",
            )),
        ))
    }
}

/// Sink whose writes never complete, standing in for a hung connection.
#[derive(Debug)]
pub struct StalledSink(pub SinkKind);

#[async_trait]
impl FallbackSink for StalledSink {
    fn kind(&self) -> SinkKind {
        self.0
    }

    async fn accept(
        &self,
        _event: &AuditEvent,
        _original_error: Option<&str>,
    ) -> Result<(), FallbackSinkError> {
        std::future::pending().await
    }
}

/// In-memory wiring of the complete write path.
pub struct Harness {
    pub clock: Arc<FixedClock>,
    pub primary: Arc<InMemoryAuditStore<FixedClock>>,
    pub table: Arc<InMemoryFallbackTable<FixedClock>>,
    pub file: Arc<dyn FallbackSink>,
    pub stderr: SharedBuffer,
    pub config: AuditConfigHandle,
    pub writer: RetryingWriter<InMemoryAuditStore<FixedClock>, FixedClock>,
}

impl Harness {
    pub fn new(config: AuditConfig, file: Arc<dyn FallbackSink>) -> Self {
        Self::with_last_resort(config, file, None)
    }

    pub fn with_last_resort(
        config: AuditConfig,
        file: Arc<dyn FallbackSink>,
        last_resort: Option<ProcessErrorSink>,
    ) -> Self {
        let clock = clock();
        let primary = Arc::new(InMemoryAuditStore::new().with_clock(Arc::clone(&clock)));
        let table = Arc::new(InMemoryFallbackTable::new().with_clock(Arc::clone(&clock)));
        let stderr = SharedBuffer::default();
        let process = last_resort
            .unwrap_or_else(|| ProcessErrorSink::with_writer(stderr.clone()))
            .with_clock(Arc::clone(&clock));
        let chain = FallbackChain::new(
            Arc::clone(&table) as Arc<dyn FallbackSink>,
            Arc::clone(&file),
            Arc::new(process),
            Arc::clone(&clock),
        );
        let handle = AuditConfigHandle::new(config).expect("valid config");
        let writer = RetryingWriter::new(
            Arc::clone(&primary),
            chain,
            handle.clone(),
            Arc::clone(&clock),
        );
        Self {
            clock,
            primary,
            table,
            file,
            stderr,
            config: handle,
            writer,
        }
    }

    pub fn refusing_file() -> Arc<dyn FallbackSink> {
        Arc::new(RefusingSink(SinkKind::FallbackFile))
    }
}
