//! Unit tests for the audit trail.

mod support;
