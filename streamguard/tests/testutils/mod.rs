//! Test utilities for StreamGuard integration tests
//!
//! Every fixture owns its own in-process database, so tests can run in
//! parallel without sharing a pool.

#![allow(dead_code)]

pub mod stream_fixture;
