// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Row, schema and query values

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single immutable row
///
/// Serializes to `{"id":"..."}`, which is also the wire format of one
/// streamed chunk (plus a trailing newline).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Table definition used by DDL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name
    pub name: String,
    /// Column holding the primary key (always `id` for [`Record`] tables)
    pub primary_key: String,
}

impl TableSchema {
    /// Schema of a table keyed by `id`
    pub fn keyed_by_id(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: "id".to_string(),
        }
    }
}

/// A full-table scan over `table`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: String,
}

impl Query {
    pub fn scan(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select id from {}", self.table)
    }
}
