// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema creation and seed data

use crate::storage::{Database, Record, SourceResult, TableSchema};

/// Terms combined three at a time into seed ids (`ape-bun-cut`, ...)
pub const SEED_TERMS: [&str; 12] = [
    "ape", "bun", "cut", "doc", "elk", "fit", "gas", "hop", "ink", "joy", "kin", "lye",
];

/// Id of the row the failure modes trip on
pub const POISON_ID: &str = "error";

/// Zero-based position of the poison row in the seed data
pub const POISON_POSITION: usize = 21;

/// Seed rows in insertion order
///
/// Every three-term combination of [`SEED_TERMS`] (12³ = 1728 rows) with the
/// poison row inserted after the first 21, for 1729 rows in total.
pub fn seed_records() -> Vec<Record> {
    let mut records = Vec::with_capacity(SEED_TERMS.len().pow(3) + 1);
    for i in SEED_TERMS {
        for j in SEED_TERMS {
            for k in SEED_TERMS {
                records.push(Record::new(format!("{}-{}-{}", i, j, k)));
                if records.len() == POISON_POSITION {
                    records.push(Record::new(POISON_ID));
                }
            }
        }
    }
    records
}

/// (Re)create `table` and fill it with [`seed_records`]
pub async fn bootstrap(database: &Database, table: &str) -> SourceResult<usize> {
    let mut conn = database.acquire().await?;

    let result = async {
        log::info!("Initializing database schema");
        conn.recreate_table(&TableSchema::keyed_by_id(table)).await?;
        log::info!("Inserting data");
        conn.insert(table, seed_records()).await
    }
    .await;

    conn.release();
    let inserted = result?;
    log::info!("Inserted {} rows into '{}'", inserted, table);
    Ok(inserted)
}
