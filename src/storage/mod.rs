// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Local storage backends.
//!
//! - [`sql::SqlStore`]: SQLite file, survives process restarts
//! - [`memory::InMemoryStore`]: DashMap, for tests and ephemeral queues

pub mod traits;
pub mod memory;
pub mod sql;

pub use crate::offline_item::record_key;
