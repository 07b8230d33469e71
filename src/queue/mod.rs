// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Typed queues over the local store.
//!
//! - [`upload::UploadQueue`]: binary file transfers, processed oldest first
//! - [`mutation::MutationQueue`]: domain-object edits, listed newest first

pub mod upload;
pub mod mutation;

pub use upload::{PendingUpload, UploadFile, UploadQueue, UPLOAD_CATEGORY};
pub use mutation::{MutationQueue, PendingMutation, MUTATION_CATEGORY};
