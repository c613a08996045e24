//! # opshub-store
//!
//! The record store boundary. Durable persistence lives outside this
//! system; everything here talks to the [`RecordStore`] trait, and
//! [`MemoryStore`] is the in-process implementation backing the server
//! and the tests. List-valued fields (status history, responses,
//! replies, upvotes) are real collections on the records themselves —
//! serialization happens only at the wire boundary.

#![deny(unsafe_code)]

mod error;
mod memory;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{RecordStore, TaskFilter};
