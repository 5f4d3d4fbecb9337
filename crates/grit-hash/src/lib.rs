//! Object identity and SHA-1 hashing for the grit object store.
//!
//! Provides the `ObjectId` type (a raw 20-byte SHA-1 digest), hex
//! encoding/decoding, a streaming hasher, and the fan-out table used by
//! pack indexes.

mod error;
pub mod fanout;
pub mod hasher;
pub mod hex;
mod oid;

pub use error::HashError;
pub use fanout::FanoutTable;
pub use oid::ObjectId;
