//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, and the `Deserialize` DTOs used for inserts.

pub mod content;
pub mod content_event;
pub mod member;
pub mod revision;
