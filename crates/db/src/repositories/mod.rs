//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod content_event_repo;
pub mod content_repo;
pub mod member_repo;
pub mod revision_repo;

pub use content_event_repo::ContentEventRepo;
pub use content_repo::ContentRepo;
pub use member_repo::MemberRepo;
pub use revision_repo::RevisionRepo;
