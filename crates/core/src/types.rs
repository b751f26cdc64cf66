/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A revision hash (lowercase hex SHA-256 for revisions created by this crate).
pub type RevisionHash = String;
