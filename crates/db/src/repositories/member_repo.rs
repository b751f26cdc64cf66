//! Repository for the `members` table.

use sqlx::PgPool;

use crate::models::member::{CreateMember, Member};

/// Column list for members queries.
const COLUMNS: &str = "id, username, created_at";

/// Provides create and lookup operations for members.
pub struct MemberRepo;

impl MemberRepo {
    pub async fn create(pool: &PgPool, input: &CreateMember) -> Result<Member, sqlx::Error> {
        let query = format!(
            "INSERT INTO members (username) VALUES ($1) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Member>(&query)
            .bind(&input.username)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Member>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM members WHERE username = $1");
        sqlx::query_as::<_, Member>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Return the usernames from `usernames` that have no member row,
    /// in input order.
    pub async fn find_missing(
        pool: &PgPool,
        usernames: &[String],
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT u.name FROM UNNEST($1::text[]) WITH ORDINALITY AS u(name, pos) \
             WHERE NOT EXISTS (SELECT 1 FROM members m WHERE m.username = u.name) \
             ORDER BY u.pos",
        )
        .bind(usernames)
        .fetch_all(pool)
        .await
    }
}
