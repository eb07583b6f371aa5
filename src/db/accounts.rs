//! Email/password accounts backing the local identity provider.

use super::{Database, now_ms};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};

/// A stored account row.
#[derive(Debug, Clone)]
pub struct Account {
    pub uid: String,
    pub email: String,
    pub password_salt: String,
    pub password_hash: String,
    pub created_at: i64,
}

fn parse_account_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        uid: row.get("uid")?,
        email: row.get("email")?,
        password_salt: row.get("password_salt")?,
        password_hash: row.get("password_hash")?,
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// Insert an account. Returns `Ok(false)` if the email is already taken.
    pub fn create_account(
        &self,
        uid: &str,
        email: &str,
        password_salt: &str,
        password_hash: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO accounts (uid, email, password_salt, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(email) DO NOTHING",
                params![uid, email, password_salt, password_hash, now_ms()],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Look up an account by email (case-insensitive).
    pub fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.with_conn(|conn| {
            let account = conn
                .query_row(
                    "SELECT * FROM accounts WHERE email = ?1",
                    params![email],
                    parse_account_row,
                )
                .optional()?;
            Ok(account)
        })
    }
}
