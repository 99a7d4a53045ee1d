use sqlx::SqlitePool;

use crate::db::models::User;

const USERNAME_UNIQUE_TARGET: &str = "users.username";

pub async fn create_user_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT id, username, password FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
}

/// Inserts a user and returns its assigned id.
///
/// The `UNIQUE` constraint on `username` is the only duplicate check; callers
/// detect a collision with [`is_username_unique_violation`].
pub async fn insert_user(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO users (username, password) VALUES (?, ?)")
        .bind(username)
        .bind(password_hash)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

/// True only when the error is a unique violation on `users.username`.
///
/// SQLite reports the offending columns in the message
/// (`UNIQUE constraint failed: users.username`), so the column list is checked
/// instead of treating every integrity error as a duplicate.
pub fn is_username_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                && db_err
                    .message()
                    .split_once("constraint failed:")
                    .is_some_and(|(_, columns)| {
                        let mut columns = columns.split(',').map(str::trim);
                        columns.next() == Some(USERNAME_UNIQUE_TARGET) && columns.next().is_none()
                    })
        }
        _ => false,
    }
}
