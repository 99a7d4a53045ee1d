use sqlx::FromRow;

/// A row of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    // Argon2 PHC string, never the plaintext
    #[sqlx(rename = "password")]
    pub password_hash: String,
}
