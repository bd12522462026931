use rusqlite::{params, Connection, OptionalExtension, Result};

use crate::models::{User, UserSettings};

pub fn has_users(conn: &Connection) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users)",
        [],
        |row| row.get::<_, i64>(0),
    )
    .map(|value| value == 1)
}

pub fn insert_user(conn: &Connection, username: &str, password_hash: &str, created_at: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
        params![username, password_hash, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn user_credentials(conn: &Connection, username: &str) -> Result<Option<(i64, String)>> {
    conn.query_row(
        "SELECT id, password_hash FROM users WHERE username = ?1",
        params![username],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

pub fn update_password(conn: &Connection, user_id: i64, password_hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, user_id],
    )?;
    Ok(())
}

pub fn create_session(conn: &Connection, user_id: i64, token: &str, created_at: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (user_id, token, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, token, created_at],
    )?;
    Ok(())
}

pub fn user_by_session(conn: &Connection, token: &str) -> Result<Option<User>> {
    conn.query_row(
        "
        SELECT u.id, u.username
        FROM sessions s
        JOIN users u ON s.user_id = u.id
        WHERE s.token = ?1
        ",
        params![token],
        |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        },
    )
    .optional()
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

pub fn session_count(conn: &Connection, user_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM sessions WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
}

/// Removes every session of the user and returns the tokens that were dropped.
pub fn delete_sessions_for_user(conn: &Connection, user_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT token FROM sessions WHERE user_id = ?1")?;
    let tokens = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<Result<Vec<String>>>()?;
    conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
    Ok(tokens)
}

/// Deletes all but the newest `keep` sessions and returns the dropped tokens.
pub fn prune_sessions(conn: &Connection, user_id: i64, keep: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "
        SELECT token
        FROM sessions
        WHERE user_id = ?1
        ORDER BY created_at DESC, id DESC
        LIMIT -1 OFFSET ?2
        ",
    )?;
    let stale = stmt
        .query_map(params![user_id, keep], |row| row.get(0))?
        .collect::<Result<Vec<String>>>()?;
    for token in &stale {
        delete_session(conn, token)?;
    }
    Ok(stale)
}

pub fn settings(conn: &Connection, user_id: i64) -> Result<UserSettings> {
    let stored = conn
        .query_row(
            "
            SELECT theme, language, currency, last_city
            FROM user_settings
            WHERE user_id = ?1
            ",
            params![user_id],
            |row| {
                Ok(UserSettings {
                    theme: row.get(0)?,
                    language: row.get(1)?,
                    currency: row.get(2)?,
                    last_city: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(stored.unwrap_or_default())
}

pub fn save_settings(conn: &Connection, user_id: i64, settings: &UserSettings) -> Result<()> {
    conn.execute(
        "
        INSERT INTO user_settings (user_id, theme, language, currency, last_city)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(user_id) DO UPDATE SET
            theme = excluded.theme,
            language = excluded.language,
            currency = excluded.currency,
            last_city = excluded.last_city
        ",
        params![
            user_id,
            settings.theme,
            settings.language,
            settings.currency,
            settings.last_city
        ],
    )?;
    Ok(())
}
