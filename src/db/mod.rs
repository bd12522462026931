pub mod calendar;
pub mod debts;
pub mod expenses;
pub mod recurring;
pub mod tasks;
pub mod users;

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Result};

use crate::error::AppResult;

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn init_db(path: &Path) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::new(manager)?;
    {
        let conn = pool.get()?;
        run_migrations(&conn)?;
    }
    Ok(pool)
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            token TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS user_settings (
            user_id INTEGER PRIMARY KEY,
            theme TEXT NOT NULL DEFAULT 'light',
            language TEXT NOT NULL DEFAULT 'en',
            currency TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            amount_cents INTEGER NOT NULL,
            category TEXT NOT NULL,
            spent_on TEXT NOT NULL,
            month TEXT NOT NULL,
            note TEXT,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS expenses_user_month ON expenses(user_id, month);

        CREATE TABLE IF NOT EXISTS debts (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            total_cents INTEGER NOT NULL,
            paid_cents INTEGER NOT NULL DEFAULT 0,
            last_payment_on TEXT,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS debt_payments (
            id INTEGER PRIMARY KEY,
            debt_id INTEGER NOT NULL,
            amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
            paid_on TEXT NOT NULL,
            FOREIGN KEY(debt_id) REFERENCES debts(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS recurring_templates (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            category TEXT,
            due_day INTEGER CHECK(due_day IS NULL OR due_day BETWEEN 1 AND 31),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS recurring_status (
            template_id INTEGER NOT NULL,
            month TEXT NOT NULL,
            paid INTEGER NOT NULL DEFAULT 0,
            paid_on TEXT,
            PRIMARY KEY(template_id, month),
            FOREIGN KEY(template_id) REFERENCES recurring_templates(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            scope TEXT NOT NULL CHECK(scope IN ('daily', 'monthly', 'yearly')),
            bucket TEXT,
            name TEXT NOT NULL,
            notes TEXT,
            deadline TEXT,
            done INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS tasks_user_bucket ON tasks(user_id, scope, bucket);

        CREATE TABLE IF NOT EXISTS calendar_events (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            occurs_on TEXT NOT NULL,
            month TEXT NOT NULL,
            category TEXT NOT NULL
                CHECK(category IN ('event', 'birthday', 'meeting', 'wedding')),
            time TEXT,
            place TEXT,
            comment TEXT,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS calendar_user_month ON calendar_events(user_id, month);
        ",
    )?;
    ensure_column(conn, "user_settings", "last_city", "TEXT")?;
    Ok(())
}

fn ensure_column(conn: &Connection, table: &str, column: &str, column_type: &str) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row? == column {
            return Ok(());
        }
    }
    conn.execute(
        &format!("ALTER TABLE {table} ADD COLUMN {column} {column_type}"),
        [],
    )?;
    Ok(())
}
