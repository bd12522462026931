use rusqlite::{params, Connection, Result};

use crate::models::{Expense, NewExpense};

pub fn list_expenses(conn: &Connection, user_id: i64, month: &str) -> Result<Vec<Expense>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, amount_cents, category, spent_on, month, note
        FROM expenses
        WHERE user_id = ?1 AND month = ?2
        ORDER BY spent_on DESC, id DESC
        ",
    )?;
    let rows = stmt.query_map(params![user_id, month], |row| {
        Ok(Expense {
            id: row.get(0)?,
            amount_cents: row.get(1)?,
            category: row.get(2)?,
            spent_on: row.get(3)?,
            month: row.get(4)?,
            note: row.get(5)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// `spent_on` must already be a valid `YYYY-MM-DD` date; the month bucket is its prefix.
pub fn insert_expense(conn: &Connection, user_id: i64, expense: &NewExpense) -> Result<i64> {
    conn.execute(
        "
        INSERT INTO expenses (user_id, amount_cents, category, spent_on, month, note)
        VALUES (?1, ?2, ?3, ?4, substr(?4, 1, 7), ?5)
        ",
        params![
            user_id,
            expense.amount_cents,
            expense.category,
            expense.spent_on,
            expense.note
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_expense(
    conn: &Connection,
    user_id: i64,
    id: i64,
    expense: &NewExpense,
) -> Result<usize> {
    conn.execute(
        "
        UPDATE expenses
        SET amount_cents = ?3, category = ?4, spent_on = ?5, month = substr(?5, 1, 7), note = ?6
        WHERE id = ?1 AND user_id = ?2
        ",
        params![
            id,
            user_id,
            expense.amount_cents,
            expense.category,
            expense.spent_on,
            expense.note
        ],
    )
}

pub fn delete_expense(conn: &Connection, user_id: i64, id: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM expenses WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )
}

pub fn list_expense_categories(conn: &Connection, user_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "
        SELECT category
        FROM expenses
        WHERE user_id = ?1
        GROUP BY category
        ORDER BY COUNT(*) DESC, category
        LIMIT 20
        ",
    )?;
    let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
    rows.collect()
}
