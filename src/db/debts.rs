use rusqlite::{params, Connection, Result};

use crate::models::{Debt, DebtPayment};

pub fn list_debts(conn: &Connection, user_id: i64) -> Result<Vec<Debt>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, name, total_cents, paid_cents, last_payment_on
        FROM debts
        WHERE user_id = ?1
        ORDER BY (total_cents - paid_cents) DESC, name
        ",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(Debt {
            id: row.get(0)?,
            name: row.get(1)?,
            total_cents: row.get(2)?,
            paid_cents: row.get(3)?,
            last_payment_on: row.get(4)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn insert_debt(
    conn: &Connection,
    user_id: i64,
    name: &str,
    total_cents: i64,
    paid_cents: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO debts (user_id, name, total_cents, paid_cents) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, name, total_cents, paid_cents],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Renames or re-totals a debt. The paid amount only moves through payments.
pub fn update_debt(
    conn: &Connection,
    user_id: i64,
    id: i64,
    name: &str,
    total_cents: i64,
) -> Result<usize> {
    conn.execute(
        "UPDATE debts SET name = ?3, total_cents = ?4 WHERE id = ?1 AND user_id = ?2",
        params![id, user_id, name, total_cents],
    )
}

pub fn delete_debt(conn: &Connection, user_id: i64, id: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM debts WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )
}

/// Records a payment and bumps the debt's paid total in one transaction.
/// Returns `false` when the debt does not belong to the user.
pub fn record_payment(
    conn: &mut Connection,
    user_id: i64,
    debt_id: i64,
    amount_cents: i64,
    paid_on: &str,
) -> Result<bool> {
    let tx = conn.transaction()?;
    let changed = tx.execute(
        "
        UPDATE debts
        SET paid_cents = paid_cents + ?3,
            last_payment_on = CASE
                WHEN last_payment_on IS NULL OR last_payment_on < ?4 THEN ?4
                ELSE last_payment_on
            END
        WHERE id = ?1 AND user_id = ?2
        ",
        params![debt_id, user_id, amount_cents, paid_on],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    tx.execute(
        "INSERT INTO debt_payments (debt_id, amount_cents, paid_on) VALUES (?1, ?2, ?3)",
        params![debt_id, amount_cents, paid_on],
    )?;
    tx.commit()?;
    Ok(true)
}

pub fn list_payments(conn: &Connection, user_id: i64) -> Result<Vec<DebtPayment>> {
    let mut stmt = conn.prepare(
        "
        SELECT p.id, p.debt_id, p.amount_cents, p.paid_on
        FROM debt_payments p
        JOIN debts d ON p.debt_id = d.id
        WHERE d.user_id = ?1
        ORDER BY p.paid_on DESC, p.id DESC
        ",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(DebtPayment {
            id: row.get(0)?,
            debt_id: row.get(1)?,
            amount_cents: row.get(2)?,
            paid_on: row.get(3)?,
        })
    })?;
    rows.collect()
}
