use rusqlite::{params, Connection, Result};

use crate::models::{MonthStatus, NewRecurringTemplate, RecurringTemplate};

pub fn list_templates(conn: &Connection, user_id: i64) -> Result<Vec<RecurringTemplate>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, name, amount_cents, category, due_day
        FROM recurring_templates
        WHERE user_id = ?1
        ORDER BY due_day IS NULL, due_day, name
        ",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(RecurringTemplate {
            id: row.get(0)?,
            name: row.get(1)?,
            amount_cents: row.get(2)?,
            category: row.get(3)?,
            due_day: row.get(4)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn insert_template(conn: &Connection, user_id: i64, template: &NewRecurringTemplate) -> Result<i64> {
    conn.execute(
        "
        INSERT INTO recurring_templates (user_id, name, amount_cents, category, due_day)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ",
        params![
            user_id,
            template.name,
            template.amount_cents,
            template.category,
            template.due_day
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_template(
    conn: &Connection,
    user_id: i64,
    id: i64,
    template: &NewRecurringTemplate,
) -> Result<usize> {
    conn.execute(
        "
        UPDATE recurring_templates
        SET name = ?3, amount_cents = ?4, category = ?5, due_day = ?6
        WHERE id = ?1 AND user_id = ?2
        ",
        params![
            id,
            user_id,
            template.name,
            template.amount_cents,
            template.category,
            template.due_day
        ],
    )
}

pub fn delete_template(conn: &Connection, user_id: i64, id: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM recurring_templates WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )
}

pub fn list_statuses(conn: &Connection, user_id: i64, month: &str) -> Result<Vec<MonthStatus>> {
    let mut stmt = conn.prepare(
        "
        SELECT s.template_id, s.month, s.paid, s.paid_on
        FROM recurring_status s
        JOIN recurring_templates t ON s.template_id = t.id
        WHERE t.user_id = ?1 AND s.month = ?2
        ",
    )?;
    let rows = stmt.query_map(params![user_id, month], |row| {
        Ok(MonthStatus {
            template_id: row.get(0)?,
            month: row.get(1)?,
            paid: row.get(2)?,
            paid_on: row.get(3)?,
        })
    })?;
    rows.collect()
}

/// Sets the paid flag for one template and month. Returns `false` if the
/// template is not owned by the user.
pub fn set_status(
    conn: &Connection,
    user_id: i64,
    template_id: i64,
    month: &str,
    paid: bool,
    paid_on: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "
        INSERT INTO recurring_status (template_id, month, paid, paid_on)
        SELECT id, ?3, ?4, ?5 FROM recurring_templates WHERE id = ?1 AND user_id = ?2
        ON CONFLICT(template_id, month) DO UPDATE SET
            paid = excluded.paid,
            paid_on = excluded.paid_on
        ",
        params![template_id, user_id, month, paid, paid_on],
    )?;
    Ok(changed > 0)
}
