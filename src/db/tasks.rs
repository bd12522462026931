use rusqlite::{params, Connection, Result, Row};

use crate::models::{NewTask, Task, TaskScope};

fn task_from_row(row: &Row<'_>) -> Result<Task> {
    let scope: String = row.get(1)?;
    let scope = scope.parse::<TaskScope>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("bad task scope '{scope}'").into(),
        )
    })?;
    Ok(Task {
        id: row.get(0)?,
        scope,
        bucket: row.get(2)?,
        name: row.get(3)?,
        notes: row.get(4)?,
        deadline: row.get(5)?,
        done: row.get(6)?,
    })
}

/// Tasks of one scope. `bucket` is ignored for yearly tasks.
pub fn list_tasks(
    conn: &Connection,
    user_id: i64,
    scope: TaskScope,
    bucket: Option<&str>,
) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, scope, bucket, name, notes, deadline, done
        FROM tasks
        WHERE user_id = ?1
          AND scope = ?2
          AND (?2 = 'yearly' OR bucket = ?3)
        ORDER BY done, deadline IS NULL, deadline, id
        ",
    )?;
    let rows = stmt.query_map(params![user_id, scope.as_str(), bucket], task_from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn insert_task(conn: &Connection, user_id: i64, task: &NewTask) -> Result<i64> {
    let bucket = match task.scope {
        TaskScope::Yearly => None,
        _ => task.bucket.as_deref(),
    };
    conn.execute(
        "
        INSERT INTO tasks (user_id, scope, bucket, name, notes, deadline, done)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
        ",
        params![
            user_id,
            task.scope.as_str(),
            bucket,
            task.name,
            task.notes,
            task.deadline
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_task(
    conn: &Connection,
    user_id: i64,
    id: i64,
    name: &str,
    notes: Option<&str>,
    deadline: Option<&str>,
) -> Result<usize> {
    conn.execute(
        "
        UPDATE tasks SET name = ?3, notes = ?4, deadline = ?5
        WHERE id = ?1 AND user_id = ?2
        ",
        params![id, user_id, name, notes, deadline],
    )
}

pub fn toggle_task(conn: &Connection, user_id: i64, id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE tasks SET done = 1 - done WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )
}

pub fn delete_task(conn: &Connection, user_id: i64, id: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )
}
