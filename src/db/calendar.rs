use rusqlite::{params, Connection, Result, Row};

use crate::models::{CalendarEvent, EventCategory, NewCalendarEvent};

const EVENT_COLUMNS: &str = "id, name, occurs_on, month, category, time, place, comment";

fn event_from_row(row: &Row<'_>) -> Result<CalendarEvent> {
    let category: String = row.get(4)?;
    let category = category.parse::<EventCategory>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("bad event category '{category}'").into(),
        )
    })?;
    Ok(CalendarEvent {
        id: row.get(0)?,
        name: row.get(1)?,
        occurs_on: row.get(2)?,
        month: row.get(3)?,
        category,
        time: row.get(5)?,
        place: row.get(6)?,
        comment: row.get(7)?,
    })
}

pub fn list_events(conn: &Connection, user_id: i64, month: &str) -> Result<Vec<CalendarEvent>> {
    let mut stmt = conn.prepare(&format!(
        "
        SELECT {EVENT_COLUMNS}
        FROM calendar_events
        WHERE user_id = ?1 AND month = ?2
        ORDER BY occurs_on, time IS NULL, time, id
        "
    ))?;
    let rows = stmt.query_map(params![user_id, month], event_from_row)?;
    rows.collect()
}

/// Events on or after `from` (a `YYYY-MM-DD` day id).
pub fn upcoming_events(
    conn: &Connection,
    user_id: i64,
    from: &str,
    limit: i64,
) -> Result<Vec<CalendarEvent>> {
    let mut stmt = conn.prepare(&format!(
        "
        SELECT {EVENT_COLUMNS}
        FROM calendar_events
        WHERE user_id = ?1 AND occurs_on >= ?2
        ORDER BY occurs_on, time IS NULL, time, id
        LIMIT ?3
        "
    ))?;
    let rows = stmt.query_map(params![user_id, from, limit], event_from_row)?;
    rows.collect()
}

pub fn insert_event(conn: &Connection, user_id: i64, event: &NewCalendarEvent) -> Result<i64> {
    conn.execute(
        "
        INSERT INTO calendar_events (user_id, name, occurs_on, month, category, time, place, comment)
        VALUES (?1, ?2, ?3, substr(?3, 1, 7), ?4, ?5, ?6, ?7)
        ",
        params![
            user_id,
            event.name,
            event.occurs_on,
            event.category.as_str(),
            event.time,
            event.place,
            event.comment
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_event(
    conn: &Connection,
    user_id: i64,
    id: i64,
    event: &NewCalendarEvent,
) -> Result<usize> {
    conn.execute(
        "
        UPDATE calendar_events
        SET name = ?3, occurs_on = ?4, month = substr(?4, 1, 7), category = ?5,
            time = ?6, place = ?7, comment = ?8
        WHERE id = ?1 AND user_id = ?2
        ",
        params![
            id,
            user_id,
            event.name,
            event.occurs_on,
            event.category.as_str(),
            event.time,
            event.place,
            event.comment
        ],
    )
}

pub fn delete_event(conn: &Connection, user_id: i64, id: i64) -> Result<usize> {
    conn.execute(
        "DELETE FROM calendar_events WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )
}
