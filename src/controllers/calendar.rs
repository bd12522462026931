use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::json;

use super::{affected, read_or_default, unknown_action, Controller};
use crate::bucket::{day_id, shift_day, MonthId};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::form::FormFields;
use crate::models::{CalendarEvent, EventCategory, NewCalendarEvent};
use crate::shell::{AppContext, FetchToken, ModuleId, Rendered};

pub const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Serialize)]
pub struct DayCell {
    pub date: String,
    pub day: u32,
    pub in_month: bool,
    pub today: bool,
    pub events: Vec<CalendarEvent>,
}

/// Monday-first weeks covering `month`, padded with days of the adjacent months.
pub fn month_grid(month: MonthId, today: NaiveDate, events: &[CalendarEvent]) -> Vec<Vec<DayCell>> {
    let mut by_day: BTreeMap<&str, Vec<CalendarEvent>> = BTreeMap::new();
    for event in events {
        by_day.entry(event.occurs_on.as_str()).or_default().push(event.clone());
    }

    let first = month.first_day();
    let lead = first.weekday().num_days_from_monday() as i64;
    let cells = lead + month.days_in_month() as i64;
    let weeks = (cells + 6) / 7;
    let start = shift_day(first, -lead);

    (0..weeks)
        .map(|week| {
            (0..7)
                .map(|weekday| {
                    let date = shift_day(start, week * 7 + weekday);
                    let id = day_id(date);
                    DayCell {
                        day: date.day(),
                        in_month: MonthId::of(date) == month,
                        today: date == today,
                        events: by_day.remove(id.as_str()).unwrap_or_default(),
                        date: id,
                    }
                })
                .collect()
        })
        .collect()
}

pub struct CalendarController {
    month: MonthId,
    today: NaiveDate,
    events: Vec<CalendarEvent>,
}

impl CalendarController {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            month: MonthId::of(today),
            today,
            events: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn month(&self) -> MonthId {
        self.month
    }

    fn parse_event(form: &FormFields) -> AppResult<NewCalendarEvent> {
        let time = match form.optional_text("time") {
            Some(raw) => {
                let parsed = NaiveTime::parse_from_str(&raw, "%H:%M").map_err(|_| {
                    AppError::validation(format!("invalid time '{raw}', expected HH:MM"))
                })?;
                Some(parsed.format("%H:%M").to_string())
            }
            None => None,
        };
        Ok(NewCalendarEvent {
            name: form.text("name")?,
            occurs_on: day_id(form.date("date")?),
            category: form.optional_text("category").unwrap_or_default().parse()?,
            time,
            place: form.optional_text("place"),
            comment: form.optional_text("comment"),
        })
    }
}

#[async_trait]
impl Controller for CalendarController {
    const MODULE: ModuleId = ModuleId::Calendar;

    async fn fetch_data(&mut self, ctx: &AppContext, token: &FetchToken) {
        self.today = ctx.today();
        let user_id = ctx.user_id();
        let month = self.month.to_string();
        if let Some(events) = read_or_default(ctx, token, Self::MODULE, |conn| {
            db::calendar::list_events(conn, user_id, &month).map_err(Into::into)
        }) {
            self.events = events;
        }
    }

    fn render(&self, _ctx: &AppContext) -> Rendered {
        let categories: Vec<_> = EventCategory::ALL.iter().map(|c| c.as_str()).collect();
        Rendered {
            template: "calendar",
            context: json!({
                "month": self.month.to_string(),
                "month_label": self.month.display_name(),
                "today": day_id(self.today),
                "weekdays": WEEKDAYS,
                "weeks": month_grid(self.month, self.today, &self.events),
                "events": self.events,
                "categories": categories,
            }),
        }
    }

    async fn handle(
        &mut self,
        ctx: &AppContext,
        action: &str,
        form: &FormFields,
    ) -> AppResult<Option<String>> {
        let user_id = ctx.user_id();
        match action {
            "shift" => {
                self.month = self.month.shift(form.integer("delta")?)?;
                Ok(None)
            }
            "today" => {
                self.month = MonthId::of(ctx.today());
                Ok(None)
            }
            "add" => {
                let event = Self::parse_event(form)?;
                db::calendar::insert_event(&*ctx.conn()?, user_id, &event)?;
                Ok(Some(format!("'{}' added on {}", event.name, event.occurs_on)))
            }
            "update" => {
                let id = form.id()?;
                let event = Self::parse_event(form)?;
                affected(
                    db::calendar::update_event(&*ctx.conn()?, user_id, id, &event)?,
                    "event",
                )?;
                Ok(Some("Event updated".into()))
            }
            "delete" => {
                affected(
                    db::calendar::delete_event(&*ctx.conn()?, user_id, form.id()?)?,
                    "event",
                )?;
                Ok(Some("Event deleted".into()))
            }
            other => Err(unknown_action(Self::MODULE, other)),
        }
    }

    fn reset(&mut self) {
        self.events.clear();
    }
}
