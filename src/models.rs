use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSettings {
    pub theme: String,
    pub language: String,
    pub currency: String,
    pub last_city: Option<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            language: "en".to_string(),
            currency: String::new(),
            last_city: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Expense {
    pub id: i64,
    pub amount_cents: i64,
    pub category: String,
    pub spent_on: String,
    pub month: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount_cents: i64,
    pub category: String,
    pub spent_on: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Debt {
    pub id: i64,
    pub name: String,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub last_payment_on: Option<String>,
}

impl Debt {
    pub fn remaining_cents(&self) -> i64 {
        self.total_cents - self.paid_cents
    }

    pub fn progress(&self) -> f64 {
        crate::money::percent(self.paid_cents, self.total_cents)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DebtPayment {
    pub id: i64,
    pub debt_id: i64,
    pub amount_cents: i64,
    pub paid_on: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecurringTemplate {
    pub id: i64,
    pub name: String,
    pub amount_cents: i64,
    pub category: Option<String>,
    pub due_day: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct NewRecurringTemplate {
    pub name: String,
    pub amount_cents: i64,
    pub category: Option<String>,
    pub due_day: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthStatus {
    pub template_id: i64,
    pub month: String,
    pub paid: bool,
    pub paid_on: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskScope {
    Daily,
    Monthly,
    Yearly,
}

impl TaskScope {
    pub const ALL: [TaskScope; 3] = [TaskScope::Daily, TaskScope::Monthly, TaskScope::Yearly];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskScope::Daily => "daily",
            TaskScope::Monthly => "monthly",
            TaskScope::Yearly => "yearly",
        }
    }
}

impl fmt::Display for TaskScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskScope {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "daily" => Ok(TaskScope::Daily),
            "monthly" => Ok(TaskScope::Monthly),
            "yearly" => Ok(TaskScope::Yearly),
            other => Err(AppError::validation(format!("unknown task scope '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub scope: TaskScope,
    pub bucket: Option<String>,
    pub name: String,
    pub notes: Option<String>,
    pub deadline: Option<String>,
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub scope: TaskScope,
    pub bucket: Option<String>,
    pub name: String,
    pub notes: Option<String>,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Event,
    Birthday,
    Meeting,
    Wedding,
}

impl EventCategory {
    pub const ALL: [EventCategory; 4] = [
        EventCategory::Event,
        EventCategory::Birthday,
        EventCategory::Meeting,
        EventCategory::Wedding,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::Event => "event",
            EventCategory::Birthday => "birthday",
            EventCategory::Meeting => "meeting",
            EventCategory::Wedding => "wedding",
        }
    }
}

impl FromStr for EventCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "event" => Ok(EventCategory::Event),
            "birthday" => Ok(EventCategory::Birthday),
            "meeting" => Ok(EventCategory::Meeting),
            "wedding" => Ok(EventCategory::Wedding),
            other => Err(AppError::validation(format!(
                "unknown event category '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarEvent {
    pub id: i64,
    pub name: String,
    pub occurs_on: String,
    pub month: String,
    pub category: EventCategory,
    pub time: Option<String>,
    pub place: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCalendarEvent {
    pub name: String,
    pub occurs_on: String,
    pub category: EventCategory,
    pub time: Option<String>,
    pub place: Option<String>,
    pub comment: Option<String>,
}
