use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde_json::json;

use super::{affected, read_or_default, unknown_action, Controller};
use crate::bucket::{checked_shift_day, day_id, shift_month_keep_day, MonthId};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::form::FormFields;
use crate::models::{NewTask, Task, TaskScope};
use crate::shell::{AppContext, FetchToken, ModuleId, Rendered};

pub struct TasksController {
    scope: TaskScope,
    day: NaiveDate,
    tasks: Vec<Task>,
}

impl TasksController {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            scope: TaskScope::Daily,
            day: ctx.today(),
            tasks: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn scope(&self) -> TaskScope {
        self.scope
    }

    /// Bucket key for the selected scope: a day, a month, or none for yearly tasks.
    pub fn bucket(&self) -> Option<String> {
        match self.scope {
            TaskScope::Daily => Some(day_id(self.day)),
            TaskScope::Monthly => Some(MonthId::of(self.day).to_string()),
            TaskScope::Yearly => None,
        }
    }

    fn bucket_label(&self) -> String {
        match self.scope {
            TaskScope::Daily => self.day.format("%A, %-d %B %Y").to_string(),
            TaskScope::Monthly => MonthId::of(self.day).display_name(),
            TaskScope::Yearly => self.day.year().to_string(),
        }
    }

    fn shift(&mut self, delta: i64) -> AppResult<()> {
        let shifted = match self.scope {
            TaskScope::Daily => checked_shift_day(self.day, delta),
            TaskScope::Monthly => shift_month_keep_day(self.day, delta),
            TaskScope::Yearly => delta
                .checked_mul(12)
                .and_then(|months| shift_month_keep_day(self.day, months)),
        };
        self.day = shifted.ok_or_else(|| {
            AppError::validation(format!("cannot move {delta} steps from {}", day_id(self.day)))
        })?;
        Ok(())
    }
}

#[async_trait]
impl Controller for TasksController {
    const MODULE: ModuleId = ModuleId::Tasks;

    async fn fetch_data(&mut self, ctx: &AppContext, token: &FetchToken) {
        let user_id = ctx.user_id();
        let scope = self.scope;
        let bucket = self.bucket();
        if let Some(tasks) = read_or_default(ctx, token, Self::MODULE, |conn| {
            Ok(db::tasks::list_tasks(conn, user_id, scope, bucket.as_deref())?)
        }) {
            self.tasks = tasks;
        }
    }

    fn render(&self, ctx: &AppContext) -> Rendered {
        let today = day_id(ctx.today());
        let rows: Vec<_> = self
            .tasks
            .iter()
            .map(|task| {
                json!({
                    "id": task.id,
                    "name": task.name,
                    "notes": task.notes,
                    "deadline": task.deadline,
                    "done": task.done,
                    "overdue": !task.done
                        && task.deadline.as_deref().is_some_and(|d| d < today.as_str()),
                })
            })
            .collect();
        let scopes: Vec<_> = TaskScope::ALL
            .iter()
            .map(|scope| json!({ "name": scope.as_str(), "active": *scope == self.scope }))
            .collect();

        Rendered {
            template: "tasks",
            context: json!({
                "scope": self.scope,
                "scopes": scopes,
                "bucket": self.bucket(),
                "bucket_label": self.bucket_label(),
                "today": today,
                "tasks": rows,
                "remaining": self.tasks.iter().filter(|t| !t.done).count(),
                "done": self.tasks.iter().filter(|t| t.done).count(),
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
            "scope" => {
                self.scope = form.text("scope")?.parse()?;
                Ok(None)
            }
            "shift" => {
                self.shift(form.integer("delta")?)?;
                Ok(None)
            }
            "today" => {
                self.day = ctx.today();
                Ok(None)
            }
            "add" => {
                let task = NewTask {
                    scope: self.scope,
                    bucket: self.bucket(),
                    name: form.text("name")?,
                    notes: form.optional_text("notes"),
                    deadline: form.optional_date("deadline")?.map(day_id),
                };
                db::tasks::insert_task(&*ctx.conn()?, user_id, &task)?;
                Ok(Some("Task added".into()))
            }
            "update" => {
                let id = form.id()?;
                let name = form.text("name")?;
                let notes = form.optional_text("notes");
                let deadline = form.optional_date("deadline")?.map(day_id);
                affected(
                    db::tasks::update_task(
                        &*ctx.conn()?,
                        user_id,
                        id,
                        &name,
                        notes.as_deref(),
                        deadline.as_deref(),
                    )?,
                    "task",
                )?;
                Ok(Some("Task updated".into()))
            }
            "toggle" => {
                affected(
                    db::tasks::toggle_task(&*ctx.conn()?, user_id, form.id()?)?,
                    "task",
                )?;
                Ok(None)
            }
            "delete" => {
                affected(
                    db::tasks::delete_task(&*ctx.conn()?, user_id, form.id()?)?,
                    "task",
                )?;
                Ok(Some("Task deleted".into()))
            }
            other => Err(unknown_action(Self::MODULE, other)),
        }
    }

    fn reset(&mut self) {
        self.tasks.clear();
    }
}
