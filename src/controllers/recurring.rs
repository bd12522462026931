use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;

use super::dashboard::recurring_totals;
use super::{affected, read_or_default, unknown_action, Controller};
use crate::bucket::{day_id, MonthId};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::form::FormFields;
use crate::models::{MonthStatus, NewRecurringTemplate, RecurringTemplate};
use crate::money::format_money;
use crate::shell::{AppContext, FetchToken, ModuleId, Rendered};

#[derive(Default)]
struct RecurringData {
    templates: Vec<RecurringTemplate>,
    statuses: Vec<MonthStatus>,
}

impl RecurringData {
    fn status(&self, template_id: i64) -> Option<&MonthStatus> {
        self.statuses.iter().find(|s| s.template_id == template_id)
    }
}

pub struct RecurringController {
    month: MonthId,
    data: RecurringData,
}

impl RecurringController {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            month: MonthId::of(ctx.today()),
            data: RecurringData::default(),
        }
    }

    fn parse_template(form: &FormFields) -> AppResult<NewRecurringTemplate> {
        let due_day = match form.optional_integer("due_day")? {
            None => None,
            Some(day @ 1..=31) => Some(day as u32),
            Some(_) => return Err(AppError::validation("due day must be between 1 and 31")),
        };
        Ok(NewRecurringTemplate {
            name: form.text("name")?,
            amount_cents: form.amount_cents("amount")?,
            category: form.optional_text("category"),
            due_day,
        })
    }
}

#[async_trait]
impl Controller for RecurringController {
    const MODULE: ModuleId = ModuleId::Recurring;

    async fn fetch_data(&mut self, ctx: &AppContext, token: &FetchToken) {
        let user_id = ctx.user_id();
        let month = self.month.to_string();
        if let Some(data) = read_or_default(ctx, token, Self::MODULE, |conn| {
            Ok(RecurringData {
                templates: db::recurring::list_templates(conn, user_id)?,
                statuses: db::recurring::list_statuses(conn, user_id, &month)?,
            })
        }) {
            self.data = data;
        }
    }

    fn render(&self, ctx: &AppContext) -> Rendered {
        let currency = ctx.currency();
        let (paid, open) = recurring_totals(&self.data.templates, &self.data.statuses);
        let days = self.month.days_in_month();

        let rows: Vec<_> = self
            .data
            .templates
            .iter()
            .map(|template| {
                let status = self.data.status(template.id);
                json!({
                    "id": template.id,
                    "name": template.name,
                    "amount": format_money(template.amount_cents, &currency),
                    "amount_input": format_money(template.amount_cents, ""),
                    "category": template.category,
                    "due_day": template.due_day,
                    "due_on": template.due_day.map(|day| {
                        format!("{}-{:02}", self.month, day.min(days))
                    }),
                    "paid": status.is_some_and(|s| s.paid),
                    "paid_on": status.and_then(|s| s.paid_on.clone()),
                })
            })
            .collect();

        let mut by_category: HashMap<&str, i64> = HashMap::new();
        for template in &self.data.templates {
            let key = template.category.as_deref().unwrap_or("other");
            *by_category.entry(key).or_insert(0) += template.amount_cents;
        }
        let mut categories: Vec<_> = by_category.into_iter().collect();
        categories.sort();
        let categories: Vec<_> = categories
            .into_iter()
            .map(|(category, cents)| {
                json!({ "category": category, "amount": format_money(cents, &currency) })
            })
            .collect();

        Rendered {
            template: "recurring",
            context: json!({
                "month": self.month.to_string(),
                "month_label": self.month.display_name(),
                "templates": rows,
                "paid": format_money(paid, &currency),
                "remaining": format_money(open, &currency),
                "total": format_money(paid + open, &currency),
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
            "add" => {
                let template = Self::parse_template(form)?;
                db::recurring::insert_template(&*ctx.conn()?, user_id, &template)?;
                Ok(Some(format!("'{}' added", template.name)))
            }
            "update" => {
                let id = form.id()?;
                let template = Self::parse_template(form)?;
                affected(
                    db::recurring::update_template(&*ctx.conn()?, user_id, id, &template)?,
                    "recurring payment",
                )?;
                Ok(Some("Recurring payment updated".into()))
            }
            "delete" => {
                affected(
                    db::recurring::delete_template(&*ctx.conn()?, user_id, form.id()?)?,
                    "recurring payment",
                )?;
                Ok(Some("Recurring payment deleted".into()))
            }
            "toggle" => {
                let id = form.id()?;
                let paid = !self.data.status(id).is_some_and(|s| s.paid);
                let paid_on = paid.then(|| day_id(ctx.today()));
                let month = self.month.to_string();
                if !db::recurring::set_status(
                    &*ctx.conn()?,
                    user_id,
                    id,
                    &month,
                    paid,
                    paid_on.as_deref(),
                )? {
                    return Err(AppError::NotFound("recurring payment"));
                }
                Ok(Some(if paid {
                    format!("Marked paid for {}", self.month.display_name())
                } else {
                    format!("Marked unpaid for {}", self.month.display_name())
                }))
            }
            "shift" => {
                self.month = self.month.shift(form.integer("delta")?)?;
                Ok(None)
            }
            other => Err(unknown_action(Self::MODULE, other)),
        }
    }

    fn reset(&mut self) {
        self.data = RecurringData::default();
    }
}
