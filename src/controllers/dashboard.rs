use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use super::{read_or_default, unknown_action, Controller};
use crate::bucket::{day_id, MonthId};
use crate::db;
use crate::error::AppResult;
use crate::form::FormFields;
use crate::models::{CalendarEvent, Debt, Expense, MonthStatus, RecurringTemplate, Task};
use crate::money::{format_money, percent};
use crate::shell::{AppContext, FetchToken, ModuleId, Rendered};

const UPCOMING_EVENTS: i64 = 5;

#[derive(Debug, Default)]
pub struct DashboardInputs {
    pub expenses: Vec<Expense>,
    pub debts: Vec<Debt>,
    pub daily_tasks: Vec<Task>,
    pub monthly_tasks: Vec<Task>,
    pub templates: Vec<RecurringTemplate>,
    pub statuses: Vec<MonthStatus>,
    pub upcoming: Vec<CalendarEvent>,
}

#[derive(Debug, Default, PartialEq)]
pub struct DashboardStats {
    pub recurring_paid_cents: i64,
    pub recurring_remaining_cents: i64,
    pub month_expenses_cents: i64,
    pub debt_outstanding_cents: i64,
    pub daily_tasks_remaining: usize,
    pub monthly_tasks_remaining: usize,
    pub category_totals: BTreeMap<String, i64>,
}

/// Paid and unpaid recurring totals for the month the statuses belong to.
pub fn recurring_totals(templates: &[RecurringTemplate], statuses: &[MonthStatus]) -> (i64, i64) {
    let paid: HashSet<i64> = statuses
        .iter()
        .filter(|status| status.paid)
        .map(|status| status.template_id)
        .collect();
    templates.iter().fold((0, 0), |(done, open), template| {
        if paid.contains(&template.id) {
            (done + template.amount_cents, open)
        } else {
            (done, open + template.amount_cents)
        }
    })
}

pub fn compute_stats(inputs: &DashboardInputs) -> DashboardStats {
    let (recurring_paid_cents, recurring_remaining_cents) =
        recurring_totals(&inputs.templates, &inputs.statuses);

    let mut category_totals = BTreeMap::new();
    for expense in &inputs.expenses {
        *category_totals.entry(expense.category.clone()).or_insert(0) += expense.amount_cents;
    }

    DashboardStats {
        recurring_paid_cents,
        recurring_remaining_cents,
        month_expenses_cents: inputs.expenses.iter().map(|e| e.amount_cents).sum(),
        debt_outstanding_cents: inputs
            .debts
            .iter()
            .map(|debt| debt.remaining_cents().max(0))
            .sum(),
        daily_tasks_remaining: inputs.daily_tasks.iter().filter(|t| !t.done).count(),
        monthly_tasks_remaining: inputs.monthly_tasks.iter().filter(|t| !t.done).count(),
        category_totals,
    }
}

#[derive(Serialize)]
struct CategoryShare {
    category: String,
    amount: String,
    share: String,
    width: i64,
}

pub struct DashboardController {
    month: MonthId,
    today: String,
    inputs: DashboardInputs,
    stats: DashboardStats,
}

impl DashboardController {
    pub fn new(ctx: &AppContext) -> Self {
        let today = ctx.today();
        Self {
            month: MonthId::of(today),
            today: day_id(today),
            inputs: DashboardInputs::default(),
            stats: DashboardStats::default(),
        }
    }

    #[cfg(test)]
    pub fn stats(&self) -> &DashboardStats {
        &self.stats
    }
}

#[async_trait]
impl Controller for DashboardController {
    const MODULE: ModuleId = ModuleId::Dashboard;

    async fn fetch_data(&mut self, ctx: &AppContext, token: &FetchToken) {
        let today = ctx.today();
        self.month = MonthId::of(today);
        self.today = day_id(today);
        let user_id = ctx.user_id();
        let month = self.month.to_string();
        let day = self.today.clone();

        let fetched = read_or_default(ctx, token, Self::MODULE, |conn| {
            Ok(DashboardInputs {
                expenses: db::expenses::list_expenses(conn, user_id, &month)?,
                debts: db::debts::list_debts(conn, user_id)?,
                daily_tasks: db::tasks::list_tasks(
                    conn,
                    user_id,
                    crate::models::TaskScope::Daily,
                    Some(&day),
                )?,
                monthly_tasks: db::tasks::list_tasks(
                    conn,
                    user_id,
                    crate::models::TaskScope::Monthly,
                    Some(&month),
                )?,
                templates: db::recurring::list_templates(conn, user_id)?,
                statuses: db::recurring::list_statuses(conn, user_id, &month)?,
                upcoming: db::calendar::upcoming_events(conn, user_id, &day, UPCOMING_EVENTS)?,
            })
        });
        if let Some(inputs) = fetched {
            self.stats = compute_stats(&inputs);
            self.inputs = inputs;
        }
    }

    fn render(&self, ctx: &AppContext) -> Rendered {
        let currency = ctx.currency();
        let money = |cents: i64| format_money(cents, &currency);
        let stats = &self.stats;

        let mut shares: Vec<CategoryShare> = stats
            .category_totals
            .iter()
            .map(|(category, cents)| {
                let share = percent(*cents, stats.month_expenses_cents);
                CategoryShare {
                    category: category.clone(),
                    amount: money(*cents),
                    share: format!("{share:.1}"),
                    width: share.round() as i64,
                }
            })
            .collect();
        shares.sort_by(|a, b| b.width.cmp(&a.width).then(a.category.cmp(&b.category)));

        Rendered {
            template: "dashboard",
            context: json!({
                "month": self.month.to_string(),
                "month_label": self.month.display_name(),
                "today": self.today,
                "recurring_paid": money(stats.recurring_paid_cents),
                "recurring_remaining": money(stats.recurring_remaining_cents),
                "month_expenses": money(stats.month_expenses_cents),
                "debt_outstanding": money(stats.debt_outstanding_cents),
                "daily_tasks_remaining": stats.daily_tasks_remaining,
                "monthly_tasks_remaining": stats.monthly_tasks_remaining,
                "categories": shares,
                "upcoming": self.inputs.upcoming,
            }),
        }
    }

    async fn handle(
        &mut self,
        _ctx: &AppContext,
        action: &str,
        _form: &FormFields,
    ) -> AppResult<Option<String>> {
        match action {
            "refresh" => Ok(None),
            other => Err(unknown_action(Self::MODULE, other)),
        }
    }

    fn reset(&mut self) {
        self.inputs = DashboardInputs::default();
        self.stats = DashboardStats::default();
    }
}
