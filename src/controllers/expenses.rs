use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::json;

use super::{affected, read_or_default, unknown_action, Controller};
use crate::bucket::{day_id, MonthId};
use crate::db;
use crate::error::AppResult;
use crate::form::FormFields;
use crate::models::{Expense, NewExpense};
use crate::money::format_money;
use crate::shell::{AppContext, FetchToken, ModuleId, Rendered};

#[derive(Default)]
struct ExpenseData {
    expenses: Vec<Expense>,
    categories: Vec<String>,
}

pub struct ExpensesController {
    month: MonthId,
    data: ExpenseData,
}

impl ExpensesController {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            month: MonthId::of(ctx.today()),
            data: ExpenseData::default(),
        }
    }

    #[cfg(test)]
    pub fn month(&self) -> MonthId {
        self.month
    }

    fn parse_expense(form: &FormFields, ctx: &AppContext) -> AppResult<NewExpense> {
        let spent_on = form.optional_date("date")?.unwrap_or_else(|| ctx.today());
        Ok(NewExpense {
            amount_cents: form.amount_cents("amount")?,
            category: form.text("category")?,
            spent_on: day_id(spent_on),
            note: form.optional_text("note"),
        })
    }
}

#[async_trait]
impl Controller for ExpensesController {
    const MODULE: ModuleId = ModuleId::Expenses;

    async fn fetch_data(&mut self, ctx: &AppContext, token: &FetchToken) {
        let user_id = ctx.user_id();
        let month = self.month.to_string();
        if let Some(data) = read_or_default(ctx, token, Self::MODULE, |conn| {
            Ok(ExpenseData {
                expenses: db::expenses::list_expenses(conn, user_id, &month)?,
                categories: db::expenses::list_expense_categories(conn, user_id)?,
            })
        }) {
            self.data = data;
        }
    }

    fn render(&self, ctx: &AppContext) -> Rendered {
        let currency = ctx.currency();
        let mut by_category: BTreeMap<&str, i64> = BTreeMap::new();
        for expense in &self.data.expenses {
            *by_category.entry(expense.category.as_str()).or_insert(0) += expense.amount_cents;
        }
        let total: i64 = by_category.values().sum();

        let rows: Vec<_> = self
            .data
            .expenses
            .iter()
            .map(|expense| {
                json!({
                    "id": expense.id,
                    "amount": format_money(expense.amount_cents, &currency),
                    "amount_input": format_money(expense.amount_cents, ""),
                    "category": expense.category,
                    "spent_on": expense.spent_on,
                    "note": expense.note,
                })
            })
            .collect();
        let categories: Vec<_> = by_category
            .iter()
            .map(|(category, cents)| {
                json!({ "category": category, "amount": format_money(*cents, &currency) })
            })
            .collect();

        Rendered {
            template: "expenses",
            context: json!({
                "month": self.month.to_string(),
                "month_label": self.month.display_name(),
                "today": day_id(ctx.today()),
                "expenses": rows,
                "totals": categories,
                "total": format_money(total, &currency),
                "known_categories": self.data.categories,
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
                let expense = Self::parse_expense(form, ctx)?;
                db::expenses::insert_expense(&*ctx.conn()?, user_id, &expense)?;
                Ok(Some("Expense added".into()))
            }
            "update" => {
                let id = form.id()?;
                let expense = Self::parse_expense(form, ctx)?;
                affected(
                    db::expenses::update_expense(&*ctx.conn()?, user_id, id, &expense)?,
                    "expense",
                )?;
                Ok(Some("Expense updated".into()))
            }
            "delete" => {
                affected(
                    db::expenses::delete_expense(&*ctx.conn()?, user_id, form.id()?)?,
                    "expense",
                )?;
                Ok(Some("Expense deleted".into()))
            }
            "shift" => {
                self.month = self.month.shift(form.integer("delta")?)?;
                Ok(None)
            }
            "month" => {
                self.month = form.text("month")?.parse()?;
                Ok(None)
            }
            other => Err(unknown_action(Self::MODULE, other)),
        }
    }

    fn reset(&mut self) {
        self.data = ExpenseData::default();
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::controllers::FeatureModule;
    use crate::shell::context::testing::{context_on, toasts};
    use crate::shell::{Loadable, ToastKind};

    #[rocket::async_test]
    async fn add_then_list_in_selected_month() {
        let (_dir, ctx) = context_on(NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"));
        let mut module = FeatureModule::new(ExpensesController::new(&ctx));
        module.load(&ctx, ctx.fetch_token()).await.unwrap();

        module
            .dispatch(
                &ctx,
                "add",
                &FormFields::from([("amount", "12.50"), ("category", "food")]),
            )
            .await;
        module
            .dispatch(
                &ctx,
                "add",
                &FormFields::from([
                    ("amount", "7"),
                    ("category", "books"),
                    ("date", "2023-12-24"),
                ]),
            )
            .await;

        let notes = toasts(&ctx);
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|t| t.kind == ToastKind::Success));

        let view = module.view().expect("view");
        assert_eq!(view.context["expenses"].as_array().unwrap().len(), 1);
        assert_eq!(view.context["total"], "12.50");
        assert_eq!(view.context["expenses"][0]["spent_on"], "2024-01-15");

        module
            .dispatch(&ctx, "shift", &FormFields::from([("delta", "-1")]))
            .await;
        let view = module.view().expect("view");
        assert_eq!(view.context["month_label"], "December 2023");
        assert_eq!(view.context["total"], "7.00");
    }

    #[rocket::async_test]
    async fn oversized_shift_is_rejected_and_month_kept() {
        let (_dir, ctx) = context_on(NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"));
        let mut module = FeatureModule::new(ExpensesController::new(&ctx));
        module.load(&ctx, ctx.fetch_token()).await.unwrap();

        for delta in ["4294967295", "2147483647", "-9223372036854775808"] {
            module
                .dispatch(&ctx, "shift", &FormFields::from([("delta", delta)]))
                .await;
        }

        let notes = toasts(&ctx);
        assert_eq!(notes.len(), 3);
        assert!(notes.iter().all(|t| t.kind == ToastKind::Error));
        assert_eq!(module.view().expect("view").context["month_label"], "January 2024");
    }

    #[rocket::async_test]
    async fn update_and_delete_report_missing_rows() {
        let (_dir, ctx) = context_on(NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"));
        let mut controller = ExpensesController::new(&ctx);

        let err = controller
            .handle(&ctx, "delete", &FormFields::from([("id", "99")]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "expense not found");

        controller
            .handle(
                &ctx,
                "add",
                &FormFields::from([("amount", "5"), ("category", "misc")]),
            )
            .await
            .unwrap();
        controller.fetch_data(&ctx, &ctx.fetch_token()).await;
        let id = controller.data.expenses[0].id.to_string();

        controller
            .handle(
                &ctx,
                "update",
                &FormFields::from([("id", id.as_str()), ("amount", "6"), ("category", "misc")]),
            )
            .await
            .unwrap();
        controller.fetch_data(&ctx, &ctx.fetch_token()).await;
        assert_eq!(controller.data.expenses[0].amount_cents, 600);
    }

    #[rocket::async_test]
    async fn stale_fetch_is_discarded() {
        let (_dir, ctx) = context_on(NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"));
        let mut controller = ExpensesController::new(&ctx);
        controller
            .handle(
                &ctx,
                "add",
                &FormFields::from([("amount", "5"), ("category", "misc")]),
            )
            .await
            .unwrap();

        let token = ctx.fetch_token();
        ctx.begin_navigation();
        controller.fetch_data(&ctx, &token).await;
        assert!(controller.data.expenses.is_empty());

        controller.fetch_data(&ctx, &ctx.fetch_token()).await;
        assert_eq!(controller.data.expenses.len(), 1);
    }

    #[rocket::async_test]
    async fn month_selection_validates_input() {
        let (_dir, ctx) = context_on(NaiveDate::from_ymd_opt(2024, 1, 15).expect("date"));
        let mut controller = ExpensesController::new(&ctx);
        assert!(controller
            .handle(&ctx, "month", &FormFields::from([("month", "2024-13")]))
            .await
            .is_err());
        controller
            .handle(&ctx, "month", &FormFields::from([("month", "2023-06")]))
            .await
            .unwrap();
        assert_eq!(controller.month().to_string(), "2023-06");
    }
}
