use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;

use super::{affected, read_or_default, unknown_action, Controller};
use crate::bucket::day_id;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::form::FormFields;
use crate::models::{Debt, DebtPayment};
use crate::money::{format_money, format_percent};
use crate::shell::{AppContext, FetchToken, ModuleId, Rendered};

#[derive(Default)]
struct DebtData {
    debts: Vec<Debt>,
    payments: Vec<DebtPayment>,
}

#[derive(Default)]
pub struct DebtsController {
    data: DebtData,
}

#[async_trait]
impl Controller for DebtsController {
    const MODULE: ModuleId = ModuleId::Debts;

    async fn fetch_data(&mut self, ctx: &AppContext, token: &FetchToken) {
        let user_id = ctx.user_id();
        if let Some(data) = read_or_default(ctx, token, Self::MODULE, |conn| {
            Ok(DebtData {
                debts: db::debts::list_debts(conn, user_id)?,
                payments: db::debts::list_payments(conn, user_id)?,
            })
        }) {
            self.data = data;
        }
    }

    fn render(&self, ctx: &AppContext) -> Rendered {
        let currency = ctx.currency();
        let mut payments: HashMap<i64, Vec<&DebtPayment>> = HashMap::new();
        for payment in &self.data.payments {
            payments.entry(payment.debt_id).or_default().push(payment);
        }

        let rows: Vec<_> = self
            .data
            .debts
            .iter()
            .map(|debt| {
                let history: Vec<_> = payments
                    .get(&debt.id)
                    .map(Vec::as_slice)
                    .unwrap_or_default()
                    .iter()
                    .map(|p| json!({ "amount": format_money(p.amount_cents, &currency), "paid_on": p.paid_on }))
                    .collect();
                json!({
                    "id": debt.id,
                    "name": debt.name,
                    "total": format_money(debt.total_cents, &currency),
                    "total_input": format_money(debt.total_cents, ""),
                    "paid": format_money(debt.paid_cents, &currency),
                    "remaining": format_money(debt.remaining_cents(), &currency),
                    "progress": format_percent(debt.progress()),
                    "progress_value": debt.progress().round() as i64,
                    "settled": debt.remaining_cents() <= 0,
                    "last_payment_on": debt.last_payment_on,
                    "payments": history,
                })
            })
            .collect();

        let total: i64 = self.data.debts.iter().map(|d| d.total_cents).sum();
        let paid: i64 = self.data.debts.iter().map(|d| d.paid_cents).sum();
        let outstanding: i64 = self
            .data
            .debts
            .iter()
            .map(|d| d.remaining_cents().max(0))
            .sum();

        Rendered {
            template: "debts",
            context: json!({
                "debts": rows,
                "today": day_id(ctx.today()),
                "total": format_money(total, &currency),
                "paid": format_money(paid, &currency),
                "outstanding": format_money(outstanding, &currency),
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
                let name = form.text("name")?;
                let total = form.amount_cents("total")?;
                let paid = match form.optional_text("paid") {
                    Some(_) => form.amount_cents("paid")?,
                    None => 0,
                };
                db::debts::insert_debt(&*ctx.conn()?, user_id, &name, total, paid)?;
                Ok(Some(format!("Debt '{name}' added")))
            }
            "update" => {
                let id = form.id()?;
                let name = form.text("name")?;
                let total = form.amount_cents("total")?;
                affected(
                    db::debts::update_debt(&*ctx.conn()?, user_id, id, &name, total)?,
                    "debt",
                )?;
                Ok(Some("Debt updated".into()))
            }
            "delete" => {
                affected(
                    db::debts::delete_debt(&*ctx.conn()?, user_id, form.id()?)?,
                    "debt",
                )?;
                Ok(Some("Debt deleted".into()))
            }
            "pay" => {
                let id = form.id()?;
                let amount = form.amount_cents("amount")?;
                if amount == 0 {
                    return Err(AppError::validation("payment must be greater than zero"));
                }
                let paid_on = form.optional_date("date")?.unwrap_or_else(|| ctx.today());
                let mut conn = ctx.conn()?;
                if !db::debts::record_payment(&mut conn, user_id, id, amount, &day_id(paid_on))? {
                    return Err(AppError::NotFound("debt"));
                }
                Ok(Some("Payment recorded".into()))
            }
            other => Err(unknown_action(Self::MODULE, other)),
        }
    }

    fn reset(&mut self) {
        self.data = DebtData::default();
    }
}
