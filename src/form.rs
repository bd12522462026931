use std::collections::HashMap;

use chrono::NaiveDate;

use crate::bucket;
use crate::error::{AppError, AppResult};
use crate::money::parse_amount_to_cents;

/// Submitted form values, with typed accessors that produce validation errors.
#[derive(Debug, Default, Clone)]
pub struct FormFields(HashMap<String, String>);

impl FormFields {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self(values)
    }

    fn raw(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn text(&self, name: &str) -> AppResult<String> {
        self.raw(name)
            .map(str::to_string)
            .ok_or_else(|| AppError::validation(format!("{name} is required")))
    }

    pub fn optional_text(&self, name: &str) -> Option<String> {
        self.raw(name).map(str::to_string)
    }

    pub fn amount_cents(&self, name: &str) -> AppResult<i64> {
        let raw = self.text(name)?;
        parse_amount_to_cents(&raw)
            .ok_or_else(|| AppError::validation(format!("{name} must be a positive amount")))
    }

    pub fn id(&self) -> AppResult<i64> {
        self.integer("id")
    }

    pub fn integer(&self, name: &str) -> AppResult<i64> {
        self.text(name)?
            .parse()
            .map_err(|_| AppError::validation(format!("{name} must be a whole number")))
    }

    pub fn optional_integer(&self, name: &str) -> AppResult<Option<i64>> {
        match self.raw(name) {
            None => Ok(None),
            Some(_) => self.integer(name).map(Some),
        }
    }

    pub fn date(&self, name: &str) -> AppResult<NaiveDate> {
        bucket::parse_day(&self.text(name)?)
    }

    pub fn optional_date(&self, name: &str) -> AppResult<Option<NaiveDate>> {
        self.raw(name).map(bucket::parse_day).transpose()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for FormFields {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_validate() {
        let form = FormFields::from([
            ("id", "7"),
            ("amount", "12,50"),
            ("date", "2024-01-15"),
            ("name", "  "),
        ]);
        assert_eq!(form.id().unwrap(), 7);
        assert_eq!(form.amount_cents("amount").unwrap(), 1250);
        assert_eq!(form.date("date").unwrap().to_string(), "2024-01-15");
        assert!(form.text("name").is_err());
        assert_eq!(form.optional_text("name"), None);
        assert_eq!(form.optional_integer("missing").unwrap(), None);
        assert!(form.optional_date("missing").unwrap().is_none());
    }

    #[test]
    fn error_messages_name_the_field() {
        let form = FormFields::from([("amount", "-1"), ("id", "x")]);
        assert_eq!(
            form.amount_cents("amount").unwrap_err().to_string(),
            "amount must be a positive amount"
        );
        assert_eq!(form.id().unwrap_err().to_string(), "id must be a whole number");
    }
}
