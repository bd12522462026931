use rocket::http::Status;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unknown route: {0}")]
    UnknownRoute(String),

    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("unknown action '{action}' for module {module}")]
    UnknownAction { module: String, action: String },

    #[error("module {module} is unavailable: {reason}")]
    ModuleUnavailable { module: String, reason: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::UnknownRoute(_) | Self::UnknownModule(_) | Self::NotFound(_) => Status::NotFound,
            Self::UnknownAction { .. } | Self::Validation(_) => Status::BadRequest,
            Self::ModuleUnavailable { .. } | Self::Http(_) => Status::ServiceUnavailable,
            Self::Database(_) | Self::Pool(_) | Self::Config(_) => Status::InternalServerError,
        }
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        err.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_http_status() {
        assert_eq!(
            Status::from(AppError::UnknownRoute("nope".into())),
            Status::NotFound
        );
        assert_eq!(
            Status::from(AppError::validation("amount is required")),
            Status::BadRequest
        );
        assert_eq!(
            AppError::ModuleUnavailable {
                module: "weather".into(),
                reason: "no api key".into(),
            }
            .status(),
            Status::ServiceUnavailable
        );
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(AppError::NotFound("debt").to_string(), "debt not found");
    }
}
