//! Converts kitchen failures into the wire envelope `{"error": string}`.
//! No other module builds error responses.

use std::fmt::{self, Display};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kitchen::{Entity, KitchenError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

pub const RECIPE_NOT_FOUND: &str = "레시피를 찾을 수 없어요";
pub const PROFILE_NOT_FOUND: &str = "프로필을 찾을 수 없어요";
pub const TRY_AGAIN: &str = "잠시 후 다시 시도해 주세요";
pub const MALFORMED_REQUEST: &str = "요청 형식이 올바르지 않아요";

/// Boundary operation a failure came from, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CategoryGroups,
    CategoryOptions,
    CookCount,
    UserCookCounts,
    Recipe,
    RandomRecipe,
    Profile,
    Search,
    Favorites,
    RecordCook,
    Prefetch,
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::CategoryGroups => "getCategoryGroups",
            Operation::CategoryOptions => "getCategoryOptions",
            Operation::CookCount => "getCookCount",
            Operation::UserCookCounts => "getUserCookCounts",
            Operation::Recipe => "getRecipeById",
            Operation::RandomRecipe => "getRandomRecipe",
            Operation::Profile => "getUserProfile",
            Operation::Search => "searchRecipes",
            Operation::Favorites => "getFavorites",
            Operation::RecordCook => "recordCook",
            Operation::Prefetch => "prefetchSearch",
        })
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{operation} failed: {source}")]
    Kitchen {
        operation: Operation,
        #[source]
        source: KitchenError,
    },
}

impl AppError {
    pub fn normalize(operation: Operation, source: KitchenError) -> Self {
        AppError::Kitchen { operation, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::Kitchen { source, .. } => match source {
                KitchenError::Validation(_) => StatusCode::BAD_REQUEST,
                KitchenError::NotFound { .. } => StatusCode::NOT_FOUND,
                KitchenError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// User-facing message. Upstream detail never leaves the server.
    pub fn message(&self) -> String {
        match self {
            AppError::MalformedPayload(_) => MALFORMED_REQUEST.to_string(),
            AppError::Kitchen { source, .. } => match source {
                KitchenError::Validation(message) => message.clone(),
                KitchenError::NotFound {
                    entity: Entity::Recipe,
                    ..
                } => RECIPE_NOT_FOUND.to_string(),
                KitchenError::NotFound {
                    entity: Entity::Profile,
                    ..
                } => PROFILE_NOT_FOUND.to_string(),
                KitchenError::Upstream(_) => TRY_AGAIN.to_string(),
            },
        }
    }
}

/// Tags a kitchen result with the operation it came from.
pub trait During<T> {
    fn during(self, operation: Operation) -> Result<T, AppError>;
}

impl<T> During<T> for Result<T, KitchenError> {
    fn during(self, operation: Operation) -> Result<T, AppError> {
        self.map_err(|e| AppError::normalize(operation, e))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            AppError::Kitchen {
                source: KitchenError::Upstream(_),
                ..
            } => error!("{self}"),
            _ => debug!("{self}"),
        }

        (status, Json(ErrorBody { error: self.message() })).into_response()
    }
}
