use std::fmt::{self, Display};

use thiserror::Error;

/// Entities the store can fail to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Recipe,
    Profile,
}

impl Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Recipe => "recipe",
            Entity::Profile => "profile",
        })
    }
}

/// Typed failures raised by the kitchen components.
///
/// `Clone` because a single failed fetch is handed to every caller that was
/// coalesced onto it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KitchenError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },

    #[error("Upstream failure: {0}")]
    Upstream(String),
}

impl KitchenError {
    pub fn upstream(cause: impl Display) -> Self {
        KitchenError::Upstream(cause.to_string())
    }

    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        KitchenError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn missing(field: &str) -> Self {
        KitchenError::Validation(format!("{field} 값이 필요해요"))
    }
}
