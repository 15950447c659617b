use axum::http::HeaderMap;
use kitchen::KitchenError;

pub const USER_HEADER: &str = "x-user-id";

/// Trimmed value of a required parameter. Missing and blank are both
/// rejected before anything reaches the store.
pub fn require(field: &str, value: Option<String>) -> Result<String, KitchenError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| KitchenError::missing(field))
}

pub fn current_user(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .map(str::to_string)
}
