use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ApiError, FieldErrors, NON_FIELD_ERRORS};

lazy_static! {
    static ref MISSING_FIELD: Regex =
        Regex::new(r"^missing field `([^`]+)`").expect("missing field pattern is valid");
    static ref FIELD_PATH: Regex = Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(?:[.\[][^ ]*)?: (.+)$")
        .expect("field path pattern is valid");
    static ref POSITION: Regex =
        Regex::new(r" at line \d+ column \d+$").expect("position pattern is valid");
    static ref INTEGER: Regex = Regex::new(r"expected [iu](8|16|32|64|128|size)\b")
        .expect("integer pattern is valid");
}

const DATA_ERROR_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

/// `Json<T>` whose rejections answer 400 in the same shape as validation
/// errors: `{field: [messages]}` for bad fields, `{"message"}` otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => {
                debug!(error = %rejection.body_text(), "Rejected request body");
                Err(rejection_to_error(rejection))
            }
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(e) => ApiError::Validation(data_error_fields(&e.body_text())),
        other => ApiError::BadRequest(other.body_text()),
    }
}

/// Turns serde's description of a body that parsed as JSON but does not fit
/// the target type into per-field messages.
fn data_error_fields(detail: &str) -> FieldErrors {
    let detail = detail.strip_prefix(DATA_ERROR_PREFIX).unwrap_or(detail);
    let detail = POSITION.replace(detail, "");
    let mut errors = FieldErrors::new();

    if let Some(caps) = MISSING_FIELD.captures(&detail) {
        errors.add(&caps[1], "This field is required.");
    } else if let Some(caps) = FIELD_PATH.captures(&detail) {
        errors.add(&caps[1], field_message(&caps[2]));
    } else if detail.contains("expected struct") {
        errors.add(NON_FIELD_ERRORS, "Invalid data. Expected a dictionary.");
    } else {
        errors.add(NON_FIELD_ERRORS, detail.to_string());
    }
    errors
}

fn field_message(serde_message: &str) -> String {
    let message = if serde_message.starts_with("invalid type: null") {
        "This field may not be null."
    } else if serde_message.contains("expected f64") || serde_message.contains("expected f32") {
        "A valid number is required."
    } else if INTEGER.is_match(serde_message) {
        "A valid integer is required."
    } else if serde_message.contains("expected a boolean") {
        "Must be a valid boolean."
    } else if serde_message.contains("expected a string") {
        "Not a valid string."
    } else {
        serde_message
    };
    message.to_string()
}
