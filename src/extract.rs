use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::{ApiError, NON_FIELD_ERRORS};

/// ValidatedJson
///
/// `Json<T>` followed by `T::validate()`. Malformed bodies and rule violations
/// both come back as 400 field maps instead of axum's default 415/422 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                ApiError::field(NON_FIELD_ERRORS, rejection.body_text())
            })?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}
