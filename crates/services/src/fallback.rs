//! Which credentials to try, and in which order.

use std::future::Future;

use api::ApiError;

/// Try an unauthenticated request first; on failure retry once with the
/// bearer token, if there is one.
///
/// Returns the error of the last attempt.
///
/// # Errors
///
/// Returns `ApiError` if every attempt fails.
pub async fn public_first<'a, T, F, Fut>(token: Option<&'a str>, call: F) -> Result<T, ApiError>
where
    F: Fn(Option<&'a str>) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    match call(None).await {
        Ok(value) => Ok(value),
        Err(error) => {
            let Some(token) = token else {
                return Err(error);
            };
            tracing::debug!(%error, "public request failed, retrying with credentials");
            call(Some(token)).await
        }
    }
}

/// Try with the bearer token first; on failure retry once without it.
///
/// # Errors
///
/// Returns `ApiError` if every attempt fails.
pub async fn auth_first<'a, T, F, Fut>(token: Option<&'a str>, call: F) -> Result<T, ApiError>
where
    F: Fn(Option<&'a str>) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    if token.is_none() {
        return call(None).await;
    }
    match call(token).await {
        Ok(value) => Ok(value),
        Err(error) => {
            tracing::debug!(%error, "authenticated request failed, retrying without credentials");
            call(None).await
        }
    }
}
