//! Shared HTTP plumbing for the collaborator clients.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::ProviderError;

/// Timeout for a single collaborator request.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) fn build_client(provider: &'static str) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|source| ProviderError::Request { provider, source })
}

/// Send a request, requiring a success status.
pub(crate) async fn send(
    provider: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|source| ProviderError::Request { provider, source })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        tracing::warn!(provider, status = status.as_u16(), "Provider returned an error status");
        return Err(ProviderError::Api {
            provider,
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Send a request and decode its JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let response = send(provider, request).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|source| ProviderError::Request { provider, source })?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::decode(provider, e.to_string()))
}

/// Join a base URL and a path without doubling the slash.
pub(crate) fn url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Check that a caller-supplied id is safe to place in a URL path.
///
/// Provider ids are opaque tokens of letters, digits, `-` and `_`; anything
/// else is refused before a request is built.
pub(crate) fn path_segment<'a>(
    provider: &'static str,
    value: &'a str,
) -> Result<&'a str, ProviderError> {
    let valid = !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !valid {
        return Err(ProviderError::Rejected {
            provider,
            message: "The reference is not a valid identifier".to_string(),
        });
    }
    Ok(value)
}
