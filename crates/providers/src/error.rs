//! Errors raised by collaborator clients.

use payout_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("{provider} request failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-2xx status.
    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("{provider} returned an unexpected response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    /// The provider processed the request and refused it.
    #[error("{provider} rejected the request: {message}")]
    Rejected {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Request { provider, .. }
            | Self::Api { provider, .. }
            | Self::Decode { provider, .. }
            | Self::Rejected { provider, .. } => provider,
        }
    }

    pub(crate) fn decode(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            provider,
            message: message.into(),
        }
    }
}

impl From<ProviderError> for CoreError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected { provider, message } => CoreError::Rejected { provider, message },
            // 4xx bodies usually explain what was wrong with the submitted data.
            ProviderError::Api {
                provider,
                status,
                body,
            } if status == 422 => CoreError::Rejected {
                provider,
                message: body,
            },
            other => CoreError::Provider {
                provider: other.provider(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn rejection_maps_to_rejected() {
        let err = ProviderError::Rejected {
            provider: "Veriff",
            message: "declined".into(),
        };
        assert_matches!(CoreError::from(err), CoreError::Rejected { provider: "Veriff", .. });
    }

    #[test]
    fn unprocessable_entity_maps_to_rejected() {
        let err = ProviderError::Api {
            provider: "Moov",
            status: 422,
            body: "invalid ssn".into(),
        };
        assert_matches!(
            CoreError::from(err),
            CoreError::Rejected { message, .. } if message == "invalid ssn"
        );
    }

    #[test]
    fn server_error_maps_to_provider() {
        let err = ProviderError::Api {
            provider: "Plaid",
            status: 503,
            body: "unavailable".into(),
        };
        assert_matches!(CoreError::from(err), CoreError::Provider { provider: "Plaid", .. });
    }
}
