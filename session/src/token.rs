//! The entitlement gate crossed once before any capture is allowed.

use crate::actions::{DeliveryActions, DeliveryError};
use idscan_common::messages::token::EXPECTED_PRODUCT;
use thiserror::Error;

/// Reasons the gate turns a session away. All of them route the user to the
/// not-found view; none of them are retried within the session.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("no access token was supplied")]
    MissingToken,

    #[error("token lookup failed: {0}")]
    LookupFailed(#[from] DeliveryError),

    #[error("token does not grant the identity-scan product")]
    WrongProduct,
}

/// A token the backend confirmed grants the identity-scan product.
///
/// Carries the server-confirmed token string, not the raw query input. The
/// confirmed string is what later flows into report audit metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub(crate) fn new(confirmed: String) -> Self {
        Self(confirmed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolve the raw token from the session's query parameters. An absent or
/// empty token fails fast without touching the network; a single failed
/// lookup is terminal for the session.
pub async fn resolve<A: DeliveryActions>(
    actions: &A,
    raw_token: Option<&str>,
) -> Result<AccessToken, GateError> {
    let raw = match raw_token {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(GateError::MissingToken),
    };

    let record = actions.lookup_token(raw).await?;

    if record.product != EXPECTED_PRODUCT {
        tracing::warn!(product = %record.product, "token grants the wrong product");
        return Err(GateError::WrongProduct);
    }

    tracing::info!("access token resolved");
    Ok(AccessToken(record.token))
}

#[cfg(test)]
mod tests {
    use super::{GateError, resolve};
    use crate::testutil::FakeActions;
    use idscan_common::messages::token::TokenRecord;

    #[tokio::test]
    async fn absent_token_fails_without_a_lookup() {
        let actions = FakeActions::default();

        assert!(matches!(
            resolve(&actions, None).await,
            Err(GateError::MissingToken)
        ));
        assert!(matches!(
            resolve(&actions, Some("")).await,
            Err(GateError::MissingToken)
        ));
        assert_eq!(actions.calls(), Vec::<&str>::new());
    }

    #[tokio::test]
    async fn unresolvable_token_is_rejected() {
        let actions = FakeActions::default();

        assert!(matches!(
            resolve(&actions, Some("abc123")).await,
            Err(GateError::LookupFailed(_))
        ));
        assert_eq!(actions.calls(), Vec::from(["lookup_token"]));
    }

    #[tokio::test]
    async fn wrong_product_is_rejected() {
        let actions = FakeActions {
            token_record: Some(TokenRecord {
                token: "confirmed-abc".to_string(),
                product: "credit-report".to_string(),
            }),
            ..FakeActions::default()
        };

        assert!(matches!(
            resolve(&actions, Some("abc123")).await,
            Err(GateError::WrongProduct)
        ));
    }

    #[tokio::test]
    async fn resolved_token_carries_the_server_confirmed_string() {
        let actions = FakeActions {
            token_record: Some(TokenRecord {
                token: "confirmed-abc".to_string(),
                product: "idscan".to_string(),
            }),
            ..FakeActions::default()
        };

        let token = resolve(&actions, Some("raw-abc")).await.unwrap();
        assert_eq!(token.as_str(), "confirmed-abc");
    }
}
