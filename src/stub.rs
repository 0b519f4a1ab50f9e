//! Stub paid resource for local runs
//!
//! Every `GET /paid-resource` answers 402 with the same challenge. The stub
//! never checks the ledger, so an agent pointed at it pays on every cycle.

use crate::types::ChallengeBody;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Path the stub serves its challenge on
pub const PAID_RESOURCE_PATH: &str = "/paid-resource";

/// Fixed terms the stub asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubChallenge {
    /// Amount in smallest token units, as a decimal string
    pub price: String,
    pub token: String,
    pub recipient: String,
    pub reason: String,
}

impl Default for StubChallenge {
    fn default() -> Self {
        Self {
            price: "1000000".to_string(),
            token: "USDC".to_string(),
            recipient: "0xcf942c47bc33dB4Fabc1696666058b784F9fa9ef".to_string(),
            reason: "Payment required to access resource".to_string(),
        }
    }
}

impl StubChallenge {
    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }

    fn body(&self) -> ChallengeBody {
        ChallengeBody::new(
            self.price.clone(),
            self.token.clone(),
            self.recipient.clone(),
            self.reason.clone(),
        )
    }
}

/// Router serving `challenge` on [`PAID_RESOURCE_PATH`]
pub fn router(challenge: StubChallenge) -> Router {
    Router::new()
        .route(PAID_RESOURCE_PATH, get(paid_resource))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(challenge))
}

async fn paid_resource(State(challenge): State<Arc<StubChallenge>>) -> impl IntoResponse {
    (StatusCode::PAYMENT_REQUIRED, Json(challenge.body()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_paid_resource_returns_challenge() {
        let response = router(StubChallenge::default())
            .oneshot(
                Request::builder()
                    .uri(PAID_RESOURCE_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["price"], "1000000");
        assert_eq!(body["token"], "USDC");
        assert_eq!(body["recipient"], "0xcf942c47bc33dB4Fabc1696666058b784F9fa9ef");
        assert_eq!(body["reason"], "Payment required to access resource");
    }

    #[tokio::test]
    async fn test_overridden_terms_are_served() {
        let challenge = StubChallenge::default()
            .with_price("42")
            .with_recipient("0x209693Bc6afc0C5328bA36FaF03C514EF312287C");
        let response = router(challenge)
            .oneshot(
                Request::builder()
                    .uri(PAID_RESOURCE_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["price"], "42");
        assert_eq!(body["recipient"], "0x209693Bc6afc0C5328bA36FaF03C514EF312287C");
        assert_eq!(body["token"], "USDC");
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let response = router(StubChallenge::default())
            .oneshot(Request::builder().uri("/other").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
