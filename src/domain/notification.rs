use crate::domain::content::ContentKind;
use serde::Serialize;
use uuid::Uuid;

/// Client-side deep link carried in the push data payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeepLink {
    pub kind: ContentKind,
    pub content_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    pub data: DeepLink,
}

/// Why a single token's send did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unregistered,
    QuotaExceeded,
    Timeout,
    Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    Delivered,
    Failed { kind: FailureKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenResult {
    pub token: String,
    pub delivery: Delivery,
}

impl TokenResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.delivery, Delivery::Delivered)
    }
}

/// Complete per-token accounting of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<TokenResult>,
}

impl DispatchReport {
    #[must_use]
    pub fn from_results(results: Vec<TokenResult>) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        Self { success_count, failure_count: results.len() - success_count, results }
    }

    pub fn failed_tokens(&self) -> impl Iterator<Item = &str> {
        self.results.iter().filter(|r| !r.is_success()).map(|r| r.token.as_str())
    }

    /// Tokens the provider says will never work again.
    pub fn unregistered_tokens(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.delivery == Delivery::Failed { kind: FailureKind::Unregistered })
            .map(|r| r.token.as_str())
    }
}
