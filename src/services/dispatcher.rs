use crate::adapters::push::{PushError, PushProvider};
use crate::config::PushConfig;
use crate::domain::notification::{Delivery, DispatchReport, FailureKind, PushNotification, TokenResult};
use futures::StreamExt;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Clone, Debug)]
struct Metrics {
    sent: Counter<u64>,
    errors: Counter<u64>,
    invalidated_tokens: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("market-ephemera");
        Self {
            sent: meter
                .u64_counter("market_push_sent_total")
                .with_description("Total number of push notifications successfully sent")
                .build(),
            errors: meter
                .u64_counter("market_push_errors_total")
                .with_description("Total number of push notification delivery errors")
                .build(),
            invalidated_tokens: meter
                .u64_counter("market_push_invalidated_tokens_total")
                .with_description("Total number of tokens reported as unregistered")
                .build(),
        }
    }
}

/// Sends one notification to many tokens and accounts for every outcome.
///
/// A dispatch never fails as a whole: each token ends up either delivered or
/// failed with a [`FailureKind`]. There is exactly one attempt per token.
#[derive(Clone, Debug)]
pub struct FanoutDispatcher {
    provider: Arc<dyn PushProvider>,
    concurrency: usize,
    send_timeout: Duration,
    invalid_token_tx: Option<mpsc::Sender<String>>,
    metrics: Metrics,
}

impl FanoutDispatcher {
    #[must_use]
    pub fn new(provider: Arc<dyn PushProvider>, config: &PushConfig) -> Self {
        Self {
            provider,
            concurrency: config.push_concurrency.max(1),
            send_timeout: Duration::from_millis(config.push_send_timeout_ms),
            invalid_token_tx: None,
            metrics: Metrics::new(),
        }
    }

    /// Forwards unregistered tokens to the token janitor for pruning.
    #[must_use]
    pub fn with_invalid_token_sink(mut self, tx: mpsc::Sender<String>) -> Self {
        self.invalid_token_tx = Some(tx);
        self
    }

    #[tracing::instrument(
        skip(self, tokens, notification),
        fields(
            kind = %notification.data.kind,
            content_id = %notification.data.content_id,
            recipients = tracing::field::Empty,
            failures = tracing::field::Empty
        )
    )]
    pub async fn dispatch(&self, tokens: Vec<String>, notification: &PushNotification) -> DispatchReport {
        let mut seen = HashSet::new();
        let tokens: Vec<String> = tokens.into_iter().filter(|t| seen.insert(t.clone())).collect();
        tracing::Span::current().record("recipients", tokens.len());

        let results: Vec<TokenResult> = match tokens.len() {
            0 => Vec::new(),
            1 => {
                let mut tokens = tokens;
                let token = tokens.remove(0);
                vec![self.send_one(token, notification).await]
            }
            _ => {
                futures::stream::iter(tokens)
                    .map(|token| self.send_one(token, notification))
                    .buffered(self.concurrency)
                    .collect()
                    .await
            }
        };

        let report = DispatchReport::from_results(results);
        tracing::Span::current().record("failures", report.failure_count);
        if report.failure_count > 0 {
            tracing::warn!(
                success = report.success_count,
                failed = report.failure_count,
                "Fan-out completed with failed tokens"
            );
        }
        self.remediate(&report).await;
        report
    }

    async fn send_one(&self, token: String, notification: &PushNotification) -> TokenResult {
        let outcome = tokio::time::timeout(self.send_timeout, self.provider.send_push(&token, notification)).await;

        let delivery = match outcome {
            Ok(Ok(())) => {
                tracing::debug!(token = %token, "Push notification sent successfully");
                self.metrics.sent.add(1, &[]);
                Delivery::Delivered
            }
            Ok(Err(PushError::Unregistered)) => {
                tracing::debug!(token = %token, "Token unregistered");
                self.metrics.invalidated_tokens.add(1, &[]);
                Delivery::Failed { kind: FailureKind::Unregistered }
            }
            Ok(Err(PushError::QuotaExceeded)) => {
                tracing::warn!("Push quota exceeded");
                self.metrics.errors.add(1, &[KeyValue::new("reason", "quota_exceeded")]);
                Delivery::Failed { kind: FailureKind::QuotaExceeded }
            }
            Ok(Err(PushError::Other(e))) => {
                tracing::error!(error = %e, "Failed to send push notification");
                self.metrics.errors.add(1, &[KeyValue::new("reason", "other")]);
                Delivery::Failed { kind: FailureKind::Provider }
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.send_timeout.as_millis(), "Push send timed out");
                self.metrics.errors.add(1, &[KeyValue::new("reason", "timeout")]);
                Delivery::Failed { kind: FailureKind::Timeout }
            }
        };

        TokenResult { token, delivery }
    }

    async fn remediate(&self, report: &DispatchReport) {
        let Some(tx) = &self.invalid_token_tx else {
            let stale = report.unregistered_tokens().count();
            if stale > 0 {
                tracing::info!(stale, "No janitor configured, leaving unregistered tokens in place");
            }
            return;
        };
        for token in report.unregistered_tokens() {
            if tx.send(token.to_owned()).await.is_err() {
                tracing::warn!("Token janitor has shut down, dropping invalid token");
                break;
            }
        }
    }
}
