use crate::adapters::store::{ContentStore, FieldUpdate};
use crate::config::MessagingConfig;
use crate::domain::clock::Clock;
use crate::domain::content::{ContentKind, ContentRecord, Payload};
use crate::domain::notification::{DeepLink, DispatchReport, PushNotification};
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use crate::services::dispatcher::FanoutDispatcher;
use crate::services::recipients::{DirectRecipient, RecipientResolver};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Characters of content shown in a notification body.
const PREVIEW_CHARS: usize = 100;

#[derive(Clone, Debug)]
struct Metrics {
    created: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("market-ephemera");
        Self {
            created: meter
                .u64_counter("market_content_created_total")
                .with_description("Total number of messages and stories created")
                .build(),
        }
    }
}

/// The content-creation pipeline.
///
/// Persistence is the only step a caller waits for. Recipient resolution and
/// push dispatch run afterwards in a detached task, and their failures never
/// reach the caller.
#[derive(Clone, Debug)]
pub struct ContentService {
    store: Arc<dyn ContentStore>,
    clock: Arc<dyn Clock>,
    resolver: RecipientResolver,
    dispatcher: FanoutDispatcher,
    config: MessagingConfig,
    metrics: Metrics,
}

impl ContentService {
    #[must_use]
    pub fn new(
        store: Arc<dyn ContentStore>,
        clock: Arc<dyn Clock>,
        resolver: RecipientResolver,
        dispatcher: FanoutDispatcher,
        config: MessagingConfig,
    ) -> Self {
        Self { store, clock, resolver, dispatcher, config, metrics: Metrics::new() }
    }

    /// Persists a direct message and notifies the recipient in the background.
    ///
    /// # Errors
    /// Returns `AppError::InvalidArgument` for self-messaging, blank text, or text over the length cap.
    /// Returns `AppError::Store` if the message cannot be persisted.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, text),
        fields(from_id = %from_id, to_id = %to_id, message_id = tracing::field::Empty)
    )]
    pub async fn send_message(&self, from_id: &UserId, to_id: &UserId, text: &str) -> Result<Uuid> {
        if from_id == to_id {
            return Err(AppError::InvalidArgument("Cannot send a message to yourself".into()));
        }
        if text.trim().is_empty() {
            return Err(AppError::InvalidArgument("Message text must not be empty".into()));
        }
        if text.chars().count() > self.config.max_text_length {
            return Err(AppError::InvalidArgument(format!(
                "Message text exceeds {} characters",
                self.config.max_text_length
            )));
        }

        let record =
            ContentRecord::new_message(Uuid::now_v7(), from_id.clone(), to_id.clone(), text.to_owned(), self.clock.now());
        let id = self.store.create(record).await?;
        tracing::Span::current().record("message_id", tracing::field::display(id));
        self.metrics.created.add(1, &[KeyValue::new("kind", ContentKind::Message.as_str())]);

        let notification = PushNotification {
            title: from_id.to_string(),
            body: Payload::Text { text: text.to_owned() }.preview(PREVIEW_CHARS),
            data: DeepLink { kind: ContentKind::Message, content_id: id },
        };
        let service = self.clone();
        let to_id = to_id.clone();
        tokio::spawn(
            async move {
                if let Err(e) = service.notify_direct(&to_id, &notification).await {
                    tracing::warn!(error = %e, "Direct message notification failed");
                }
            }
            .in_current_span(),
        );

        Ok(id)
    }

    /// Persists a story and notifies the owner's followers in the background.
    ///
    /// # Errors
    /// Returns `AppError::InvalidArgument` if the payload is empty or over the length cap.
    /// Returns `AppError::Store` if the story cannot be persisted.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, payload),
        fields(owner_id = %owner_id, story_id = tracing::field::Empty)
    )]
    pub async fn post_broadcast(&self, owner_id: &UserId, payload: Payload) -> Result<Uuid> {
        self.validate_payload(&payload)?;

        let record = ContentRecord::new_story(Uuid::now_v7(), owner_id.clone(), payload, self.clock.now());
        let notification = PushNotification {
            title: format!("{owner_id} posted a new story"),
            body: record.payload().preview(PREVIEW_CHARS),
            data: DeepLink { kind: ContentKind::Story, content_id: record.id() },
        };
        let id = self.store.create(record).await?;
        tracing::Span::current().record("story_id", tracing::field::display(id));
        self.metrics.created.add(1, &[KeyValue::new("kind", ContentKind::Story.as_str())]);

        let service = self.clone();
        let owner_id = owner_id.clone();
        tokio::spawn(
            async move {
                if let Err(e) = service.notify_followers(&owner_id, &notification).await {
                    tracing::warn!(error = %e, "Follower fan-out failed");
                }
            }
            .in_current_span(),
        );

        Ok(id)
    }

    /// Resolves the owner's followers and dispatches one notification to each.
    ///
    /// Zero recipients is a silent no-op that never reaches the dispatcher.
    ///
    /// # Errors
    /// Returns `AppError::Directory` if the followers cannot be resolved.
    #[tracing::instrument(err(level = "warn"), skip(self, notification), fields(owner_id = %owner_id))]
    pub async fn notify_followers(&self, owner_id: &UserId, notification: &PushNotification) -> Result<DispatchReport> {
        let tokens = self.resolver.followers_of(owner_id).await?;
        if tokens.is_empty() {
            tracing::debug!("No followers to notify");
            return Ok(DispatchReport::default());
        }
        Ok(self.dispatcher.dispatch(tokens, notification).await)
    }

    /// Notifies the recipient of a direct message, if they can be reached.
    ///
    /// # Errors
    /// Returns `AppError::Directory` if the recipient's token cannot be looked up.
    #[tracing::instrument(err(level = "warn"), skip(self, notification), fields(to_id = %to_id))]
    pub async fn notify_direct(&self, to_id: &UserId, notification: &PushNotification) -> Result<DispatchReport> {
        match self.resolver.direct(to_id).await? {
            DirectRecipient::Token(token) => Ok(self.dispatcher.dispatch(vec![token], notification).await),
            DirectRecipient::Unreachable => Ok(DispatchReport::default()),
        }
    }

    /// Marks a message as read by its recipient. Repeating the call is harmless.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist or has expired.
    /// Returns `AppError::PermissionDenied` if `reader_id` is not the recipient.
    #[tracing::instrument(err(level = "debug"), skip(self), fields(reader_id = %reader_id, message_id = %message_id))]
    pub async fn mark_read(&self, reader_id: &UserId, message_id: Uuid) -> Result<()> {
        let record = self
            .store
            .get_by_id(ContentKind::Message, message_id)
            .await?
            .filter(|r| r.is_live_at(self.clock.now()))
            .ok_or(AppError::NotFound)?;

        if record.target_id() != Some(reader_id) {
            return Err(AppError::PermissionDenied);
        }
        if record.is_read() {
            return Ok(());
        }
        self.store.update_field(ContentKind::Message, message_id, FieldUpdate::Read(true)).await?;
        Ok(())
    }

    fn validate_payload(&self, payload: &Payload) -> Result<()> {
        let limit = self.config.max_caption_length;
        match payload {
            Payload::Text { text } if text.trim().is_empty() => {
                Err(AppError::InvalidArgument("Story text must not be empty".into()))
            }
            Payload::Text { text } if text.chars().count() > limit => {
                Err(AppError::InvalidArgument(format!("Story text exceeds {limit} characters")))
            }
            Payload::Media { media_ref, .. } if media_ref.trim().is_empty() => {
                Err(AppError::InvalidArgument("Media reference must not be empty".into()))
            }
            Payload::Media { caption: Some(caption), .. } if caption.chars().count() > limit => {
                Err(AppError::InvalidArgument(format!("Caption exceeds {limit} characters")))
            }
            _ => Ok(()),
        }
    }
}
