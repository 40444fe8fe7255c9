use crate::adapters::push::{PushError, PushProvider};
use crate::domain::notification::PushNotification;
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct FcmPushProvider;

#[async_trait]
impl PushProvider for FcmPushProvider {
    async fn send_push(&self, token: &str, notification: &PushNotification) -> Result<(), PushError> {
        tracing::debug!(
            token = %token,
            kind = %notification.data.kind,
            content_id = %notification.data.content_id,
            "STUB: Sending FCM push notification"
        );
        Ok(())
    }
}
