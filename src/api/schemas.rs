use crate::domain::content::Payload;
use crate::domain::user::UserId;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub to_id: UserId,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub text: Option<String>,
    pub media_ref: Option<String>,
    pub caption: Option<String>,
}

impl TryFrom<BroadcastRequest> for Payload {
    type Error = AppError;

    fn try_from(request: BroadcastRequest) -> Result<Self, Self::Error> {
        match (request.text, request.media_ref) {
            (Some(text), None) if request.caption.is_none() => Ok(Self::Text { text }),
            (None, Some(media_ref)) => Ok(Self::Media { media_ref, caption: request.caption }),
            (Some(_), Some(_)) => Err(AppError::InvalidArgument("Provide either text or media_ref, not both".into())),
            (Some(_), None) => Err(AppError::InvalidArgument("Caption requires media_ref".into())),
            (None, None) => Err(AppError::InvalidArgument("Provide text or media_ref".into())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub directory: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: Option<&str>, media_ref: Option<&str>, caption: Option<&str>) -> BroadcastRequest {
        BroadcastRequest {
            text: text.map(String::from),
            media_ref: media_ref.map(String::from),
            caption: caption.map(String::from),
        }
    }

    #[test]
    fn test_broadcast_request_maps_to_payload() {
        assert_eq!(
            Payload::try_from(request(Some("Open till 2"), None, None)).unwrap(),
            Payload::Text { text: "Open till 2".into() }
        );
        assert_eq!(
            Payload::try_from(request(None, Some("media/kale.jpg"), Some("Kale!"))).unwrap(),
            Payload::Media { media_ref: "media/kale.jpg".into(), caption: Some("Kale!".into()) }
        );
        assert!(Payload::try_from(request(Some("x"), Some("y"), None)).is_err());
        assert!(Payload::try_from(request(Some("x"), None, Some("c"))).is_err());
        assert!(Payload::try_from(request(None, None, None)).is_err());
    }
}
