use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ApiError;

pub const SERVER_NAME: &str = "fossify-api";

/// Raw `/send_sms` body. Fields that are absent or not strings come out as
/// `None`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsBody {
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MmsBody {
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub attachments: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendSmsRequest {
    pub phone_number: String,
    pub message: String,
}

impl TryFrom<SmsBody> for SendSmsRequest {
    type Error = ApiError;

    fn try_from(body: SmsBody) -> Result<Self, Self::Error> {
        match (body.phone_number, body.message) {
            (Some(phone_number), Some(message))
                if !phone_number.is_empty() && !message.is_empty() =>
            {
                Ok(Self {
                    phone_number,
                    message,
                })
            }
            _ => Err(ApiError::BadRequest("Missing phoneNumber or message")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendMmsRequest {
    pub phone_number: String,
    pub message: String,
    /// Base64 blobs in request order; entries are checked when staged.
    pub attachments: Vec<Value>,
}

impl TryFrom<MmsBody> for SendMmsRequest {
    type Error = ApiError;

    fn try_from(body: MmsBody) -> Result<Self, Self::Error> {
        let phone_number = body
            .phone_number
            .filter(|p| !p.is_empty())
            .ok_or(ApiError::BadRequest("Missing phoneNumber"))?;
        Ok(Self {
            phone_number,
            message: body.message.unwrap_or_default(),
            attachments: body.attachments,
        })
    }
}

/// Parses a JSON object body. Malformed JSON and non-object documents yield
/// the empty body so validation reports the missing fields.
pub fn parse_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> T {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
        _ => T::default(),
    }
}

fn lenient_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(d)?;
    Ok(value.as_str().map(str::to_owned))
}

fn lenient_list<'de, D>(d: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(d)? {
        Value::Array(items) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Sent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResult {
    pub status: SendStatus,
    pub id: String,
}

impl SendResult {
    pub fn sent(id: String) -> Self {
        Self {
            status: SendStatus::Sent,
            id,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub server: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Sms,
    Mms,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub phone_number: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
    pub received_at: i64,
}

impl WebhookPayload {
    /// Builds the payload for an inbound message received now. Any
    /// attachments make it an `mms` event.
    pub fn inbound(phone_number: String, message: String, attachments: Vec<String>) -> Self {
        let (kind, attachments) = if attachments.is_empty() {
            (MessageKind::Sms, None)
        } else {
            (MessageKind::Mms, Some(attachments))
        };
        Self {
            kind,
            phone_number,
            message,
            attachments,
            received_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sms_body_non_string_fields_are_missing() {
        let body: SmsBody = parse_body(br#"{"phoneNumber": 5551234, "message": "hi"}"#);
        assert!(body.phone_number.is_none());
        assert_eq!(body.message.as_deref(), Some("hi"));
        assert!(SendSmsRequest::try_from(body).is_err());
    }

    #[test]
    fn test_malformed_and_non_object_bodies_are_empty() {
        let body: SmsBody = parse_body(b"{not json");
        assert!(body.phone_number.is_none() && body.message.is_none());

        let body: SmsBody = parse_body(br#"["5551234", "hi"]"#);
        assert!(body.phone_number.is_none() && body.message.is_none());
    }

    #[test]
    fn test_sms_request_rejects_empty_message() {
        let body: SmsBody = parse_body(br#"{"phoneNumber": "5551234", "message": ""}"#);
        let err = SendSmsRequest::try_from(body).unwrap_err();
        assert_eq!(err.to_string(), "Missing phoneNumber or message");
    }

    #[test]
    fn test_mms_defaults() {
        let body: MmsBody = parse_body(br#"{"phoneNumber": "5551234"}"#);
        let req = SendMmsRequest::try_from(body).unwrap();
        assert_eq!(req.message, "");
        assert!(req.attachments.is_empty());

        let body: MmsBody =
            parse_body(br#"{"phoneNumber": "5551234", "message": 3, "attachments": "abc"}"#);
        let req = SendMmsRequest::try_from(body).unwrap();
        assert_eq!(req.message, "");
        assert!(req.attachments.is_empty());
    }

    #[test]
    fn test_mms_missing_phone() {
        let body: MmsBody = parse_body(br#"{"message": "hello"}"#);
        let err = SendMmsRequest::try_from(body).unwrap_err();
        assert_eq!(err.to_string(), "Missing phoneNumber");
    }

    #[test]
    fn test_send_result_serializes_as_sent() {
        let value = serde_json::to_value(SendResult::sent("42".to_string())).unwrap();
        assert_eq!(value, json!({ "status": "sent", "id": "42" }));
    }

    #[test]
    fn test_webhook_payload_sms_omits_attachments() {
        let payload = WebhookPayload::inbound("+15551234".into(), "hey".into(), vec![]);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "sms");
        assert_eq!(value["phoneNumber"], "+15551234");
        assert_eq!(value["message"], "hey");
        assert!(value.get("attachments").is_none());
        assert!(value["receivedAt"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_webhook_payload_mms_keeps_attachment_order() {
        let payload = WebhookPayload::inbound(
            "+15551234".into(),
            "".into(),
            vec!["a".into(), "b".into()],
        );
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "mms");
        assert_eq!(value["attachments"], json!(["a", "b"]));
    }
}
