//! Subset of the Telegram Bot API object model used by the webhook and the
//! outbound client. Unknown fields are ignored on deserialization.

use serde::{Deserialize, Serialize};

/// File name extensions accepted for documents without a `video/*` MIME type
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "webm", "m4v", "flv", "wmv", "3gp", "ts"];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub channel_post: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub my_chat_member: Option<ChatMemberUpdated>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub video: Option<Video>,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }

    /// Human readable label for logs and operator alerts
    pub fn label(&self) -> String {
        match (&self.title, &self.username) {
            (Some(title), _) => format!("{} ({})", title, self.id),
            (None, Some(username)) => format!("@{} ({})", username, self.id),
            _ => self.id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Video {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: String,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    pub from: User,
    #[serde(default)]
    pub date: i64,
    pub old_chat_member: ChatMember,
    pub new_chat_member: ChatMember,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMember {
    pub status: String,
    pub user: User,
}

impl ChatMember {
    pub fn is_present(&self) -> bool {
        matches!(
            self.status.as_str(),
            "creator" | "administrator" | "member" | "restricted"
        )
    }
}

/// Result of `getFile`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Bot API response envelope
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl SendMessageRequest {
    pub fn new<S: Into<String>>(chat_id: i64, text: S) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to_message_id: None,
            reply_markup: None,
        }
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.reply_to_message_id = Some(message_id);
        self
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        if !keyboard.inline_keyboard.is_empty() {
            self.reply_markup = Some(keyboard);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

/// A video carried by a message, whichever field it arrived in
#[derive(Debug, Clone, PartialEq)]
pub struct VideoAttachment {
    pub file_id: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
}

impl Message {
    /// The message's video, or a document that looks like one
    pub fn video_attachment(&self) -> Option<VideoAttachment> {
        if let Some(video) = &self.video {
            return Some(VideoAttachment {
                file_id: video.file_id.clone(),
                file_name: video
                    .file_name
                    .clone()
                    .unwrap_or_else(|| format!("video_{}.mp4", self.message_id)),
                mime_type: video.mime_type.clone(),
                file_size: video.file_size,
            });
        }

        let document = self.document.as_ref()?;
        let by_mime = document
            .mime_type
            .as_deref()
            .map(|mime| mime.starts_with("video/"))
            .unwrap_or(false);
        let by_extension = document
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !by_mime && !by_extension {
            return None;
        }

        Some(VideoAttachment {
            file_id: document.file_id.clone(),
            file_name: document
                .file_name
                .clone()
                .unwrap_or_else(|| format!("document_{}", self.message_id)),
            mime_type: document.mime_type.clone(),
            file_size: document.file_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(extra: serde_json::Value) -> Message {
        let mut base = json!({
            "message_id": 7,
            "chat": {"id": -1001, "type": "supergroup", "title": "Uploads"},
            "date": 1_700_000_000
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    fn decode_envelope<T: serde::de::DeserializeOwned>(raw: &str) -> ApiEnvelope<T> {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_envelope_without_result_decodes_for_any_payload() {
        let failed: ApiEnvelope<File> =
            decode_envelope(r#"{"ok": false, "description": "Bad Request: file is too big"}"#);
        assert!(!failed.ok);
        assert!(failed.result.is_none());
        assert_eq!(failed.description.as_deref(), Some("Bad Request: file is too big"));

        let ok: ApiEnvelope<File> =
            decode_envelope(r#"{"ok": true, "result": {"file_id": "F1", "file_path": "videos/a.mp4"}}"#);
        assert_eq!(ok.result.and_then(|f| f.file_path).as_deref(), Some("videos/a.mp4"));
    }

    #[test]
    fn test_video_message_is_attachment() {
        let msg = message(json!({
            "video": {"file_id": "F1", "file_unique_id": "U1", "file_name": "clip.mp4",
                      "mime_type": "video/mp4", "file_size": 2097152, "duration": 12}
        }));
        let attachment = msg.video_attachment().unwrap();
        assert_eq!(attachment.file_id, "F1");
        assert_eq!(attachment.file_name, "clip.mp4");
        assert_eq!(attachment.file_size, Some(2_097_152));
    }

    #[test]
    fn test_document_accepted_by_mime_or_extension() {
        let by_mime = message(json!({
            "document": {"file_id": "D1", "file_name": "raw", "mime_type": "video/quicktime"}
        }));
        assert!(by_mime.video_attachment().is_some());

        let by_extension = message(json!({
            "document": {"file_id": "D2", "file_name": "Holiday.MKV",
                         "mime_type": "application/octet-stream"}
        }));
        assert_eq!(by_extension.video_attachment().unwrap().file_name, "Holiday.MKV");

        let pdf = message(json!({
            "document": {"file_id": "D3", "file_name": "notes.pdf", "mime_type": "application/pdf"}
        }));
        assert!(pdf.video_attachment().is_none());
    }

    #[test]
    fn test_update_ignores_unknown_fields() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 1,
            "edited_message": {"message_id": 1},
            "poll": {}
        }))
        .unwrap();
        assert!(update.message.is_none());
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn test_send_message_omits_empty_keyboard() {
        let request = SendMessageRequest::new(5, "hi").with_keyboard(InlineKeyboardMarkup::default());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("reply_markup").is_none());
        assert!(json.get("reply_to_message_id").is_none());
    }
}
