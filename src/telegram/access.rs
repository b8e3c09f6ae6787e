use std::collections::HashSet;

use super::types::{Message, User};
use crate::config::TelegramConfig;

/// Static allow-list check applied to every inbound update.
///
/// Group and channel posts are accepted from allowed chats. Direct messages
/// and retry button presses are accepted from admin users only.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    allowed_chat_ids: HashSet<i64>,
    admin_user_ids: HashSet<i64>,
}

impl AccessPolicy {
    pub fn new<C, A>(allowed_chat_ids: C, admin_user_ids: A) -> Self
    where
        C: IntoIterator<Item = i64>,
        A: IntoIterator<Item = i64>,
    {
        Self {
            allowed_chat_ids: allowed_chat_ids.into_iter().collect(),
            admin_user_ids: admin_user_ids.into_iter().collect(),
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(
            config.allowed_chat_ids.iter().copied(),
            config.admin_user_ids.iter().copied(),
        )
    }

    pub fn is_allowed_chat(&self, chat_id: i64) -> bool {
        self.allowed_chat_ids.contains(&chat_id)
    }

    pub fn is_admin(&self, user: &User) -> bool {
        !user.is_bot && self.admin_user_ids.contains(&user.id)
    }

    pub fn allows_message(&self, message: &Message) -> bool {
        if message.chat.is_private() {
            return message
                .from
                .as_ref()
                .map(|user| self.is_admin(user))
                .unwrap_or(false);
        }
        self.is_allowed_chat(message.chat.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(chat: serde_json::Value, from: Option<i64>) -> Message {
        let mut value = json!({"message_id": 1, "chat": chat});
        if let Some(id) = from {
            value["from"] = json!({"id": id, "is_bot": false, "first_name": "op"});
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_group_posts_follow_chat_allow_list() {
        let policy = AccessPolicy::new([-1001], [7]);
        let allowed = message(json!({"id": -1001, "type": "supergroup"}), Some(99));
        let other = message(json!({"id": -2002, "type": "supergroup"}), Some(7));
        assert!(policy.allows_message(&allowed));
        assert!(!policy.allows_message(&other));
    }

    #[test]
    fn test_direct_messages_require_admin() {
        let policy = AccessPolicy::new([-1001], [7]);
        let admin = message(json!({"id": 7, "type": "private"}), Some(7));
        let stranger = message(json!({"id": 8, "type": "private"}), Some(8));
        let anonymous = message(json!({"id": 8, "type": "private"}), None);
        assert!(policy.allows_message(&admin));
        assert!(!policy.allows_message(&stranger));
        assert!(!policy.allows_message(&anonymous));
    }

    #[test]
    fn test_channel_posts_without_sender() {
        let policy = AccessPolicy::new([-1003], Vec::new());
        let post = message(json!({"id": -1003, "type": "channel"}), None);
        assert!(policy.allows_message(&post));
    }
}
