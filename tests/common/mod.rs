#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use vidmirror::{
    config::{Config, DatabaseConfig},
    database::Database,
    errors::ProviderUploadError,
    models::Provider,
    pipeline::{Pipeline, ProviderRegistry},
    telegram::{MessagingClient, Update},
    testing::{RecordingMessagingClient, ScriptedProvider},
};

pub const ALLOWED_CHAT: i64 = -1001;
pub const OTHER_CHAT: i64 = -2002;
pub const OPERATOR_CHAT: i64 = -999;
pub const ADMIN_USER: i64 = 7;
pub const REGULAR_USER: i64 = 8;
pub const OPERATOR_TOKEN: &str = "op-token";
pub const WEBHOOK_SECRET: &str = "hook-secret";

pub struct Harness {
    pub config: Config,
    pub database: Database,
    pub messaging: Arc<RecordingMessagingClient>,
    pub provider_a: Arc<ScriptedProvider>,
    pub provider_b: Arc<ScriptedProvider>,
    pub pipeline: Pipeline,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.database = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(1),
    };
    config.telegram.bot_token = "123:test".to_string();
    config.telegram.allowed_chat_ids = vec![ALLOWED_CHAT];
    config.telegram.admin_user_ids = vec![ADMIN_USER];
    config.telegram.operator_chat_id = Some(OPERATOR_CHAT);
    config.providers.upload_timeout = Duration::from_secs(2);
    config.web.operator_token = Some(OPERATOR_TOKEN.to_string());
    config.web.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    config
}

impl Harness {
    pub async fn new(provider_a: ScriptedProvider, provider_b: ScriptedProvider) -> Self {
        let config = test_config();
        let database = Database::new(&config.database).await.unwrap();
        database.migrate().await.unwrap();

        let messaging = Arc::new(RecordingMessagingClient::new());
        let provider_a = Arc::new(provider_a);
        let provider_b = Arc::new(provider_b);
        let registry = ProviderRegistry::new(provider_a.clone(), provider_b.clone()).unwrap();
        let client: Arc<dyn MessagingClient> = messaging.clone();
        let pipeline = Pipeline::new(&config, database.clone(), client, registry);

        Self {
            config,
            database,
            messaging,
            provider_a,
            provider_b,
            pipeline,
        }
    }
}

pub fn http_500(provider: Provider) -> ProviderUploadError {
    ProviderUploadError::Http {
        provider,
        status: 500,
        body: "internal error".to_string(),
    }
}

pub fn video_message_json(update_id: i64, chat_id: i64, file_id: &str, caption: Option<&str>) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": 10 + update_id,
            "from": {"id": ADMIN_USER, "is_bot": false, "first_name": "Admin"},
            "chat": {"id": chat_id, "type": "supergroup", "title": "Uploads"},
            "date": 1_700_000_000,
            "caption": caption,
            "video": {
                "file_id": file_id,
                "file_unique_id": format!("u-{file_id}"),
                "duration": 12,
                "file_name": "clip.mp4",
                "mime_type": "video/mp4",
                "file_size": 2 * 1024 * 1024
            }
        }
    })
}

pub fn video_message(update_id: i64, chat_id: i64, file_id: &str, caption: Option<&str>) -> Update {
    serde_json::from_value(video_message_json(update_id, chat_id, file_id, caption)).unwrap()
}

pub fn retry_callback(update_id: i64, user_id: i64, data: &str) -> Update {
    serde_json::from_value(json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cb-{update_id}"),
            "from": {"id": user_id, "is_bot": false, "first_name": "User"},
            "message": {
                "message_id": 500,
                "chat": {"id": ALLOWED_CHAT, "type": "supergroup", "title": "Uploads"},
                "date": 1_700_000_100
            },
            "data": data
        }
    }))
    .unwrap()
}

pub fn bot_added_to(update_id: i64, chat_id: i64) -> Update {
    serde_json::from_value(json!({
        "update_id": update_id,
        "my_chat_member": {
            "chat": {"id": chat_id, "type": "group", "title": "Somewhere"},
            "from": {"id": REGULAR_USER, "is_bot": false, "first_name": "User"},
            "date": 1_700_000_200,
            "old_chat_member": {
                "status": "left",
                "user": {"id": 42, "is_bot": true, "first_name": "vidmirror"}
            },
            "new_chat_member": {
                "status": "member",
                "user": {"id": 42, "is_bot": true, "first_name": "vidmirror"}
            }
        }
    }))
    .unwrap()
}
