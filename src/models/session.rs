use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub data: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything the OAuth flow keeps between requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user_info: Option<Value>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub oauth_state: Option<String>,
}

impl SessionData {
    pub fn user_field(&self, key: &str) -> Option<&str> {
        self.user_info.as_ref()?.get(key)?.as_str()
    }
}
