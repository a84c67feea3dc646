//! Google authorization-code flow.

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::{config::OAuthConfig, error::AppError};

const SCOPES: &str = "openid profile email";

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Raw upstream reply relayed by the token proxy.
#[derive(Debug)]
pub struct ProxiedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    config: Arc<OAuthConfig>,
}

impl OAuthClient {
    pub fn new(http: Client, config: OAuthConfig) -> Self {
        Self {
            http,
            config: Arc::new(config),
        }
    }

    pub fn authorize_url(&self, state: &str) -> Result<String, AppError> {
        let url = Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
                ("access_type", "offline"),
            ],
        )
        .map_err(|err| AppError::Config(format!("invalid oauth auth url: {err}")))?;
        Ok(url.into())
    }

    pub fn revoke_url(&self, token: &str) -> Result<String, AppError> {
        let url = Url::parse_with_params(&self.config.revoke_url, &[("token", token)])
            .map_err(|err| AppError::Config(format!("invalid oauth revoke url: {err}")))?;
        Ok(url.into())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("token exchange rejected: {status} {body}");
            return Err(AppError::bad_request(format!("Failed to exchange token: {status}")));
        }
        Ok(response.json().await?)
    }

    pub async fn user_info(&self, access_token: &str) -> Result<Value, AppError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            warn!("userinfo request rejected: {status}");
            return Err(AppError::bad_request(format!("Failed to get user info: {status}")));
        }
        Ok(response.json().await?)
    }

    /// Forwards a token request body unchanged to Google's token endpoint.
    pub async fn proxy_token(
        &self,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<ProxiedResponse, AppError> {
        let mut request = self.http.post(&self.config.token_url).body(body);
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();
        Ok(ProxiedResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        OAuthClient::new(
            Client::new(),
            OAuthConfig {
                client_id: "client-123".into(),
                client_secret: "shh".into(),
                ..OAuthConfig::default()
            },
        )
    }

    #[test]
    fn authorize_url_carries_client_and_state() {
        let url = Url::parse(&client().authorize_url("xyz").unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["scope"], "openid profile email");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["redirect_uri"], "http://localhost:8080/calling");
    }

    #[test]
    fn token_response_ignores_unused_fields() {
        let tokens: TokenResponse = serde_json::from_str(
            r#"{"access_token":"ya29","expires_in":3599,"refresh_token":"1//r","id_token":"e.y.j","token_type":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(tokens.access_token, "ya29");
    }

    #[test]
    fn revoke_url_escapes_token() {
        let url = client().revoke_url("a b&c").unwrap();
        assert_eq!(url, "https://oauth2.googleapis.com/revoke?token=a+b%26c");
    }
}
