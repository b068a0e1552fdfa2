//! OAuth2 sign-in (authorization code flow).
//!
//! The user opens the consent URL, approves, and pastes the code back through
//! a [`CodePrompt`]. The code is exchanged for tokens, and the userinfo
//! endpoint supplies the account. Defaults target Google.

use async_trait::async_trait;
use conclave_license::{Account, IdentityProvider, LicenseError, LicenseResult, SignIn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// OAuth2 configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// OAuth2 client ID.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Redirect URI for the OAuth flow.
    pub redirect_uri: String,
    /// Requested scopes, space separated.
    pub scope: String,
    /// Base URL of the consent page (e.g. `https://accounts.google.com`).
    pub auth_base_url: String,
    /// Base URL of the token endpoint (e.g. `https://oauth2.googleapis.com`).
    pub oauth_base_url: String,
    /// Base URL of the userinfo endpoint (e.g. `https://openidconnect.googleapis.com`).
    pub userinfo_base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "urn:ietf:wg:oauth:2.0:oob".to_string(),
            scope: "openid email profile".to_string(),
            auth_base_url: "https://accounts.google.com".to_string(),
            oauth_base_url: "https://oauth2.googleapis.com".to_string(),
            userinfo_base_url: "https://openidconnect.googleapis.com".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Shows the consent URL to the user and collects the authorization code.
#[async_trait]
pub trait CodePrompt: Send + Sync {
    /// Returns the pasted code, or `None` if the user backed out.
    async fn request_code(&self, auth_url: &str) -> Option<String>;
}

/// OAuth2 tokens.
#[derive(Debug, Clone)]
struct OAuthTokens {
    access_token: String,
    expires_at: Option<SystemTime>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

/// Identity provider running the OAuth2 authorization code flow.
pub struct OAuthIdentityProvider {
    config: OAuthConfig,
    client: Client,
    prompt: Arc<dyn CodePrompt>,
    tokens: RwLock<Option<OAuthTokens>>,
}

impl OAuthIdentityProvider {
    /// Creates a provider that asks `prompt` for authorization codes.
    pub fn new(config: OAuthConfig, prompt: Arc<dyn CodePrompt>) -> LicenseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                LicenseError::RemoteUnavailable(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            config,
            client,
            prompt,
            tokens: RwLock::new(None),
        })
    }

    /// Sets an existing access token (e.g., loaded from a keychain).
    pub async fn set_access_token(&self, access_token: String) {
        *self.tokens.write().await = Some(OAuthTokens {
            access_token,
            expires_at: None,
        });
    }

    /// Whether an unexpired access token is held.
    pub async fn is_authenticated(&self) -> bool {
        self.valid_token().await.is_some()
    }

    /// Drops the held token; the next sign-in is interactive.
    pub async fn sign_out(&self) {
        *self.tokens.write().await = None;
    }

    /// The consent page URL the user must visit.
    #[must_use]
    pub fn auth_url(&self) -> String {
        format!(
            "{}/o/oauth2/v2/auth?\
            client_id={}&\
            redirect_uri={}&\
            response_type=code&\
            scope={}&\
            prompt=select_account",
            self.config.auth_base_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&self.config.scope)
        )
    }

    async fn valid_token(&self) -> Option<String> {
        let guard = self.tokens.read().await;
        let tokens = guard.as_ref()?;
        let expired = tokens
            .expires_at
            .is_some_and(|exp| SystemTime::now() > exp);
        (!expired).then(|| tokens.access_token.clone())
    }

    /// Exchanges an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> LicenseResult<String> {
        debug!("Exchanging auth code for tokens");

        let response = self
            .client
            .post(format!("{}/token", self.config.oauth_base_url))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| LicenseError::RemoteUnavailable(format!("token exchange failed: {e}")))?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(LicenseError::RemoteUnavailable(format!(
                "token exchange failed: {error}"
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            LicenseError::RemoteUnavailable(format!("failed to parse token response: {e}"))
        })?;

        // 60s buffer before the provider's own expiry.
        let expires_at = token_response
            .expires_in
            .map(|secs| SystemTime::now() + Duration::from_secs(secs.saturating_sub(60)));

        *self.tokens.write().await = Some(OAuthTokens {
            access_token: token_response.access_token.clone(),
            expires_at,
        });
        Ok(token_response.access_token)
    }

    /// Fetches the signed-in account. `Ok(None)` means the token was refused.
    async fn fetch_account(&self, access_token: &str) -> LicenseResult<Option<Account>> {
        let response = self
            .client
            .get(format!("{}/oauth2/v3/userinfo", self.config.userinfo_base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| LicenseError::RemoteUnavailable(format!("userinfo failed: {e}")))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(LicenseError::RemoteUnavailable(format!(
                "userinfo failed: {error}"
            )));
        }

        let info: UserInfo = response.json().await.map_err(|e| {
            LicenseError::RemoteUnavailable(format!("failed to parse userinfo: {e}"))
        })?;

        // Only a verified email identifies the user.
        let email = info.email.filter(|_| info.email_verified == Some(true));
        Ok(Some(Account {
            uid: info.sub,
            email,
            display_name: info.name,
        }))
    }
}

#[async_trait]
impl IdentityProvider for OAuthIdentityProvider {
    fn provider_name(&self) -> &'static str {
        "OAuth2"
    }

    async fn sign_in(&self) -> LicenseResult<SignIn> {
        if let Some(token) = self.valid_token().await {
            match self.fetch_account(&token).await? {
                Some(account) => return Ok(SignIn::SignedIn(account)),
                None => {
                    debug!("Held token refused, signing in again");
                    self.sign_out().await;
                }
            }
        }

        let code = self
            .prompt
            .request_code(&self.auth_url())
            .await
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let Some(code) = code else {
            return Ok(SignIn::Cancelled);
        };

        let token = self.exchange_code(&code).await?;
        let account = self.fetch_account(&token).await?.ok_or_else(|| {
            LicenseError::RemoteUnavailable("fresh token refused by userinfo".to_string())
        })?;

        info!("Signed in as {}", account.uid);
        Ok(SignIn::SignedIn(account))
    }
}
