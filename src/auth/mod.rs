/// Spotify authorization-code flow
pub mod callback;

use crate::config::SpotifyConfig;
use crate::models::AuthTokens;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub use callback::CallbackListener;

pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const API_BASE_URL: &str = "https://api.spotify.com/v1";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Spotify authentication was cancelled ({0})")]
    Cancelled(String),
    #[error("no authorization code in callback")]
    MissingCode,
    #[error("token exchange failed with HTTP status {0}")]
    ExchangeFailed(reqwest::StatusCode),
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("callback listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote endpoints used by the auth flow and the player backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorize: String,
    pub token: String,
    pub api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize: AUTHORIZE_URL.to_string(),
            token: TOKEN_URL.to_string(),
            api_base: API_BASE_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Endpoints rooted at a single base URL, as served by a local stand-in
    pub fn local(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize: format!("{}/authorize", base),
            token: format!("{}/api/token", base),
            api_base: format!("{}/v1", base),
        }
    }
}

/// Result of the browser redirect back to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(String),
    Cancelled(String),
    Missing,
}

impl CallbackOutcome {
    pub fn into_code(self) -> Result<String, AuthError> {
        match self {
            CallbackOutcome::Code(code) => Ok(code),
            CallbackOutcome::Cancelled(reason) => Err(AuthError::Cancelled(reason)),
            CallbackOutcome::Missing => Err(AuthError::MissingCode),
        }
    }
}

/// Build the authorization redirect URL.
///
/// Always forces the consent dialog so switching accounts works after logout.
pub fn build_auth_url(config: &SpotifyConfig, endpoints: &Endpoints) -> Result<Url, AuthError> {
    let scope = config.scope_string();
    let url = Url::parse_with_params(
        &endpoints.authorize,
        &[
            ("client_id", config.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("show_dialog", "true"),
        ],
    )?;
    Ok(url)
}

/// Parse a redirect target: a full URL, a path with query, or a bare query string
pub fn parse_callback(input: &str) -> CallbackOutcome {
    let input = input.trim();
    let parsed = Url::parse(input).or_else(|_| {
        let relative = if !input.contains('?') && input.contains('=') {
            format!("?{}", input)
        } else {
            input.to_string()
        };
        Url::parse("http://localhost/").and_then(|base| base.join(&relative))
    });

    let Ok(url) = parsed else {
        return CallbackOutcome::Missing;
    };

    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => return CallbackOutcome::Cancelled(value.into_owned()),
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            _ => {}
        }
    }

    code.map(CallbackOutcome::Code)
        .unwrap_or(CallbackOutcome::Missing)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Client for the token endpoint
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    config: SpotifyConfig,
    endpoints: Endpoints,
}

impl AuthClient {
    pub fn new(config: SpotifyConfig) -> Self {
        Self::with_endpoints(config, Endpoints::default())
    }

    pub fn with_endpoints(config: SpotifyConfig, endpoints: Endpoints) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            endpoints,
        }
    }

    pub fn config(&self) -> &SpotifyConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn authorize_url(&self) -> Result<Url, AuthError> {
        build_auth_url(&self.config, &self.endpoints)
    }

    /// Exchange an authorization code for a token pair. Single attempt.
    pub async fn exchange_code(&self, code: &str) -> Result<AuthTokens, AuthError> {
        tracing::info!("Exchanging authorization code for tokens");
        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .await?;

        let refresh_token = response.refresh_token.unwrap_or_else(|| {
            tracing::warn!("Token endpoint returned no refresh token");
            String::new()
        });

        Ok(AuthTokens {
            access_token: response.access_token,
            refresh_token,
        })
    }

    /// Trade a refresh token for a new access token.
    ///
    /// The endpoint may omit a new refresh token; the old one is kept then.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        tracing::info!("Refreshing access token");
        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;

        Ok(AuthTokens {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
        })
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(&self.endpoints.token)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Token endpoint answered {}", status);
            return Err(AuthError::ExchangeFailed(status));
        }

        Ok(response.json::<TokenResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockServer;

    fn test_config() -> SpotifyConfig {
        SpotifyConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:3000".to_string(),
            ..SpotifyConfig::default()
        }
    }

    #[test]
    fn test_auth_url_is_deterministic() {
        let config = test_config();
        let url = build_auth_url(&config, &Endpoints::default()).unwrap();
        assert_eq!(url, build_auth_url(&config, &Endpoints::default()).unwrap());

        assert_eq!(url.host_str(), Some("accounts.spotify.com"));
        assert_eq!(url.path(), "/authorize");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("client_id".to_string(), "client".to_string()),
                ("response_type".to_string(), "code".to_string()),
                ("redirect_uri".to_string(), "http://localhost:3000".to_string()),
                ("scope".to_string(), config.scope_string()),
                ("show_dialog".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_callback_variants() {
        assert_eq!(
            parse_callback("http://localhost:3000/?code=abc&state=x"),
            CallbackOutcome::Code("abc".to_string())
        );
        assert_eq!(
            parse_callback("/callback?code=abc"),
            CallbackOutcome::Code("abc".to_string())
        );
        assert_eq!(
            parse_callback("code=abc"),
            CallbackOutcome::Code("abc".to_string())
        );
        assert_eq!(
            parse_callback("?error=access_denied&code=abc"),
            CallbackOutcome::Cancelled("access_denied".to_string())
        );
        assert_eq!(parse_callback("/callback"), CallbackOutcome::Missing);
        assert!(matches!(
            CallbackOutcome::Cancelled("access_denied".into()).into_code(),
            Err(AuthError::Cancelled(_))
        ));
    }

    #[tokio::test]
    async fn test_exchange_code_sends_basic_auth_form() {
        let server = MockServer::start(vec![(
            200,
            r#"{"access_token":"acc","refresh_token":"ref","token_type":"Bearer","expires_in":3600}"#,
        )])
        .await;
        let client = AuthClient::with_endpoints(test_config(), Endpoints::local(&server.url()));

        let tokens = client.exchange_code("the-code").await.unwrap();
        assert_eq!(
            tokens,
            AuthTokens {
                access_token: "acc".to_string(),
                refresh_token: "ref".to_string()
            }
        );

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/token");
        // base64("client:secret")
        assert_eq!(
            request.header("authorization"),
            Some("Basic Y2xpZW50OnNlY3JldA==")
        );
        assert_eq!(
            request.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            request.body,
            "grant_type=authorization_code&code=the-code&redirect_uri=http%3A%2F%2Flocalhost%3A3000"
        );
    }

    #[tokio::test]
    async fn test_exchange_code_fails_on_non_success_without_retry() {
        let server = MockServer::start(vec![(400, r#"{"error":"invalid_grant"}"#)]).await;
        let client = AuthClient::with_endpoints(test_config(), Endpoints::local(&server.url()));

        let err = client.exchange_code("bad").await.unwrap_err();
        assert!(matches!(err, AuthError::ExchangeFailed(status) if status.as_u16() == 400));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_keeps_old_refresh_token() {
        let server = MockServer::start(vec![(200, r#"{"access_token":"new-acc"}"#)]).await;
        let client = AuthClient::with_endpoints(test_config(), Endpoints::local(&server.url()));

        let tokens = client.refresh("old-ref").await.unwrap();
        assert_eq!(tokens.access_token, "new-acc");
        assert_eq!(tokens.refresh_token, "old-ref");
        assert_eq!(
            server.requests()[0].body,
            "grant_type=refresh_token&refresh_token=old-ref"
        );
    }
}
