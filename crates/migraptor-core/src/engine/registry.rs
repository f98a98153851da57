//! Registry login check.
//!
//! Performs the same handshake as `docker login`: `GET /v2/` answers 401
//! with a `Bearer` challenge naming the token realm, and the realm only
//! hands out a token for valid credentials. Registries that accept basic
//! auth directly answer 200 on `/v2/`.

use super::docker::RegistryCredentials;
use crate::config::{AppConfig, NetworkConfig};
use crate::{MigraptorError, Result};
use reqwest::{header, Client, StatusCode};
use tracing::{debug, info};

/// Verifies registry credentials before anything is pulled or deleted.
pub struct RegistryLogin {
    client: Client,
    base_url: String,
}

impl RegistryLogin {
    /// Check against `https://<server>`.
    pub fn new(server: &str) -> Result<Self> {
        Self::with_base_url(format!("https://{}", server.trim_end_matches('/')))
    }

    /// Check against an explicit base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(AppConfig::USER_AGENT)
            .build()
            .map_err(|e| MigraptorError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Succeeds when the registry accepts `credentials`.
    pub async fn verify(&self, credentials: &RegistryCredentials) -> Result<()> {
        let endpoint = format!("{}/v2/", self.base_url);
        let response = self
            .client
            .get(&endpoint)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!("Registry {} accepted the credentials", credentials.server);
            return Ok(());
        }
        if status != StatusCode::UNAUTHORIZED {
            return Err(rejected(credentials, status));
        }

        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer_challenge);
        let Some(challenge) = challenge else {
            // Basic challenge: the credentials we just sent were refused.
            return Err(rejected(credentials, status));
        };

        debug!("Requesting registry token from {}", challenge.realm);
        let mut request = self
            .client
            .get(&challenge.realm)
            .basic_auth(&credentials.username, Some(&credentials.password));
        if let Some(service) = &challenge.service {
            request = request.query(&[("service", service.as_str())]);
        }
        let response = request.send().await?;
        if response.status().is_success() {
            info!("Logged in to registry {}", credentials.server);
            Ok(())
        } else {
            Err(rejected(credentials, response.status()))
        }
    }
}

fn rejected(credentials: &RegistryCredentials, status: StatusCode) -> MigraptorError {
    MigraptorError::Engine {
        message: format!(
            "Login to registry {} as {} failed with status {}",
            credentials.server,
            credentials.username,
            status.as_u16()
        ),
    }
}

#[derive(Debug, PartialEq, Eq)]
struct BearerChallenge {
    realm: String,
    service: Option<String>,
}

/// Parse `Bearer realm="...",service="..."`. Other schemes yield `None`.
fn parse_bearer_challenge(value: &str) -> Option<BearerChallenge> {
    let (scheme, params) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let mut realm = None;
    let mut service = None;
    let mut rest = params.trim();
    while !rest.is_empty() {
        let (key, after) = rest.split_once('=')?;
        let (val, remainder) = match after.strip_prefix('"') {
            Some(quoted) => {
                let end = quoted.find('"')?;
                (&quoted[..end], &quoted[end + 1..])
            }
            None => after.split_once(',').unwrap_or((after, "")),
        };
        match key.trim() {
            "realm" => realm = Some(val.to_string()),
            "service" => service = Some(val.to_string()),
            _ => {}
        }
        rest = remainder.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
    }

    Some(BearerChallenge {
        realm: realm?,
        service,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Mock, Server, ServerGuard};

    // base64("root:secret")
    const BASIC: &str = "Basic cm9vdDpzZWNyZXQ=";

    fn credentials(password: &str) -> RegistryCredentials {
        RegistryCredentials {
            server: "registry.example.com".into(),
            username: "root".into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_parse_gitlab_challenge() {
        let parsed = parse_bearer_challenge(
            r#"Bearer realm="https://gitlab.example.com/jwt/auth",service="container_registry""#,
        )
        .unwrap();
        assert_eq!(parsed.realm, "https://gitlab.example.com/jwt/auth");
        assert_eq!(parsed.service.as_deref(), Some("container_registry"));

        assert!(parse_bearer_challenge(r#"Basic realm="registry""#).is_none());
        assert!(parse_bearer_challenge(r#"Bearer service="x""#).is_none());
    }

    async fn token_server() -> (ServerGuard, Mock) {
        let mut server = Server::new_async().await;
        let challenge = format!(
            r#"Bearer realm="{}/jwt/auth",service="container_registry""#,
            server.url()
        );
        let challenge_mock = server
            .mock("GET", "/v2/")
            .with_status(401)
            .with_header("WWW-Authenticate", &challenge)
            .create_async()
            .await;
        (server, challenge_mock)
    }

    #[tokio::test]
    async fn test_valid_credentials_get_a_token() {
        let (mut server, _challenge) = token_server().await;
        let granted = server
            .mock("GET", "/jwt/auth")
            .match_header("authorization", BASIC)
            .match_query(Matcher::UrlEncoded(
                "service".into(),
                "container_registry".into(),
            ))
            .with_status(200)
            .with_body(r#"{"token": "t"}"#)
            .create_async()
            .await;

        RegistryLogin::with_base_url(server.url())
            .unwrap()
            .verify(&credentials("secret"))
            .await
            .unwrap();
        granted.assert_async().await;
    }

    #[tokio::test]
    async fn test_wrong_password_is_an_engine_failure() {
        let (mut server, _challenge) = token_server().await;
        let denied = server
            .mock("GET", "/jwt/auth")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let err = RegistryLogin::with_base_url(server.url())
            .unwrap()
            .verify(&credentials("wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, MigraptorError::Engine { .. }));
        assert!(err.to_string().contains("status 401"));
        assert_eq!(err.exit_code(), 99);
        denied.assert_async().await;
    }

    #[tokio::test]
    async fn test_basic_auth_registry_refusal() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/")
            .with_status(401)
            .with_header("WWW-Authenticate", r#"Basic realm="registry""#)
            .create_async()
            .await;

        let err = RegistryLogin::with_base_url(server.url())
            .unwrap()
            .verify(&credentials("secret"))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 99);
    }
}
