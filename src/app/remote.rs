use anyhow::Context as _;
use async_trait::async_trait;
use url::Url;

use crate::config::SiteConfig;
use crate::formats::{AuthExchangeResponse, GraphqlRequest, UserData};

const USER_AGENT: &str = concat!("learnsite/", env!("CARGO_PKG_VERSION"));

/// Outbound collaborators. Requests are opaque JSON; no retries.
#[async_trait]
pub trait RemoteServices: Send + Sync {
    /// Trades a one-time OAuth code for the reader's identity and project.
    async fn exchange_code(&self, code: &str) -> anyhow::Result<UserData>;
    async fn invite(&self, email: &str) -> anyhow::Result<()>;
    async fn graphql(
        &self,
        endpoint: &Url,
        request: &GraphqlRequest,
    ) -> anyhow::Result<serde_json::Value>;
}

#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    auth_endpoint: Option<Url>,
    invite_endpoint: Url,
}

impl HttpRemote {
    pub fn new(config: &SiteConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            auth_endpoint: config.auth_endpoint.clone(),
            invite_endpoint: config.invite_endpoint.clone(),
        })
    }

    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> anyhow::Result<String> {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .with_context(|| format!("read response body: {url}"))?;
        if !status.is_success() {
            anyhow::bail!("POST {url} failed ({status}): {}", raw.trim());
        }
        Ok(raw)
    }
}

#[async_trait]
impl RemoteServices for HttpRemote {
    async fn exchange_code(&self, code: &str) -> anyhow::Result<UserData> {
        let Some(endpoint) = &self.auth_endpoint else {
            anyhow::bail!("auth endpoint is not configured (LEARNSITE_AUTH_ENDPOINT)");
        };

        let raw = self
            .post_json(endpoint, &serde_json::json!({ "code": code }))
            .await?;
        let body: AuthExchangeResponse =
            serde_json::from_str(&raw).context("parse auth exchange response")?;
        user_from_exchange(body)
    }

    async fn invite(&self, email: &str) -> anyhow::Result<()> {
        self.post_json(&self.invite_endpoint, &serde_json::json!({ "email": email }))
            .await?;
        tracing::info!(email = %email, "invite sent");
        Ok(())
    }

    async fn graphql(
        &self,
        endpoint: &Url,
        request: &GraphqlRequest,
    ) -> anyhow::Result<serde_json::Value> {
        let body = serde_json::to_value(request).context("serialize graphql request")?;
        let raw = self.post_json(endpoint, &body).await?;
        serde_json::from_str(&raw).context("parse graphql response")
    }
}

fn user_from_exchange(body: AuthExchangeResponse) -> anyhow::Result<UserData> {
    if let Some(message) = body.error_message.filter(|m| !m.trim().is_empty()) {
        anyhow::bail!("auth exchange rejected: {message}");
    }
    let Some(email) = body.email.filter(|e| !e.trim().is_empty()) else {
        anyhow::bail!("auth exchange response is missing email");
    };
    let name = body
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.clone());
    Ok(UserData {
        project_id: body.project_id,
        email,
        name,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Read as _;
    use std::sync::mpsc;
    use std::thread;

    use super::*;

    /// Serves one request with a canned response and reports the request body.
    fn one_shot(status: u16, body: &'static str) -> (Url, mpsc::Receiver<(String, String)>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start stub server");
        let url = Url::parse(&format!("http://{}/hook", server.server_addr())).unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok(mut request) = server.recv() {
                let mut received = String::new();
                let _ = request.as_reader().read_to_string(&mut received);
                let _ = tx.send((request.url().to_string(), received));
                let header =
                    tiny_http::Header::from_bytes("Content-Type", "application/json").unwrap();
                let _ = request.respond(
                    tiny_http::Response::from_string(body)
                        .with_status_code(status)
                        .with_header(header),
                );
            }
        });
        (url, rx)
    }

    fn remote(auth: Option<Url>, invite: Option<Url>) -> HttpRemote {
        let mut config = SiteConfig {
            auth_endpoint: auth,
            ..SiteConfig::default()
        };
        if let Some(invite) = invite {
            config.invite_endpoint = invite;
        }
        HttpRemote::new(&config).unwrap()
    }

    #[tokio::test]
    async fn exchange_code_posts_code_and_reads_user() {
        let (url, rx) = one_shot(
            200,
            r#"{"projectId":"cixyz","email":"ada@example.com","name":"Ada"}"#,
        );
        let user = remote(Some(url), None).exchange_code("abc").await.unwrap();
        assert_eq!(user.project_id.as_deref(), Some("cixyz"));
        assert_eq!(user.name, "Ada");

        let (path, body) = rx.recv().unwrap();
        assert_eq!(path, "/hook");
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, serde_json::json!({ "code": "abc" }));
    }

    #[tokio::test]
    async fn exchange_code_fails_on_error_message_or_status() {
        let (url, _rx) = one_shot(200, r#"{"errorMessage":"bad code"}"#);
        let err = remote(Some(url), None).exchange_code("abc").await.unwrap_err();
        assert!(format!("{err:#}").contains("bad code"));

        let (url, _rx) = one_shot(500, r#"{}"#);
        assert!(remote(Some(url), None).exchange_code("abc").await.is_err());

        assert!(remote(None, None).exchange_code("abc").await.is_err());
    }

    #[test]
    fn missing_name_falls_back_to_email() {
        let user = user_from_exchange(AuthExchangeResponse {
            project_id: None,
            email: Some("ada@example.com".to_owned()),
            name: None,
            error_message: None,
        })
        .unwrap();
        assert_eq!(user.name, "ada@example.com");
    }

    #[tokio::test]
    async fn invite_posts_email() {
        let (url, rx) = one_shot(200, "{}");
        remote(None, Some(url)).invite("ada@example.com").await.unwrap();
        let (_, body) = rx.recv().unwrap();
        assert!(body.contains("ada@example.com"));
    }

    #[tokio::test]
    async fn graphql_forwards_query_and_returns_envelope() {
        let (url, rx) = one_shot(200, r#"{"data":{"allPokemons":{"edges":[]}}}"#);
        let request = GraphqlRequest {
            query: "{ allPokemons { edges { node { id } } } }".to_owned(),
            variables: None,
            operation_name: None,
        };
        let value = remote(None, None).graphql(&url, &request).await.unwrap();
        assert!(value.pointer("/data/allPokemons/edges").is_some());

        let (_, body) = rx.recv().unwrap();
        let sent: GraphqlRequest = serde_json::from_str(&body).unwrap();
        assert_eq!(sent, request);
    }
}
