use std::sync::Arc;

use log::debug;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::identity::IdentityProvider;

use super::transport::BackendError;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// HTTP client for the application backend.
///
/// Every call looks the access token up again from the identity provider and
/// sends it as a bearer credential when there is one.
#[derive(Clone)]
pub struct BackendClient {
    pub base_url: String,
    client: Client,
    provider: Arc<dyn IdentityProvider>,
}

impl BackendClient {
    /// `base_url` is the backend origin, request paths are appended to it as is.
    pub fn new(base_url: String, provider: Arc<dyn IdentityProvider>) -> Result<Self, BackendError> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(APP_USER_AGENT)
            .build()?;

        Ok(Self {
            base_url,
            client,
            provider,
        })
    }

    pub async fn get(&self, path: &str) -> Result<Value, BackendError> {
        self.get_json(path).await
    }

    /// POST `body` as JSON, no body is sent for `None` or a falsy value
    /// (`null`, `false`, `0`, `""`).
    pub async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value, BackendError> {
        self.post_json(path, body).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        debug!("GET {path}");

        let request = self.client.get(self.url(path));
        self.send(request).await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, BackendError> {
        debug!("POST {path}");

        let mut request = self
            .client
            .post(self.url(path))
            .header(CONTENT_TYPE, "application/json");

        if let Some(body) = body.filter(|b| is_truthy(b)) {
            request = request.body(serde_json::to_vec(body)?);
        }

        self.send(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn access_token(&self) -> Option<String> {
        match self.provider.get_session().await {
            Ok(session) => session
                .map(|s| s.access_token)
                .filter(|t| !t.is_empty()),
            Err(e) => {
                debug!("no access token available: {e}");
                None
            }
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let request = match self.access_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            debug!("backend answered {status}");
            return Err(BackendError::Failed {
                status,
                message: body,
            });
        }

        Ok(serde_json::from_str::<T>(&body)?)
    }
}

fn is_truthy(body: &Value) -> bool {
    match body {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::StatusCode;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, Request, ResponseTemplate,
    };

    use crate::core::{
        common::{BackendClient, BackendError},
        identity::{IdentityError, MockIdentityProvider, Session, User},
    };

    fn provider_with_token(token: Option<&'static str>) -> Arc<MockIdentityProvider> {
        let mut provider = MockIdentityProvider::new();
        provider.expect_get_session().returning(move || {
            Ok(token.map(|t| Session {
                access_token: t.to_string(),
                refresh_token: None,
                token_type: Some("bearer".to_string()),
                expires_in: None,
                expires_at: None,
                user: User {
                    id: "u1".to_string(),
                    email: None,
                },
            }))
        });
        Arc::new(provider)
    }

    fn no_authorization(req: &Request) -> bool {
        !req.headers.contains_key("authorization")
    }

    #[tokio::test]
    async fn get_attaches_bearer_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("Authorization", "Bearer abcdef1234567890"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user_id": "u1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client =
            BackendClient::new(mock_server.uri(), provider_with_token(Some("abcdef1234567890")))
                .unwrap();

        let res = client.get("/me").await.unwrap();

        assert_eq!(json!({"user_id": "u1"}), res);
    }

    #[tokio::test]
    async fn get_without_session_sends_no_authorization() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .and(no_authorization)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = BackendClient::new(mock_server.uri(), provider_with_token(None)).unwrap();

        assert_eq!(json!({"status": "ok"}), client.get("/").await.unwrap());
    }

    #[tokio::test]
    async fn provider_failure_counts_as_no_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/objectives"))
            .and(no_authorization)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"objectives": []})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut provider = MockIdentityProvider::new();
        provider
            .expect_get_session()
            .returning(|| Err(IdentityError::Provider("refresh failed".to_string())));

        let client = BackendClient::new(mock_server.uri(), Arc::new(provider)).unwrap();

        client.get("/objectives").await.unwrap();
    }

    #[tokio::test]
    async fn post_serializes_body_as_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("Content-Type", "application/json"))
            .and(header("Authorization", "Bearer tok"))
            .and(body_json(json!({"value": 1.5, "units": "V"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = BackendClient::new(mock_server.uri(), provider_with_token(Some("tok"))).unwrap();

        let res = client
            .post("/echo", Some(&json!({"value": 1.5, "units": "V"})))
            .await
            .unwrap();

        assert_eq!(json!({"ok": true}), res);
    }

    #[tokio::test]
    async fn post_without_body_sends_no_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/problems/generate/KCL-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"problem_id": "p1"})))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = BackendClient::new(mock_server.uri(), provider_with_token(Some("tok"))).unwrap();

        client.post("/problems/generate/KCL-01", None).await.unwrap();
        client
            .post("/problems/generate/KCL-01", Some(&serde_json::Value::Null))
            .await
            .unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(2, requests.len());
        for request in requests {
            assert!(request.body.is_empty());
            assert_eq!(
                "application/json",
                request.headers.get("content-type").unwrap().to_str().unwrap()
            );
        }
    }

    #[tokio::test]
    async fn post_with_falsy_body_sends_no_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/echo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(6)
            .mount(&mock_server)
            .await;

        let client = BackendClient::new(mock_server.uri(), provider_with_token(None)).unwrap();

        for body in [json!(false), json!(0), json!(0.0), json!("")] {
            client.post("/echo", Some(&body)).await.unwrap();
        }
        for body in [json!([]), json!({})] {
            client.post("/echo", Some(&body)).await.unwrap();
        }

        let bodies = mock_server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.body)
            .collect::<Vec<_>>();

        assert_eq!(
            vec![
                vec![],
                vec![],
                vec![],
                vec![],
                b"[]".to_vec(),
                b"{}".to_vec()
            ],
            bodies
        );
    }

    #[tokio::test]
    async fn failure_carries_raw_response_text() {
        let mock_server = MockServer::start().await;

        Mock::given(path("/me"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&mock_server)
            .await;

        let client = BackendClient::new(mock_server.uri(), provider_with_token(Some("tok"))).unwrap();

        for res in [client.get("/me").await, client.post("/me", None).await] {
            match res {
                Err(BackendError::Failed { status, message }) => {
                    assert_eq!(StatusCode::UNAUTHORIZED, status);
                    assert_eq!("unauthorized", message);
                }
                other => panic!("unexpected result {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn non_json_success_is_a_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&mock_server)
            .await;

        let client = BackendClient::new(mock_server.uri(), provider_with_token(None)).unwrap();

        assert!(matches!(client.get("/").await, Err(BackendError::Decode(_))));
    }

    #[tokio::test]
    async fn path_is_appended_verbatim() {
        let mock_server = MockServer::start().await;

        Mock::given(path("/api/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user_id": "u1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let base = format!("{}/api", mock_server.uri());
        let client = BackendClient::new(base, provider_with_token(None)).unwrap();

        client.get("/me").await.unwrap();
    }
}
