//! FCM gateway over the HTTP v1 API.
//!
//! Single sends go to `messages:send`. Multicast uses the batch endpoint with
//! one `multipart/mixed` sub-request per token; each sub-response carries its
//! own HTTP status line, and only `200` counts as delivered. Bearer tokens
//! come from an [`AccessTokenSource`]; a rejected token is dropped from the
//! cache so the next request mints a new one.

use super::oauth::{resolve_credentials, AccessTokenSource};
use super::{BatchResponse, GatewayError, GatewayResult, PushGateway};
use crate::config::PushConfig;
use crate::logging::redact_token;
use crate::models::Notification;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct FcmGateway {
    client: reqwest::Client,
    endpoint: String,
    project_id: String,
    tokens: Arc<dyn AccessTokenSource>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

impl std::fmt::Debug for FcmGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcmGateway")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("tokens", &self.tokens)
            .finish()
    }
}

impl FcmGateway {
    pub fn from_config(config: &PushConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GatewayError::configuration(format!("HTTP client: {e}")))?;

        let credentials = resolve_credentials(config, &client)?;
        let project_id = config
            .project_id
            .clone()
            .filter(|p| !p.trim().is_empty())
            .or(credentials.project_id)
            .ok_or_else(|| GatewayError::configuration("push.project_id is required for fcm"))?;

        Ok(Self::with_token_source(
            client,
            &config.endpoint,
            project_id,
            credentials.source,
        ))
    }

    pub fn with_token_source(
        client: reqwest::Client,
        endpoint: &str,
        project_id: impl Into<String>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            tokens,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn send_path(&self) -> String {
        format!("/v1/projects/{}/messages:send", self.project_id)
    }

    async fn bearer(&self) -> GatewayResult<String> {
        Ok(format!("Bearer {}", self.tokens.access_token().await?))
    }

    async fn checked<T>(&self, result: GatewayResult<T>) -> GatewayResult<T> {
        if let Err(GatewayError::Unauthorized { status }) = &result {
            warn!(status = *status, "FCM rejected access token, clearing cache");
            self.tokens.invalidate().await;
        }
        result
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    async fn send(&self, token: &str, notification: &Notification) -> GatewayResult<String> {
        let result = self.send_once(token, notification).await;
        self.checked(result).await
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> GatewayResult<BatchResponse> {
        let result = self.send_batch(tokens, notification).await;
        self.checked(result).await
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}

impl FcmGateway {
    async fn send_once(&self, token: &str, notification: &Notification) -> GatewayResult<String> {
        let url = format!("{}{}", self.endpoint, self.send_path());
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer().await?)
            .json(&message_body(token, notification))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status.as_u16(), body));
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::invalid_response(e.to_string()))?;
        debug!(token = %redact_token(token), message_id = %parsed.name, "FCM send accepted");
        Ok(parsed.name)
    }

    async fn send_batch(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> GatewayResult<BatchResponse> {
        if tokens.is_empty() {
            return Ok(BatchResponse::default());
        }

        let boundary = format!("batch_{}", Uuid::new_v4().simple());
        let body = build_batch_body(&boundary, &self.send_path(), tokens, notification);
        let url = format!("{}/batch", self.endpoint);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer().await?)
            .header(CONTENT_TYPE, format!("multipart/mixed; boundary={boundary}"))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_default();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(GatewayError::from_status(status.as_u16(), text));
        }

        let result = parse_batch_response(&content_type, &text, tokens.len())?;
        if result.failure_count > 0 {
            warn!(
                success_count = result.success_count,
                failure_count = result.failure_count,
                "FCM batch completed with per-token failures"
            );
        }
        Ok(result)
    }
}

fn message_body(token: &str, notification: &Notification) -> Value {
    let mut message = json!({
        "token": token,
        "notification": {
            "title": notification.title,
            "body": notification.body,
        },
    });
    if !notification.data.is_empty() {
        message["data"] = json!(notification.data);
    }
    json!({ "message": message })
}

pub(crate) fn build_batch_body(
    boundary: &str,
    send_path: &str,
    tokens: &[String],
    notification: &Notification,
) -> String {
    let mut body = String::new();
    for (index, token) in tokens.iter().enumerate() {
        body.push_str(&format!("--{boundary}\r\n"));
        body.push_str("Content-Type: application/http\r\n");
        body.push_str("Content-Transfer-Encoding: binary\r\n");
        body.push_str(&format!("Content-ID: <{}>\r\n\r\n", index + 1));
        body.push_str(&format!("POST {send_path}\r\n"));
        body.push_str("Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.push_str(&message_body(token, notification).to_string());
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    body
}

fn extract_boundary(content_type: &str) -> Option<&str> {
    content_type.split(';').find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Count per-part statuses in a `multipart/mixed` batch response.
///
/// Parts missing from the response are counted as failures so the totals
/// always cover `expected` tokens.
pub(crate) fn parse_batch_response(
    content_type: &str,
    body: &str,
    expected: usize,
) -> GatewayResult<BatchResponse> {
    let boundary = extract_boundary(content_type).ok_or_else(|| {
        GatewayError::invalid_response(format!("missing multipart boundary in '{content_type}'"))
    })?;
    let delimiter = format!("--{boundary}");

    let statuses: Vec<u16> = body
        .split(delimiter.as_str())
        .filter_map(|part| {
            part.lines()
                .find(|line| line.starts_with("HTTP/"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|code| code.parse().ok())
        })
        .collect();

    if statuses.is_empty() {
        return Err(GatewayError::invalid_response(
            "batch response contained no sub-responses",
        ));
    }

    let success_count = statuses.iter().filter(|s| **s == 200).count().min(expected);
    Ok(BatchResponse {
        success_count,
        failure_count: expected - success_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PushProvider;
    use crate::gateway::test_support::serve;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fcm_config() -> PushConfig {
        PushConfig {
            provider: PushProvider::Fcm,
            project_id: Some("demo-project".to_string()),
            access_token: Some("ya29.secret-token".to_string()),
            ..PushConfig::default()
        }
    }

    #[derive(Debug, Default)]
    struct CountingSource {
        issued: AtomicUsize,
        invalidated: AtomicUsize,
    }

    #[async_trait]
    impl AccessTokenSource for CountingSource {
        async fn access_token(&self) -> GatewayResult<String> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst);
            Ok(format!("ya29.token-{n}"))
        }

        async fn invalidate(&self) {
            self.invalidated.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let mut config = fcm_config();
        config.access_token = None;
        config.credentials_path = Some("/nonexistent/service-account.json".to_string());
        assert!(matches!(
            FcmGateway::from_config(&config),
            Err(GatewayError::Configuration { .. })
        ));

        let gateway = FcmGateway::from_config(&fcm_config()).unwrap();
        assert_eq!(gateway.send_path(), "/v1/projects/demo-project/messages:send");
        assert!(!format!("{gateway:?}").contains("secret-token"));
    }

    #[test]
    fn test_project_id_taken_from_service_account_key() {
        let key_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/service-account.json");
        let config = PushConfig {
            provider: PushProvider::Fcm,
            credentials_path: Some(key_path.display().to_string()),
            ..PushConfig::default()
        };
        let gateway = FcmGateway::from_config(&config).unwrap();
        assert_eq!(gateway.project_id(), "notifier-test");
    }

    #[tokio::test]
    async fn test_send_uses_token_source_bearer() {
        let (endpoint, requests) =
            serve("", vec![(200, r#"{"name":"projects/p/messages/1"}"#.to_string())]).await;
        let source = Arc::new(CountingSource::default());
        let gateway =
            FcmGateway::with_token_source(reqwest::Client::new(), &endpoint, "p", source.clone());

        let id = gateway.send("tok", &Notification::new("t", "b")).await.unwrap();
        assert_eq!(id, "projects/p/messages/1");
        let request = requests.lock()[0].to_lowercase();
        assert!(request.starts_with("post /v1/projects/p/messages:send"));
        assert!(request.contains("authorization: bearer ya29.token-0"));
        assert_eq!(source.invalidated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_response_invalidates_cached_token() {
        let (endpoint, _) = serve(
            "",
            vec![
                (401, r#"{"error":"expired"}"#.to_string()),
                (403, r#"{"error":"denied"}"#.to_string()),
            ],
        )
        .await;
        let source = Arc::new(CountingSource::default());
        let gateway =
            FcmGateway::with_token_source(reqwest::Client::new(), &endpoint, "p", source.clone());
        let tokens = vec!["a".to_string(), "b".to_string()];

        let err = gateway.send("tok", &Notification::new("t", "b")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized { status: 401 }));
        let err = gateway
            .send_multicast(&tokens, &Notification::new("t", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized { status: 403 }));
        assert_eq!(source.invalidated.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_message_body_omits_empty_data() {
        let body = message_body("tok", &Notification::new("Hi", "There"));
        assert_eq!(body["message"]["token"], "tok");
        assert_eq!(body["message"]["notification"]["title"], "Hi");
        assert!(body["message"].get("data").is_none());

        let with_data = Notification::new("Hi", "There").with_data("user_id", "42");
        let body = message_body("tok", &with_data);
        assert_eq!(body["message"]["data"]["user_id"], "42");
    }

    #[test]
    fn test_build_batch_body_has_one_part_per_token() {
        let tokens = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let body = build_batch_body(
            "xyz",
            "/v1/projects/p/messages:send",
            &tokens,
            &Notification::new("t", "b"),
        );
        assert_eq!(body.matches("POST /v1/projects/p/messages:send").count(), 3);
        assert!(body.contains("Content-ID: <3>"));
        assert!(body.ends_with("--xyz--\r\n"));
    }

    #[test]
    fn test_parse_batch_response_counts_statuses() {
        let body = "--resp\r\nContent-Type: application/http\r\n\r\nHTTP/1.1 200 OK\r\n\r\n{}\r\n\
                    --resp\r\nContent-Type: application/http\r\n\r\nHTTP/1.1 404 Not Found\r\n\r\n{}\r\n\
                    --resp\r\nContent-Type: application/http\r\n\r\nHTTP/1.1 200 OK\r\n\r\n{}\r\n\
                    --resp--\r\n";
        let result =
            parse_batch_response("multipart/mixed; boundary=\"resp\"", body, 3).unwrap();
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 1);

        // Missing parts are failures
        let result = parse_batch_response("multipart/mixed; boundary=resp", body, 5).unwrap();
        assert_eq!(result.success_count + result.failure_count, 5);
    }

    #[test]
    fn test_parse_batch_response_rejects_garbage() {
        assert!(parse_batch_response("application/json", "{}", 1).is_err());
        assert!(parse_batch_response("multipart/mixed; boundary=x", "nothing", 1).is_err());
    }
}
