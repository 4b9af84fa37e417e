//! Usage: Exchanges a redirect credential for a backend session.

use crate::handoff::parser::RedirectCredential;
use crate::handoff::source::BoxFuture;
use crate::shared::error::AppResult;
use crate::shared::security::mask_token;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeBody<'a> {
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

/// The backend's view of the signed-in user. Every field is optional; backend versions have
/// differed on which ones they populate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionUser {
    pub id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub onboarded: Option<bool>,
    pub created_at: Option<String>,
    pub last_sign_in_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExchangeResponse {
    success: Option<bool>,
    user: Option<SessionUser>,
    error: Option<Value>,
}

pub trait SessionExchange: Send + Sync {
    fn exchange<'a>(
        &'a self,
        credential: &'a RedirectCredential,
    ) -> BoxFuture<'a, AppResult<SessionUser>>;
}

pub struct SessionExchangeClient {
    client: reqwest::Client,
    exchange_url: String,
}

impl SessionExchangeClient {
    pub fn new(client: reqwest::Client, exchange_url: String) -> Self {
        Self {
            client,
            exchange_url,
        }
    }
}

impl SessionExchange for SessionExchangeClient {
    fn exchange<'a>(
        &'a self,
        credential: &'a RedirectCredential,
    ) -> BoxFuture<'a, AppResult<SessionUser>> {
        Box::pin(async move {
            tracing::info!(
                access_token = %mask_token(&credential.access_token),
                "exchanging redirect credential for session"
            );

            let body = ExchangeBody {
                access_token: credential.access_token.trim(),
                refresh_token: credential
                    .refresh_token
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty()),
            };

            let response = self
                .client
                .post(self.exchange_url.trim())
                .json(&body)
                .send()
                .await
                .map_err(|e| format!("EXCHANGE_FAILED: session exchange request failed: {e}"))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| format!("EXCHANGE_FAILED: session exchange response read failed: {e}"))?;

            parse_exchange_response(status, &body)
        })
    }
}

fn parse_exchange_response(status: reqwest::StatusCode, body: &str) -> AppResult<SessionUser> {
    if !status.is_success() {
        let (error_code, error_message) = parse_backend_error_details(body);
        let snippet = sanitize_error_body_snippet(body);
        let mut msg = format!(
            "EXCHANGE_FAILED: session exchange returned status={}",
            status.as_u16()
        );
        if let Some(code) = error_code {
            msg.push_str(" code=");
            msg.push_str(code.as_str());
        }
        if let Some(detail) = error_message {
            msg.push_str(" message=");
            msg.push_str(detail.chars().take(240).collect::<String>().as_str());
        }
        msg.push_str(" body=");
        msg.push_str(snippet.as_str());
        return Err(msg.into());
    }

    let parsed: ExchangeResponse = serde_json::from_str(body)
        .map_err(|e| format!("EXCHANGE_FAILED: session exchange response json invalid: {e}"))?;

    if parsed.success == Some(false) {
        let detail = parsed
            .error
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or("backend reported failure");
        return Err(format!("EXCHANGE_FAILED: {detail}").into());
    }

    parsed
        .user
        .ok_or_else(|| "EXCHANGE_FAILED: session exchange response missing user".into())
}

fn parse_backend_error_details(body: &str) -> (Option<String>, Option<String>) {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return (None, None),
    };

    let mut code = value
        .get("code")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let mut message = value
        .get("error_description")
        .and_then(Value::as_str)
        .or_else(|| value.get("message").and_then(Value::as_str))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    if let Some(error_value) = value.get("error") {
        if let Some(err_str) = error_value.as_str() {
            if code.is_none() {
                code = Some(err_str.trim().to_string());
            }
        } else if let Some(err_obj) = error_value.as_object() {
            if code.is_none() {
                code = err_obj
                    .get("code")
                    .and_then(Value::as_str)
                    .or_else(|| err_obj.get("type").and_then(Value::as_str))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);
            }
            if message.is_none() {
                message = err_obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);
            }
        }
    }

    (code, message)
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lc = key.trim().to_ascii_lowercase();
    key_lc.contains("token") || key_lc.contains("secret") || key_lc == "authorization"
}

fn redact_sensitive_json_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if is_sensitive_key(key) {
                    if let Some(raw) = nested.as_str() {
                        *nested = Value::String(mask_token(raw));
                        continue;
                    }
                }
                redact_sensitive_json_fields(nested);
            }
        }
        Value::Array(items) => {
            for nested in items {
                redact_sensitive_json_fields(nested);
            }
        }
        _ => {}
    }
}

fn sanitize_error_body_snippet(body: &str) -> String {
    if let Ok(mut value) = serde_json::from_str::<Value>(body) {
        redact_sensitive_json_fields(&mut value);
        if let Ok(encoded) = serde_json::to_string(&value) {
            return encoded.chars().take(500).collect();
        }
    }
    body.chars().take(500).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn parse_exchange_response_extracts_user() {
        let body = r#"{"success": true, "user": {"id": "u1", "email": "a@b.c", "onboarded": true}}"#;
        let user = parse_exchange_response(StatusCode::OK, body).unwrap();
        assert_eq!(user.id.as_deref(), Some("u1"));
        assert_eq!(user.onboarded, Some(true));
    }

    #[test]
    fn parse_exchange_response_accepts_bare_user_object() {
        let body = r#"{"user": {"email": "a@b.c", "fullName": "Ana"}}"#;
        let user = parse_exchange_response(StatusCode::OK, body).unwrap();
        assert_eq!(user.full_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn parse_exchange_response_rejects_declared_failure() {
        let body = r#"{"success": false, "error": "token expired"}"#;
        let err = parse_exchange_response(StatusCode::OK, body).unwrap_err();
        assert_eq!(err.code(), "EXCHANGE_FAILED");
        assert!(err.message().contains("token expired"));
    }

    #[test]
    fn parse_exchange_response_rejects_missing_user() {
        let body = r#"{"success": true}"#;
        let err = parse_exchange_response(StatusCode::OK, body).unwrap_err();
        assert_eq!(err.code(), "EXCHANGE_FAILED");
    }

    #[test]
    fn parse_exchange_response_surfaces_http_error_details() {
        let body = r#"{"message": "Invalid Google token"}"#;
        let err = parse_exchange_response(StatusCode::UNAUTHORIZED, body).unwrap_err();
        assert_eq!(err.code(), "EXCHANGE_FAILED");
        assert!(err.message().contains("status=401"));
        assert!(err.message().contains("Invalid Google token"));
    }

    #[test]
    fn parse_backend_error_details_supports_nested_error_payload() {
        let payload = r#"{"error": {"message": "session expired", "code": "invalid_session"}}"#;
        let (code, message) = parse_backend_error_details(payload);
        assert_eq!(code.as_deref(), Some("invalid_session"));
        assert_eq!(message.as_deref(), Some("session expired"));
    }

    #[test]
    fn sanitize_error_body_snippet_masks_token_fields() {
        let raw = r#"{"error": "bad", "accessToken": "abcd1234xyz9876"}"#;
        let snippet = sanitize_error_body_snippet(raw);
        assert!(!snippet.contains("abcd1234xyz9876"));
        assert!(snippet.contains(crate::shared::security::mask_token("abcd1234xyz9876").as_str()));
    }

    #[test]
    fn exchange_body_omits_missing_refresh_token() {
        let body = ExchangeBody {
            access_token: "AT",
            refresh_token: None,
        };
        let encoded = serde_json::to_string(&body).unwrap();
        assert_eq!(encoded, r#"{"accessToken":"AT"}"#);
    }
}
