//! Common utilities for the UCloud API client
//!
//! Every UCloud action is a signed form POST to a single endpoint. `Params`
//! collects the parameters of one action, `HttpClient` signs and sends them and
//! maps the response envelope to `UCloudError`.

pub mod signature;

use crate::error::UCloudError;
use crate::models::{Credential, RequestContext};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Parameters of one API action, kept sorted by key for signing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    action: String,
    values: BTreeMap<String, String>,
}

impl Params {
    /// Start a parameter set for `action`
    pub fn new(action: impl Into<String>) -> Self {
        let action = action.into();
        let mut values = BTreeMap::new();
        values.insert("Action".to_string(), action.clone());
        Self { action, values }
    }

    /// Action name
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Add `Region` and `ProjectId`
    #[must_use]
    pub fn context(self, ctx: &RequestContext) -> Self {
        self.set("Region", &ctx.region).set("ProjectId", &ctx.project_id)
    }

    /// Set a parameter
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(key.into(), value.to_string());
        self
    }

    /// Set a parameter when present and non-empty
    #[must_use]
    pub fn set_opt(self, key: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.set(key, v),
            _ => self,
        }
    }

    /// Set a list parameter as `Key.0`, `Key.1`, ...
    #[must_use]
    pub fn set_list(mut self, key: &str, values: &[String]) -> Self {
        for (i, value) in values.iter().enumerate() {
            self.values.insert(format!("{key}.{i}"), value.clone());
        }
        self
    }

    /// Read back a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Sorted key/value pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// URL-encoded form body
    pub fn to_form_body(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// HTTP client wrapper with request signing
pub struct HttpClient {
    client: Client,
    base_url: String,
    credential: Credential,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, credential: Credential) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Credential requests are signed with
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Sign `params`, adding `PublicKey` and `Signature`
    pub fn sign(&self, params: Params) -> Result<Params, UCloudError> {
        if self.credential.public_key.is_empty() || self.credential.private_key.is_empty() {
            return Err(UCloudError::InvalidRequest(
                "invalid credential information, please set it before request".to_string(),
            ));
        }
        let params = params.set("PublicKey", &self.credential.public_key);
        let signature = signature::sign(&params, &self.credential.private_key);
        Ok(params.set("Signature", signature))
    }

    /// POST one action and decode its response
    ///
    /// A non-zero `RetCode` in the body becomes `UCloudError::RetCode`.
    pub async fn call<T: DeserializeOwned>(&self, params: Params) -> Result<T, UCloudError> {
        let action = params.action().to_string();
        let signed = self.sign(params)?;
        debug!("POST {} action {}", self.base_url, action);

        let response = self
            .client
            .post(&self.base_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(signed.to_form_body())
            .send()
            .await
            .map_err(|e| {
                warn!("do {} failed, {}", action, e);
                UCloudError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("do {} failed, HTTP {}", action, status);
            return Err(UCloudError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        decode_response(&action, &body)
    }
}

/// Decode a response body, turning a non-zero `RetCode` into an error
pub fn decode_response<T: DeserializeOwned>(action: &str, body: &str) -> Result<T, UCloudError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let code = value.get("RetCode").and_then(serde_json::Value::as_i64).unwrap_or(0);
    if code != 0 {
        let message = value
            .get("Message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        warn!("do {} failed, RetCode {}: {}", action, code, message);
        return Err(UCloudError::RetCode {
            action: action.to_string(),
            code,
            message,
        });
    }
    debug!("do {} successful!", action);
    Ok(serde_json::from_value(value)?)
}
