//! Firebase Realtime Database adapter (REST)
//!
//! Records live at `{url}/{namespace}/{id}.json`. A JSON `null` body means
//! nothing is stored at the path.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{Namespace, Store, StorePath};
use crate::{Error, Result};

const USER_AGENT: &str = concat!("spotwatch/", env!("CARGO_PKG_VERSION"));

pub struct RtdbStore {
    http_client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RtdbStore {
    pub fn new(url: &str, auth_token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::Config(format!("Invalid store url: {}", url)));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            auth_token: auth_token.filter(|t| !t.is_empty()),
        })
    }

    fn url_for(&self, relative: &str) -> String {
        format!("{}/{}.json", self.base_url, relative)
    }

    fn request(&self, method: reqwest::Method, relative: &str) -> reqwest::RequestBuilder {
        let builder = self.http_client.request(method, self.url_for(relative));
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token)]),
            None => builder,
        }
    }
}

async fn check(response: Response, relative: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let reason = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "permission denied",
        _ => "request failed",
    };
    Err(Error::Store(format!(
        "{} {} ({}): {}",
        relative,
        reason,
        status.as_u16(),
        body
    )))
}

#[async_trait]
impl Store for RtdbStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>> {
        let relative = path.to_string();
        debug!(path = %relative, "RTDB get");

        let response = self.request(reqwest::Method::GET, &relative).send().await?;
        let value: Value = check(response, &relative).await?.json().await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn set(&self, path: &StorePath, record: Value) -> Result<()> {
        let relative = path.to_string();
        debug!(path = %relative, "RTDB set");

        let response = self
            .request(reqwest::Method::PUT, &relative)
            .json(&record)
            .send()
            .await?;
        check(response, &relative).await?;
        Ok(())
    }

    async fn delete(&self, path: &StorePath) -> Result<()> {
        let relative = path.to_string();
        debug!(path = %relative, "RTDB delete");

        let response = self.request(reqwest::Method::DELETE, &relative).send().await?;
        check(response, &relative).await?;
        Ok(())
    }

    async fn list(&self, namespace: Namespace) -> Result<Vec<(String, Value)>> {
        let relative = namespace.as_str();
        let response = self.request(reqwest::Method::GET, relative).send().await?;
        let value: Value = check(response, relative).await?.json().await?;
        Ok(children(value))
    }

    fn backend(&self) -> &'static str {
        "rtdb"
    }
}

/// Flatten a namespace snapshot into `(id, record)` pairs
///
/// RTDB returns an array instead of an object when every key is a small
/// integer; holes come back as `null`.
fn children(snapshot: Value) -> Vec<(String, Value)> {
    match snapshot {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}
