//! Gateway over a live REST API using a blocking reqwest client.

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::gateway::client::{Gateway, Query};

/// Talks to `base_url` (for example `http://localhost:3000`).
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    client: Client,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("taskflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("http client error: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn send(&self, method: &str, path: &str, req: RequestBuilder) -> Result<Response> {
        debug!(method, path, "gateway request");
        let resp = req.send()?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        // json-server and most APIs put a human readable reason in `message`.
        let body = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "An error occurred".to_string());
        Err(Error::Status { status: status.as_u16(), message })
    }

    fn json(resp: Response) -> Result<Value> {
        let text = resp.text()?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl Gateway for HttpGateway {
    fn get(&self, path: &str, query: &Query) -> Result<Value> {
        let pairs: Vec<(&str, &str)> = query.pairs().collect();
        let req = self.client.get(self.url(path)).query(&pairs);
        Self::json(self.send("GET", path, req)?)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let req = self.client.post(self.url(path)).json(body);
        Self::json(self.send("POST", path, req)?)
    }

    fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        let req = self.client.patch(self.url(path)).json(body);
        Self::json(self.send("PATCH", path, req)?)
    }

    fn delete(&self, path: &str) -> Result<()> {
        let req = self.client.delete(self.url(path));
        self.send("DELETE", path, req)?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
