//! # Downstream Transport
//!
//! One HTTP exchange with a downstream service. The invoker layers retry and circuit
//! breaking on top; this layer only maps the wire outcome into [`ServiceCallError`].

use super::errors::ServiceCallError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// HTTP methods supported for downstream calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(format!("Unsupported HTTP method: {other}")),
        }
    }
}

/// A fully resolved downstream request
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub service: String,
    pub method: HttpMethod,
    pub url: Url,
    pub payload: Value,
    pub timeout: Duration,
}

/// Wire-level access to downstream services
#[async_trait]
pub trait DownstreamTransport: Send + Sync + fmt::Debug {
    /// Perform the request and parse a 2xx body as JSON
    async fn send(&self, request: &ServiceRequest) -> Result<Value, ServiceCallError>;

    /// `GET url`, returning the HTTP status code of whatever answered
    async fn probe(&self, service: &str, url: &Url, timeout: Duration)
        -> Result<u16, ServiceCallError>;
}

/// reqwest-backed transport sharing one pooled client across services
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self, ServiceCallError> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| ServiceCallError::connection("http_client", e.to_string()))?;
        Ok(Self { client })
    }

    fn map_send_error(service: &str, timeout: Duration, err: reqwest::Error) -> ServiceCallError {
        if err.is_timeout() {
            ServiceCallError::Timeout {
                service: service.to_string(),
                timeout,
            }
        } else {
            ServiceCallError::connection(service, err.to_string())
        }
    }
}

/// Flatten a JSON object into query parameters; strings are passed verbatim,
/// other values as their JSON text.
pub fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    match payload {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl DownstreamTransport for HttpTransport {
    async fn send(&self, request: &ServiceRequest) -> Result<Value, ServiceCallError> {
        let service = request.service.as_str();

        let builder = match request.method {
            HttpMethod::Get => self
                .client
                .get(request.url.clone())
                .query(&query_pairs(&request.payload)),
            HttpMethod::Post => self.client.post(request.url.clone()).json(&request.payload),
        };

        debug!(
            service = service,
            method = %request.method,
            url = %request.url,
            "Sending downstream request"
        );

        let response = builder
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| Self::map_send_error(service, request.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ServiceCallError::http_status(service, status.as_u16(), body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::map_send_error(service, request.timeout, e))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| ServiceCallError::invalid_response(service, e.to_string()))
    }

    async fn probe(
        &self,
        service: &str,
        url: &Url,
        timeout: Duration,
    ) -> Result<u16, ServiceCallError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::map_send_error(service, timeout, e))?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_http_method_parsing() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert!("DELETE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_query_pairs_stringify_scalars() {
        let mut pairs = query_pairs(&json!({"query": "coffee shop", "top_k": 5, "deep": true}));
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("deep".to_string(), "true".to_string()),
                ("query".to_string(), "coffee shop".to_string()),
                ("top_k".to_string(), "5".to_string()),
            ]
        );
        assert!(query_pairs(&json!([1, 2])).is_empty());
    }
}
