use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use digest_auth::{AuthContext, HttpMethod};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HOST, WWW_AUTHENTICATE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::TransportError;

/// Authenticated round trips to a gateway. Endpoints are relative to the base URI;
/// an empty endpoint addresses the base URI itself.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET without a body, POST with a JSON body.
    async fn fetch_json(
        &self,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>, TransportError>;

    /// POSTs a url-encoded form and returns the markup.
    async fn fetch_html(
        &self,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> Result<String, TransportError>;
}

pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TransportError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Connection settings for one client. Nothing here is process-wide.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub base_uri: String,
    pub username: String,
    pub password: String,
    /// Gateways ship self-signed certificates
    pub accept_invalid_certs: bool,
    pub http1_only: bool,
    pub timeout: Duration,
    pub host_header: Option<String>,
}

impl TransportConfig {
    pub fn new(base_uri: &str, username: &str, password: &str) -> Self {
        Self {
            base_uri: base_uri.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            accept_invalid_certs: true,
            http1_only: false,
            timeout: Duration::from_secs(10),
            host_header: None,
        }
    }
}

enum Payload {
    Json(Vec<u8>),
    Form(Vec<(String, String)>),
}

/// `reqwest` based transport answering HTTP digest challenges.
pub struct HttpTransport {
    client: reqwest::Client,
    base_uri: String,
    username: String,
    password: String,
    host_header: RwLock<Option<String>>,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        if config.http1_only {
            builder = builder.http1_only();
        }

        Ok(Self {
            client: builder.build()?,
            base_uri: config.base_uri.trim_end_matches('/').to_string(),
            username: config.username,
            password: config.password,
            host_header: RwLock::new(config.host_header.filter(|h| !h.is_empty())),
        })
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Overrides the Host header of every following request; empty restores the default.
    /// Needed when the gateway is reached through a tunnel but checks its own hostname.
    pub fn set_host_header(&self, host: &str) {
        if let Ok(mut current) = self.host_header.write() {
            *current = Some(host.to_string()).filter(|h| !h.is_empty());
        }
    }

    pub fn host_header(&self) -> Option<String> {
        self.host_header.read().ok().and_then(|h| h.clone())
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_uri, endpoint)
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        payload: Option<Payload>,
    ) -> Result<Vec<u8>, TransportError> {
        let url = self.url(endpoint);
        tracing::debug!("{method} {url}");

        let response = self
            .request(&method, &url, payload.as_ref(), None)
            .send()
            .await?;

        let response = match digest_challenge(&response) {
            Some(challenge) => {
                let authorization =
                    self.authorization(&challenge, &method, &url, payload.as_ref())?;
                self.request(&method, &url, payload.as_ref(), Some(authorization))
                    .send()
                    .await?
            }
            None => response,
        };

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    fn request(
        &self,
        method: &Method,
        url: &str,
        payload: Option<&Payload>,
        authorization: Option<String>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method.clone(), url);
        if let Some(host) = self.host_header() {
            builder = builder.header(HOST, host);
        }
        if let Some(authorization) = authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        match payload {
            Some(Payload::Json(bytes)) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.clone()),
            Some(Payload::Form(fields)) => builder.form(fields),
            None => builder,
        }
    }

    fn authorization(
        &self,
        challenge: &str,
        method: &Method,
        url: &str,
        payload: Option<&Payload>,
    ) -> Result<String, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUri(e.to_string()))?;
        let uri = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };
        let body = match payload {
            Some(Payload::Json(bytes)) => Some(bytes.as_slice()),
            _ => None,
        };
        let http_method = if *method == Method::POST {
            HttpMethod::POST
        } else {
            HttpMethod::GET
        };

        let mut prompt =
            digest_auth::parse(challenge).map_err(|e| TransportError::Auth(e.to_string()))?;
        let context = AuthContext::new_with_method(
            self.username.as_str(),
            self.password.as_str(),
            uri.as_str(),
            body,
            http_method,
        );
        let answer = prompt
            .respond(&context)
            .map_err(|e| TransportError::Auth(e.to_string()))?;
        Ok(answer.to_header_string())
    }
}

fn digest_challenge(response: &reqwest::Response) -> Option<String> {
    if response.status() != StatusCode::UNAUTHORIZED {
        return None;
    }
    response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| {
            value
                .get(..6)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
        })
        .map(str::to_string)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_json(
        &self,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>, TransportError> {
        match body {
            Some(body) => {
                let bytes = serde_json::to_vec(body)?;
                self.send(Method::POST, endpoint, Some(Payload::Json(bytes)))
                    .await
            }
            None => self.send(Method::GET, endpoint, None).await,
        }
    }

    async fn fetch_html(
        &self,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> Result<String, TransportError> {
        let fields = form
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let bytes = self
            .send(Method::POST, endpoint, Some(Payload::Form(fields)))
            .await?;
        Ok(decode_html(endpoint, bytes))
    }
}

/// Pages that are not valid UTF-8 are read as ISO-8859-1, which maps every byte.
fn decode_html(endpoint: &str, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(html) => html,
        Err(e) => {
            tracing::debug!(
                "Response from {endpoint} is not UTF-8 ({}), decoding as ISO-8859-1",
                e.utf8_error()
            );
            e.into_bytes().into_iter().map(char::from).collect()
        }
    }
}
