use std::collections::HashMap;

use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;

use crate::error::{ProbeError, ProbeResult};
use crate::payload::{self, LeafType};

/// One `(field, description)` pair the server returned for a malformed input location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default, rename = "fieldViolations")]
    field_violations: Vec<RawViolation>,
}

#[derive(Debug, Deserialize)]
struct RawViolation {
    field: String,
    description: String,
}

/// Thin wrapper over `reqwest` that always addresses one fixed (method, url, headers) target with
/// `Content-Type: application/json+protobuf`, the same request shape the original tool's
/// `fasthttp`-based `probeAPI`/`testAPI` sent.
pub struct ProbeClient {
    client: Client,
    method: Method,
    url: String,
    headers: HashMap<String, String>,
}

impl ProbeClient {
    pub fn new(method: &str, url: &str, headers: HashMap<String, String>) -> ProbeResult<Self> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ProbeError::Configuration(format!("invalid HTTP method {method:?}")))?;
        Ok(ProbeClient {
            client: Client::new(),
            method,
            url: canonicalize_url(url)?,
            headers,
        })
    }

    /// Sends a raw request, returning status, response content type, and body — used by the
    /// preflight check, which cares about the status code rather than the violation list.
    async fn send(&self, body: Vec<u8>) -> ProbeResult<(StatusCode, String, Vec<u8>)> {
        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .header("Content-Type", "application/json+protobuf")
            .body(body);

        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|source| ProbeError::Transport {
            url: self.url.clone(),
            source,
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.bytes().await.map_err(|source| ProbeError::Transport {
            url: self.url.clone(),
            source,
        })?;

        Ok((status, content_type, body.to_vec()))
    }

    /// Sends a single probe at `index_path` with the given leaf type and parses out the violation
    /// list. An `application/json` response with no `details` yields an empty list (spec.md
    /// §4.2); any other content type is a fatal `UnsupportedContentType`.
    pub async fn probe(
        &self,
        index_path: &[i32],
        leaf_type: LeafType,
    ) -> ProbeResult<Vec<FieldViolation>> {
        let body = payload::generate_bytes(index_path, leaf_type);
        let (_status, content_type, body) = self.send(body).await?;
        parse_violations(&content_type, &body)
    }

    /// Sends the str-leaf and int-leaf probes at the request root. Aborts (per spec.md §4.2) if
    /// neither returns HTTP 400 — the endpoint is then not a JSON-validating protobuf API.
    pub async fn preflight(&self) -> ProbeResult<()> {
        let str_body = payload::generate_bytes(&[], LeafType::Str);
        let (status1, _, _) = self.send(str_body).await?;

        let int_body = payload::generate_bytes(&[], LeafType::Int);
        let (status2, _, _) = self.send(int_body).await?;

        if status1 != StatusCode::BAD_REQUEST && status2 != StatusCode::BAD_REQUEST {
            return Err(ProbeError::InferenceImpossible {
                url: self.url.clone(),
            });
        }

        Ok(())
    }
}

fn parse_violations(content_type: &str, body: &[u8]) -> ProbeResult<Vec<FieldViolation>> {
    if content_type.contains("application/json+protobuf") {
        return Err(ProbeError::UnsupportedContentType {
            content_type: content_type.to_string(),
        });
    }

    if !content_type.contains("application/json") {
        return Err(ProbeError::UnsupportedContentType {
            content_type: content_type.to_string(),
        });
    }

    let response: ErrorResponse = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(_) => return Ok(Vec::new()),
    };

    let violations = response
        .error
        .details
        .into_iter()
        .flat_map(|detail| detail.field_violations)
        .map(|v| FieldViolation {
            field: v.field,
            description: v.description,
        })
        .collect();

    Ok(violations)
}

/// Forces the URL's `alt` query parameter to `json`, adding it if absent — matching the original
/// tool's `modifyAltParameter`.
pub fn canonicalize_url(input: &str) -> ProbeResult<String> {
    let mut url = reqwest::Url::parse(input)
        .map_err(|e| ProbeError::Configuration(format!("unparseable URL {input:?}: {e}")))?;

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "alt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.push(("alt".to_string(), "json".to_string()));

    url.query_pairs_mut().clear().extend_pairs(&pairs);
    Ok(url.to_string())
}
