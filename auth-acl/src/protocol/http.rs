//! OpenFGA HTTP transport
//!
//! Speaks the engine's REST API (`/stores`, `/stores/{id}/check`, ...). Paged
//! endpoints are followed until the continuation token is exhausted so
//! callers always see complete results.

use crate::{error::EngineError, models::*, protocol::EngineTransport};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const READ_PAGE_SIZE: u32 = 100;

/// One HTTP connection to an OpenFGA server
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport for `host:port`. A host that already carries a
    /// scheme is used as-is.
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, EngineError> {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host.trim_end_matches('/'), port)
        } else {
            format!("http://{}:{}", host, port)
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call<B, R>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<R, EngineError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            EngineError::Unavailable(format!("request to {} failed: {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| EngineError::InvalidResponse(format!("{}: {}", path, e)))
    }
}

fn continuation_query(token: &str) -> Vec<(&'static str, &str)> {
    if token.is_empty() {
        Vec::new()
    } else {
        vec![("continuation_token", token)]
    }
}

/// Map a non-2xx engine response onto the error taxonomy
fn classify_failure(status: StatusCode, body: &str) -> EngineError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return EngineError::Unavailable(format!("engine answered {}: {}", status, body));
    }

    let failure: ErrorBody = serde_json::from_str(body).unwrap_or_else(|_| ErrorBody {
        code: status.as_str().to_string(),
        message: body.to_string(),
    });

    let message = failure.message.to_lowercase();
    let names_missing_type = message.contains("type '") && message.contains("not found");
    if failure.code == "type_not_found" || names_missing_type {
        return EngineError::TypeNotFound(failure.message);
    }

    EngineError::Rejected {
        code: failure.code,
        message: failure.message,
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListStoresResponse {
    #[serde(default)]
    stores: Vec<StoreInfo>,
    #[serde(default)]
    continuation_token: String,
}

#[derive(Debug, Deserialize)]
struct ModelSummary {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ReadModelsResponse {
    #[serde(default)]
    authorization_models: Vec<ModelSummary>,
    #[serde(default)]
    continuation_token: String,
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    tuple_key: &'a TupleKey,
    authorization_model_id: &'a str,
    consistency: Consistency,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    allowed: bool,
}

#[derive(Debug, Serialize)]
struct TupleKeys<'a> {
    tuple_keys: &'a [TupleKey],
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    writes: Option<TupleKeys<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deletes: Option<TupleKeys<'a>>,
    authorization_model_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct Empty {}

#[derive(Debug, Serialize)]
struct ReadRequest<'a> {
    tuple_key: &'a TupleFilter,
    page_size: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    continuation_token: &'a str,
    consistency: Consistency,
}

#[derive(Debug, Deserialize)]
struct StoredTuple {
    key: TupleKey,
}

#[derive(Debug, Deserialize)]
struct ReadResponse {
    #[serde(default)]
    tuples: Vec<StoredTuple>,
    #[serde(default)]
    continuation_token: String,
}

#[derive(Debug, Serialize)]
struct ListObjectsRequest<'a> {
    authorization_model_id: &'a str,
    #[serde(rename = "type")]
    object_type: &'a str,
    relation: &'a str,
    user: &'a str,
    consistency: Consistency,
}

#[derive(Debug, Deserialize)]
struct ListObjectsResponse {
    #[serde(default)]
    objects: Vec<String>,
}

#[async_trait]
impl EngineTransport for HttpTransport {
    async fn list_stores(&self) -> Result<Vec<StoreInfo>, EngineError> {
        let mut stores = Vec::new();
        let mut token = String::new();
        loop {
            let query = continuation_query(&token);
            let page: ListStoresResponse = self
                .call::<(), _>(Method::GET, "/stores", &query, None)
                .await?;
            stores.extend(page.stores);
            if page.continuation_token.is_empty() {
                break;
            }
            token = page.continuation_token;
        }
        Ok(stores)
    }

    async fn read_authorization_models(&self, store_id: &str) -> Result<Vec<String>, EngineError> {
        let mut models = Vec::new();
        let mut token = String::new();
        loop {
            let path = format!("/stores/{}/authorization-models", store_id);
            let query = continuation_query(&token);
            let page: ReadModelsResponse = self
                .call::<(), _>(Method::GET, &path, &query, None)
                .await?;
            models.extend(page.authorization_models.into_iter().map(|m| m.id));
            if page.continuation_token.is_empty() {
                break;
            }
            token = page.continuation_token;
        }
        Ok(models)
    }

    async fn check(
        &self,
        model: &AuthorizationModel,
        key: &TupleKey,
        consistency: Consistency,
    ) -> Result<bool, EngineError> {
        let request = CheckRequest {
            tuple_key: key,
            authorization_model_id: &model.model_id,
            consistency,
        };
        let path = format!("/stores/{}/check", model.store_id);
        let response: CheckResponse = self.call(Method::POST, &path, &[], Some(&request)).await?;
        debug!("Engine check {} -> {} ({:?})", key, response.allowed, consistency);
        Ok(response.allowed)
    }

    async fn write(
        &self,
        model: &AuthorizationModel,
        writes: &[TupleKey],
        deletes: &[TupleKey],
    ) -> Result<(), EngineError> {
        if writes.is_empty() && deletes.is_empty() {
            return Ok(());
        }
        let request = WriteRequest {
            writes: (!writes.is_empty()).then_some(TupleKeys { tuple_keys: writes }),
            deletes: (!deletes.is_empty()).then_some(TupleKeys { tuple_keys: deletes }),
            authorization_model_id: &model.model_id,
        };
        let path = format!("/stores/{}/write", model.store_id);
        let _: Empty = self.call(Method::POST, &path, &[], Some(&request)).await?;
        Ok(())
    }

    async fn read(
        &self,
        model: &AuthorizationModel,
        filter: &TupleFilter,
        consistency: Consistency,
    ) -> Result<Vec<TupleKey>, EngineError> {
        let path = format!("/stores/{}/read", model.store_id);
        let mut tuples = Vec::new();
        let mut token = String::new();
        loop {
            let request = ReadRequest {
                tuple_key: filter,
                page_size: READ_PAGE_SIZE,
                continuation_token: &token,
                consistency,
            };
            let page: ReadResponse = self.call(Method::POST, &path, &[], Some(&request)).await?;
            tuples.extend(page.tuples.into_iter().map(|t| t.key));
            if page.continuation_token.is_empty() {
                break;
            }
            token = page.continuation_token;
        }
        Ok(tuples)
    }

    async fn list_objects(
        &self,
        model: &AuthorizationModel,
        user: &str,
        relation: &str,
        object_type: &str,
        consistency: Consistency,
    ) -> Result<Vec<String>, EngineError> {
        let request = ListObjectsRequest {
            authorization_model_id: &model.model_id,
            object_type,
            relation,
            user,
            consistency,
        };
        let path = format!("/stores/{}/list-objects", model.store_id);
        let response: ListObjectsResponse = self
            .call(Method::POST, &path, &[], Some(&request))
            .await?;
        Ok(response.objects)
    }
}
