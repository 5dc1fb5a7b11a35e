

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::base::{
    CollectionRef, DEFAULT_MAX_BATCH_SIZE, DocumentPage, DocumentRef, DocumentStore, StoreError,
    WriteBatch,
};
use super::path::DocumentPath;
use crate::core::config::CascadeConfig;


const PRODUCTION_ENDPOINT: &str = "https://firestore.googleapis.com/v1/";

const EMULATOR_TOKEN: &str = "owner";

const LISTING_PAGE_SIZE: usize = 300;

const INITIAL_RETRY_DELAY_MS: u64 = 100;

const MAX_RETRY_DELAY_MS: u64 = 10000;


#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    pub project_id: String,
    pub database: String,
    pub emulator_host: Option<String>,
    pub access_token: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl From<&CascadeConfig> for FirestoreSettings {
    fn from(config: &CascadeConfig) -> Self {
        Self {
            project_id: config.project_id.clone(),
            database: config.database.clone(),
            emulator_host: config.emulator_host.clone(),
            access_token: config.access_token.clone(),
            timeout: Duration::from_secs(config.timeout),
            max_retries: config.max_retries,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionIdsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionIdsResponse {
    #[serde(default)]
    collection_ids: Vec<String>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommitRequest {
    writes: Vec<DeleteWrite>,
}

#[derive(Debug, Serialize)]
struct DeleteWrite {
    delete: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    #[serde(default)]
    write_results: Vec<serde_json::Value>,
    #[serde(default)]
    commit_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

fn is_retryable(error: &StoreError) -> bool {
    match error {
        StoreError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.status().is_some_and(|s| {
                    s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                })
        }
        StoreError::Status { code, .. } => {
            *code == StatusCode::TOO_MANY_REQUESTS.as_u16() || *code >= 500
        }
        _ => false,
    }
}


struct Transport {
    client: Client,
    base_url: Url,
    database_name: String,
    token: Option<String>,
    max_retries: u32,
}

impl Transport {
    fn url(&self, relative: &[String], suffix: &str) -> Result<Url, StoreError> {
        let mut parts: Vec<String> = self.database_name.split('/').map(str::to_string).collect();
        parts.extend(relative.iter().cloned());
        if let Some(last) = parts.last_mut() {
            last.push_str(suffix);
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidResponse("endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(parts.iter().map(String::as_str));
        Ok(url)
    }

    fn document_name(&self, path: &DocumentPath) -> String {
        format!("{}/{}", self.database_name, path)
    }

    fn relative_path(&self, name: &str) -> Result<DocumentPath, StoreError> {
        let relative = name
            .strip_prefix(&self.database_name)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| {
                StoreError::InvalidResponse(format!("document {} is outside {}", name, self.database_name))
            })?;
        Ok(DocumentPath::parse(relative)?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute<T: DeserializeOwned + Send>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(StoreError::Status {
                code: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<T>().await?)
    }

    /// Runs an idempotent read, retrying transient failures with backoff.
    async fn read<T, F>(&self, operation: &str, build: F) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Send,
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let attempts = self.max_retries + 1;
        let mut delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!("Executing {} (attempt {})", operation, attempt);
            match self.execute::<T>(build()).await {
                Ok(result) => return Ok(result),
                Err(e) if is_retryable(&e) && attempt < attempts => {
                    debug!("{} failed (attempt {}), retrying: {}", operation, attempt, e);
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_millis(MAX_RETRY_DELAY_MS));
                    attempt += 1;
                }
                Err(e) if is_retryable(&e) && attempts > 1 => {
                    warn!("{} failed after {} attempts: {}", operation, attempts, e);
                    return Err(StoreError::RetryExhausted(attempts, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
    }
}


/// Firestore over its REST API. Batches commit through `documents:commit`,
/// which applies all writes atomically.
pub struct FirestoreStore {
    transport: Arc<Transport>,
}

impl FirestoreStore {
    pub fn new(settings: FirestoreSettings) -> Result<Self, StoreError> {
        let (base_url, token) = match &settings.emulator_host {
            Some(host) => {
                let url = Url::parse(&format!("http://{}/v1/", host))
                    .map_err(|e| StoreError::Unavailable(format!("invalid emulator host {}: {}", host, e)))?;
                (url, Some(EMULATOR_TOKEN.to_string()))
            }
            None => {
                let url = Url::parse(PRODUCTION_ENDPOINT)
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                (url, settings.access_token.clone())
            }
        };

        let client = Client::builder().timeout(settings.timeout).build()?;
        let database_name = format!(
            "projects/{}/databases/{}/documents",
            settings.project_id, settings.database
        );

        if settings.emulator_host.is_none() && token.is_none() {
            warn!("No access token configured for Firestore; requests will be unauthenticated");
        }
        info!("FirestoreStore created for {} at {}", database_name, base_url);

        Ok(Self {
            transport: Arc::new(Transport {
                client,
                base_url,
                database_name,
                token,
                max_retries: settings.max_retries,
            }),
        })
    }

    pub fn from_config(config: &CascadeConfig) -> Result<Self, StoreError> {
        Self::new(FirestoreSettings::from(config))
    }

    pub fn database_name(&self) -> &str {
        &self.transport.database_name
    }
}


struct FirestoreBatch {
    transport: Arc<Transport>,
    names: Vec<String>,
}

#[async_trait]
impl WriteBatch for FirestoreBatch {
    fn delete(&mut self, document: &DocumentRef) {
        self.names.push(self.transport.document_name(&document.path));
    }

    fn len(&self) -> usize {
        self.names.len()
    }

    async fn commit(self: Box<Self>) -> Result<usize, StoreError> {
        if self.names.is_empty() {
            return Ok(0);
        }

        let url = self.transport.url(&[], ":commit")?;
        let request = CommitRequest {
            writes: self
                .names
                .iter()
                .map(|name| DeleteWrite { delete: name.clone() })
                .collect(),
        };

        let response: CommitResponse = self
            .transport
            .execute(self.transport.client.post(url).json(&request))
            .await?;
        debug!(
            "Committed {} deletes at {}",
            response.write_results.len(),
            response.commit_time.as_deref().unwrap_or("unknown time")
        );
        Ok(self.names.len())
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn list_child_collections(
        &self,
        parent: &DocumentPath,
    ) -> Result<Vec<CollectionRef>, StoreError> {
        let url = self.transport.url(parent.segments(), ":listCollectionIds")?;
        let mut collections = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let body = ListCollectionIdsRequest {
                page_token: page_token.clone(),
            };
            let response: ListCollectionIdsResponse = self
                .transport
                .read("listCollectionIds", || self.transport.client.post(url.clone()).json(&body))
                .await?;

            for id in response.collection_ids {
                collections.push(CollectionRef::new(parent.collection(&id)?));
            }

            page_token = non_empty(response.next_page_token);
            if page_token.is_none() {
                break;
            }
        }

        debug!("Found {} collections under {}", collections.len(), parent);
        Ok(collections)
    }

    async fn list_documents(&self, collection: &CollectionRef) -> Result<Vec<DocumentRef>, StoreError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_documents_page(collection, LISTING_PAGE_SIZE, page_token.as_deref())
                .await?;
            documents.extend(page.documents);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(documents)
    }

    async fn list_documents_page(
        &self,
        collection: &CollectionRef,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, StoreError> {
        let mut url = self.transport.url(collection.path.segments(), "")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("pageSize", &page_size.to_string())
                .append_pair("mask.fieldPaths", "__name__")
                .append_pair("showMissing", "true");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let response: ListDocumentsResponse = self
            .transport
            .read("listDocuments", || self.transport.client.get(url.clone()))
            .await?;

        let documents = response
            .documents
            .iter()
            .map(|raw| self.transport.relative_path(&raw.name).map(DocumentRef::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DocumentPage {
            documents,
            next_page_token: non_empty(response.next_page_token),
        })
    }

    fn new_batch(&self) -> Box<dyn WriteBatch> {
        Box::new(FirestoreBatch {
            transport: Arc::clone(&self.transport),
            names: Vec::new(),
        })
    }

    fn max_batch_size(&self) -> usize {
        DEFAULT_MAX_BATCH_SIZE
    }

    fn store_name(&self) -> &str {
        "firestore"
    }
}
