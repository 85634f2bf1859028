use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::errors::ServiceError;
use crate::models::{CatalogStatus, ClipReference, CorpusSelection, SentenceCandidate};
use crate::services::{
    CatalogService, ClipMerger, ClipRenderer, DialogueResponder, RhymeFinder, SentenceSampler,
    SentenceSearch,
};

/// Client for the subtitle backend's JSON API
#[derive(Debug, Clone)]
pub struct HttpBackend {
    /// HTTP client for API requests
    client: Client,
    /// Base URL every API path is resolved against
    base_url: Url,
}

/// Sentence as serialized by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentencePayload {
    pub drama_id: String,
    pub episode: String,
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    #[serde(default, alias = "score", skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
}

impl From<SentencePayload> for SentenceCandidate {
    fn from(payload: SentencePayload) -> Self {
        Self {
            corpus_id: payload.drama_id,
            episode_id: payload.episode,
            text: payload.text,
            start_seconds: payload.start_seconds,
            end_seconds: payload.end_seconds,
            match_score: payload.match_score,
        }
    }
}

/// Envelope of every sentence-returning endpoint
#[derive(Debug, Deserialize)]
pub struct SentenceListResponse {
    #[serde(default)]
    pub results: Vec<SentencePayload>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct DialogueRequest<'a> {
    sentence_text: &'a str,
    drama_id: &'a str,
    episode: &'a str,
    drama_ids: String,
}

#[derive(Debug, Serialize)]
struct ClipRequest<'a> {
    drama_id: &'a str,
    episode: &'a str,
    start_time: f64,
    end_time: f64,
    context_seconds: f64,
}

#[derive(Debug, Deserialize)]
struct ClipResponse {
    clip_url: String,
}

#[derive(Debug, Serialize)]
struct MergeRequest<'a> {
    clip_urls: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    merged_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Decode a sentence list body, dropping entries that violate the sentence constraints
pub fn decode_sentences(body: &str) -> Result<Vec<SentenceCandidate>, ServiceError> {
    let response: SentenceListResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::ParseError(format!("sentence list: {}", e)))?;

    if let Some(message) = &response.error {
        debug!("Backend returned a note with its results: {}", message);
    }

    Ok(response
        .results
        .into_iter()
        .map(SentenceCandidate::from)
        .filter(|candidate| match candidate.validate() {
            Ok(()) => true,
            Err(reason) => {
                warn!("Dropping invalid sentence {:?}: {}", candidate.text, reason);
                false
            }
        })
        .collect())
}

/// Build the error for a non-success response body
pub fn decode_error(status_code: u16, body: &str) -> ServiceError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string());
    ServiceError::ApiError {
        status_code,
        message,
    }
}

impl HttpBackend {
    /// Create a new client for the backend at `endpoint`
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, ServiceError> {
        let mut base_url = Url::parse(endpoint)
            .map_err(|e| ServiceError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::InvalidEndpoint(endpoint.to_string()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ServiceError::RequestFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an API path or a returned relative URL against the base URL
    pub fn resolve(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ServiceError::InvalidEndpoint(format!("{}: {}", path, e)))
    }

    async fn read_body(response: Response) -> Result<String, ServiceError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("Backend error ({}): {}", status, body);
            return Err(decode_error(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String, ServiceError> {
        let url = self.resolve(path)?;
        debug!("GET {} {:?}", url, query);
        let response = self.client.get(url).query(query).send().await?;
        Self::read_body(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.resolve(path)?;
        debug!("POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        let text = Self::read_body(response).await?;
        serde_json::from_str(&text)
            .map_err(|e| ServiceError::ParseError(format!("{}: {}", path, e)))
    }

    /// Download a rendered or merged video to `destination`, returning its size in bytes
    pub async fn download(
        &self,
        reference: &ClipReference,
        destination: &Path,
    ) -> Result<u64, ServiceError> {
        let url = self.resolve(reference.as_str())?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(decode_error(status.as_u16(), &body));
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(destination, &bytes).await.map_err(|e| {
            ServiceError::RequestFailed(format!("Failed to write {}: {}", destination.display(), e))
        })?;
        Ok(bytes.len() as u64)
    }
}

#[async_trait]
impl SentenceSampler for HttpBackend {
    async fn sample_random(
        &self,
        count: usize,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, ServiceError> {
        let body = self
            .get_text(
                "api/random_sentences",
                &[("count", count.to_string()), ("drama_ids", corpora.to_param())],
            )
            .await?;
        decode_sentences(&body)
    }
}

#[async_trait]
impl SentenceSearch for HttpBackend {
    async fn search(
        &self,
        query: &str,
        anchored: bool,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, ServiceError> {
        // The backend compiles every query as a pattern, so literals are escaped
        let query = if anchored {
            query.to_string()
        } else {
            regex::escape(query)
        };
        let mut params = vec![("query", query), ("drama_ids", corpora.to_param())];
        if anchored {
            params.push(("regex", "true".to_string()));
        }
        let body = self.get_text("api/search", &params).await?;
        decode_sentences(&body)
    }
}

#[async_trait]
impl RhymeFinder for HttpBackend {
    async fn find_rhyming(
        &self,
        text: &str,
        min_length: usize,
        max_length: usize,
        limit: usize,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, ServiceError> {
        let body = self
            .get_text(
                "api/rhyming_sentences",
                &[
                    ("text", text.to_string()),
                    ("min_length", min_length.to_string()),
                    ("max_length", max_length.to_string()),
                    ("limit", limit.to_string()),
                    ("drama_ids", corpora.to_param()),
                ],
            )
            .await?;
        decode_sentences(&body)
    }
}

#[async_trait]
impl DialogueResponder for HttpBackend {
    async fn find_dialogue_responses(
        &self,
        text: &str,
        corpus_id: &str,
        episode_id: &str,
        corpora: &CorpusSelection,
    ) -> Result<Vec<SentenceCandidate>, ServiceError> {
        let request = DialogueRequest {
            sentence_text: text,
            drama_id: corpus_id,
            episode: episode_id,
            drama_ids: corpora.to_param(),
        };
        let url = self.resolve("api/dialogue_responses")?;
        let response = self.client.post(url).json(&request).send().await?;
        let body = Self::read_body(response).await?;
        decode_sentences(&body)
    }
}

#[async_trait]
impl ClipRenderer for HttpBackend {
    async fn render_clip(
        &self,
        corpus_id: &str,
        episode_id: &str,
        start: f64,
        end: f64,
        padding: f64,
    ) -> Result<ClipReference, ServiceError> {
        let request = ClipRequest {
            drama_id: corpus_id,
            episode: episode_id,
            start_time: start,
            end_time: end,
            context_seconds: padding,
        };
        let response: ClipResponse = self.post_json("api/generate_clip", &request).await?;
        let url = self.resolve(&response.clip_url)?;
        Ok(ClipReference::new(url.as_str()))
    }
}

#[async_trait]
impl ClipMerger for HttpBackend {
    async fn merge_clips(&self, clips: &[ClipReference]) -> Result<ClipReference, ServiceError> {
        let request = MergeRequest {
            clip_urls: clips.iter().map(ClipReference::as_str).collect(),
        };
        let response: MergeResponse = self.post_json("api/merge_clips", &request).await?;
        let url = self.resolve(&response.merged_url)?;
        Ok(ClipReference::new(url.as_str()))
    }
}

#[async_trait]
impl CatalogService for HttpBackend {
    async fn catalog_status(&self) -> Result<CatalogStatus, ServiceError> {
        let body = self.get_text("api/status", &[]).await?;
        serde_json::from_str(&body).map_err(|e| ServiceError::ParseError(format!("status: {}", e)))
    }
}
