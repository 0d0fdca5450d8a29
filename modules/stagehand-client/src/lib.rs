pub mod error;
pub mod types;

pub use error::{Result, StagehandError};
pub use types::WaitUntil;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use types::{
    ExtractRequest, ExtractResponse, NavigateOptions, NavigateRequest, StartSessionRequest,
    StartSessionResponse,
};

pub const DEFAULT_BASE_URL: &str = "https://api.stagehand.browserbase.com";

const API_KEY_HEADER: &str = "x-bb-api-key";
const PROJECT_ID_HEADER: &str = "x-bb-project-id";

/// Remote calls include page loads and LLM extraction, so the budget is generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
struct Api {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    project_id: String,
}

impl Api {
    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let text = self.post_raw(path, body).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn post_raw<B: Serialize>(&self, path: &str, body: &B) -> Result<String> {
        let endpoint = format!("{}/v1{}", self.base_url, path);

        let resp = self
            .client
            .post(&endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .header(PROJECT_ID_HEADER, &self.project_id)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StagehandError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}

pub struct StagehandClient {
    api: Api,
    model_name: Option<String>,
}

impl StagehandClient {
    pub fn new(base_url: &str, api_key: &str, project_id: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            api: Api {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: api_key.to_string(),
                project_id: project_id.to_string(),
            },
            model_name: None,
        })
    }

    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    /// Start a managed browser session. The caller owns the returned session
    /// and must `end` it.
    pub async fn start_session(&self) -> Result<StagehandSession> {
        let body = StartSessionRequest {
            project_id: &self.api.project_id,
            model_name: self.model_name.as_deref(),
        };
        let resp: StartSessionResponse = self.api.post("/sessions/start", &body).await?;
        debug!(session_id = %resp.session_id, "Stagehand session started");

        Ok(StagehandSession {
            api: self.api.clone(),
            id: resp.session_id,
            ended: false,
        })
    }
}

/// One live remote browser session.
pub struct StagehandSession {
    api: Api,
    id: String,
    ended: bool,
}

impl StagehandSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn ensure_open(&self) -> Result<()> {
        if self.ended {
            return Err(StagehandError::SessionClosed(self.id.clone()));
        }
        Ok(())
    }

    pub async fn navigate(&self, url: &str, wait_until: WaitUntil) -> Result<()> {
        self.ensure_open()?;
        let body = NavigateRequest {
            url,
            options: NavigateOptions { wait_until },
        };
        self.api
            .post_raw(&format!("/sessions/{}/navigate", self.id), &body)
            .await?;
        debug!(session_id = %self.id, url, "Navigated");
        Ok(())
    }

    /// Run an instruction-driven extraction against the current page.
    /// Returns the `items` array of the extracted object; a response without
    /// `items` is treated as an empty extraction.
    pub async fn extract(
        &self,
        instruction: &str,
        schema: &serde_json::Value,
    ) -> Result<Vec<serde_json::Value>> {
        self.ensure_open()?;
        let body = ExtractRequest {
            instruction,
            schema_definition: schema,
        };
        let resp: ExtractResponse = self
            .api
            .post(&format!("/sessions/{}/extract", self.id), &body)
            .await?;
        let items = resp.data.items.unwrap_or_default();
        debug!(session_id = %self.id, count = items.len(), "Extracted items");
        Ok(items)
    }

    /// End the session. Idempotent on the client side.
    pub async fn end(&mut self) -> Result<()> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;
        self.api
            .post_raw(&format!("/sessions/{}/end", self.id), &serde_json::json!({}))
            .await?;
        debug!(session_id = %self.id, "Stagehand session ended");
        Ok(())
    }
}
