use serde::{Deserialize, Serialize};

/// When a navigation is considered finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartSessionRequest<'a> {
    pub project_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NavigateRequest<'a> {
    pub url: &'a str,
    pub options: NavigateOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NavigateOptions {
    pub wait_until: WaitUntil,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExtractRequest<'a> {
    pub instruction: &'a str,
    pub schema_definition: &'a serde_json::Value,
}

/// Envelope returned by `/extract`. The extracted object lives under `data`
/// and, for list-shaped schemas, carries its rows under `items`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExtractResponse {
    #[serde(default)]
    pub data: ExtractedData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ExtractedData {
    #[serde(default)]
    pub items: Option<Vec<serde_json::Value>>,
}
