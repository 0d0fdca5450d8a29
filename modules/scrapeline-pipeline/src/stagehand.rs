// Production SessionProvider backed by the hosted Stagehand API.

use async_trait::async_trait;
use anyhow::Result;

use stagehand_client::{StagehandClient, StagehandSession, WaitUntil};

use crate::traits::{BrowserSession, SessionProvider, WaitPolicy};

pub struct StagehandProvider {
    client: StagehandClient,
}

impl StagehandProvider {
    pub fn new(client: StagehandClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionProvider for StagehandProvider {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let session = self.client.start_session().await?;
        tracing::info!(session_id = session.id(), "Browser session opened");
        Ok(Box::new(session))
    }
}

fn wait_until(policy: WaitPolicy) -> WaitUntil {
    match policy {
        WaitPolicy::Load => WaitUntil::Load,
        WaitPolicy::NetworkIdle => WaitUntil::NetworkIdle,
    }
}

#[async_trait]
impl BrowserSession for StagehandSession {
    async fn goto(&mut self, url: &str, wait: WaitPolicy) -> Result<()> {
        self.navigate(url, wait_until(wait)).await?;
        Ok(())
    }

    async fn extract(
        &mut self,
        instruction: &str,
        schema: &serde_json::Value,
    ) -> Result<Vec<serde_json::Value>> {
        Ok(StagehandSession::extract(self, instruction, schema).await?)
    }

    async fn close(&mut self) -> Result<()> {
        self.end().await?;
        Ok(())
    }
}
