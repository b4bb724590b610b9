//! Notifier settings endpoints.

use sw_core::constants::NOTIFIERS_API_PATH;
use sw_core::error::SwResult;

use crate::client::ApiClient;
use crate::models::{NotifierDocument, NotifierKind};

impl ApiClient {
    /// Settings endpoints of one notifier.
    pub fn notifier(&self, kind: NotifierKind) -> NotifierSettings<'_> {
        NotifierSettings { client: self, kind }
    }
}

/// Operations on `/api/notifiers/{kind}`.
pub struct NotifierSettings<'a> {
    client: &'a ApiClient,
    kind: NotifierKind,
}

impl NotifierSettings<'_> {
    pub fn kind(&self) -> NotifierKind {
        self.kind
    }

    fn path(&self) -> String {
        format!("{NOTIFIERS_API_PATH}/{}", self.kind)
    }

    pub async fn load(&self) -> SwResult<NotifierDocument> {
        self.client.get_json(&self.path()).await
    }

    /// Replace the stored document.
    pub async fn save(&self, document: &NotifierDocument) -> SwResult<()> {
        let body = serde_json::to_value(document)?;
        self.client.put(&self.path(), &body).await?;
        Ok(())
    }

    /// Merge `changes` into the stored document.
    pub async fn update(&self, changes: &serde_json::Value) -> SwResult<()> {
        self.client.patch(&self.path(), changes).await?;
        Ok(())
    }

    pub async fn set_enabled(&self, enabled: bool) -> SwResult<()> {
        self.update(&serde_json::json!({ "enabled": enabled })).await
    }

    /// Unlink the notifier from the account.
    pub async fn disconnect(&self) -> SwResult<()> {
        self.client.delete(&self.path()).await?;
        Ok(())
    }
}
