use tracing::debug;

/// Client for the external attachment store. The core never handles binary
/// content itself; messages carry opaque references produced by the upload
/// service, and the only call we make is the best-effort delete when a
/// message is removed.
#[derive(Clone)]
pub struct AttachmentStore {
    base_url: Option<String>,
    http: reqwest::Client,
}

impl AttachmentStore {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// Store with no backing service; delete becomes a logged no-op.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub async fn delete(&self, attachment_id: &str) -> anyhow::Result<()> {
        let Some(base) = &self.base_url else {
            debug!(attachment_id, "no attachment store configured, skipping cleanup");
            return Ok(());
        };

        let url = format!("{}/attachments/{}", base.trim_end_matches('/'), attachment_id);
        let resp = self.http.delete(&url).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("attachment store returned {}", resp.status());
        }
        Ok(())
    }
}
