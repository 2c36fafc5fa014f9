use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::assets::AssetMetadata;

#[derive(Debug, Clone, PartialEq)]
pub enum Icon {
    Image { content_type: String, bytes: Vec<u8> },
    /// Shown when the image service cannot deliver; carries the text to render instead.
    TextFallback(String),
}

/// Best-effort token icon fetcher. Never fails; errors become a text fallback.
#[derive(Clone)]
pub struct IconService {
    client: reqwest::Client,
}

impl IconService {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    pub async fn fetch(&self, metadata: &AssetMetadata) -> Icon {
        let Some(url) = metadata.icon_url.as_deref() else {
            return Icon::TextFallback(metadata.symbol.clone());
        };

        match self.try_fetch(url).await {
            Ok(icon) => icon,
            Err(e) => {
                debug!(url = %url, error = %e, "Icon unavailable, using text fallback");
                Icon::TextFallback(metadata.symbol.clone())
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> anyhow::Result<Icon> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("icon service returned {}", response.status());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        if !content_type.starts_with("image/") {
            anyhow::bail!("unexpected content type {}", content_type);
        }

        let bytes = response.bytes().await?.to_vec();
        Ok(Icon::Image {
            content_type,
            bytes,
        })
    }
}

impl Default for IconService {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}
