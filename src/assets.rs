//! Fetchers for the three read-only asset catalogs.
//!
//! These endpoints are unauthenticated and independent of the session;
//! each returns a JSON envelope keyed by the catalog kind. The client
//! fetches them concurrently at construction, but they are also usable
//! standalone.

use reqwest::Client;
use serde::Deserialize;

use crate::error::{FireflyError, Result};
use crate::types::{ImageStyle, TextFont, TextPreset, ASSET_BASE_URL, ORIGIN, USER_AGENT};

#[derive(Deserialize)]
struct StylesEnvelope {
    styles: Vec<ImageStyle>,
}

#[derive(Deserialize)]
struct PresetsEnvelope {
    presets: Vec<TextPreset>,
}

#[derive(Deserialize)]
struct FontsEnvelope {
    fonts: Vec<TextFont>,
}

async fn fetch_catalog<T: serde::de::DeserializeOwned>(http: &Client, path: &str) -> Result<T> {
    let url = format!("{}{}/en-US/content.json", ASSET_BASE_URL, path);
    let resp = http
        .get(&url)
        .header("Origin", ORIGIN)
        .header("User-Agent", USER_AGENT)
        .send()
        .await
        .map_err(|e| FireflyError::Network {
            context: format!("Failed to fetch asset catalog {}", path),
            source: e,
        })?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(FireflyError::Http { status, body });
    }

    resp.json().await.map_err(|e| FireflyError::Network {
        context: format!("Failed to parse asset catalog {}", path),
        source: e,
    })
}

/// Fetch the image-styles catalog.
pub async fn fetch_image_styles(http: &Client) -> Result<Vec<ImageStyle>> {
    let envelope: StylesEnvelope = fetch_catalog(http, "image-styles/v4").await?;
    Ok(envelope.styles)
}

/// Fetch the text-presets catalog.
pub async fn fetch_text_presets(http: &Client) -> Result<Vec<TextPreset>> {
    let envelope: PresetsEnvelope = fetch_catalog(http, "text-presets/v3").await?;
    Ok(envelope.presets)
}

/// Fetch the text-fonts catalog.
pub async fn fetch_text_fonts(http: &Client) -> Result<Vec<TextFont>> {
    let envelope: FontsEnvelope = fetch_catalog(http, "text-fonts/v2").await?;
    Ok(envelope.fonts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styles_envelope() {
        let envelope: StylesEnvelope = serde_json::from_str(
            r#"{
            "version": "4.0",
            "styles": [
                {
                    "id": "hyper_realistic",
                    "title": "Hyper realistic",
                    "group": "popular",
                    "style_prompt": "hyper realistic, photorealistic",
                    "anchor_prompt": "photo"
                }
            ]
        }"#,
        )
        .unwrap();
        assert_eq!(envelope.styles.len(), 1);
        assert_eq!(envelope.styles[0].title, "Hyper realistic");
    }

    #[test]
    fn test_presets_envelope() {
        let envelope: PresetsEnvelope = serde_json::from_str(
            r#"{
            "presets": [
                {"id": "snake", "title": "Snake", "prompt": "snake scales", "seedSuggestions": [7]}
            ]
        }"#,
        )
        .unwrap();
        assert_eq!(envelope.presets[0].seed_suggestions, vec![7]);
    }

    #[test]
    fn test_fonts_envelope() {
        let envelope: FontsEnvelope = serde_json::from_str(
            r#"{"fonts": [{"id": "source-sans", "label": "Source Sans"}]}"#,
        )
        .unwrap();
        assert_eq!(envelope.fonts[0].label, "Source Sans");
    }
}
