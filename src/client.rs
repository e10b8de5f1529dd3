use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::assets;
use crate::error::{FireflyError, Result};
use crate::multipart::{boundary_param, MultipartDecoder};
use crate::options::{
    default_seed_source, GenerationOptions, ImageOptions, SeedSource, TextOptions,
};
use crate::request;
use crate::types::{
    BuildTarget, DenialReason, GenerationResult, ImageFormat, ImageStyle, TextFont, TextPreset,
    API_KEY, ORIGIN, USER_AGENT,
};

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct Session {
    id: String,
    expires_at: Option<Instant>,
}

/// Async client for the Firefly generation service.
///
/// Built in two phases: [`Firefly::builder`] configures credentials and
/// targets, and `connect` fetches the asset catalogs (concurrently) and
/// opens a session before handing back a usable client.
///
/// Generation calls take `&self` and may run concurrently; renewing the
/// session takes `&mut self`, so a renewal cannot race an in-flight call.
///
/// # Example
/// ```no_run
/// use firefly_rs::Firefly;
///
/// # async fn example() -> firefly_rs::Result<()> {
/// let firefly = Firefly::builder("bearer-token").connect().await?;
/// let result = firefly
///     .text_to_image("flying pigs", &Default::default())
///     .await?;
/// std::fs::write(format!("pigs.{}", result.ext()), &result.image).unwrap();
/// # Ok(())
/// # }
/// ```
pub struct Firefly {
    http: Client,
    base: &'static str,
    engine: &'static str,
    headers: HeaderMap,
    session: Session,
    image_styles: Arc<Vec<ImageStyle>>,
    text_presets: Arc<Vec<TextPreset>>,
    text_fonts: Arc<Vec<TextFont>>,
    seed_source: SeedSource,
}

impl std::fmt::Debug for Firefly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Firefly")
            .field("base", &self.base)
            .field("session_id", &self.session.id)
            .field("image_styles", &self.image_styles.len())
            .field("text_presets", &self.text_presets.len())
            .field("text_fonts", &self.text_fonts.len())
            .finish()
    }
}

/// Two-phase constructor for [`Firefly`].
pub struct FireflyBuilder {
    token: String,
    target: BuildTarget,
    anonymous: bool,
    fetch_image_assets: bool,
    fetch_text_assets: bool,
    seed_source: Option<SeedSource>,
    http: Option<Client>,
}

impl FireflyBuilder {
    /// Select the deployment target (default: prod).
    pub fn build_target(mut self, target: BuildTarget) -> Self {
        self.target = target;
        self
    }

    /// Anonymous mode. Not supported; `connect` fails fast when set.
    pub fn anonymous(mut self, anonymous: bool) -> Self {
        self.anonymous = anonymous;
        self
    }

    /// Whether to fetch the image-styles catalog at connect (default true).
    pub fn fetch_image_assets(mut self, fetch: bool) -> Self {
        self.fetch_image_assets = fetch;
        self
    }

    /// Whether to fetch the text preset/font catalogs at connect
    /// (default true).
    pub fn fetch_text_assets(mut self, fetch: bool) -> Self {
        self.fetch_text_assets = fetch;
        self
    }

    /// Use a custom `reqwest::Client` (for pooling, timeouts, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Replace the random source used for default seeds.
    pub fn with_seed_source(mut self, seed_source: SeedSource) -> Self {
        self.seed_source = Some(seed_source);
        self
    }

    /// Fetch the requested catalogs, create a session, and return the
    /// ready client.
    pub async fn connect(self) -> Result<Firefly> {
        let FireflyBuilder {
            token,
            target,
            anonymous,
            fetch_image_assets,
            fetch_text_assets,
            seed_source,
            http,
        } = self;

        if anonymous {
            return Err(FireflyError::AnonymousUnsupported);
        }

        let http = http.unwrap_or_default();
        let headers = base_headers(&token)?;

        let (styles, presets, fonts) = tokio::try_join!(
            async {
                if fetch_image_assets {
                    assets::fetch_image_styles(&http).await
                } else {
                    Ok(Vec::new())
                }
            },
            async {
                if fetch_text_assets {
                    assets::fetch_text_presets(&http).await
                } else {
                    Ok(Vec::new())
                }
            },
            async {
                if fetch_text_assets {
                    assets::fetch_text_fonts(&http).await
                } else {
                    Ok(Vec::new())
                }
            },
        )?;
        debug!(
            styles = styles.len(),
            presets = presets.len(),
            fonts = fonts.len(),
            "asset catalogs loaded"
        );

        let mut firefly = Firefly {
            http,
            base: target.base_url(),
            engine: target.engine_id(),
            headers,
            session: Session {
                id: String::new(),
                expires_at: None,
            },
            image_styles: Arc::new(styles),
            text_presets: Arc::new(presets),
            text_fonts: Arc::new(fonts),
            seed_source: seed_source.unwrap_or_else(default_seed_source),
        };
        firefly.create_session(DEFAULT_SESSION_TTL).await?;
        Ok(firefly)
    }
}

fn base_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert("origin", HeaderValue::from_static(ORIGIN));
    headers.insert("accept", HeaderValue::from_static("multipart/form-data"));
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| FireflyError::InvalidToken)?,
    );
    headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
    headers.insert("x-api-key", HeaderValue::from_static(API_KEY));
    Ok(headers)
}

/// `GEN_STATUS` bit flags from the metadata part. The key prefix has
/// drifted between service revisions, so both spellings are accepted.
fn generation_status(metadata: &Value) -> u64 {
    ["gi_GEN_STATUS", "gt_GEN_STATUS"]
        .iter()
        .find_map(|key| {
            let node = metadata.get("values")?.get(key)?;
            node.as_u64()
                .or_else(|| node.get("value").and_then(Value::as_u64))
        })
        .unwrap_or(0)
}

impl Firefly {
    /// Start configuring a client with the given bearer token.
    pub fn builder(token: impl Into<String>) -> FireflyBuilder {
        FireflyBuilder {
            token: token.into(),
            target: BuildTarget::default(),
            anonymous: false,
            fetch_image_assets: true,
            fetch_text_assets: true,
            seed_source: None,
            http: None,
        }
    }

    /// Connect with all defaults (prod target, both catalogs).
    pub async fn new(token: impl Into<String>) -> Result<Self> {
        Firefly::builder(token).connect().await
    }

    /// Base URL of the generation service in use.
    pub fn base_url(&self) -> &str {
        self.base
    }

    /// The current session id. Empty when the service did not issue one.
    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    /// Whether the session is still within its TTL. Re-checked by every
    /// generation call before any network activity.
    pub fn has_time_left(&self) -> bool {
        self.session
            .expires_at
            .is_some_and(|expires_at| Instant::now() < expires_at)
    }

    /// The image-styles catalog (empty if not fetched).
    pub fn image_styles(&self) -> &[ImageStyle] {
        &self.image_styles
    }

    /// The text-presets catalog (empty if not fetched).
    pub fn text_presets(&self) -> &[TextPreset] {
        &self.text_presets
    }

    /// The text-fonts catalog (empty if not fetched).
    pub fn text_fonts(&self) -> &[TextFont] {
        &self.text_fonts
    }

    /// Options builder bound to this client's style catalog.
    pub fn image_options(&self) -> ImageOptions {
        ImageOptions::new(Arc::clone(&self.image_styles))
    }

    /// Options builder bound to this client's preset and font catalogs.
    pub fn text_options(&self) -> TextOptions {
        TextOptions::new(
            Arc::clone(&self.text_presets),
            Arc::clone(&self.text_fonts),
        )
        .with_seed_source(self.seed_source.clone())
    }

    // ── Session ─────────────────────────────────────────────────────

    /// Create (or renew) the session. The id comes from the
    /// `x-session-id` response header; a missing header yields an empty
    /// id, which is not an error but leaves the session unusable.
    pub async fn create_session(&mut self, duration: Duration) -> Result<String> {
        let url = format!("{}session/create", self.base);
        let ttl = json!({ "session_ttl": duration.as_secs() });
        let form = Form::new().text("contentAnalyzerRequests", ttl.to_string());

        let resp = self
            .http
            .post(&url)
            .headers(self.headers.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| FireflyError::Network {
                context: format!("Cannot reach Firefly at {}", self.base),
                source: e,
            })?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(FireflyError::Unauthorized);
        }

        let id = resp
            .headers()
            .get("x-session-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        self.session.id = id.clone();
        if id.is_empty() {
            warn!("session create returned no x-session-id; session is unusable");
        } else {
            self.session.expires_at = Some(Instant::now() + duration);
            debug!(ttl_secs = duration.as_secs(), "session created");
        }
        Ok(id)
    }

    // ── Generation ──────────────────────────────────────────────────

    /// Generate an image from a text prompt. Returns JPEG bytes plus the
    /// metadata part and a snapshot of the options used, including the
    /// seed that was drawn when none was set.
    pub async fn text_to_image(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult> {
        if !self.has_time_left() {
            return Err(FireflyError::SessionExpired);
        }

        let resolved = request::resolve_text_options(options, &self.seed_source);
        let descriptor = request::text_to_image_descriptor(self.engine, prompt, &resolved);
        let (metadata, image) = self.predict(descriptor, None, ImageFormat::Jpeg).await?;

        if let Some(reason) = DenialReason::from_status(generation_status(&metadata)) {
            return Err(FireflyError::GenerationDenied(reason));
        }

        Ok(GenerationResult {
            image: image.to_vec(),
            format: ImageFormat::Jpeg,
            metadata,
            options: resolved,
        })
    }

    /// Fill the non-transparent region of a WebP glyph mask with generated
    /// imagery. `options.description` is required and becomes the prompt.
    /// Returns WebP bytes.
    pub async fn glyph_to_image(
        &self,
        glyph: Vec<u8>,
        options: &GenerationOptions,
    ) -> Result<GenerationResult> {
        let description = match options.description.as_deref() {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => return Err(FireflyError::MissingDescription),
        };
        if !self.has_time_left() {
            return Err(FireflyError::SessionExpired);
        }

        let resolved = request::resolve_glyph_options(options, &self.seed_source);
        let descriptor =
            request::glyph_to_image_descriptor(self.engine, &description, &resolved);
        let (metadata, image) = self
            .predict(descriptor, Some(glyph), ImageFormat::Webp)
            .await?;

        if let Some(reason) = DenialReason::from_status(generation_status(&metadata)) {
            return Err(FireflyError::GenerationDenied(reason));
        }

        Ok(GenerationResult {
            image: image.to_vec(),
            format: ImageFormat::Webp,
            metadata,
            options: resolved,
        })
    }

    /// Submit a predict request and decode the multipart response down to
    /// (metadata, image). Stops reading as soon as both are in hand.
    async fn predict(
        &self,
        descriptor: Value,
        glyph: Option<Vec<u8>>,
        format: ImageFormat,
    ) -> Result<(Value, Bytes)> {
        let url = format!("{}v2/predict", self.base);

        let mut form = Form::new().text("contentAnalyzerRequests", descriptor.to_string());
        if let Some(mask) = glyph {
            let part = Part::bytes(mask)
                .mime_str(ImageFormat::Webp.mime())
                .map_err(|e| FireflyError::Network {
                    context: "Failed to encode glyph form field".to_string(),
                    source: e,
                })?;
            form = form.part(request::GLYPH_FIELD_NAME, part);
        }

        let transaction_id = Uuid::new_v4().to_string();
        let mut headers = self.headers.clone();
        headers.insert(
            "x-session-id",
            HeaderValue::from_str(&self.session.id).map_err(|_| {
                FireflyError::InvalidResponse("session id is not header-safe".to_string())
            })?,
        );
        headers.insert(
            "x-transaction-id",
            HeaderValue::from_str(&transaction_id).map_err(|_| {
                FireflyError::InvalidResponse("transaction id is not header-safe".to_string())
            })?,
        );
        headers.insert("prefer", HeaderValue::from_static("respond-sync, wait=100"));

        debug!(%transaction_id, "submitting predict request");

        let resp = self
            .http
            .post(&url)
            .headers(headers)
            .multipart(form)
            .send()
            .await
            .map_err(|e| FireflyError::Network {
                context: format!("Cannot reach Firefly at {}", self.base),
                source: e,
            })?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(FireflyError::Unauthorized);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(FireflyError::Http { status, body });
        }

        let boundary = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(boundary_param)
            .ok_or_else(|| {
                FireflyError::InvalidResponse(
                    "predict response is not multipart (no boundary)".to_string(),
                )
            })?;

        let mut decoder = MultipartDecoder::new(resp.bytes_stream(), &boundary);
        let mut metadata: Option<Value> = None;
        let mut image: Option<Bytes> = None;
        while let Some(part) = decoder.next_part().await? {
            if metadata.is_none() && part.content_type == "application/json" {
                metadata = Some(serde_json::from_slice(&part.data)?);
            } else if image.is_none() && part.content_type == format.mime() {
                image = Some(part.data);
            }
            // Other part types are tolerated and skipped.
            if metadata.is_some() && image.is_some() {
                break;
            }
        }

        match (metadata, image) {
            (Some(metadata), Some(image)) => Ok((metadata, image)),
            (None, _) => Err(FireflyError::InvalidResponse(
                "predict response ended without a metadata part".to_string(),
            )),
            (_, None) => Err(FireflyError::InvalidResponse(
                "predict response ended without an image part".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client(expires_at: Option<Instant>) -> Firefly {
        Firefly {
            http: Client::new(),
            base: BuildTarget::Prod.base_url(),
            engine: BuildTarget::Prod.engine_id(),
            headers: base_headers("test-token").unwrap(),
            session: Session {
                id: if expires_at.is_some() {
                    "sess-1".to_string()
                } else {
                    String::new()
                },
                expires_at,
            },
            image_styles: Arc::new(Vec::new()),
            text_presets: Arc::new(Vec::new()),
            text_fonts: Arc::new(Vec::new()),
            seed_source: Arc::new(|_| 7),
        }
    }

    #[test]
    fn test_has_time_left() {
        assert!(!offline_client(None).has_time_left());
        assert!(offline_client(Some(Instant::now() + Duration::from_secs(60))).has_time_left());
        let expired = offline_client(Instant::now().checked_sub(Duration::from_secs(1)));
        assert!(!expired.has_time_left());
    }

    #[tokio::test]
    async fn test_text_to_image_expired_session_no_network() {
        let client = offline_client(None);
        let err = client
            .text_to_image("a cat", &GenerationOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FireflyError::SessionExpired));
    }

    #[tokio::test]
    async fn test_glyph_to_image_requires_description() {
        let client = offline_client(Some(Instant::now() + Duration::from_secs(60)));
        let err = client
            .glyph_to_image(vec![0u8; 4], &GenerationOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FireflyError::MissingDescription));

        let mut options = GenerationOptions::new();
        options.set_description("");
        let err = client.glyph_to_image(vec![0u8; 4], &options).await.unwrap_err();
        assert!(matches!(err, FireflyError::MissingDescription));
    }

    #[tokio::test]
    async fn test_glyph_to_image_expired_session() {
        let client = offline_client(None);
        let mut options = GenerationOptions::new();
        options.set_description("chrome letters");
        let err = client.glyph_to_image(vec![0u8; 4], &options).await.unwrap_err();
        assert!(matches!(err, FireflyError::SessionExpired));
    }

    #[tokio::test]
    async fn test_builder_anonymous_fails_fast() {
        let err = Firefly::builder("token")
            .anonymous(true)
            .connect()
            .await
            .unwrap_err();
        assert!(matches!(err, FireflyError::AnonymousUnsupported));
    }

    #[test]
    fn test_base_headers() {
        let headers = base_headers("abc").unwrap();
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer abc");
        assert_eq!(headers.get("x-api-key").unwrap(), "clio-playground-web");
        assert_eq!(headers.get("Accept").unwrap(), "multipart/form-data");
        assert!(headers.get("Origin").is_some());
        assert!(headers.get("User-Agent").is_some());
    }

    #[test]
    fn test_base_headers_rejects_bad_token() {
        assert!(matches!(
            base_headers("line\nbreak").unwrap_err(),
            FireflyError::InvalidToken
        ));
    }

    #[test]
    fn test_generation_status_wrapped_value() {
        let metadata = json!({"values": {"gi_GEN_STATUS": {"value": 2}}});
        assert_eq!(generation_status(&metadata), 2);
        assert_eq!(
            DenialReason::from_status(generation_status(&metadata)),
            Some(DenialReason::NsfwClassification)
        );
    }

    #[test]
    fn test_generation_status_fallback_key() {
        let metadata = json!({"values": {"gt_GEN_STATUS": {"value": 4}}});
        assert_eq!(generation_status(&metadata), 4);
    }

    #[test]
    fn test_generation_status_prefers_gi_key() {
        let metadata = json!({"values": {
            "gi_GEN_STATUS": {"value": 0},
            "gt_GEN_STATUS": {"value": 8}
        }});
        assert_eq!(generation_status(&metadata), 0);
    }

    #[test]
    fn test_generation_status_bare_number() {
        let metadata = json!({"values": {"gi_GEN_STATUS": 16}});
        assert_eq!(generation_status(&metadata), 16);
    }

    #[test]
    fn test_generation_status_absent_is_success() {
        assert_eq!(generation_status(&json!({"values": {}})), 0);
        assert_eq!(generation_status(&json!({})), 0);
    }
}
