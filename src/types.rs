use serde::Deserialize;
use serde_json::Value;

use crate::options::GenerationOptions;

/// `Origin` header sent on every request, authenticated or not.
pub(crate) const ORIGIN: &str = "https://firefly.adobe.com";

/// Browser user agent the web playground identifies as.
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36";

/// API key of the web playground.
pub(crate) const API_KEY: &str = "clio-playground-web";

/// Base URL for the unauthenticated asset catalogs.
pub(crate) const ASSET_BASE_URL: &str = "https://clio-assets.adobe.com/clio-playground/";

/// Deployment target selecting the service base URL and diffusion engine id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildTarget {
    Dev,
    Stage,
    #[default]
    Prod,
}

impl BuildTarget {
    /// Resolve a target by name. Unrecognized names fall back to `Prod`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "dev" => BuildTarget::Dev,
            "stage" => BuildTarget::Stage,
            _ => BuildTarget::Prod,
        }
    }

    /// Base URL of the generation service for this target.
    pub fn base_url(self) -> &'static str {
        match self {
            BuildTarget::Dev | BuildTarget::Stage => {
                "https://senseicore-stage-ue1.adobe.io/services/"
            }
            BuildTarget::Prod => "https://sensei-ue1.adobe.io/services/",
        }
    }

    /// Diffusion engine identifier for this target.
    pub fn engine_id(self) -> &'static str {
        match self {
            BuildTarget::Dev => {
                "Classification:diffusion-service:Service-943088ea714543dd8289374cd1e92bb6"
            }
            BuildTarget::Stage => {
                "Classification:diffusion-service:Service-7367c21c82b946e7adb3995315de18a8"
            }
            BuildTarget::Prod => {
                "Classification:diffusion-service:Service-c742bc2eaae1491987dc00daff32fc07"
            }
        }
    }
}

// ── Asset catalogs ──────────────────────────────────────────────

/// One entry of the image-styles catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageStyle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub group: Option<String>,
    pub style_prompt: String,
    pub anchor_prompt: String,
}

/// One entry of the text-presets catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct TextPreset {
    pub id: String,
    pub title: String,
    pub prompt: String,
    #[serde(rename = "seedSuggestions", default)]
    pub seed_suggestions: Vec<u32>,
}

/// One entry of the text-fonts catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct TextFont {
    pub id: String,
    #[serde(alias = "title", default)]
    pub label: String,
    #[serde(default)]
    pub family: Option<String>,
}

// ── Generation outcome ──────────────────────────────────────────

/// Output encoding of a generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Webp,
}

impl ImageFormat {
    /// File extension without the dot.
    pub fn ext(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
        }
    }

    /// MIME type as it appears in multipart part headers.
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }
}

/// Content-policy reason a generation was denied, decoded from the
/// `GEN_STATUS` bit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The prompt was blocked outright by the content filter.
    ContentDenied,
    /// The output was classified as NSFW.
    NsfwClassification,
    /// The prompt matched a protected artist style.
    ArtistStyleClassification,
    /// The service declined without a stated cause.
    SilentDenial,
    /// The prompt was not recognized as English.
    NonEnglishPrompt,
    /// Post-processing flagged the output as NSFW.
    NsfwPostProcessing,
}

/// Status flags in ascending bit order. The lowest set bit determines
/// the reported reason.
const STATUS_FLAGS: [(u64, DenialReason); 6] = [
    (1, DenialReason::ContentDenied),
    (2, DenialReason::NsfwClassification),
    (4, DenialReason::ArtistStyleClassification),
    (8, DenialReason::SilentDenial),
    (16, DenialReason::NonEnglishPrompt),
    (32, DenialReason::NsfwPostProcessing),
];

impl DenialReason {
    /// Decode a `GEN_STATUS` value. Zero means success (`None`).
    pub fn from_status(status: u64) -> Option<DenialReason> {
        STATUS_FLAGS
            .iter()
            .find(|(mask, _)| status & mask != 0)
            .map(|&(_, reason)| reason)
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            DenialReason::ContentDenied => "prompt denied by content filter",
            DenialReason::NsfwClassification => "output classified as NSFW",
            DenialReason::ArtistStyleClassification => "prompt matched a protected artist style",
            DenialReason::SilentDenial => "generation silently denied",
            DenialReason::NonEnglishPrompt => "prompt is not in English",
            DenialReason::NsfwPostProcessing => "output flagged as NSFW in post-processing",
        };
        f.write_str(msg)
    }
}

/// A completed generation: image bytes plus the metadata part of the
/// response and a snapshot of the options actually used (including the
/// resolved seed).
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub image: Vec<u8>,
    pub format: ImageFormat,
    pub metadata: Value,
    pub options: GenerationOptions,
}

impl GenerationResult {
    /// File extension matching the image bytes (`"jpeg"` or `"webp"`).
    pub fn ext(&self) -> &'static str {
        self.format.ext()
    }
}
