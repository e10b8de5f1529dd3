use std::sync::Arc;

use rand::Rng;

use crate::error::{FireflyError, Result};
use crate::types::{ImageStyle, TextFont, TextPreset};

/// Source of random integers in `[0, n)`. Injectable so tests can pin
/// the seed the client would otherwise draw at random.
pub type SeedSource = Arc<dyn Fn(u32) -> u32 + Send + Sync>;

pub(crate) fn default_seed_source() -> SeedSource {
    Arc::new(|n| rand::rng().random_range(0..n))
}

/// Named aspect ratios supported by the web playground.
const ASPECT_RATIOS: [(&str, u32, u32); 4] = [
    ("square", 1024, 1024),
    ("landscape", 1408, 1024),
    ("portrait", 1024, 1408),
    ("widescreen", 1792, 1024),
];

fn aspect_ratio_dimensions(name: &str) -> Option<(u32, u32)> {
    let needle = name.to_lowercase();
    ASPECT_RATIOS
        .iter()
        .find(|(n, _, _)| *n == needle)
        .map(|&(_, w, h)| (w, h))
}

/// Accumulated parameters for a generation call.
///
/// All fields are optional; anything left unset falls back to the
/// per-operation defaults at request-build time. `style_prompt` and
/// `anchor_prompt` grow by concatenation through the `add_*` methods,
/// every other field is last-write-wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub steps: Option<u32>,
    pub fix_face: Option<bool>,
    pub style_prompt: Option<String>,
    pub anchor_prompt: Option<String>,
    pub seed: Option<u32>,
    pub description: Option<String>,
    pub pad_ratio: Option<f64>,
    pub strength: Option<f64>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_width(&mut self, width: u32) {
        self.width = Some(width);
    }

    pub fn set_height(&mut self, height: u32) {
        self.height = Some(height);
    }

    pub fn set_steps(&mut self, steps: u32) {
        self.steps = Some(steps);
    }

    pub fn set_fix_face(&mut self, fix_face: bool) {
        self.fix_face = Some(fix_face);
    }

    pub fn set_seed(&mut self, seed: u32) {
        self.seed = Some(seed);
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn set_pad_ratio(&mut self, pad_ratio: f64) {
        self.pad_ratio = Some(pad_ratio);
    }

    pub fn set_strength(&mut self, strength: f64) {
        self.strength = Some(strength);
    }

    pub fn set_style_prompt(&mut self, style_prompt: impl Into<String>) {
        self.style_prompt = Some(style_prompt.into());
    }

    pub fn set_anchor_prompt(&mut self, anchor_prompt: impl Into<String>) {
        self.anchor_prompt = Some(anchor_prompt.into());
    }

    /// Append a style-prompt fragment, comma-separated after the first.
    pub fn add_style_prompt(&mut self, fragment: &str) {
        append_fragment(&mut self.style_prompt, fragment);
    }

    /// Append an anchor-prompt fragment, comma-separated after the first.
    pub fn add_anchor_prompt(&mut self, fragment: &str) {
        append_fragment(&mut self.anchor_prompt, fragment);
    }
}

fn append_fragment(slot: &mut Option<String>, fragment: &str) {
    match slot {
        Some(existing) => {
            existing.push_str(", ");
            existing.push_str(fragment);
        }
        None => *slot = Some(fragment.to_string()),
    }
}

// ── Catalog lookup ──────────────────────────────────────────────

fn find_style<'a>(styles: &'a [ImageStyle], name: &str) -> Result<&'a ImageStyle> {
    let needle = name.to_lowercase();
    styles
        .iter()
        .find(|s| s.id.to_lowercase() == needle || s.title.to_lowercase() == needle)
        .ok_or_else(|| FireflyError::InvalidSelection {
            kind: "style",
            name: name.to_string(),
        })
}

fn find_preset<'a>(presets: &'a [TextPreset], name: &str) -> Result<&'a TextPreset> {
    let needle = name.to_lowercase();
    presets
        .iter()
        .find(|p| p.id.to_lowercase() == needle || p.title.to_lowercase() == needle)
        .ok_or_else(|| FireflyError::InvalidSelection {
            kind: "text preset",
            name: name.to_string(),
        })
}

fn find_font<'a>(fonts: &'a [TextFont], name: &str) -> Result<&'a TextFont> {
    let needle = name.to_lowercase();
    fonts
        .iter()
        .find(|f| f.id.to_lowercase() == needle || f.label.to_lowercase() == needle)
        .ok_or_else(|| FireflyError::InvalidSelection {
            kind: "font",
            name: name.to_string(),
        })
}

// ── Image options ───────────────────────────────────────────────

/// Options builder for [`text_to_image`](crate::Firefly::text_to_image),
/// bound to the image-styles catalog so styles can be referenced by id or
/// title (case-insensitive).
///
/// # Example
/// ```no_run
/// # async fn example() -> firefly_rs::Result<()> {
/// # let firefly = firefly_rs::Firefly::builder("token").connect().await?;
/// let mut opts = firefly.image_options();
/// opts.set_aspect_ratio("widescreen")?;
/// opts.add_style("pastel")?;
/// opts.add_style("wireframe")?;
/// let result = firefly.text_to_image("flying pigs", opts.options()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ImageOptions {
    styles: Arc<Vec<ImageStyle>>,
    options: GenerationOptions,
}

impl ImageOptions {
    /// Create a builder over the given style catalog.
    pub fn new(styles: impl Into<Arc<Vec<ImageStyle>>>) -> Self {
        Self {
            styles: styles.into(),
            options: GenerationOptions::new(),
        }
    }

    /// Set width and height from a named ratio: `square`, `landscape`,
    /// `portrait`, or `widescreen`.
    pub fn set_aspect_ratio(&mut self, name: &str) -> Result<()> {
        let (width, height) =
            aspect_ratio_dimensions(name).ok_or_else(|| FireflyError::InvalidSelection {
                kind: "aspect ratio",
                name: name.to_string(),
            })?;
        self.options.set_width(width);
        self.options.set_height(height);
        Ok(())
    }

    pub fn set_width(&mut self, width: u32) {
        self.options.set_width(width);
    }

    pub fn set_height(&mut self, height: u32) {
        self.options.set_height(height);
    }

    pub fn set_steps(&mut self, steps: u32) {
        self.options.set_steps(steps);
    }

    pub fn set_fix_face(&mut self, fix_face: bool) {
        self.options.set_fix_face(fix_face);
    }

    pub fn set_seed(&mut self, seed: u32) {
        self.options.set_seed(seed);
    }

    /// Replace both prompt fragments with those of the named style.
    pub fn set_style(&mut self, name: &str) -> Result<()> {
        let style = find_style(&self.styles, name)?;
        self.options.set_style_prompt(style.style_prompt.clone());
        self.options.set_anchor_prompt(style.anchor_prompt.clone());
        Ok(())
    }

    /// Append the named style's prompt fragments, composing with any
    /// styles already added.
    pub fn add_style(&mut self, name: &str) -> Result<()> {
        let style = find_style(&self.styles, name)?;
        let (style_prompt, anchor_prompt) =
            (style.style_prompt.clone(), style.anchor_prompt.clone());
        self.options.add_style_prompt(&style_prompt);
        self.options.add_anchor_prompt(&anchor_prompt);
        Ok(())
    }

    /// Append several styles in order. Stops at the first unknown name.
    pub fn add_styles<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.add_style(name.as_ref())?;
        }
        Ok(())
    }

    /// Look up a style record by id or title.
    pub fn style(&self, name: &str) -> Result<&ImageStyle> {
        find_style(&self.styles, name)
    }

    /// Distinct style groups present in the catalog.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = self
            .styles
            .iter()
            .filter_map(|s| s.group.as_deref())
            .collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    /// The accumulated options.
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub fn into_options(self) -> GenerationOptions {
        self.options
    }
}

// ── Text options ────────────────────────────────────────────────

/// Options builder for [`glyph_to_image`](crate::Firefly::glyph_to_image),
/// bound to the text-preset and font catalogs.
///
/// Selecting a preset fills `description` and, unless `set_auto_seed(false)`
/// was called, picks one of the preset's suggested seeds at random.
#[derive(Clone)]
pub struct TextOptions {
    presets: Arc<Vec<TextPreset>>,
    fonts: Arc<Vec<TextFont>>,
    auto_seed: bool,
    seed_source: SeedSource,
    options: GenerationOptions,
}

impl TextOptions {
    /// Create a builder over the given preset and font catalogs.
    pub fn new(
        presets: impl Into<Arc<Vec<TextPreset>>>,
        fonts: impl Into<Arc<Vec<TextFont>>>,
    ) -> Self {
        Self {
            presets: presets.into(),
            fonts: fonts.into(),
            auto_seed: true,
            seed_source: default_seed_source(),
            options: GenerationOptions::new(),
        }
    }

    /// Replace the random source used for suggested-seed selection.
    pub fn with_seed_source(mut self, seed_source: SeedSource) -> Self {
        self.seed_source = seed_source;
        self
    }

    /// Toggle automatic seed selection from preset suggestions (default on).
    pub fn set_auto_seed(&mut self, auto_seed: bool) {
        self.auto_seed = auto_seed;
    }

    /// Resolve the named preset into a `description`, picking one of its
    /// suggested seeds when auto-seed is on.
    pub fn set_text_preset(&mut self, name: &str) -> Result<()> {
        let preset = find_preset(&self.presets, name)?;
        self.options.set_description(preset.prompt.clone());
        if self.auto_seed && !preset.seed_suggestions.is_empty() {
            let draw = self.seed_source.as_ref();
            let idx = draw(preset.seed_suggestions.len() as u32) as usize;
            self.options.set_seed(preset.seed_suggestions[idx]);
        }
        Ok(())
    }

    /// Look up a preset record by id or title.
    pub fn preset(&self, name: &str) -> Result<&TextPreset> {
        find_preset(&self.presets, name)
    }

    /// Look up a font record by id or label.
    pub fn font(&self, name: &str) -> Result<&TextFont> {
        find_font(&self.fonts, name)
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.options.set_description(description);
    }

    pub fn set_steps(&mut self, steps: u32) {
        self.options.set_steps(steps);
    }

    pub fn set_seed(&mut self, seed: u32) {
        self.options.set_seed(seed);
    }

    /// Padding around the glyph mask, in `[0.0, 1.0]`. Left unset, padding
    /// stays disabled on the wire.
    pub fn set_pad_ratio(&mut self, pad_ratio: f64) {
        self.options.set_pad_ratio(pad_ratio);
    }

    /// How strongly generation adheres to the mask, in `[0.0, 1.0]`.
    pub fn set_strength(&mut self, strength: f64) {
        self.options.set_strength(strength);
    }

    /// The accumulated options.
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub fn into_options(self) -> GenerationOptions {
        self.options
    }
}

impl std::fmt::Debug for TextOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextOptions")
            .field("presets", &self.presets.len())
            .field("fonts", &self.fonts.len())
            .field("auto_seed", &self.auto_seed)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styles() -> Vec<ImageStyle> {
        vec![
            ImageStyle {
                id: "pastel_color".into(),
                title: "Pastel".into(),
                group: Some("color".into()),
                style_prompt: "soft pastel tones".into(),
                anchor_prompt: "pastel drawing".into(),
            },
            ImageStyle {
                id: "wireframe".into(),
                title: "Wireframe".into(),
                group: Some("technique".into()),
                style_prompt: "wireframe render".into(),
                anchor_prompt: "3d wireframe".into(),
            },
        ]
    }

    fn presets() -> Vec<TextPreset> {
        vec![
            TextPreset {
                id: "lava".into(),
                title: "Lava".into(),
                prompt: "molten lava texture".into(),
                seed_suggestions: vec![11, 22, 33],
            },
            TextPreset {
                id: "ivy".into(),
                title: "Ivy".into(),
                prompt: "dense green ivy".into(),
                seed_suggestions: vec![],
            },
        ]
    }

    fn fonts() -> Vec<TextFont> {
        vec![TextFont {
            id: "acumin-pro".into(),
            label: "Acumin Pro".into(),
            family: None,
        }]
    }

    #[test]
    fn test_aspect_ratio_table() {
        let cases = [
            ("square", 1024, 1024),
            ("landscape", 1408, 1024),
            ("portrait", 1024, 1408),
            ("widescreen", 1792, 1024),
        ];
        for (name, width, height) in cases {
            let mut opts = ImageOptions::new(styles());
            opts.set_aspect_ratio(name).unwrap();
            assert_eq!(opts.options().width, Some(width), "{name}");
            assert_eq!(opts.options().height, Some(height), "{name}");
        }
    }

    #[test]
    fn test_aspect_ratio_case_insensitive() {
        let mut opts = ImageOptions::new(styles());
        opts.set_aspect_ratio("WIDESCREEN").unwrap();
        assert_eq!(opts.options().width, Some(1792));
    }

    #[test]
    fn test_aspect_ratio_unknown() {
        let mut opts = ImageOptions::new(styles());
        let err = opts.set_aspect_ratio("panorama").unwrap_err();
        assert!(matches!(
            err,
            FireflyError::InvalidSelection { kind: "aspect ratio", .. }
        ));
    }

    #[test]
    fn test_style_lookup_by_id_and_title_any_case() {
        let opts = ImageOptions::new(styles());
        for name in ["pastel", "PASTEL", "Pastel", "pastel_color", "PASTEL_COLOR"] {
            assert_eq!(opts.style(name).unwrap().id, "pastel_color", "{name}");
        }
    }

    #[test]
    fn test_set_style_overwrites() {
        let mut opts = ImageOptions::new(styles());
        opts.set_style("pastel").unwrap();
        opts.set_style("wireframe").unwrap();
        assert_eq!(opts.options().style_prompt.as_deref(), Some("wireframe render"));
        assert_eq!(opts.options().anchor_prompt.as_deref(), Some("3d wireframe"));
    }

    #[test]
    fn test_add_style_concatenates_with_single_separator() {
        let mut opts = ImageOptions::new(styles());
        opts.add_style("pastel").unwrap();
        opts.add_style("wireframe").unwrap();
        assert_eq!(
            opts.options().style_prompt.as_deref(),
            Some("soft pastel tones, wireframe render")
        );
        assert_eq!(
            opts.options().anchor_prompt.as_deref(),
            Some("pastel drawing, 3d wireframe")
        );
    }

    #[test]
    fn test_add_styles_batch() {
        let mut opts = ImageOptions::new(styles());
        opts.add_styles(["pastel", "wireframe"]).unwrap();
        assert_eq!(
            opts.options().style_prompt.as_deref(),
            Some("soft pastel tones, wireframe render")
        );
    }

    #[test]
    fn test_add_unknown_style() {
        let mut opts = ImageOptions::new(styles());
        let err = opts.add_style("cubist").unwrap_err();
        assert!(matches!(err, FireflyError::InvalidSelection { kind: "style", .. }));
    }

    #[test]
    fn test_groups_deduplicated() {
        let opts = ImageOptions::new(styles());
        assert_eq!(opts.groups(), vec!["color", "technique"]);
    }

    #[test]
    fn test_preset_sets_description_and_seed() {
        let mut opts = TextOptions::new(presets(), fonts())
            .with_seed_source(Arc::new(|_| 1));
        opts.set_text_preset("lava").unwrap();
        assert_eq!(opts.options().description.as_deref(), Some("molten lava texture"));
        assert_eq!(opts.options().seed, Some(22));
    }

    #[test]
    fn test_preset_auto_seed_off() {
        let mut opts = TextOptions::new(presets(), fonts());
        opts.set_auto_seed(false);
        opts.set_text_preset("lava").unwrap();
        assert_eq!(opts.options().seed, None);
    }

    #[test]
    fn test_preset_without_suggestions_leaves_seed() {
        let mut opts = TextOptions::new(presets(), fonts());
        opts.set_text_preset("ivy").unwrap();
        assert_eq!(opts.options().seed, None);
    }

    #[test]
    fn test_font_lookup() {
        let opts = TextOptions::new(presets(), fonts());
        assert_eq!(opts.font("acumin pro").unwrap().id, "acumin-pro");
        assert!(matches!(
            opts.font("comic sans").unwrap_err(),
            FireflyError::InvalidSelection { kind: "font", .. }
        ));
    }

    #[test]
    fn test_add_fragment_initializes_without_separator() {
        let mut options = GenerationOptions::new();
        options.add_style_prompt("first");
        assert_eq!(options.style_prompt.as_deref(), Some("first"));
        options.add_style_prompt("second");
        assert_eq!(options.style_prompt.as_deref(), Some("first, second"));
    }

    #[test]
    fn test_scalar_fields_last_write_wins() {
        let mut options = GenerationOptions::new();
        options.set_steps(10);
        options.set_steps(25);
        assert_eq!(options.steps, Some(25));
    }
}
