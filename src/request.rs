//! Builders for the `contentAnalyzerRequests` descriptor sent to
//! `v2/predict`.
//!
//! Each call gets a freshly built descriptor: a pipeline graph reference,
//! typed scalar/string/boolean params, typed inputs and expected outputs.
//! Every input and output carries its own uuid; ids are never reused
//! across calls or fields.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::options::{GenerationOptions, SeedSource};
use crate::types::ImageFormat;

/// Multipart field carrying the glyph mask in glyph-to-image calls.
pub(crate) const GLYPH_FIELD_NAME: &str = "glyphInput";

const TEXT_GRAPH: &str = "urn:graph:Text2Image_v2";
const GLYPH_GRAPH: &str = "urn:graph:Glyph2Image";

const SEED_RANGE: u32 = 100_000;
const TEXT_DEFAULT_STEPS: u32 = 40;
const GLYPH_DEFAULT_STEPS: u32 = 30;
const DEFAULT_DIMENSION: u32 = 1024;
const DEFAULT_STRENGTH: f64 = 0.5;

/// Wire value of `gi_PAD_RATIO` when no padding was requested.
const PAD_DISABLED: f64 = -1.0;

/// Fill text-to-image defaults, drawing a seed when none was supplied.
/// The returned options are the snapshot reported back on the result.
pub(crate) fn resolve_text_options(
    options: &GenerationOptions,
    seeds: &SeedSource,
) -> GenerationOptions {
    let mut resolved = options.clone();
    let draw = seeds.as_ref();
    resolved.seed = Some(resolved.seed.unwrap_or_else(|| draw(SEED_RANGE)));
    resolved.steps = Some(resolved.steps.unwrap_or(TEXT_DEFAULT_STEPS));
    resolved.width = Some(resolved.width.unwrap_or(DEFAULT_DIMENSION));
    resolved.height = Some(resolved.height.unwrap_or(DEFAULT_DIMENSION));
    resolved.fix_face = Some(resolved.fix_face.unwrap_or(true));
    resolved
}

/// Fill glyph-to-image defaults. `pad_ratio` stays unset when the caller
/// did not ask for padding; the wire sentinel is applied at build time.
pub(crate) fn resolve_glyph_options(
    options: &GenerationOptions,
    seeds: &SeedSource,
) -> GenerationOptions {
    let mut resolved = options.clone();
    let draw = seeds.as_ref();
    resolved.seed = Some(resolved.seed.unwrap_or_else(|| draw(SEED_RANGE)));
    resolved.steps = Some(resolved.steps.unwrap_or(GLYPH_DEFAULT_STEPS));
    resolved.width = Some(resolved.width.unwrap_or(DEFAULT_DIMENSION));
    resolved.height = Some(resolved.height.unwrap_or(DEFAULT_DIMENSION));
    resolved.fix_face = Some(resolved.fix_face.unwrap_or(true));
    resolved.strength = Some(resolved.strength.unwrap_or(DEFAULT_STRENGTH));
    resolved
}

/// The `gi_ADVANCED` param: steps plus the optional prompt fragments,
/// sent as an embedded JSON string.
fn advanced_options(resolved: &GenerationOptions) -> String {
    let mut advanced = json!({
        "num_inference_steps": resolved.steps.unwrap_or(TEXT_DEFAULT_STEPS),
    });
    if let Some(style_prompt) = &resolved.style_prompt {
        advanced["style_prompt"] = json!(style_prompt);
    }
    if let Some(anchor_prompt) = &resolved.anchor_prompt {
        advanced["anchor_prompt"] = json!(anchor_prompt);
    }
    advanced.to_string()
}

fn engine_envelope(engine: &str, format: ImageFormat, request: Value) -> Value {
    json!({
        "sensei:name": "SelectionParse v2",
        "sensei:invocation_mode": "synchronous",
        "sensei:invocation_batch": false,
        "sensei:in_response": false,
        "sensei:engines": [
            {
                "sensei:execution_info": {
                    "sensei:engine": engine,
                },
                "sensei:inputs": {},
                "sensei:outputs": {
                    "spl:response": {
                        "dc:format": "application/json",
                        "sensei:multipart_field_name": "spl:response",
                    },
                    "gt_GEN_IMAGE": {
                        "dc:format": format.mime(),
                        "sensei:multipart_field_name": "outfile",
                    },
                },
                "sensei:params": {
                    "spl:request": request,
                },
            }
        ],
    })
}

fn expected_outputs(format: ImageFormat) -> Value {
    json!({
        "gt_GEN_IMAGE": {
            "id": Uuid::new_v4().to_string(),
            "type": "image",
            "expectedMimeType": format.mime(),
        },
        "gt_GEN_STATUS": {
            "id": Uuid::new_v4().to_string(),
            "type": "scalar",
        },
    })
}

/// Build the text-to-image descriptor. `resolved` must come from
/// [`resolve_text_options`] so every defaulted field is present.
pub(crate) fn text_to_image_descriptor(
    engine: &str,
    prompt: &str,
    resolved: &GenerationOptions,
) -> Value {
    let request = json!({
        "graph": {"uri": TEXT_GRAPH},
        "params": [
            {"name": "gi_SEED", "type": "scalar", "value": resolved.seed.unwrap_or(0)},
            {"name": "gi_NUM_STEPS", "type": "scalar", "value": resolved.steps.unwrap_or(TEXT_DEFAULT_STEPS)},
            {"name": "gi_OUTPUT_WIDTH", "type": "scalar", "value": resolved.width.unwrap_or(DEFAULT_DIMENSION)},
            {"name": "gi_OUTPUT_HEIGHT", "type": "scalar", "value": resolved.height.unwrap_or(DEFAULT_DIMENSION)},
            {"name": "gi_ADVANCED", "type": "string", "value": advanced_options(resolved)},
            {"name": "gi_LANGUAGE", "type": "string", "value": "en-US"},
            {"name": "gi_USE_FACE_FIX", "type": "boolean", "value": resolved.fix_face.unwrap_or(true)},
        ],
        "inputs": {
            "gi_PROMPT": {
                "id": Uuid::new_v4().to_string(),
                "type": "string",
                "value": prompt,
            },
        },
        "outputs": expected_outputs(ImageFormat::Jpeg),
    });
    engine_envelope(engine, ImageFormat::Jpeg, request)
}

/// Build the glyph-to-image descriptor. The prompt input is the resolved
/// `description`; the mask itself travels as the separate multipart field
/// named [`GLYPH_FIELD_NAME`].
pub(crate) fn glyph_to_image_descriptor(
    engine: &str,
    description: &str,
    resolved: &GenerationOptions,
) -> Value {
    let request = json!({
        "graph": {"uri": GLYPH_GRAPH},
        "params": [
            {"name": "gi_SEED", "type": "scalar", "value": resolved.seed.unwrap_or(0)},
            {"name": "gi_NUM_STEPS", "type": "scalar", "value": resolved.steps.unwrap_or(GLYPH_DEFAULT_STEPS)},
            {"name": "gi_OUTPUT_WIDTH", "type": "scalar", "value": resolved.width.unwrap_or(DEFAULT_DIMENSION)},
            {"name": "gi_OUTPUT_HEIGHT", "type": "scalar", "value": resolved.height.unwrap_or(DEFAULT_DIMENSION)},
            {"name": "gi_PAD_RATIO", "type": "scalar", "value": resolved.pad_ratio.unwrap_or(PAD_DISABLED)},
            {"name": "gi_STRENGTH", "type": "scalar", "value": resolved.strength.unwrap_or(DEFAULT_STRENGTH)},
            {"name": "gi_ADVANCED", "type": "string", "value": advanced_options(resolved)},
            {"name": "gi_LANGUAGE", "type": "string", "value": "en-US"},
            {"name": "gi_USE_FACE_FIX", "type": "boolean", "value": resolved.fix_face.unwrap_or(true)},
        ],
        "inputs": {
            "gi_PROMPT": {
                "id": Uuid::new_v4().to_string(),
                "type": "string",
                "value": description,
            },
            "gi_GLYPH": {
                "id": Uuid::new_v4().to_string(),
                "type": "image",
                "dc:format": ImageFormat::Webp.mime(),
                "sensei:multipart_field_name": GLYPH_FIELD_NAME,
            },
        },
        "outputs": expected_outputs(ImageFormat::Webp),
    });
    engine_envelope(engine, ImageFormat::Webp, request)
}
