//! Fill a WebP glyph mask using a named text preset.
//!
//! Usage: FIREFLY_TOKEN=<bearer> cargo run --example glyph_banner -- mask.webp

use firefly_rs::Firefly;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let token = std::env::var("FIREFLY_TOKEN")?;
    let mask_path = std::env::args().nth(1).unwrap_or_else(|| "mask.webp".into());
    let mask = std::fs::read(&mask_path)?;

    let firefly = Firefly::builder(token).connect().await?;

    let mut opts = firefly.text_options();
    opts.set_text_preset("lava")?;
    opts.set_strength(0.7);

    let result = firefly.glyph_to_image(mask, opts.options()).await?;
    let path = format!("banner.{}", result.ext());
    std::fs::write(&path, &result.image)?;
    println!("wrote {path} with preset seed {:?}", result.options.seed);
    Ok(())
}
