//! Minimal text-to-image generation.
//!
//! Usage: FIREFLY_TOKEN=<bearer> cargo run --example simple_text_to_image

use firefly_rs::Firefly;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let token = std::env::var("FIREFLY_TOKEN")?;

    let firefly = Firefly::builder(token).connect().await?;
    println!("session: {}", firefly.session_id());

    let result = firefly
        .text_to_image("flying pigs over a neon city", &Default::default())
        .await?;

    let path = format!("pigs.{}", result.ext());
    std::fs::write(&path, &result.image)?;
    println!("wrote {} ({} bytes, seed {:?})", path, result.image.len(), result.options.seed);
    Ok(())
}
