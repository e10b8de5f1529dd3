//! Compose several named styles and an aspect ratio, then generate a
//! batch of variations concurrently.

use firefly_rs::Firefly;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let token = std::env::var("FIREFLY_TOKEN")?;
    let firefly = Firefly::builder(token).connect().await?;

    println!("style groups: {:?}", firefly.image_options().groups());

    let mut opts = firefly.image_options();
    opts.set_aspect_ratio("landscape")?;
    opts.add_styles(["pastel", "wireframe"])?;
    opts.set_steps(25);

    let prompt = "a lighthouse in a storm";
    let runs = (0..4).map(|_| firefly.text_to_image(prompt, opts.options()));
    let results = futures_util::future::try_join_all(runs).await?;

    for (i, result) in results.iter().enumerate() {
        let path = format!("lighthouse-{i}.{}", result.ext());
        std::fs::write(&path, &result.image)?;
        println!("wrote {path} (seed {:?})", result.options.seed);
    }
    Ok(())
}
