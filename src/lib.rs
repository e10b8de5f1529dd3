//! # firefly-rs
//!
//! Async Rust client for the reverse-engineered Adobe Firefly API.
//!
//! Manages the short-lived session the service requires, loads the
//! style/preset/font catalogs, builds the pipeline descriptors for
//! text-to-image and glyph-to-image generation, and decodes the
//! multipart responses into image bytes plus metadata.
//!
//! ## Quick Start
//!
//! ```no_run
//! use firefly_rs::Firefly;
//!
//! # async fn example() -> firefly_rs::Result<()> {
//! let firefly = Firefly::builder("bearer-token").connect().await?;
//!
//! // Compose options from named catalog entries
//! let mut opts = firefly.image_options();
//! opts.set_aspect_ratio("widescreen")?;
//! opts.add_style("pastel")?;
//! opts.add_style("wireframe")?;
//!
//! let result = firefly
//!     .text_to_image("flying pigs over a neon city", opts.options())
//!     .await?;
//!
//! std::fs::write(format!("pigs.{}", result.ext()), &result.image).unwrap();
//! println!("seed used: {:?}", result.options.seed);
//! # Ok(())
//! # }
//! ```
//!
//! Generation calls borrow the client immutably and can run concurrently;
//! renewing the session (`create_session`) needs `&mut`, so callers
//! serialize renewals by construction.

pub mod assets;
pub mod client;
pub mod error;
pub mod multipart;
pub mod options;
mod request;
pub mod types;

pub use client::{Firefly, FireflyBuilder};
pub use error::{FireflyError, Result};
pub use multipart::{boundary_param, MultipartDecoder, MultipartPart};
pub use options::{GenerationOptions, ImageOptions, SeedSource, TextOptions};
pub use types::{
    BuildTarget, DenialReason, GenerationResult, ImageFormat, ImageStyle, TextFont, TextPreset,
};
