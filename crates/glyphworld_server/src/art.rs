//! # Custom Player Art
//!
//! Players may describe how they want to look. Generation is slow and may
//! fail, so it runs on its own task under a timeout and lands in the
//! shared [`SpriteStore`] when done. The tick loop never waits for it;
//! until art arrives the renderer shows a placeholder.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use glyphworld_render::{Sprite, SpriteSheet, SpriteStore};
use tracing::{info, warn};

use crate::error::ArtError;

/// Longest description accepted, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Produces a sprite from a text description.
pub trait ArtGenerator: Send + Sync + 'static {
    /// Generates art for `description`.
    ///
    /// # Errors
    ///
    /// Generation failed.
    fn generate(&self, description: &str) -> impl Future<Output = Result<Sprite, ArtError>> + Send;
}

/// Offline generator: deterministic placeholder art seeded by the
/// description.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProceduralArtist;

impl ArtGenerator for ProceduralArtist {
    async fn generate(&self, description: &str) -> Result<Sprite, ArtError> {
        Ok(Sprite::placeholder(description))
    }
}

/// Result of one forge run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForgeOutcome {
    /// Whether generated art was stored.
    pub success: bool,
    /// Text to show the player.
    pub message: String,
}

/// Runs a generator with a timeout and stores whatever comes out.
#[derive(Debug)]
pub struct SpriteForge<G> {
    generator: Arc<G>,
    store: Arc<SpriteStore>,
    timeout: Duration,
}

impl<G> Clone for SpriteForge<G> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            store: Arc::clone(&self.store),
            timeout: self.timeout,
        }
    }
}

impl<G: ArtGenerator> SpriteForge<G> {
    /// Creates a forge writing into `store`.
    #[must_use]
    pub fn new(generator: G, store: Arc<SpriteStore>, timeout: Duration) -> Self {
        Self {
            generator: Arc::new(generator),
            store,
            timeout,
        }
    }

    /// Generates art for `key` from `description`.
    ///
    /// On failure a placeholder is stored instead, so the player always
    /// ends up with something.
    pub async fn forge(&self, key: &str, description: &str) -> ForgeOutcome {
        match self.try_forge(description).await {
            Ok(sprite) => {
                self.store.insert(key, SpriteSheet::from(sprite));
                info!(key, "Custom art stored");
                ForgeOutcome {
                    success: true,
                    message: "Your new look is ready.".to_owned(),
                }
            }
            Err(e) => {
                warn!(key, error = %e, "Art generation failed, using placeholder");
                self.store.insert(key, SpriteSheet::placeholder(key));
                ForgeOutcome {
                    success: false,
                    message: format!("Could not create art ({e}); keeping your default look."),
                }
            }
        }
    }

    async fn try_forge(&self, description: &str) -> Result<Sprite, ArtError> {
        let description = validate_description(description)?;
        tokio::time::timeout(self.timeout, self.generator.generate(description))
            .await
            .map_err(|_| ArtError::Timeout(self.timeout))?
    }

    /// The store written to.
    #[must_use]
    pub fn store(&self) -> &Arc<SpriteStore> {
        &self.store
    }
}

fn validate_description(description: &str) -> Result<&str, ArtError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(ArtError::InvalidDescription("empty".to_owned()));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ArtError::InvalidDescription(format!(
            "longer than {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    if description.chars().any(char::is_control) {
        return Err(ArtError::InvalidDescription("control characters".to_owned()));
    }
    Ok(description)
}
