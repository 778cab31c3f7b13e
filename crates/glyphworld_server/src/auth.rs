//! # Authentication
//!
//! The world only ever sees a resolved [`Identity`]. How a connection
//! proves who it is belongs to the [`Authenticator`].

use glyphworld_procedural::splitmix64;

use crate::error::{ServerError, ServerResult};

/// Longest accepted display name.
pub const MAX_USERNAME_LEN: usize = 16;

/// A resolved user.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Stable id, used as the player id.
    pub user_id: String,
    /// Display name.
    pub username: String,
}

/// Resolves connection credentials to an identity.
pub trait Authenticator: Send + Sync {
    /// Looks up the user behind `fingerprint`.
    ///
    /// `requested_name` is a hint for first-time users.
    ///
    /// # Errors
    ///
    /// [`ServerError::Auth`] if the fingerprint is not acceptable.
    fn authenticate(&self, fingerprint: &str, requested_name: &str) -> ServerResult<Identity>;
}

/// Lets everyone in. Ids are derived from the fingerprint so the same
/// fingerprint always maps to the same player.
#[derive(Clone, Copy, Debug, Default)]
pub struct GuestAuthenticator;

impl Authenticator for GuestAuthenticator {
    fn authenticate(&self, fingerprint: &str, requested_name: &str) -> ServerResult<Identity> {
        if fingerprint.is_empty() {
            return Err(ServerError::Auth("empty fingerprint".into()));
        }
        let hash = fingerprint
            .bytes()
            .fold(0u64, |acc, b| splitmix64(acc ^ u64::from(b)));
        let user_id = format!("guest-{:08x}", hash >> 32);

        let name: String = requested_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .take(MAX_USERNAME_LEN)
            .collect();
        let username = if name.is_empty() { user_id.clone() } else { name };

        Ok(Identity { user_id, username })
    }
}
