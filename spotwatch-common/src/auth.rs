//! Sensor authentication capability
//!
//! Registries hold an `Arc<dyn Authenticator>` so a real credential check can
//! be substituted without touching registry logic. The shipped
//! [`PresenceAuthenticator`] only requires that a key was supplied; it does not
//! compare the key against anything.

use async_trait::async_trait;

/// Checks a caller-supplied key against a sensor's registered credential
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns true when `key` may act on `sensor_id`
    async fn authenticate(&self, sensor_id: &str, key: Option<&str>) -> bool;
}

/// Allows any request that carries a key
///
/// Placeholder until sensor keys are checked against the credential cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct PresenceAuthenticator;

#[async_trait]
impl Authenticator for PresenceAuthenticator {
    async fn authenticate(&self, sensor_id: &str, key: Option<&str>) -> bool {
        let allowed = key.is_some();
        tracing::debug!(sensor_id = %sensor_id, allowed, "Authenticated sensor request");
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_key_fails() {
        assert!(!PresenceAuthenticator.authenticate("s1", None).await);
    }

    #[tokio::test]
    async fn test_any_present_key_passes() {
        assert!(PresenceAuthenticator.authenticate("s1", Some("anything")).await);
        assert!(PresenceAuthenticator.authenticate("unknown", Some("")).await);
    }
}
