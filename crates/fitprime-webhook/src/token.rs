use crate::signature::constant_time_eq;
use dashmap::DashMap;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const TOKEN_BYTES: usize = 32;

/// 32 random bytes, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// What to do with requests for an instance that has no registered token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnregisteredInstancePolicy {
    /// Reject the request
    #[default]
    Reject,
    /// Accept the request and log a warning; for instances created before
    /// token authentication was rolled out
    Allow,
}

/// Per-instance webhook tokens
///
/// Cloning is cheap and clones share the same tokens.
#[derive(Clone)]
pub struct TokenRegistry {
    tokens: Arc<DashMap<String, SecretString>>,
    policy: UnregisteredInstancePolicy,
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new(UnregisteredInstancePolicy::default())
    }
}

impl TokenRegistry {
    pub fn new(policy: UnregisteredInstancePolicy) -> Self {
        Self {
            tokens: Arc::new(DashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> UnregisteredInstancePolicy {
        self.policy
    }

    /// Issue a fresh random token for `instance`, replacing any previous one
    pub fn generate(&self, instance: &str) -> String {
        let token = generate_token();

        let replaced = self
            .tokens
            .insert(instance.to_string(), SecretString::from(token.clone()))
            .is_some();
        info!(
            "Webhook token generated for instance {} (replaced existing: {})",
            instance, replaced
        );

        token
    }

    pub fn get(&self, instance: &str) -> Option<String> {
        self.tokens
            .get(instance)
            .map(|token| token.expose_secret().to_string())
    }

    pub fn contains(&self, instance: &str) -> bool {
        self.tokens.contains_key(instance)
    }

    /// Drop the token for `instance`; returns whether one existed
    pub fn remove(&self, instance: &str) -> bool {
        let removed = self.tokens.remove(instance).is_some();
        if removed {
            info!("Webhook token removed for instance {}", instance);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Check a token presented by a caller claiming to be `instance`
    pub fn validate(&self, instance: &str, provided: Option<&str>) -> bool {
        let Some(provided) = provided.filter(|token| !token.is_empty()) else {
            warn!("Webhook request for instance {} without token", instance);
            return false;
        };

        let Some(stored) = self.tokens.get(instance) else {
            return match self.policy {
                UnregisteredInstancePolicy::Allow => {
                    warn!(
                        "No webhook token registered for instance {}, allowing request",
                        instance
                    );
                    true
                }
                UnregisteredInstancePolicy::Reject => {
                    warn!(
                        "No webhook token registered for instance {}, rejecting request",
                        instance
                    );
                    false
                }
            };
        };

        let valid = constant_time_eq(stored.expose_secret().as_bytes(), provided.as_bytes());
        if !valid {
            warn!("Invalid webhook token for instance {}", instance);
        }
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_format() {
        let registry = TokenRegistry::default();
        let token = registry.generate("academia-centro");

        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(registry.get("academia-centro"), Some(token));
    }

    #[test]
    fn test_generate_overwrites_previous_token() {
        let registry = TokenRegistry::default();
        let first = registry.generate("inst");
        let second = registry.generate("inst");

        assert_ne!(first, second);
        assert_eq!(registry.len(), 1);
        assert!(!registry.validate("inst", Some(&first)));
        assert!(registry.validate("inst", Some(&second)));
    }

    #[test]
    fn test_get_unknown_instance() {
        let registry = TokenRegistry::default();
        assert_eq!(registry.get("missing"), None);
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn test_validate_matching_token() {
        let registry = TokenRegistry::default();
        let token = registry.generate("inst");
        assert!(registry.validate("inst", Some(&token)));
    }

    #[test]
    fn test_validate_mismatched_tokens() {
        let registry = TokenRegistry::default();
        let token = registry.generate("inst");

        let mut same_length = token.clone().into_bytes();
        same_length[10] = if same_length[10] == b'a' { b'b' } else { b'a' };
        let same_length = String::from_utf8(same_length).unwrap();

        assert!(!registry.validate("inst", Some(&same_length)));
        assert!(!registry.validate("inst", Some("short")));
        assert!(!registry.validate("inst", Some(&format!("{}00", token))));
    }

    #[test]
    fn test_validate_missing_token_rejected() {
        let registry = TokenRegistry::new(UnregisteredInstancePolicy::Allow);
        registry.generate("inst");

        assert!(!registry.validate("inst", None));
        assert!(!registry.validate("inst", Some("")));
        assert!(!registry.validate("legacy", None));
    }

    #[test]
    fn test_unregistered_instance_rejected_by_default() {
        let registry = TokenRegistry::default();
        assert_eq!(registry.policy(), UnregisteredInstancePolicy::Reject);
        assert!(!registry.validate("legacy", Some("anything")));
    }

    #[test]
    fn test_unregistered_instance_allowed_when_opted_in() {
        let registry = TokenRegistry::new(UnregisteredInstancePolicy::Allow);
        assert!(registry.validate("legacy", Some("anything")));
    }

    #[test]
    fn test_registered_instance_still_checked_when_permissive() {
        let registry = TokenRegistry::new(UnregisteredInstancePolicy::Allow);
        registry.generate("inst");
        assert!(!registry.validate("inst", Some("anything")));
    }

    #[test]
    fn test_remove() {
        let registry = TokenRegistry::default();
        let token = registry.generate("inst");

        assert!(registry.remove("inst"));
        assert!(!registry.remove("inst"));
        assert!(registry.is_empty());
        assert!(!registry.validate("inst", Some(&token)));
    }

    #[test]
    fn test_clones_share_tokens() {
        let registry = TokenRegistry::default();
        let clone = registry.clone();
        let token = clone.generate("inst");
        assert!(registry.validate("inst", Some(&token)));
    }

    #[test]
    fn test_policy_serde() {
        let policy: UnregisteredInstancePolicy = serde_json::from_str("\"allow\"").unwrap();
        assert_eq!(policy, UnregisteredInstancePolicy::Allow);
    }
}
