//! Credential material that must not leak.
//!
//! [`SecretString`] is the only shape a BYOK key takes inside the engine:
//! no `Clone`, no `Display`, no `Serialize`, memory zeroed on drop, and
//! the raw bytes only reachable through scoped exposure.

use zeroize::Zeroizing;

use crate::model::ByokProvider;

/// An opaque secret. Cannot be logged, serialized, or cloned; the backing
/// memory is zeroed when dropped.
pub struct SecretString {
    inner: Zeroizing<String>,
}

impl SecretString {
    /// Wrap a secret. The input is moved, not copied.
    pub fn new(value: String) -> Self {
        Self {
            inner: Zeroizing::new(value),
        }
    }

    /// Scoped exposure — the secret is only visible inside the closure.
    /// This is the ONLY way to read the value.
    pub fn expose<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        f(&self.inner)
    }

    /// Length in bytes, safe to log.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// Intentionally: no Display, no Clone, no Serialize, no PartialEq.

/// A caller-supplied model credential, handed off out-of-band through the
/// [`crate::KeyStash`] and consumed by exactly one bout.
pub struct ByokCredentials {
    /// Upstream the key belongs to, detected from its prefix.
    pub provider: ByokProvider,
    /// Caller-selected model id for that upstream, when given.
    pub model: Option<String>,
    /// The key itself.
    pub key: SecretString,
}

impl ByokCredentials {
    /// Build credentials from a raw key, detecting the provider.
    pub fn from_raw(key: String, model: Option<String>) -> Self {
        let provider = ByokProvider::detect(&key);
        Self {
            provider,
            model,
            key: SecretString::new(key),
        }
    }
}

impl std::fmt::Debug for ByokCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByokCredentials")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
