// ABOUTME: Phantom-typed identifiers handed out by the container runtime.
// ABOUTME: Keeps container handles and image IDs from being swapped by accident.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker types for phantom type parameters.
pub enum ContainerMarker {}
pub enum ImageMarker {}

/// Length of the abbreviated form printed by Docker and Podman.
const SHORT_LEN: usize = 12;

/// An opaque runtime-assigned identifier.
///
/// The marker parameter means a `ContainerId` can never be passed where an
/// `ImageId` is expected, even though both are strings on the wire.
#[must_use = "IDs reference runtime resources and should not be ignored"]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Abbreviated form, as shown by `docker ps`.
    pub fn short(&self) -> &str {
        let value = self.value.strip_prefix("sha256:").unwrap_or(&self.value);
        match value.char_indices().nth(SHORT_LEN) {
            Some((end, _)) => &value[..end],
            None => value,
        }
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

// T is only a marker, so these impls must not require T: Trait.

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Handle of a created container.
pub type ContainerId = Id<ContainerMarker>;
/// Identifier of a locally stored image.
pub type ImageId = Id<ImageMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_truncates_long_ids() {
        let id = ContainerId::new("4f1c2e9a7b3d5e6f7a8b9c0d");
        assert_eq!(id.short(), "4f1c2e9a7b3d");
    }

    #[test]
    fn short_strips_digest_prefix() {
        let id = ImageId::new("sha256:0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
    }

    #[test]
    fn short_keeps_short_ids() {
        let id = ContainerId::new("abc");
        assert_eq!(id.short(), "abc");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = ContainerId::new("c0ffee");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"c0ffee\"");
        let back: ContainerId = serde_json::from_str("\"c0ffee\"").unwrap();
        assert_eq!(back, id);
    }
}
