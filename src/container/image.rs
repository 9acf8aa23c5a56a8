//! Image references.

use crate::constants::{DEFAULT_IMAGE_TAG, MAX_IMAGE_REF_LEN};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A parsed image reference: `[registry/]repository[:tag][@digest]`.
///
/// Two references that differ only by an omitted `latest` tag compare
/// equal after [`normalized`](Self::normalized).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageRef {
    registry: Option<String>,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    /// Parses and validates an image reference.
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidImageReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        if reference.is_empty() {
            return Err(invalid("reference cannot be empty"));
        }
        if reference.len() > MAX_IMAGE_REF_LEN {
            return Err(invalid("reference too long"));
        }
        if !reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/:.-_@".contains(c))
        {
            return Err(invalid("reference contains invalid characters"));
        }

        let (rest, digest) = match reference.split_once('@') {
            Some((rest, digest)) if !digest.is_empty() => (rest, Some(digest.to_string())),
            Some(_) => return Err(invalid("empty digest")),
            None => (reference, None),
        };

        // A ':' after the last '/' separates the tag; earlier ones belong to a registry port.
        let last_slash = rest.rfind('/').map_or(0, |i| i + 1);
        let (path, tag) = match rest[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                let tag = &rest[split + 1..];
                if tag.is_empty() {
                    return Err(invalid("empty tag"));
                }
                (&rest[..split], Some(tag.to_string()))
            }
            None => (rest, None),
        };

        let (registry, repository) = match path.split_once('/') {
            Some((first, remainder))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), remainder.to_string())
            }
            _ => (None, path.to_string()),
        };

        if repository.is_empty() || repository.split('/').any(str::is_empty) {
            return Err(invalid("empty repository path component"));
        }

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Registry host, if the reference names one.
    #[must_use]
    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    /// Repository including the registry, without tag or digest.
    ///
    /// Cleanup groups images by this value.
    #[must_use]
    pub fn repository(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{registry}/{}", self.repository),
            None => self.repository.clone(),
        }
    }

    /// Explicit tag, if any.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Content digest, if any.
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Returns the reference with the default tag filled in.
    ///
    /// Digest-pinned references are left untouched.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut normalized = self.clone();
        if normalized.tag.is_none() && normalized.digest.is_none() {
            normalized.tag = Some(DEFAULT_IMAGE_TAG.to_string());
        }
        normalized
    }

    /// Returns a copy of this reference with a different tag.
    #[must_use]
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: Some(tag.into()),
            digest: None,
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.repository())?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ImageRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ImageRef {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ImageRef> for String {
    fn from(image: ImageRef) -> Self {
        image.to_string()
    }
}
