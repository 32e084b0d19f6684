//! Credential resolution.
//!
//! The password stored in `<name>-secret` is the source of truth once it
//! exists. Only before that is the declared `spec.password` used, and only if
//! that is empty is a random password generated. Changing `spec.password` on a
//! running cluster therefore does not rotate its credential.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use kube::ResourceExt;
use rand::RngCore;
use tracing::{debug, warn};

use crate::controller::error::{Error, Result};
use crate::controller::store::{ChildKind, ChildResource, ResourceStore};
use crate::crd::KeyDb;
use crate::resources::common::secret_name;
use crate::resources::secret::stored_password;

/// Number of random bytes in a generated password.
pub const GENERATED_PASSWORD_BYTES: usize = 16;

/// Value used when the entropy source fails.
pub const FALLBACK_PASSWORD: &str = "changeme";

/// Where the resolved password came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CredentialSource {
    /// Existing Secret.
    Stored,
    /// `spec.password`.
    Declared,
    /// Freshly generated.
    Generated,
    /// Generation failed; placeholder in use.
    Fallback,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Stored => write!(f, "stored"),
            CredentialSource::Declared => write!(f, "declared"),
            CredentialSource::Generated => write!(f, "generated"),
            CredentialSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// The authoritative password for one reconciliation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub password: String,
    pub source: CredentialSource,
}

// Keep the password out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("password", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve the password for a KeyDb, looking up its Secret through `store`.
///
/// A missing Secret falls through to the declared or generated password; any
/// other lookup failure is returned. `rng` is only drawn from when a new
/// password has to be generated.
pub async fn resolve_credential<R: RngCore + Send>(
    store: &dyn ResourceStore,
    resource: &KeyDb,
    rng: &mut R,
) -> Result<Credential> {
    let namespace = resource
        .namespace()
        .ok_or_else(|| Error::MissingField(format!("metadata.namespace of KeyDb {}", resource.name_any())))?;
    let name = secret_name(resource);

    let stored = match store.get(ChildKind::Secret, &namespace, &name).await? {
        Some(ChildResource::Secret(secret)) => stored_password(&secret)?,
        Some(other) => {
            return Err(Error::Transient(format!(
                "expected Secret {namespace}/{name}, store returned {}",
                other.kind()
            )));
        }
        None => None,
    };

    Ok(choose_credential(
        stored,
        resource.spec.password.as_deref(),
        rng,
    ))
}

/// Apply the precedence rules: stored, then declared, then generated.
pub fn choose_credential<R: RngCore>(
    stored: Option<String>,
    declared: Option<&str>,
    rng: &mut R,
) -> Credential {
    if let Some(password) = stored.filter(|p| !p.is_empty()) {
        debug!("Reusing stored password");
        return Credential {
            password,
            source: CredentialSource::Stored,
        };
    }

    if let Some(password) = declared.filter(|p| !p.is_empty()) {
        return Credential {
            password: password.to_string(),
            source: CredentialSource::Declared,
        };
    }

    match generate_password(rng) {
        Ok(password) => Credential {
            password,
            source: CredentialSource::Generated,
        },
        Err(e) => {
            warn!(error = %e, "Password generation failed, using placeholder password");
            Credential {
                password: FALLBACK_PASSWORD.to_string(),
                source: CredentialSource::Fallback,
            }
        }
    }
}

/// Generate a random password: 16 bytes, URL-safe base64 without padding.
pub fn generate_password<R: RngCore>(rng: &mut R) -> std::result::Result<String, rand::Error> {
    let mut bytes = [0u8; GENERATED_PASSWORD_BYTES];
    rng.try_fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
