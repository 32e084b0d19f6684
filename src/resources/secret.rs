//! Secret generation for the KeyDB credential.

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;

use crate::controller::error::{Error, Result};
use crate::crd::KeyDb;
use crate::resources::common::{child_metadata, secret_name};

/// Key holding the raw password bytes.
pub const PASSWORD_KEY: &str = "password";

/// Generate the credential Secret holding `password`.
pub fn generate_secret(resource: &KeyDb, password: &str) -> Result<Secret> {
    Ok(Secret {
        metadata: child_metadata(resource, secret_name(resource))?,
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([(
            PASSWORD_KEY.to_string(),
            ByteString(password.as_bytes().to_vec()),
        )])),
        ..Default::default()
    })
}

/// Read the password out of a stored Secret.
///
/// Empty or missing values count as absent. A value that is not valid UTF-8
/// is an error: it cannot be written into `keydb.conf` unchanged.
pub fn stored_password(secret: &Secret) -> Result<Option<String>> {
    let Some(value) = secret
        .data
        .as_ref()
        .and_then(|data| data.get(PASSWORD_KEY))
        .filter(|value| !value.0.is_empty())
    else {
        return Ok(None);
    };

    String::from_utf8(value.0.clone()).map(Some).map_err(|e| {
        Error::Configuration(format!(
            "{PASSWORD_KEY} in Secret {} is not valid UTF-8: {e}",
            secret.metadata.name.as_deref().unwrap_or_default()
        ))
    })
}
