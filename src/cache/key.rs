//! Cache key derivation for checkpoint calls
//!
//! A cache key is the SHA-256 digest of the canonical encoding of
//! `[identity, positional args, keyword args]`. Same identity and
//! equal-by-value arguments always give the same key, across runs.

use crate::cache::codec::{to_canonical, Codec};
use crate::error::{StepCacheError, StepCacheResult};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Separator between identity and digest in artifact keys
pub const KEY_SEPARATOR: &str = "__";

/// Store key of the manifest inside a cache root
pub const MANIFEST_KEY: &str = "cache_manifest.json";

/// Hex length of a SHA-256 digest
const DIGEST_HEX_LEN: usize = 64;

/// Longest accepted identity, in bytes
///
/// Artifact names add the separator, digest and extension, and `FsStore`
/// temp names wrap those in a dot prefix and a 32-character suffix. This
/// keeps both under the usual 255-byte file name limit.
pub const MAX_IDENTITY_LEN: usize = 128;

/// Arguments of one checkpointed call, captured by value
///
/// Capture failures are deferred until the key is derived, so an argument
/// that is later excluded from the key never causes an error.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Result<Value, String>>,
    keyword: BTreeMap<String, Result<Value, String>>,
}

impl CallArgs {
    /// Create an empty argument set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.positional.push(to_canonical(value));
        self
    }

    /// Set a keyword argument, replacing any previous value for `name`
    pub fn kwarg<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        self.keyword.insert(name.into(), to_canonical(value));
        self
    }

    /// Copy of these arguments with the named keywords removed
    pub fn without<S: AsRef<str>>(&self, excluded: &[S]) -> Self {
        let mut args = self.clone();
        for name in excluded {
            args.keyword.remove(name.as_ref());
        }
        args
    }

    /// Canonical value `[identity, [args..], {kwargs..}]`
    fn canonical(&self, identity: &str) -> StepCacheResult<Value> {
        let mut positional = Vec::with_capacity(self.positional.len());
        for (index, arg) in self.positional.iter().enumerate() {
            match arg {
                Ok(value) => positional.push(value.clone()),
                Err(reason) => {
                    return Err(StepCacheError::unserializable(
                        identity,
                        format!("positional argument {index}: {reason}"),
                    ))
                }
            }
        }

        let mut keyword = serde_json::Map::new();
        for (name, arg) in &self.keyword {
            match arg {
                Ok(value) => {
                    keyword.insert(name.clone(), value.clone());
                }
                Err(reason) => {
                    return Err(StepCacheError::unserializable(
                        identity,
                        format!("keyword argument '{name}': {reason}"),
                    ))
                }
            }
        }

        Ok(Value::Array(vec![
            Value::String(identity.to_string()),
            Value::Array(positional),
            Value::Object(keyword),
        ]))
    }
}

/// Fixed-length digest identifying one argument set of a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hex form of the digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store key of the artifact for `identity` under this key
    pub fn artifact_key(&self, identity: &str, extension: &str) -> String {
        format!("{identity}{KEY_SEPARATOR}{}.{extension}", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derive the cache key for a call of `identity` with `args`
pub fn derive(codec: &dyn Codec, identity: &str, args: &CallArgs) -> StepCacheResult<CacheKey> {
    let canonical = args.canonical(identity)?;
    let bytes = codec
        .encode(&canonical)
        .map_err(|e| StepCacheError::unserializable(identity, e))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let key = CacheKey(hex::encode(hasher.finalize()));

    debug!("Derived key {} for checkpoint {}", key, identity);
    Ok(key)
}

/// Check that an identity can be embedded in a store key
pub fn validate_identity(identity: &str) -> StepCacheResult<()> {
    let reason = if identity.is_empty() {
        Some("name is empty")
    } else if identity.len() > MAX_IDENTITY_LEN {
        Some("name is longer than 128 bytes")
    } else if identity.contains(['/', '\\', '\0']) {
        Some("name contains a path separator or NUL byte")
    } else if identity.starts_with('.') {
        Some("name starts with '.'")
    } else if identity == MANIFEST_KEY {
        Some("name is reserved for the manifest")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StepCacheError::InvalidIdentity {
            identity: identity.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Recover the owning identity from an artifact store key
///
/// Splits on the last separator, so identities containing `__` parse back
/// exactly. Returns `None` for keys that are not artifacts.
pub fn parse_artifact_key<'a>(key: &'a str, extension: &str) -> Option<&'a str> {
    if key == MANIFEST_KEY {
        return None;
    }
    let stem = key.strip_suffix(extension)?.strip_suffix('.')?;
    let (identity, digest) = stem.rsplit_once(KEY_SEPARATOR)?;
    if identity.is_empty()
        || digest.len() != DIGEST_HEX_LEN
        || !digest.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    Some(identity)
}

/// Default identity for a function path such as `pipeline::step1`
///
/// Takes the last path segment, mirroring how a function's own name
/// identifies it.
pub fn default_identity(function_path: &str) -> &str {
    function_path
        .rsplit("::")
        .next()
        .map(str::trim)
        .unwrap_or(function_path)
}
