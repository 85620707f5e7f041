//! Named checkpoint handles
//!
//! A [`Checkpoint`] binds an identity (and optionally a list of keyword
//! arguments to leave out of the key) to a cache, so a pipeline step can be
//! written once and called many times:
//!
//! ```rust,ignore
//! let enhance = cache.checkpoint("step2_enhance_text");
//! let upper: String = enhance
//!     .run(CallArgs::new().arg(&text), || async { Ok::<_, StepCacheError>(text.to_uppercase()) })
//!     .await?;
//! ```

use crate::cache::engine::CheckpointCache;
use crate::cache::key::CallArgs;
use crate::error::StepCacheError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;

/// A pipeline step routed through a [`CheckpointCache`]
pub struct Checkpoint<'a> {
    cache: &'a CheckpointCache,
    identity: String,
    excluded: Vec<String>,
}

impl<'a> Checkpoint<'a> {
    pub(crate) fn new(cache: &'a CheckpointCache, identity: String) -> Self {
        Self {
            cache,
            identity,
            excluded: vec![],
        }
    }

    /// Leave the named keyword arguments out of the cache key
    ///
    /// Excluded arguments may hold values that cannot be serialized. If an
    /// excluded argument changes the result, callers get the result cached
    /// for the first value seen.
    pub fn exclude_args<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(names.into_iter().map(Into::into));
        self
    }

    /// Identity this checkpoint is tracked under
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Keyword names excluded from the key
    pub fn excluded_args(&self) -> &[String] {
        &self.excluded
    }

    /// Run the step with `args`, computing only on a cache miss
    pub async fn run<T, E, F, Fut>(&self, args: CallArgs, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StepCacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let args = args.without(&self.excluded);
        self.cache.run(&self.identity, &args, compute).await
    }
}

impl CheckpointCache {
    /// Handle for the checkpoint named `identity`
    pub fn checkpoint(&self, identity: impl Into<String>) -> Checkpoint<'_> {
        Checkpoint::new(self, identity.into())
    }
}

/// Checkpoint handle named after a function
///
/// `checkpoint!(cache, steps::load_input)` is `cache.checkpoint("load_input")`.
#[macro_export]
macro_rules! checkpoint {
    ($cache:expr, $func:path) => {
        $cache.checkpoint($crate::cache::key::default_identity(stringify!($func)))
    };
}
