//! Projection environment: aliases, transforms, and the clock.
//!
//! A [`ProjectionEnv`] is immutable once built and cheap to clone. Lookups walk
//! the parent chain, so an environment only needs to hold what it adds or
//! overrides:
//!
//! ```
//! use resource_filter::ProjectionEnv;
//!
//! let env = ProjectionEnv::builder()
//!     .parent(ProjectionEnv::builtin())
//!     .alias("v", "compound.string.value")
//!     .unwrap()
//!     .build();
//!
//! assert_eq!(env.alias("v").unwrap().to_string(), "compound.string.value");
//! assert!(env.transform("len").is_some());
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use strsim::levenshtein;

use crate::filter::{AccessPath, FilterError, FilterResult};
use crate::transform::{Transform, BUILTINS};

/// Maximum edit distance for suggesting a transform name.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// The clock relative date operands are resolved against.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Aliases, transforms and clock used to compile and evaluate filters.
#[derive(Clone)]
pub struct ProjectionEnv {
    inner: Arc<EnvInner>,
}

struct EnvInner {
    parent: Option<ProjectionEnv>,
    aliases: HashMap<String, AccessPath>,
    transforms: HashMap<String, Arc<dyn Transform>>,
    clock: Option<Clock>,
}

impl ProjectionEnv {
    /// Starts building an environment.
    pub fn builder() -> ProjectionEnvBuilder {
        ProjectionEnvBuilder::default()
    }

    /// An environment with no aliases, no transforms and the system clock.
    pub fn empty() -> Self {
        Self::builder().build()
    }

    /// An environment holding the built-in transforms.
    pub fn builtin() -> Self {
        BUILTINS
            .iter()
            .fold(Self::builder(), |builder, (name, transform)| {
                builder.transform(*name, *transform)
            })
            .build()
    }

    /// Returns the parent environment, if any.
    pub fn parent(&self) -> Option<&ProjectionEnv> {
        self.inner.parent.as_ref()
    }

    /// Looks up an alias in this environment or its ancestors.
    pub fn alias(&self, name: &str) -> Option<&AccessPath> {
        self.inner
            .aliases
            .get(name)
            .or_else(|| self.parent()?.alias(name))
    }

    /// Looks up a transform in this environment or its ancestors.
    pub fn transform(&self, name: &str) -> Option<&dyn Transform> {
        match self.inner.transforms.get(name) {
            Some(transform) => Some(transform.as_ref()),
            None => self.parent()?.transform(name),
        }
    }

    /// Names of every transform visible from this environment, sorted.
    pub fn transform_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        let mut env = Some(self);
        while let Some(current) = env {
            names.extend(current.inner.transforms.keys().cloned());
            env = current.parent();
        }
        names.into_iter().collect()
    }

    /// The current time according to the nearest clock in the chain.
    pub fn now(&self) -> DateTime<Utc> {
        let mut env = Some(self);
        while let Some(current) = env {
            if let Some(clock) = &current.inner.clock {
                return clock();
            }
            env = current.parent();
        }
        Utc::now()
    }

    /// Closest registered transform name to `name`, for error messages.
    pub(crate) fn suggest_transform(&self, name: &str) -> Option<String> {
        let names = self.transform_names();
        find_similar_name(name, names.iter().map(String::as_str))
    }
}

impl Default for ProjectionEnv {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for ProjectionEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut aliases: Vec<&String> = self.inner.aliases.keys().collect();
        aliases.sort();
        let mut transforms: Vec<&String> = self.inner.transforms.keys().collect();
        transforms.sort();
        f.debug_struct("ProjectionEnv")
            .field("aliases", &aliases)
            .field("transforms", &transforms)
            .field("clock", &self.inner.clock.is_some())
            .field("parent", &self.inner.parent)
            .finish()
    }
}

/// Builder for [`ProjectionEnv`].
#[derive(Default)]
pub struct ProjectionEnvBuilder {
    parent: Option<ProjectionEnv>,
    aliases: HashMap<String, AccessPath>,
    transforms: HashMap<String, Arc<dyn Transform>>,
    clock: Option<Clock>,
}

impl fmt::Debug for ProjectionEnvBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut aliases: Vec<&String> = self.aliases.keys().collect();
        aliases.sort();
        let mut transforms: Vec<&String> = self.transforms.keys().collect();
        transforms.sort();
        f.debug_struct("ProjectionEnvBuilder")
            .field("aliases", &aliases)
            .field("transforms", &transforms)
            .field("clock", &self.clock.is_some())
            .field("parent", &self.parent)
            .finish()
    }
}

impl ProjectionEnvBuilder {
    /// Falls back to `parent` for anything this environment does not define.
    pub fn parent(mut self, parent: ProjectionEnv) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Registers `name` as an alias for the key `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidKey`] if `key` is not a valid access path.
    pub fn alias(self, name: impl Into<String>, key: &str) -> FilterResult<Self> {
        let path = key
            .parse::<AccessPath>()
            .map_err(|reason| FilterError::invalid_key(key, 0, reason))?;
        Ok(self.alias_path(name, path))
    }

    /// Registers `name` as an alias for an already parsed path.
    pub fn alias_path(mut self, name: impl Into<String>, path: AccessPath) -> Self {
        self.aliases.insert(name.into(), path);
        self
    }

    /// Registers a transform under `name`, shadowing any ancestor's.
    pub fn transform(mut self, name: impl Into<String>, transform: impl Transform + 'static) -> Self {
        self.transforms.insert(name.into(), Arc::new(transform));
        self
    }

    /// Sets the clock used for relative date operands.
    pub fn clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Pins the clock to a fixed instant.
    pub fn fixed_clock(self, now: DateTime<Utc>) -> Self {
        self.clock(move || now)
    }

    /// Builds the environment.
    pub fn build(self) -> ProjectionEnv {
        ProjectionEnv {
            inner: Arc::new(EnvInner {
                parent: self.parent,
                aliases: self.aliases,
                transforms: self.transforms,
                clock: self.clock,
            }),
        }
    }
}

/// Finds the candidate closest to `query` by case-insensitive edit distance.
///
/// Returns `None` for exact matches and for candidates further than
/// [`MAX_SUGGESTION_DISTANCE`] edits away.
fn find_similar_name<'a>(query: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let query_lower = query.to_lowercase();

    let (best_match, best_distance) = candidates
        .filter(|name| !name.is_empty())
        .map(|name| {
            let distance = levenshtein(&query_lower, &name.to_lowercase());
            (name.to_string(), distance)
        })
        .min_by_key(|(_, d)| *d)?;

    if best_distance > 0 && best_distance <= MAX_SUGGESTION_DISTANCE {
        Some(best_match)
    } else {
        None
    }
}
