//! Filter expression engine for structured resources.
//!
//! Compile an expression such as `status:RUNNING disks.sizeGb>100` once
//! against a [`ProjectionEnv`], then evaluate it against any number of
//! [`Value`]s. Resources need no schema: a `Value` is any tree of scalars,
//! lists and maps, typically converted from JSON.
//!
//! # Quick Start
//!
//! ```
//! use resource_filter::{Filter, ProjectionEnv, Value};
//! use serde_json::json;
//!
//! let env = ProjectionEnv::builtin();
//! let filter = Filter::compile("networkInterfaces.len() > 2", &env).unwrap();
//!
//! let resources: Vec<Value> = vec![
//!     json!({"networkInterfaces": [{}, {}, {}]}).into(),
//!     json!({"networkInterfaces": [{}, {}]}).into(),
//! ];
//! let mut warnings = Vec::new();
//! let selected = filter.filter_values(&resources, &mut warnings).unwrap();
//! assert_eq!(selected.len(), 1);
//! assert!(warnings.is_empty());
//! ```

pub mod filter;
pub mod projection;
pub mod times;
pub mod transform;
pub mod value;

pub use filter::{
    AccessPath, Deprecation, Filter, FilterError, FilterErrorKind, FilterResult, IgnoreWarnings,
    LogWarnings, WarningSink,
};
pub use projection::{Clock, ProjectionEnv, ProjectionEnvBuilder};
pub use transform::{Transform, TransformError};
pub use value::Value;
