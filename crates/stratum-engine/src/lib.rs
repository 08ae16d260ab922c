//! Context-aware hierarchical permission resolution.
//!
//! The engine answers one question: *which permissions does a subject
//! hold, and at what value, in a given context?* Subjects belong to
//! groups, groups inherit from parent groups, and any node may carry
//! different values per context (world, gamemode, ...). Conflicts resolve
//! by context specificity first, then deny precedence among equally
//! specific candidates.
//!
//! The store is synchronous and has no internal locking; multi-threaded
//! hosts wrap it in a single exclusive lock.
//!
//! ```
//! use stratum_core::{ContextSet, SubjectId};
//! use stratum_engine::{PermissionStore, Settings};
//!
//! let mut store = PermissionStore::new(Settings::default());
//! store.create_group("admin").unwrap();
//! store
//!     .set_group_permission("admin", "command.fly", true, &ContextSet::new())
//!     .unwrap();
//!
//! let id = SubjectId::new();
//! store.create_subject(id, "alice");
//! store.add_group_membership(&id, "admin").unwrap();
//!
//! let effective = store.resolve(&id, &ContextSet::new()).unwrap();
//! assert_eq!(effective.get("command.fly"), Some(&true));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]

mod cache;
mod config;
mod error;
mod primary;
mod registry;
mod resolver;
mod store;
mod tracks;

pub use config::{PrimaryGroupStrategy, Settings};
pub use error::{EngineError, EngineResult};
pub use registry::PermissionRegistry;
pub use store::PermissionStore;
