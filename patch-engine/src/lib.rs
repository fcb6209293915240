//! # patch-engine
//!
//! Structural patches for JSON config documents.
//!
//! ## Approach
//!
//! A config document is a tree of objects with scalar leaves. Changes to it
//! are recorded as a [`Patch`] with three buckets:
//!
//! 1. **create-on-missing**: leaves written only where the target lacks them
//! 2. **overwrite**: leaves written unconditionally
//! 3. **remove**: markers for keys to delete; an empty marker deletes the
//!    key, a non-empty one descends into it
//!
//! Patches are grouped per version into a [`PatchSet`] and versions form a
//! contiguous, append-only [`PatchChain`]. Folding the chain for one file
//! gives that file's *baseline*. New patches come from comparing a live file
//! against its baseline: every differing leaf is classified
//! (CREATE / OVERWRITE / REMOVE) and a [`Resolver`] decides which side wins.
//!
//! ## Example
//!
//! ```rust
//! use patch_engine::{resolve_patch, ConfigTree, Conflict, Disposition, ResolveError};
//! use serde_json::json;
//!
//! let live: ConfigTree = serde_json::from_value(json!({"volume": 5})).unwrap();
//! let baseline = ConfigTree::new();
//!
//! let mut keep = |_: &str, _: &Conflict| -> Result<Disposition, ResolveError> {
//!     Ok(Disposition::KeepOnDisk)
//! };
//! let patch = resolve_patch("Mod/config.json", &live, &baseline, &mut keep)
//!     .unwrap()
//!     .unwrap();
//!
//! let fresh = patch.apply(ConfigTree::new()).unwrap();
//! assert_eq!(fresh, live);
//! ```

pub mod chain;
pub mod classify;
pub mod diff;
pub mod error;
pub mod patch;
pub mod types;

// Re-export primary public API
pub use chain::PatchChain;
pub use classify::{Resolver, classify, flatten, resolve_patch};
pub use diff::diff_trees;
pub use error::{ChainError, EngineError, PatchError, ResolveError};
pub use patch::{Patch, PatchSet};
pub use types::{Classification, ConfigTree, Conflict, Disposition, LeafPath, TreeDiff};
