//! Flagperm - permission flag evaluation
//!
//! Holders (users, roles, external-platform users and roles) are granted
//! dot-delimited flags such as `mod.ban.*:30:5`. A check asks whether a holder
//! has a set of required flags and whether it may use them right now:
//!
//! - `?` matches one segment, a trailing `*` matches the rest, `*` matches all
//! - the most specific matching grant decides which cooldown and limit apply
//! - `:30` is a cooldown in seconds, `:30:5` adds a lifetime usage limit
//!
//! ```no_run
//! use flagperm::{parse_flag, CheckRequest, Engine, LmdbStore, PermissionHolder};
//!
//! let store = LmdbStore::open_path("./data/perms.mdb")?;
//! let holder = PermissionHolder::User("5f8d0d55b54764421b7156c9".into());
//! store.grant(&holder, &[parse_flag("mod.ban.*:30:5")?])?;
//!
//! let engine = Engine::new(store.clone(), store);
//! let req = CheckRequest::new(holder, vec![parse_flag("mod.ban.user")?]).invoke();
//! engine.assert_permitted(&req)?;
//! # Ok::<(), flagperm::PermError>(())
//! ```

pub mod checks;
pub mod config;
pub mod constants;
pub mod db;
pub mod engine;
pub mod error;
pub mod flag;
pub mod holder;
pub mod keys;
pub mod matcher;
pub mod memory;
pub mod model;
pub mod set;
pub mod tracker;
pub mod tx;

pub use config::StoreConfig;
pub use db::LmdbStore;
pub use engine::{all_passed, current_epoch, missing, CheckRequest, CheckResult, Engine};
pub use error::{Grammar, PermError, Result};
pub use flag::{flag_array, is_valid_flag, parse_flag, parse_strict_flag, Flag, StrictFlag};
pub use holder::{HolderKey, HolderRepository, HolderType, PermissionHolder};
pub use matcher::{best_match, matches, specificity};
pub use memory::MemoryStore;
pub use model::PermissionDef;
pub use set::{difference, unique, PermissionSet};
pub use tracker::{CooldownLimitState, Policy, StateStore, Verdict};
pub use tx::Tx;
