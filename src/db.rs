//! LMDB-backed holder repository, state store and definition registry

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use tracing::info;

use crate::config::StoreConfig;
use crate::constants::{DB_DEFINITIONS, DB_HOLDERS, DB_STATES};
use crate::error::{err, PermError, Result};
use crate::flag::{flag_array, Flag, StrictFlag};
use crate::holder::{HolderKey, HolderRepository, HolderType, PermissionHolder};
use crate::keys::{holder_key, parse_key, state_key};
use crate::model::PermissionDef;
use crate::tracker::{CooldownLimitState, StateStore};
use crate::tx::Tx;

const STATE_LEN: usize = 17;

/// All database handles
pub struct Dbs {
    /// holder key -> newline separated flags
    pub holders: Database<Bytes, Str>,
    /// holder key + flag digest -> [present][last_invoked_at][uses_consumed]
    pub states: Database<Bytes, Bytes>,
    /// strict flag -> JSON PermissionDef
    pub definitions: Database<Str, Str>,
}

/// Store on a single LMDB environment. Cheap to clone.
///
/// LMDB admits one write transaction at a time, so every
/// [`StateStore::update`] is atomic across threads sharing the environment.
#[derive(Clone)]
pub struct LmdbStore {
    env: Env,
    dbs: Arc<Dbs>,
}

pub(crate) fn encode_flags(flags: &[Flag]) -> String {
    flags.iter().map(Flag::as_str).collect::<Vec<_>>().join("\n")
}

pub(crate) fn decode_flags(raw: &str) -> Vec<Flag> {
    let lines: Vec<&str> = raw.lines().filter(|l| !l.is_empty()).collect();
    // Every stored flag was parsed on the way in; a bad line is dropped, not fatal
    flag_array(&lines, true, true).unwrap_or_default()
}

/// `[present u8][last_invoked_at u64][uses_consumed u64]`, big-endian
pub(crate) fn encode_state(state: &CooldownLimitState) -> [u8; STATE_LEN] {
    let mut buf = [0u8; STATE_LEN];
    buf[0] = u8::from(state.last_invoked_at.is_some());
    BigEndian::write_u64(&mut buf[1..9], state.last_invoked_at.unwrap_or(0));
    BigEndian::write_u64(&mut buf[9..], state.uses_consumed);
    buf
}

pub(crate) fn decode_state(bytes: &[u8]) -> Result<CooldownLimitState> {
    if bytes.len() != STATE_LEN {
        return Err(PermError::Store(format!("corrupt state record ({} bytes)", bytes.len())));
    }
    let last = BigEndian::read_u64(&bytes[1..9]);
    Ok(CooldownLimitState {
        last_invoked_at: (bytes[0] != 0).then_some(last),
        uses_consumed: BigEndian::read_u64(&bytes[9..]),
    })
}

// Shared read paths, usable from both read and write transactions
pub(crate) fn read_permissions(d: &Dbs, tx: &RoTxn, holder: &HolderKey) -> Result<Option<Vec<Flag>>> {
    Ok(d.holders.get(tx, &holder_key(holder)?).map_err(err)?.map(decode_flags))
}

pub(crate) fn read_state(d: &Dbs, tx: &RoTxn, holder: &HolderKey, flag_key: &str) -> Result<CooldownLimitState> {
    match d.states.get(tx, &state_key(holder, flag_key)?).map_err(err)? {
        Some(bytes) => decode_state(bytes),
        None => Ok(CooldownLimitState::default()),
    }
}

impl LmdbStore {
    /// Open (creating if needed) the environment described by `config`
    pub fn open(config: &StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.path).map_err(err)?;
        // SAFETY: LMDB requires no other process to open this path with different flags concurrently.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size)
                .max_dbs(config.max_dbs)
                .open(&config.path)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let dbs = Dbs {
            holders: env.create_database(&mut tx, Some(DB_HOLDERS)).map_err(err)?,
            states: env.create_database(&mut tx, Some(DB_STATES)).map_err(err)?,
            definitions: env.create_database(&mut tx, Some(DB_DEFINITIONS)).map_err(err)?,
        };
        tx.commit().map_err(err)?;
        info!(path = %config.path.display(), map_size = config.map_size, "opened permission store");
        Ok(LmdbStore { env, dbs: Arc::new(dbs) })
    }

    /// Open with default sizing at `path`
    pub fn open_path(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::open(&StoreConfig::at(path))
    }

    /// Execute a read-only operation
    pub fn read<T, F: FnOnce(&Dbs, &RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        f(&self.dbs, &self.env.read_txn().map_err(err)?)
    }

    /// Run multiple operations in a single write transaction
    pub fn transact<T, F: FnOnce(&mut Tx) -> Result<T>>(&self, f: F) -> Result<T> {
        let mut tx = Tx::new(&self.env, &self.dbs)?;
        let r = f(&mut tx)?;
        tx.commit()?;
        Ok(r)
    }

    // Holders

    /// Replace a holder's stored flags
    pub fn set_permissions(&self, holder: &PermissionHolder, flags: &[Flag]) -> Result<()> {
        self.transact(|tx| tx.set_permissions(holder, flags))
    }

    /// Add flags to a holder (creating it); returns how many were new
    pub fn grant(&self, holder: &PermissionHolder, flags: &[Flag]) -> Result<usize> {
        self.transact(|tx| tx.grant(holder, flags))
    }

    /// Remove flags from a holder; returns how many were present
    pub fn revoke(&self, holder: &PermissionHolder, flags: &[Flag]) -> Result<usize> {
        self.transact(|tx| tx.revoke(holder, flags))
    }

    pub fn remove_holder(&self, holder: &PermissionHolder) -> Result<bool> {
        self.transact(|tx| tx.remove_holder(holder))
    }

    pub fn holder_exists(&self, holder: &PermissionHolder) -> Result<bool> {
        self.read(|d, tx| Ok(read_permissions(d, tx, &holder.key())?.is_some()))
    }

    /// Every holder with a stored record
    pub fn list_holders(&self) -> Result<Vec<PermissionHolder>> {
        self.read(|d, tx| {
            let mut r = Vec::new();
            for item in d.holders.iter(tx).map_err(err)? {
                let (k, _) = item.map_err(err)?;
                if let [t, id] = parse_key(k).as_slice() {
                    if let Some(t) = HolderType::parse(t) {
                        r.push(t.holder(*id));
                    }
                }
            }
            Ok(r)
        })
    }

    // State

    /// Forget the cooldown/limit record of one key; returns whether it existed
    pub fn reset_state(&self, holder: &HolderKey, flag_key: &str) -> Result<bool> {
        self.transact(|tx| tx.reset_state(holder, flag_key))
    }

    // Definitions

    pub fn define_permission(&self, def: &PermissionDef) -> Result<()> {
        self.transact(|tx| tx.define_permission(def))
    }

    pub fn get_permission(&self, key: &StrictFlag) -> Result<Option<PermissionDef>> {
        self.read(|d, tx| match d.definitions.get(tx, key.as_str()).map_err(err)? {
            Some(json) => serde_json::from_str(json).map(Some).map_err(err),
            None => Ok(None),
        })
    }

    pub fn remove_permission(&self, key: &StrictFlag) -> Result<bool> {
        self.transact(|tx| tx.remove_permission(key))
    }

    /// All definitions in key order
    pub fn list_permissions(&self) -> Result<Vec<PermissionDef>> {
        self.read(|d, tx| {
            let mut r = Vec::new();
            for item in d.definitions.iter(tx).map_err(err)? {
                let (_, json) = item.map_err(err)?;
                r.push(serde_json::from_str(json).map_err(err)?);
            }
            Ok(r)
        })
    }

    /// Clear all databases (for testing)
    pub fn clear_all(&self) -> Result<()> {
        self.transact(|tx| tx.clear_all())
    }
}

impl HolderRepository for LmdbStore {
    fn get_permissions(&self, holder: &PermissionHolder) -> Result<Vec<Flag>> {
        let key = holder.key();
        self.read(|d, tx| read_permissions(d, tx, &key))?.ok_or(PermError::NotFound(key))
    }
}

impl StateStore for LmdbStore {
    fn load(&self, holder: &HolderKey, flag_key: &str) -> Result<CooldownLimitState> {
        self.read(|d, tx| read_state(d, tx, holder, flag_key))
    }

    fn save(&self, holder: &HolderKey, flag_key: &str, state: &CooldownLimitState) -> Result<()> {
        self.transact(|tx| tx.save_state(holder, flag_key, state))
    }

    fn update(
        &self,
        holder: &HolderKey,
        flag_key: &str,
        decide: &mut dyn FnMut(&mut CooldownLimitState) -> bool,
    ) -> Result<()> {
        self.transact(|tx| {
            let mut state = tx.load_state(holder, flag_key)?;
            if decide(&mut state) {
                tx.save_state(holder, flag_key, &state)?;
            }
            Ok(())
        })
    }
}
