//! Transaction wrapper for batched writes

use heed::{Env, RwTxn};

use crate::db::{encode_flags, encode_state, read_permissions, read_state, Dbs};
use crate::error::{err, Result};
use crate::flag::{Flag, StrictFlag};
use crate::holder::{HolderKey, PermissionHolder};
use crate::keys::{holder_key, state_key};
use crate::model::PermissionDef;
use crate::set::PermissionSet;
use crate::tracker::CooldownLimitState;

/// Write transaction over every database of one store
pub struct Tx<'a> {
    txn: RwTxn<'a>,
    dbs: &'a Dbs,
}

impl<'a> Tx<'a> {
    #[inline]
    pub(crate) fn new(env: &'a Env, dbs: &'a Dbs) -> Result<Self> {
        Ok(Tx { txn: env.write_txn().map_err(err)?, dbs })
    }

    #[inline]
    pub(crate) fn commit(self) -> Result<()> {
        self.txn.commit().map_err(err)
    }

    /// Stored flags of a holder, `None` if it has no record
    pub fn get_permissions(&self, holder: &PermissionHolder) -> Result<Option<Vec<Flag>>> {
        read_permissions(self.dbs, &self.txn, &holder.key())
    }

    /// Replace a holder's stored flags (deduplicated, order kept)
    pub fn set_permissions(&mut self, holder: &PermissionHolder, flags: &[Flag]) -> Result<()> {
        let set: PermissionSet = flags.iter().cloned().collect();
        self.put_permissions(&holder.key(), &set.into_vec())
    }

    /// Add flags, creating the holder if needed
    pub fn grant(&mut self, holder: &PermissionHolder, flags: &[Flag]) -> Result<usize> {
        let key = holder.key();
        let mut set: PermissionSet = read_permissions(self.dbs, &self.txn, &key)?.unwrap_or_default().into_iter().collect();
        let added = flags.iter().filter(|f| set.insert((*f).clone())).count();
        self.put_permissions(&key, &set.into_vec())?;
        Ok(added)
    }

    /// Remove flags (exact canonical match only); the holder record is kept
    pub fn revoke(&mut self, holder: &PermissionHolder, flags: &[Flag]) -> Result<usize> {
        let key = holder.key();
        let Some(current) = read_permissions(self.dbs, &self.txn, &key)? else {
            return Ok(0);
        };
        let before = current.len();
        let kept: Vec<Flag> = current.into_iter().filter(|f| !flags.contains(f)).collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.put_permissions(&key, &kept)?;
        }
        Ok(removed)
    }

    /// Drop a holder record. Cooldown/limit state is left in place.
    pub fn remove_holder(&mut self, holder: &PermissionHolder) -> Result<bool> {
        self.dbs.holders.delete(&mut self.txn, &holder_key(&holder.key())?).map_err(err)
    }

    fn put_permissions(&mut self, key: &HolderKey, flags: &[Flag]) -> Result<()> {
        self.dbs.holders.put(&mut self.txn, &holder_key(key)?, &encode_flags(flags)).map_err(err)
    }

    pub fn load_state(&self, holder: &HolderKey, flag_key: &str) -> Result<CooldownLimitState> {
        read_state(self.dbs, &self.txn, holder, flag_key)
    }

    pub fn save_state(&mut self, holder: &HolderKey, flag_key: &str, state: &CooldownLimitState) -> Result<()> {
        self.dbs.states.put(&mut self.txn, &state_key(holder, flag_key)?, &encode_state(state)).map_err(err)
    }

    pub fn reset_state(&mut self, holder: &HolderKey, flag_key: &str) -> Result<bool> {
        self.dbs.states.delete(&mut self.txn, &state_key(holder, flag_key)?).map_err(err)
    }

    pub fn define_permission(&mut self, def: &PermissionDef) -> Result<()> {
        let json = serde_json::to_string(def).map_err(err)?;
        self.dbs.definitions.put(&mut self.txn, def.key.as_str(), &json).map_err(err)
    }

    pub fn remove_permission(&mut self, key: &StrictFlag) -> Result<bool> {
        self.dbs.definitions.delete(&mut self.txn, key.as_str()).map_err(err)
    }

    pub(crate) fn clear_all(&mut self) -> Result<()> {
        self.dbs.holders.clear(&mut self.txn).map_err(err)?;
        self.dbs.states.clear(&mut self.txn).map_err(err)?;
        self.dbs.definitions.clear(&mut self.txn).map_err(err)
    }
}
