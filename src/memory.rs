//! In-process holder repository and state store

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::error::{PermError, Result};
use crate::flag::Flag;
use crate::holder::{HolderKey, HolderRepository, PermissionHolder};
use crate::set::PermissionSet;
use crate::tracker::{CooldownLimitState, StateStore};

type StateKey = (HolderKey, String);
type Slot = Arc<Mutex<CooldownLimitState>>;

fn poisoned<T>(_: PoisonError<T>) -> PermError {
    PermError::Store("lock poisoned".into())
}

/// Memory-only store. Updates serialize per `(holder, flag)` key, so
/// unrelated keys never contend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    holders: RwLock<HashMap<HolderKey, Vec<Flag>>>,
    states: Mutex<HashMap<StateKey, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a holder's stored flags
    pub fn set_permissions(&self, holder: &PermissionHolder, flags: &[Flag]) -> Result<()> {
        let set: PermissionSet = flags.iter().cloned().collect();
        self.holders.write().map_err(poisoned)?.insert(holder.key(), set.into_vec());
        Ok(())
    }

    /// Add flags, creating the holder if needed; returns how many were new
    pub fn grant(&self, holder: &PermissionHolder, flags: &[Flag]) -> Result<usize> {
        let mut holders = self.holders.write().map_err(poisoned)?;
        let entry = holders.entry(holder.key()).or_default();
        let mut set: PermissionSet = std::mem::take(entry).into_iter().collect();
        let added = flags.iter().filter(|f| set.insert((*f).clone())).count();
        *entry = set.into_vec();
        Ok(added)
    }

    /// Remove flags; returns how many were present
    pub fn revoke(&self, holder: &PermissionHolder, flags: &[Flag]) -> Result<usize> {
        let mut holders = self.holders.write().map_err(poisoned)?;
        let Some(current) = holders.get_mut(&holder.key()) else {
            return Ok(0);
        };
        let before = current.len();
        current.retain(|f| !flags.contains(f));
        Ok(before - current.len())
    }

    pub fn remove_holder(&self, holder: &PermissionHolder) -> Result<bool> {
        Ok(self.holders.write().map_err(poisoned)?.remove(&holder.key()).is_some())
    }

    /// Forget the cooldown/limit record of one key; returns whether it existed
    pub fn reset_state(&self, holder: &HolderKey, flag_key: &str) -> Result<bool> {
        Ok(self.states.lock().map_err(poisoned)?.remove(&(holder.clone(), flag_key.to_string())).is_some())
    }

    /// Slot for a key, created lazily
    fn slot(&self, holder: &HolderKey, flag_key: &str) -> Result<Slot> {
        let mut states = self.states.lock().map_err(poisoned)?;
        Ok(states.entry((holder.clone(), flag_key.to_string())).or_default().clone())
    }

    fn lock(slot: &Slot) -> Result<MutexGuard<'_, CooldownLimitState>> {
        slot.lock().map_err(poisoned)
    }
}

impl HolderRepository for MemoryStore {
    fn get_permissions(&self, holder: &PermissionHolder) -> Result<Vec<Flag>> {
        let key = holder.key();
        match self.holders.read().map_err(poisoned)?.get(&key) {
            Some(flags) => Ok(flags.clone()),
            None => Err(PermError::NotFound(key)),
        }
    }
}

impl StateStore for MemoryStore {
    fn load(&self, holder: &HolderKey, flag_key: &str) -> Result<CooldownLimitState> {
        let slot = self.states.lock().map_err(poisoned)?.get(&(holder.clone(), flag_key.to_string())).cloned();
        let state = match slot {
            Some(slot) => *Self::lock(&slot)?,
            None => CooldownLimitState::default(),
        };
        Ok(state)
    }

    fn save(&self, holder: &HolderKey, flag_key: &str, state: &CooldownLimitState) -> Result<()> {
        let slot = self.slot(holder, flag_key)?;
        *Self::lock(&slot)? = *state;
        Ok(())
    }

    fn update(
        &self,
        holder: &HolderKey,
        flag_key: &str,
        decide: &mut dyn FnMut(&mut CooldownLimitState) -> bool,
    ) -> Result<()> {
        let mut states = self.states.lock().map_err(poisoned)?;
        let key = (holder.clone(), flag_key.to_string());
        let Some(slot) = states.get(&key).cloned() else {
            // First touch: decide under the map lock, insert only on change
            let mut state = CooldownLimitState::default();
            if decide(&mut state) {
                states.insert(key, Arc::new(Mutex::new(state)));
            }
            return Ok(());
        };
        drop(states);

        // Held across load, decide and save
        let mut guard = Self::lock(&slot)?;
        let mut state = *guard;
        if decide(&mut state) {
            *guard = state;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::parse_flag;

    fn flags(raw: &[&str]) -> Vec<Flag> {
        raw.iter().map(|s| parse_flag(s).unwrap()).collect()
    }

    fn holder() -> PermissionHolder {
        PermissionHolder::Role("5f8d0d55b54764421b7156ca".into())
    }

    #[test]
    fn grant_revoke_remove() {
        let store = MemoryStore::new();
        assert!(matches!(store.get_permissions(&holder()), Err(PermError::NotFound(_))));

        assert_eq!(store.grant(&holder(), &flags(&["a", "b", "a"])).unwrap(), 2);
        assert_eq!(store.grant(&holder(), &flags(&["b", "c"])).unwrap(), 1);
        assert_eq!(store.revoke(&holder(), &flags(&["a", "z"])).unwrap(), 1);
        assert_eq!(store.get_permissions(&holder()).unwrap(), flags(&["b", "c"]));

        assert!(store.remove_holder(&holder()).unwrap());
        assert_eq!(store.revoke(&holder(), &flags(&["b"])).unwrap(), 0);
    }

    #[test]
    fn state_slots() {
        let store = MemoryStore::new();
        let key = holder().key();
        assert_eq!(store.load(&key, "x").unwrap(), CooldownLimitState::default());

        store
            .update(&key, "x", &mut |s: &mut CooldownLimitState| {
                s.uses_consumed = 3;
                true
            })
            .unwrap();
        assert_eq!(store.load(&key, "x").unwrap().uses_consumed, 3);

        store
            .update(&key, "x", &mut |s: &mut CooldownLimitState| {
                s.uses_consumed = 7;
                false
            })
            .unwrap();
        assert_eq!(store.load(&key, "x").unwrap().uses_consumed, 3);

        assert!(store.reset_state(&key, "x").unwrap());
        assert_eq!(store.load(&key, "x").unwrap(), CooldownLimitState::default());
    }

    #[test]
    fn unchanged_updates_leave_no_slot() {
        let store = MemoryStore::new();
        let key = holder().key();
        for _ in 0..3 {
            store.update(&key, "x:0:0", &mut |_: &mut CooldownLimitState| false).unwrap();
        }
        assert!(store.states.lock().unwrap().is_empty());

        store
            .update(&key, "x", &mut |s: &mut CooldownLimitState| {
                s.uses_consumed = 1;
                true
            })
            .unwrap();
        assert_eq!(store.states.lock().unwrap().len(), 1);
    }
}
