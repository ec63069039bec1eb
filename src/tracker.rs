//! Cooldown and usage-limit bookkeeping
//!
//! State is keyed by `(holderKey, flagKey)` where the flag key is the canonical
//! string of the *granted* flag that matched, so every required flag resolved
//! through the same grant shares one cooldown and one usage counter.
//!
//! Invoking evaluations go through [`StateStore::update`], which must run the
//! load-decide-save sequence atomically per key. Pure reads use `load` only.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::MILLIS_PER_SECOND;
use crate::error::Result;
use crate::flag::Flag;
use crate::holder::HolderKey;

/// Per `(holder, flag)` invocation record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownLimitState {
    /// Epoch millis of the last permitted invocation
    pub last_invoked_at: Option<u64>,
    pub uses_consumed: u64,
}

/// Persistence for cooldown/limit state
pub trait StateStore {
    /// Current state, default when never invoked
    fn load(&self, holder: &HolderKey, flag_key: &str) -> Result<CooldownLimitState>;

    fn save(&self, holder: &HolderKey, flag_key: &str, state: &CooldownLimitState) -> Result<()>;

    /// Load the state, hand it to `decide`, and save it when `decide` returns
    /// true. Concurrent updates of the same key must not interleave.
    fn update(
        &self,
        holder: &HolderKey,
        flag_key: &str,
        decide: &mut dyn FnMut(&mut CooldownLimitState) -> bool,
    ) -> Result<()>;
}

impl<T: StateStore + ?Sized> StateStore for &T {
    fn load(&self, holder: &HolderKey, flag_key: &str) -> Result<CooldownLimitState> {
        (**self).load(holder, flag_key)
    }
    fn save(&self, holder: &HolderKey, flag_key: &str, state: &CooldownLimitState) -> Result<()> {
        (**self).save(holder, flag_key, state)
    }
    fn update(
        &self,
        holder: &HolderKey,
        flag_key: &str,
        decide: &mut dyn FnMut(&mut CooldownLimitState) -> bool,
    ) -> Result<()> {
        (**self).update(holder, flag_key, decide)
    }
}

impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn load(&self, holder: &HolderKey, flag_key: &str) -> Result<CooldownLimitState> {
        (**self).load(holder, flag_key)
    }
    fn save(&self, holder: &HolderKey, flag_key: &str, state: &CooldownLimitState) -> Result<()> {
        (**self).save(holder, flag_key, state)
    }
    fn update(
        &self,
        holder: &HolderKey,
        flag_key: &str,
        decide: &mut dyn FnMut(&mut CooldownLimitState) -> bool,
    ) -> Result<()> {
        (**self).update(holder, flag_key, decide)
    }
}

/// Whether to honour and whether to consume cooldowns and limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Policy {
    pub respect_cooldown: bool,
    pub invoke_cooldown: bool,
    pub respect_limit: bool,
    pub invoke_limit: bool,
}

impl Policy {
    /// Does evaluating `flag` under this policy need stored state at all?
    pub fn reads_state(&self, flag: &Flag) -> bool {
        (flag.has_cooldown() && (self.respect_cooldown || self.invoke_cooldown))
            || (flag.has_limit() && (self.respect_limit || self.invoke_limit))
    }

    /// Can a pass under this policy mutate state for `flag`?
    pub fn writes_state(&self, flag: &Flag) -> bool {
        (flag.has_cooldown() && self.invoke_cooldown) || (flag.has_limit() && self.invoke_limit)
    }
}

/// Outcome of the cooldown/limit stage for one matched flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    /// `Some` only when the cooldown was evaluated
    pub on_cooldown: Option<bool>,
    pub cooldown_expires: Option<u64>,
    pub limit_exhausted: bool,
}

impl Verdict {
    fn pass() -> Self {
        Verdict { passed: true, on_cooldown: None, cooldown_expires: None, limit_exhausted: false }
    }
}

/// Decide pass/fail against `state` and apply invocations. Returns the verdict
/// and whether `state` was changed.
pub fn decide(flag: &Flag, policy: &Policy, state: &mut CooldownLimitState, now: u64) -> (Verdict, bool) {
    let mut verdict = Verdict::pass();

    if flag.has_cooldown() && policy.respect_cooldown {
        let window = flag.cooldown().saturating_mul(MILLIS_PER_SECOND);
        match state.last_invoked_at {
            Some(last) if now.saturating_sub(last) < window => {
                verdict.passed = false;
                verdict.on_cooldown = Some(true);
                verdict.cooldown_expires = Some(last.saturating_add(window));
            }
            _ => verdict.on_cooldown = Some(false),
        }
    }

    // Reported independently of the cooldown outcome
    if flag.has_limit() && policy.respect_limit && state.uses_consumed >= flag.limit() {
        verdict.passed = false;
        verdict.limit_exhausted = true;
    }

    let mut changed = false;
    if verdict.passed {
        if policy.invoke_cooldown && flag.has_cooldown() {
            state.last_invoked_at = Some(now);
            changed = true;
        }
        if policy.invoke_limit && flag.has_limit() {
            state.uses_consumed = state.uses_consumed.saturating_add(1);
            changed = true;
        }
    }
    (verdict, changed)
}

/// Run the cooldown/limit stage for `matched` on behalf of `holder`
pub fn evaluate<S: StateStore + ?Sized>(
    store: &S,
    holder: &HolderKey,
    matched: &Flag,
    policy: &Policy,
    now: u64,
) -> Result<Verdict> {
    if !policy.reads_state(matched) {
        return Ok(Verdict::pass());
    }

    if !policy.writes_state(matched) {
        let mut state = store.load(holder, matched.as_str())?;
        return Ok(decide(matched, policy, &mut state, now).0);
    }

    let mut verdict = Verdict::pass();
    store.update(holder, matched.as_str(), &mut |state: &mut CooldownLimitState| {
        let (v, changed) = decide(matched, policy, state, now);
        verdict = v;
        if changed {
            debug!(
                holder = %holder,
                flag = %matched,
                last_invoked_at = ?state.last_invoked_at,
                uses_consumed = state.uses_consumed,
                "invoked"
            );
        }
        changed
    })?;
    Ok(verdict)
}
