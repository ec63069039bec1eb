//! Check engine: the entry point callers use

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checks;
use crate::error::{PermError, Result};
use crate::flag::Flag;
use crate::holder::{HolderRepository, PermissionHolder};
use crate::matcher::best_match;
use crate::set::PermissionSet;
use crate::tracker::{evaluate, Policy, StateStore, Verdict};

/// Milliseconds since the unix epoch
pub fn current_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Does holder H have the required flags, and may it use them now?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub holder: PermissionHolder,
    pub required: Vec<Flag>,
    /// Granted on top of the stored flags for this check only
    #[serde(default)]
    pub additional: Vec<Flag>,
    #[serde(flatten)]
    pub policy: Policy,
}

impl CheckRequest {
    /// A request that neither respects nor invokes cooldowns and limits
    pub fn new(holder: PermissionHolder, required: Vec<Flag>) -> Self {
        CheckRequest { holder, required, additional: Vec::new(), policy: Policy::default() }
    }

    pub fn additional(mut self, additional: Vec<Flag>) -> Self {
        self.additional = additional;
        self
    }

    pub fn respect_cooldown(mut self, yes: bool) -> Self {
        self.policy.respect_cooldown = yes;
        self
    }

    pub fn invoke_cooldown(mut self, yes: bool) -> Self {
        self.policy.invoke_cooldown = yes;
        self
    }

    pub fn respect_limit(mut self, yes: bool) -> Self {
        self.policy.respect_limit = yes;
        self
    }

    pub fn invoke_limit(mut self, yes: bool) -> Self {
        self.policy.invoke_limit = yes;
        self
    }

    /// Respect and invoke both cooldowns and limits
    pub fn invoke(self) -> Self {
        self.respect_cooldown(true).invoke_cooldown(true).respect_limit(true).invoke_limit(true)
    }
}

/// Outcome for one required flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub flag: Flag,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_cooldown: Option<bool>,
    /// Epoch millis when the cooldown clears
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_expires: Option<u64>,
    /// Granted flag whose cooldown/limit applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<Flag>,
    #[serde(default)]
    pub limit_exhausted: bool,
}

impl CheckResult {
    fn unmatched(flag: Flag) -> Self {
        CheckResult { flag, passed: false, on_cooldown: None, cooldown_expires: None, matched: None, limit_exhausted: false }
    }

    fn matched(flag: Flag, matched: Flag, v: Verdict) -> Self {
        CheckResult {
            flag,
            passed: v.passed,
            on_cooldown: v.on_cooldown,
            cooldown_expires: v.cooldown_expires,
            matched: Some(matched),
            limit_exhausted: v.limit_exhausted,
        }
    }
}

/// Logical AND over all results
pub fn all_passed(results: &[CheckResult]) -> bool {
    results.iter().all(|r| r.passed)
}

/// Required flags whose check did not pass, in request order
pub fn missing(results: &[CheckResult]) -> Vec<Flag> {
    results.iter().filter(|r| !r.passed).map(|r| r.flag.clone()).collect()
}

/// Stateless orchestrator over a holder repository and a state store
#[derive(Debug, Clone)]
pub struct Engine<H, S> {
    holders: H,
    states: S,
}

impl<H: HolderRepository, S: StateStore> Engine<H, S> {
    pub fn new(holders: H, states: S) -> Self {
        Engine { holders, states }
    }

    pub fn holders(&self) -> &H {
        &self.holders
    }

    pub fn states(&self) -> &S {
        &self.states
    }

    /// Evaluate every required flag, one result each, in request order
    pub fn check(&self, req: &CheckRequest) -> Result<Vec<CheckResult>> {
        self.check_at(req, current_epoch())
    }

    /// `check` against an explicit clock (epoch millis)
    pub fn check_at(&self, req: &CheckRequest, now: u64) -> Result<Vec<CheckResult>> {
        checks::not_empty(&req.required, "required")?;
        req.holder.validate()?;

        let stored = self.holders.get_permissions(&req.holder)?;
        let set = PermissionSet::merged(stored, &req.additional);
        let key = req.holder.key();

        // One tracker run per matched flag, shared by every required flag it satisfies
        let mut verdicts: HashMap<&Flag, Verdict> = HashMap::new();
        let mut results = Vec::with_capacity(req.required.len());

        for required in &req.required {
            let result = match best_match(&set, required) {
                None => CheckResult::unmatched(required.clone()),
                Some(matched) => {
                    let verdict = match verdicts.get(matched) {
                        Some(v) => *v,
                        None => {
                            let v = evaluate(&self.states, &key, matched, &req.policy, now)?;
                            verdicts.insert(matched, v);
                            v
                        }
                    };
                    CheckResult::matched(required.clone(), matched.clone(), verdict)
                }
            };
            debug!(
                holder = %key,
                required = %required,
                matched = ?result.matched.as_ref().map(Flag::as_str),
                passed = result.passed,
                "checked"
            );
            results.push(result);
        }
        Ok(results)
    }

    /// `check`, failing with `PermError::Permission` unless every flag passed
    pub fn assert_permitted(&self, req: &CheckRequest) -> Result<Vec<CheckResult>> {
        self.assert_permitted_at(req, current_epoch())
    }

    pub fn assert_permitted_at(&self, req: &CheckRequest, now: u64) -> Result<Vec<CheckResult>> {
        let results = self.check_at(req, now)?;
        if all_passed(&results) {
            Ok(results)
        } else {
            Err(PermError::Permission { failed: missing(&results) })
        }
    }
}
