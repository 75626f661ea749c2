//! Incident bookkeeping: cooldown suppression and relapse verification.
//!
//! The ledger never talks to the backend itself. The orchestrator feeds it
//! one observation per target and resource each tick and acts on the
//! emission it gets back.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Duration, Utc};

use crate::Resource;

/// One tracked alert stream: a single resource on a single target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncidentKey {
    pub target_id: String,
    pub resource: Resource,
}

impl IncidentKey {
    pub fn new(target_id: impl Into<String>, resource: Resource) -> Self {
        Self {
            target_id: target_id.into(),
            resource,
        }
    }
}

impl Display for IncidentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.target_id, self.resource)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// A plain threshold breach outside the cooldown window.
    Normal,
    /// The metric kept breaching through the whole verification window
    /// after its incident was marked resolved.
    Relapse,
}

pub struct IncidentLedger {
    cooldown: Duration,
    post_resolution_checks: u32,
    /// Last emission per key, for cooldown suppression.
    last_sent: HashMap<IncidentKey, DateTime<Utc>>,
    /// Keys currently under relapse verification, with ticks remaining.
    verifying: HashMap<IncidentKey, u32>,
}

impl IncidentLedger {
    pub fn new(cooldown_seconds: u64, post_resolution_checks: u32) -> Self {
        Self {
            cooldown: Duration::seconds(cooldown_seconds as i64),
            post_resolution_checks,
            last_sent: HashMap::new(),
            verifying: HashMap::new(),
        }
    }

    pub fn is_verifying(&self, key: &IncidentKey) -> bool {
        self.verifying.contains_key(key)
    }

    /// Feeds one tick of observations for a key and decides what to emit.
    ///
    /// A fresh resolution arms verification and consumes the key's tick
    /// entirely. While verifying, a clean reading stands the key down and a
    /// breaching one burns a check; when the last check burns, the relapse
    /// emission is due. Outside verification the usual cooldown applies:
    /// a breach only emits when the previous emission is at least a full
    /// window old.
    pub fn observe(
        &mut self,
        key: IncidentKey,
        breached: bool,
        recently_resolved: bool,
        now: DateTime<Utc>,
    ) -> Option<Emission> {
        if recently_resolved && !self.verifying.contains_key(&key) {
            self.verifying.insert(key, self.post_resolution_checks);
            return None;
        }

        if let Some(&counter) = self.verifying.get(&key) {
            if !breached {
                self.verifying.remove(&key);
                return None;
            }
            let remaining = counter.saturating_sub(1);
            if remaining > 0 {
                self.verifying.insert(key, remaining);
                return None;
            }
            self.verifying.remove(&key);
            self.last_sent.insert(key, now);
            return Some(Emission::Relapse);
        }

        if !breached {
            return None;
        }

        if let Some(last) = self.last_sent.get(&key)
            && now - *last < self.cooldown
        {
            return None;
        }

        self.last_sent.insert(key, now);
        Some(Emission::Normal)
    }
}
