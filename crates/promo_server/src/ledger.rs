//! Promo code ledger.
//!
//! Two indices share one timestamp per grant: session key to the current
//! grant, and code to its issuance record. Codes are five-digit numbers and
//! unique among live records. Expiry is lazy; nothing runs on a timer.

use chrono::{DateTime, TimeDelta, Utc};
use derive_getters::Getters;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::{debug, error, info, instrument};

/// Smallest code.
pub const CODE_MIN: u32 = 10_000;
/// Largest code.
pub const CODE_MAX: u32 = 99_999;

/// Produces candidate codes.
pub trait CodeSource: Send + std::fmt::Debug {
    /// Next candidate in `CODE_MIN..=CODE_MAX`.
    fn next_code(&mut self) -> u32;
}

/// Uniformly random codes.
#[derive(Debug)]
pub struct RandomCodes {
    rng: StdRng,
}

impl RandomCodes {
    /// Seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence, for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl CodeSource for RandomCodes {
    fn next_code(&mut self) -> u32 {
        self.rng.gen_range(CODE_MIN..=CODE_MAX)
    }
}

/// Ledger timing and retry limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_new::new)]
pub struct LedgerPolicy {
    /// A session gets its existing code back while the grant is younger than this.
    pub cooldown: TimeDelta,
    /// Grants older than this are deleted.
    pub ttl: TimeDelta,
    /// Candidate codes tried before giving up.
    pub max_attempts: u32,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            cooldown: TimeDelta::hours(24),
            ttl: TimeDelta::days(7),
            max_attempts: 50,
        }
    }
}

/// Ledger failure.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum LedgerError {
    /// No unused code was drawn within the attempt limit.
    #[display("No unique promo code after {} attempts", attempts)]
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

impl std::error::Error for LedgerError {}

/// The grant currently held by a session.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct SessionGrant {
    code: String,
    issued_at: DateTime<Utc>,
}

/// Issuance record for a code.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct CodeRecord {
    issued_at: DateTime<Utc>,
    session_key: String,
    /// Reserved for redemption tracking; never set by the ledger.
    redeemed: bool,
}

/// In-memory promo ledger.
#[derive(Debug)]
pub struct PromoLedger {
    sessions: HashMap<String, SessionGrant>,
    codes: HashMap<String, CodeRecord>,
    source: Box<dyn CodeSource>,
    policy: LedgerPolicy,
}

impl PromoLedger {
    /// Creates an empty ledger.
    #[instrument(skip(source))]
    pub fn new(policy: LedgerPolicy, source: Box<dyn CodeSource>) -> Self {
        info!("Creating promo ledger");
        Self {
            sessions: HashMap::new(),
            codes: HashMap::new(),
            source,
            policy,
        }
    }

    /// Returns the session's code if it is still in cooldown, otherwise mints one.
    #[instrument(skip(self))]
    pub fn issue_or_reuse(
        &mut self,
        session_key: &str,
        now: DateTime<Utc>,
    ) -> Result<String, LedgerError> {
        if let Some(grant) = self.sessions.get(session_key) {
            let age = now - grant.issued_at;
            if age < self.policy.cooldown && age < self.policy.ttl {
                debug!(code = %grant.code, "Reusing code within cooldown");
                return Ok(grant.code.clone());
            }
        }

        let code = self.mint()?;
        self.sessions.insert(
            session_key.to_owned(),
            SessionGrant {
                code: code.clone(),
                issued_at: now,
            },
        );
        self.codes.insert(
            code.clone(),
            CodeRecord {
                issued_at: now,
                session_key: session_key.to_owned(),
                redeemed: false,
            },
        );
        info!(session_key, code = %code, "Issued promo code");
        Ok(code)
    }

    fn mint(&mut self) -> Result<String, LedgerError> {
        for attempt in 1..=self.policy.max_attempts {
            let code = self.source.next_code().to_string();
            if !self.codes.contains_key(&code) {
                return Ok(code);
            }
            debug!(attempt, code = %code, "Code collision, retrying");
        }
        error!(attempts = self.policy.max_attempts, "Promo code space exhausted");
        Err(LedgerError::Exhausted {
            attempts: self.policy.max_attempts,
        })
    }

    /// Issuance record for a live code.
    pub fn lookup_code(&self, code: &str) -> Option<&CodeRecord> {
        self.codes.get(code)
    }

    /// Current grant for a session.
    pub fn grant(&self, session_key: &str) -> Option<&SessionGrant> {
        self.sessions.get(session_key)
    }

    /// Number of live codes.
    pub fn live_codes(&self) -> usize {
        self.codes.len()
    }

    /// Deletes grants and code records older than the TTL.
    #[instrument(skip(self))]
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let ttl = self.policy.ttl;
        let before = self.codes.len();
        self.sessions.retain(|_, grant| now - grant.issued_at < ttl);
        self.codes.retain(|_, record| now - record.issued_at < ttl);
        let removed = before - self.codes.len();
        if removed > 0 {
            debug!(removed, "Pruned expired promo codes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Always proposes the same code.
    #[derive(Debug)]
    struct FixedCode(u32);

    impl CodeSource for FixedCode {
        fn next_code(&mut self) -> u32 {
            self.0
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000)
    }

    fn ledger() -> PromoLedger {
        PromoLedger::new(LedgerPolicy::default(), Box::new(RandomCodes::seeded(9)))
    }

    #[test]
    fn test_codes_are_five_digits() {
        let mut source = RandomCodes::seeded(1);
        for _ in 0..1_000 {
            let code = source.next_code();
            assert!((CODE_MIN..=CODE_MAX).contains(&code));
        }
    }

    #[test]
    fn test_same_session_within_cooldown_reuses_code() {
        let mut ledger = ledger();
        let first = ledger.issue_or_reuse("alice", t0()).expect("issue");
        let again = ledger
            .issue_or_reuse("alice", t0() + TimeDelta::hours(23))
            .expect("reuse");
        assert_eq!(first, again);
        assert_eq!(ledger.live_codes(), 1);
    }

    #[test]
    fn test_after_cooldown_mints_new_code_and_keeps_old_record() {
        let mut ledger = ledger();
        let first = ledger.issue_or_reuse("alice", t0()).expect("issue");
        let later = t0() + TimeDelta::hours(25);
        let second = ledger.issue_or_reuse("alice", later).expect("reissue");
        assert_ne!(first, second);
        assert_eq!(ledger.grant("alice").map(|g| g.issued_at), Some(later));
        assert!(ledger.lookup_code(&first).is_some());
        assert_eq!(ledger.live_codes(), 2);
    }

    #[test]
    fn test_both_indices_share_timestamp() {
        let mut ledger = ledger();
        let code = ledger.issue_or_reuse("bob", t0()).expect("issue");
        let record = ledger.lookup_code(&code).expect("indexed");
        assert_eq!(record.issued_at(), &t0());
        assert_eq!(record.session_key(), "bob");
        assert!(!record.redeemed());
        assert_eq!(ledger.grant("bob").map(|g| *g.issued_at()), Some(t0()));
    }

    #[test]
    fn test_collision_exhausts_after_bounded_attempts() {
        let policy = LedgerPolicy::new(TimeDelta::hours(1), TimeDelta::days(7), 5);
        let mut ledger = PromoLedger::new(policy, Box::new(FixedCode(12_345)));
        assert_eq!(ledger.issue_or_reuse("a", t0()), Ok("12345".to_string()));
        assert_eq!(
            ledger.issue_or_reuse("b", t0()),
            Err(LedgerError::Exhausted { attempts: 5 })
        );
        assert!(ledger.grant("b").is_none());
    }

    #[test]
    fn test_prune_drops_expired_entries_only() {
        let mut ledger = ledger();
        let old = ledger.issue_or_reuse("old", t0()).expect("issue");
        let fresh = ledger
            .issue_or_reuse("fresh", t0() + TimeDelta::days(6))
            .expect("issue");

        ledger.prune(t0() + TimeDelta::days(7));

        assert!(ledger.lookup_code(&old).is_none());
        assert!(ledger.grant("old").is_none());
        assert!(ledger.lookup_code(&fresh).is_some());
        assert!(ledger.grant("fresh").is_some());
    }

    #[test]
    fn test_expired_code_frees_its_value() {
        let policy = LedgerPolicy::new(TimeDelta::hours(1), TimeDelta::days(7), 3);
        let mut ledger = PromoLedger::new(policy, Box::new(FixedCode(55_555)));
        ledger.issue_or_reuse("a", t0()).expect("issue");
        ledger.prune(t0() + TimeDelta::days(8));
        assert_eq!(
            ledger.issue_or_reuse("b", t0() + TimeDelta::days(8)),
            Ok("55555".to_string())
        );
    }
}
