//! Per-user conversation sessions.
//!
//! A session tracks which input the bot is waiting for and the product
//! draft collected so far. Sessions live in memory only and expire after a
//! fixed idle TTL. Expiry is evaluated lazily whenever a session is looked
//! up; [`SessionStore::purge_expired`] exists for an optional background
//! sweep.
//!
//! Every write bumps a store-wide revision counter so callers that read a
//! session, await something slow, and then write back can detect that the
//! session changed underneath them ([`SessionStore::replace`],
//! [`SessionStore::clear_if_current`]).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::providers::Checkout;

/// Opaque identifier of the conversation partner (the Telegram chat id).
pub type UserId = i64;

/// Which input the conversation is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    AwaitingPrice,
    AwaitingName,
    AwaitingQuantity,
}

impl Stage {
    /// Human-readable stage name used in status replies.
    pub fn label(self) -> &'static str {
        match self {
            Stage::AwaitingPrice => "waiting for price",
            Stage::AwaitingName => "waiting for product name",
            Stage::AwaitingQuantity => "waiting for quantity",
        }
    }
}

/// Product description collected across stages.
///
/// Drafts are values: every transition builds a new draft from the previous
/// one plus the field entered at that stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    price_minor_units: u64,
    currency: Option<String>,
    name: Option<String>,
}

impl Draft {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Draft holding only a price. Later fields start over.
    pub fn with_price(&self, price_minor_units: u64, currency: impl Into<String>) -> Self {
        Self {
            price_minor_units,
            currency: Some(currency.into()),
            name: None,
        }
    }

    /// Keeps price and currency, sets the product name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            price_minor_units: self.price_minor_units,
            currency: self.currency.clone(),
            name: Some(name.into()),
        }
    }

    /// Finishes the draft with a quantity. The quantity is never stored: it
    /// is the last input, so it goes straight into the checkout.
    ///
    /// Returns `None` when an earlier stage left a field unset.
    pub fn complete(&self, quantity: u32) -> Option<Checkout> {
        if self.price_minor_units == 0 {
            return None;
        }
        Some(Checkout {
            price_minor_units: self.price_minor_units,
            currency: self.currency.clone()?,
            product_name: self.name.clone()?,
            quantity,
        })
    }

    /// Price in minor units (cents); zero while unset.
    pub fn price_minor_units(&self) -> u64 {
        self.price_minor_units
    }

    pub fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One user's conversation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    stage: Stage,
    draft: Draft,
    last_updated: Instant,
    revision: u64,
}

impl Session {
    /// Creates a session stamped with the current time.
    pub fn new(stage: Stage, draft: Draft) -> Self {
        Self {
            stage,
            draft,
            last_updated: Instant::now(),
            revision: 0,
        }
    }

    /// A fresh session waiting for the price.
    pub fn start() -> Self {
        Self::new(Stage::AwaitingPrice, Draft::empty())
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn last_updated(&self) -> Instant {
        self.last_updated
    }

    /// Store-assigned revision; zero until the session has been stored.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Result of [`SessionStore::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Active(Session),
    /// A session existed but outlived the TTL; it has been removed.
    Expired,
    Absent,
}

struct Inner {
    sessions: HashMap<UserId, Session>,
    next_revision: u64,
}

impl Inner {
    fn insert(&mut self, user: UserId, mut session: Session) {
        self.next_revision += 1;
        session.revision = self.next_revision;
        self.sessions.insert(user, session);
    }
}

/// Thread-safe in-memory session map keyed by user id.
pub struct SessionStore {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl SessionStore {
    /// Default idle lifetime of a session.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                next_revision: 0,
            }),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a copy of the stored session, expired or not.
    pub fn get(&self, user: UserId) -> Option<Session> {
        self.lock().sessions.get(&user).cloned()
    }

    /// Stores `session` for `user`, replacing whatever was there.
    pub fn put(&self, user: UserId, session: Session) {
        self.lock().insert(user, session);
    }

    /// Removes the session for `user`, if any.
    pub fn clear(&self, user: UserId) {
        self.lock().sessions.remove(&user);
    }

    /// True iff a session exists and has outlived the TTL.
    ///
    /// Returns false when there is no session at all.
    pub fn is_expired(&self, user: UserId) -> bool {
        let now = Instant::now();
        self.lock()
            .sessions
            .get(&user)
            .is_some_and(|session| self.expired_at(session, now))
    }

    /// Looks up the live session for `user`, dropping it if it expired.
    pub fn lookup(&self, user: UserId) -> Lookup {
        let now = Instant::now();
        let mut inner = self.lock();
        match inner.sessions.get(&user) {
            None => return Lookup::Absent,
            Some(session) if !self.expired_at(session, now) => {
                return Lookup::Active(session.clone());
            }
            Some(_) => {}
        }
        inner.sessions.remove(&user);
        Lookup::Expired
    }

    /// Replaces the session only if it is still the one the caller read.
    ///
    /// Returns false (and leaves the store untouched) when the session was
    /// replaced or removed in the meantime.
    pub fn replace(&self, user: UserId, expected: &Session, next: Session) -> bool {
        let mut inner = self.lock();
        if !is_current(&inner, user, expected) {
            return false;
        }
        inner.insert(user, next);
        true
    }

    /// Removes the session only if it is still the one the caller read.
    pub fn clear_if_current(&self, user: UserId, expected: &Session) -> bool {
        let mut inner = self.lock();
        if !is_current(&inner, user, expected) {
            return false;
        }
        inner.sessions.remove(&user);
        true
    }

    /// Drops every expired session and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|_, session| !self.expired_at(session, now));
        before - inner.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }

    fn expired_at(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.last_updated) > self.ttl
    }

    // Values are plain data; a panic while holding the lock cannot leave a
    // half-written session behind.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

fn is_current(inner: &Inner, user: UserId, expected: &Session) -> bool {
    inner
        .sessions
        .get(&user)
        .is_some_and(|current| current.revision == expected.revision)
}
