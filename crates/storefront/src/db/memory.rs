//! In-memory store.
//!
//! Implements every storage trait over a single mutex-guarded state. A
//! ledger transaction holds the mutex from `begin` until it is committed or
//! dropped, which gives the same serialization the row locks give on
//! `PostgreSQL`: a second purchase for the same user waits for the first to
//! finish and then reads the committed balance. Writes are staged on the
//! transaction and applied only on commit.
//!
//! Individual operations can be made to fail so tests can exercise rollback
//! and best-effort paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

use pennyshop_core::{ItemId, Money, PurchaseId, SessionId, UserId, Username};

use super::{ItemStore, LedgerStore, LedgerTx, RepositoryError, SessionStore, UserStore};
use crate::models::{Item, NewSession, Purchase, Session, StoredCredentials, User, UserPurchase};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<UserId, StoredCredentials>,
    items: BTreeMap<ItemId, Item>,
    sessions: HashMap<SessionId, Session>,
    purchases: Vec<Purchase>,
    next_user_id: i32,
    next_item_id: i32,
    next_purchase_id: i32,
}

impl MemoryState {
    fn next_id(counter: &mut i32) -> i32 {
        *counter += 1;
        *counter
    }
}

#[derive(Debug, Default)]
struct Faults {
    purchase_insert: AtomicBool,
    last_login_update: AtomicBool,
    sweep: AtomicBool,
}

impl Faults {
    fn check(flag: &AtomicBool, what: &str) -> Result<(), RepositoryError> {
        if flag.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(format!("injected {what} failure")));
        }
        Ok(())
    }
}

/// Store backed by process memory. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Faults>,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Create an empty store whose lock waits give up after `lock_timeout`.
    #[must_use]
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            faults: Arc::new(Faults::default()),
            lock_timeout,
        }
    }

    async fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        tokio::time::timeout(self.lock_timeout, self.state.lock())
            .await
            .map_err(|_| RepositoryError::Timeout("lock wait timed out".to_owned()))
    }

    /// Add an item and return it with its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Timeout` if the store stays locked.
    pub async fn seed_item(
        &self,
        name: &str,
        description: &str,
        price: Money,
    ) -> Result<Item, RepositoryError> {
        let mut state = self.lock().await?;
        let id = ItemId::new(MemoryState::next_id(&mut state.next_item_id));
        let item = Item {
            id,
            name: name.to_owned(),
            description: description.to_owned(),
            price,
        };
        state.items.insert(id, item.clone());
        Ok(item)
    }

    /// Change an item's price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn set_item_price(&self, id: ItemId, price: Money) -> Result<(), RepositoryError> {
        let mut state = self.lock().await?;
        let item = state.items.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        item.price = price;
        Ok(())
    }

    /// Number of stored sessions, expired or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Timeout` if the store stays locked.
    pub async fn session_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock().await?.sessions.len())
    }

    /// Number of purchase records across all users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Timeout` if the store stays locked.
    pub async fn purchase_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock().await?.purchases.len())
    }

    /// Make purchase inserts fail until reset.
    pub fn fail_purchase_inserts(&self, fail: bool) {
        self.faults.purchase_insert.store(fail, Ordering::SeqCst);
    }

    /// Make `last_login` updates fail until reset.
    pub fn fail_last_login_updates(&self, fail: bool) {
        self.faults.last_login_update.store(fail, Ordering::SeqCst);
    }

    /// Make expired-session deletes fail until reset.
    pub fn fail_sweeps(&self, fail: bool) {
        self.faults.sweep.store(fail, Ordering::SeqCst);
    }
}

impl UserStore for MemoryStore {
    async fn create_user(
        &self,
        username: &Username,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut state = self.lock().await?;
        if state.users.values().any(|c| c.user.username == *username) {
            return Err(RepositoryError::Conflict("username already exists".to_owned()));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(MemoryState::next_id(&mut state.next_user_id)),
            username: username.clone(),
            balance: Money::ZERO,
            last_login: now,
            created_at: now,
        };
        state.users.insert(
            user.id,
            StoredCredentials {
                user: user.clone(),
                password_hash: password_hash.to_owned(),
            },
        );
        Ok(user)
    }

    async fn get_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<StoredCredentials>, RepositoryError> {
        let state = self.lock().await?;
        Ok(state
            .users
            .values()
            .find(|c| c.user.username == *username)
            .cloned())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.lock().await?;
        Ok(state.users.get(&id).map(|c| c.user.clone()))
    }

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        Faults::check(&self.faults.last_login_update, "last_login update")?;
        let mut state = self.lock().await?;
        let creds = state.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        creds.user.last_login = at;
        Ok(())
    }
}

impl ItemStore for MemoryStore {
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        Ok(self.lock().await?.items.get(&id).cloned())
    }

    async fn list_items(&self) -> Result<Vec<Item>, RepositoryError> {
        Ok(self.lock().await?.items.values().cloned().collect())
    }
}

impl SessionStore for MemoryStore {
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        Ok(self.lock().await?.sessions.get(id).cloned())
    }

    async fn insert_session(&self, session: NewSession) -> Result<Session, RepositoryError> {
        let mut state = self.lock().await?;
        if !state.users.contains_key(&session.user_id) {
            return Err(RepositoryError::NotFound);
        }
        if state.sessions.contains_key(&session.id) {
            return Err(RepositoryError::Conflict("session id already exists".to_owned()));
        }

        let session = Session::from(session);
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        Faults::check(&self.faults.sweep, "session sweep")?;
        let mut state = self.lock().await?;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.expires_at >= now);
        Ok(u64::try_from(before - state.sessions.len()).unwrap_or(u64::MAX))
    }
}

/// An open transaction on a [`MemoryStore`].
///
/// Holds the store lock until committed or dropped.
#[derive(Debug)]
pub struct MemoryLedgerTx {
    state: OwnedMutexGuard<MemoryState>,
    faults: Arc<Faults>,
    balances: HashMap<UserId, Money>,
    purchases: Vec<Purchase>,
}

impl LedgerStore for MemoryStore {
    type Tx = MemoryLedgerTx;

    async fn begin(&self) -> Result<MemoryLedgerTx, RepositoryError> {
        let state = tokio::time::timeout(self.lock_timeout, Arc::clone(&self.state).lock_owned())
            .await
            .map_err(|_| RepositoryError::Timeout("lock wait timed out".to_owned()))?;

        Ok(MemoryLedgerTx {
            state,
            faults: Arc::clone(&self.faults),
            balances: HashMap::new(),
            purchases: Vec::new(),
        })
    }

    async fn balance(&self, user_id: UserId) -> Result<Option<Money>, RepositoryError> {
        let state = self.lock().await?;
        Ok(state.users.get(&user_id).map(|c| c.user.balance))
    }

    async fn purchases(&self, user_id: UserId) -> Result<Vec<UserPurchase>, RepositoryError> {
        let state = self.lock().await?;
        state
            .purchases
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| {
                let user = state.users.get(&p.user_id).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!("purchase {} has no user", p.id))
                })?;
                let item = state.items.get(&p.item_id).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!("purchase {} has no item", p.id))
                })?;
                Ok(UserPurchase {
                    username: user.user.username.as_str().to_owned(),
                    item_name: item.name.clone(),
                    price_paid: p.price_paid,
                    purchased_at: p.purchased_at,
                })
            })
            .collect()
    }
}

impl LedgerTx for MemoryLedgerTx {
    async fn lock_item_price(&mut self, item_id: ItemId) -> Result<Option<Money>, RepositoryError> {
        Ok(self.state.items.get(&item_id).map(|i| i.price))
    }

    async fn lock_balance(&mut self, user_id: UserId) -> Result<Option<Money>, RepositoryError> {
        if let Some(staged) = self.balances.get(&user_id) {
            return Ok(Some(*staged));
        }
        Ok(self.state.users.get(&user_id).map(|c| c.user.balance))
    }

    async fn set_balance(&mut self, user_id: UserId, balance: Money) -> Result<(), RepositoryError> {
        if !self.state.users.contains_key(&user_id) {
            return Err(RepositoryError::NotFound);
        }
        if balance.is_negative() || balance > Money::MAX_BALANCE {
            return Err(RepositoryError::Conflict(format!(
                "balance {balance} violates the balance constraint"
            )));
        }
        self.balances.insert(user_id, balance);
        Ok(())
    }

    async fn insert_purchase(
        &mut self,
        user_id: UserId,
        item_id: ItemId,
        price_paid: Money,
    ) -> Result<Purchase, RepositoryError> {
        Faults::check(&self.faults.purchase_insert, "purchase insert")?;
        if !self.state.users.contains_key(&user_id) || !self.state.items.contains_key(&item_id) {
            return Err(RepositoryError::NotFound);
        }

        let staged = i32::try_from(self.purchases.len())
            .map_err(|_| RepositoryError::Conflict("too many staged purchases".to_owned()))?;
        let purchase = Purchase {
            id: PurchaseId::new(self.state.next_purchase_id + staged + 1),
            user_id,
            item_id,
            price_paid,
            purchased_at: Utc::now(),
        };
        self.purchases.push(purchase.clone());
        Ok(purchase)
    }

    async fn commit(mut self) -> Result<(), RepositoryError> {
        for (user_id, balance) in std::mem::take(&mut self.balances) {
            if let Some(creds) = self.state.users.get_mut(&user_id) {
                creds.user.balance = balance;
            }
        }
        for purchase in std::mem::take(&mut self.purchases) {
            self.state.next_purchase_id = purchase.id.as_i32();
            self.state.purchases.push(purchase);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Duration as ChronoDuration;
    use pennyshop_core::CsrfToken;

    use super::*;

    async fn store_with_user() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .create_user(&Username::parse("test_user").unwrap(), "hash")
            .await
            .unwrap();
        (store, user)
    }

    fn new_session(id: &str, user_id: UserId, expires_at: DateTime<Utc>) -> NewSession {
        NewSession {
            id: SessionId::from(id),
            csrf_token: CsrfToken::from("csrf"),
            user_id,
            source_addr: None,
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let (store, _) = store_with_user().await;
        let result = store
            .create_user(&Username::parse("test_user").unwrap(), "other")
            .await;
        assert_matches!(result, Err(RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_duplicate_session_id_conflicts() {
        let (store, user) = store_with_user().await;
        let expires = Utc::now() + ChronoDuration::hours(1);
        store
            .insert_session(new_session("dup", user.id, expires))
            .await
            .unwrap();
        let result = store.insert_session(new_session("dup", user.id, expires)).await;
        assert_matches!(result, Err(RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let (store, user) = store_with_user().await;
        let item = store
            .seed_item("thing", "", Money::from_minor(100))
            .await
            .unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.set_balance(user.id, Money::from_minor(500)).await.unwrap();
            tx.insert_purchase(user.id, item.id, item.price).await.unwrap();
        }

        assert_eq!(store.balance(user.id).await.unwrap(), Some(Money::ZERO));
        assert_eq!(store.purchase_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commit_applies_staged_writes() {
        let (store, user) = store_with_user().await;

        let mut tx = store.begin().await.unwrap();
        tx.set_balance(user.id, Money::from_minor(500)).await.unwrap();
        assert_eq!(
            tx.lock_balance(user.id).await.unwrap(),
            Some(Money::from_minor(500))
        );
        tx.commit().await.unwrap();

        assert_eq!(
            store.balance(user.id).await.unwrap(),
            Some(Money::from_minor(500))
        );
    }

    #[tokio::test]
    async fn test_open_transaction_blocks_until_timeout() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(20));
        let _tx = store.begin().await.unwrap();

        let result = store.begin().await;
        assert_matches!(result, Err(RepositoryError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_negative_balance_rejected() {
        let (store, user) = store_with_user().await;
        let mut tx = store.begin().await.unwrap();
        let result = tx.set_balance(user.id, Money::from_minor(-1)).await;
        assert_matches!(result, Err(RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_boundary() {
        let (store, user) = store_with_user().await;
        let now = Utc::now();
        store
            .insert_session(new_session("old", user.id, now - ChronoDuration::seconds(1)))
            .await
            .unwrap();
        store
            .insert_session(new_session("edge", user.id, now))
            .await
            .unwrap();

        assert_eq!(store.delete_expired_sessions(now).await.unwrap(), 1);
        assert!(store.get_session(&SessionId::from("edge")).await.unwrap().is_some());
        assert!(store.get_session(&SessionId::from("old")).await.unwrap().is_none());
    }
}
