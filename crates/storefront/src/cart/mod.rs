//! Client-side cart mirrored against the remote cart API.
//!
//! [`CartStore`] owns the line collection. Reads hand out clones; every
//! mutation goes to the server first and is applied locally only once the
//! server accepts it.
//!
//! # Ordering
//!
//! Mutations on the same [`CartLineKey`] run one at a time in the order they
//! were issued, so the last quantity a user picked is the one that sticks.
//! Mutations on different keys run concurrently.
//!
//! Every change to the collection takes a sequence number. A full-cart read
//! records the number current when it was issued. When its response arrives,
//! lines changed locally since then keep their local state and every other
//! line takes the server's. A response older than the last whole-cart
//! replacement is dropped.

mod summary;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use redseam_core::{CartLineKey, Price, ProductId};
use secrecy::SecretString;
use tokio::sync::OwnedMutexGuard;
use tracing::instrument;

use crate::api::ApiClient;
use crate::api::types::CartLine;
use crate::error::{ApiError, Result, add_breadcrumb};
use crate::forms::CheckoutForm;
use crate::session::SessionCookies;

pub use summary::CartSummary;

/// In-memory cart synchronized with the remote cart.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    client: ApiClient,
    session: SessionCookies,
    delivery_fee: Price,
    state: RwLock<CartState>,
    key_locks: Mutex<HashMap<CartLineKey, Arc<tokio::sync::Mutex<()>>>>,
    seq: AtomicU64,
}

#[derive(Debug, Default)]
struct CartState {
    lines: Vec<CartLine>,
    error: Option<String>,
    loading: usize,
    /// Sequence of the last whole-cart replacement.
    replaced_seq: u64,
    /// Sequence of the last local change per key, newer than `replaced_seq`.
    key_seqs: HashMap<CartLineKey, u64>,
}

impl CartState {
    /// Replace every line.
    fn replace(&mut self, seq: u64, lines: Vec<CartLine>) {
        self.lines = lines;
        self.replaced_seq = seq;
        self.key_seqs.retain(|_, changed| *changed > seq);
    }

    /// Record a local change to `key`.
    fn touch(&mut self, key: &CartLineKey, seq: u64) {
        self.key_seqs.insert(key.clone(), seq);
    }

    fn changed_since(&self, key: &CartLineKey, seq: u64) -> bool {
        self.key_seqs.get(key).is_some_and(|changed| *changed > seq)
    }

    /// Apply a server read issued at `seq`, keeping local state for keys
    /// changed after it.
    fn merge(&mut self, seq: u64, fetched: Vec<CartLine>) {
        let mut merged = Vec::with_capacity(fetched.len());
        let mut kept = HashSet::new();
        for line in fetched {
            let key = line.key();
            if self.changed_since(&key, seq) {
                if let Some(local) = self.lines.iter().find(|l| l.key() == key) {
                    merged.push(local.clone());
                }
                kept.insert(key);
            } else {
                merged.push(line);
            }
        }
        for local in &self.lines {
            let key = local.key();
            if self.changed_since(&key, seq) && !kept.contains(&key) {
                merged.push(local.clone());
            }
        }
        self.replace(seq, merged);
    }
}

/// How a full-cart read treats failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reload {
    /// Record the error and empty the cart.
    Fetch,
    /// Log and keep the current lines.
    Refresh,
}

impl CartStore {
    /// Empty cart backed by `client`, authenticated from `session`.
    #[must_use]
    pub fn new(client: ApiClient, session: SessionCookies, delivery_fee: Price) -> Self {
        Self {
            inner: Arc::new(CartStoreInner {
                client,
                session,
                delivery_fee,
                state: RwLock::new(CartState::default()),
                key_locks: Mutex::new(HashMap::new()),
                seq: AtomicU64::new(0),
            }),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot of every line.
    #[must_use]
    pub fn items(&self) -> Vec<CartLine> {
        self.read().lines.clone()
    }

    /// Number of distinct lines (not units).
    #[must_use]
    pub fn cart_count(&self) -> usize {
        self.read().lines.len()
    }

    /// Line for `key`, if present.
    #[must_use]
    pub fn line(&self, key: &CartLineKey) -> Option<CartLine> {
        self.read().lines.iter().find(|line| line.key() == *key).cloned()
    }

    /// Whether a [`fetch_cart`](Self::fetch_cart) is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read().loading > 0
    }

    /// Message from the last failed fetch, cleared by the next one.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    /// Totals for the current lines.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        CartSummary::from_lines(&self.read().lines, self.inner.delivery_fee)
    }

    // =========================================================================
    // Full-cart reads
    // =========================================================================

    /// Replace the local cart with the server's.
    ///
    /// Without a token the cart is emptied and nothing is sent. On failure
    /// the error is recorded (see [`error`](Self::error)) and the cart is
    /// emptied.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) {
        self.reload(Reload::Fetch).await;
    }

    /// Re-read the server cart quietly, e.g. after adding a line.
    ///
    /// Failures are logged and leave the local cart untouched.
    #[instrument(skip(self))]
    pub async fn refresh_cart_count(&self) {
        self.reload(Reload::Refresh).await;
    }

    async fn reload(&self, mode: Reload) {
        let seq = self.next_seq();

        let Some(token) = self.inner.session.token() else {
            let mut state = self.write();
            if seq > state.replaced_seq {
                state.replace(seq, Vec::new());
            }
            return;
        };

        if mode == Reload::Fetch {
            let mut state = self.write();
            state.loading += 1;
            state.error = None;
        }

        let result = self.inner.client.get_cart(&token).await;

        let mut state = self.write();
        if mode == Reload::Fetch {
            state.loading = state.loading.saturating_sub(1);
        }
        if seq <= state.replaced_seq {
            tracing::debug!(seq, replaced = state.replaced_seq, "Discarding stale cart response");
            return;
        }

        match (result, mode) {
            (Ok(lines), _) => {
                let lines = dedupe_lines(lines);
                tracing::debug!(lines = lines.len(), "Cart loaded");
                state.merge(seq, lines);
            }
            (Err(e), Reload::Fetch) => {
                tracing::error!(error = %e, "Error fetching cart");
                state.error = Some(e.to_string());
                state.replace(seq, Vec::new());
            }
            (Err(e), Reload::Refresh) => {
                tracing::warn!(error = %e, "Error refreshing cart count");
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of a product variant, then re-read the cart.
    ///
    /// Nothing changes locally until the server accepts the request; the new
    /// line appears with the re-read.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidQuantity`] for zero, [`ApiError::MissingToken`]
    /// when signed out, or the request's error.
    #[instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        product_id: ProductId,
        quantity: u32,
        color: Option<&str>,
        size: Option<&str>,
    ) -> Result<()> {
        if quantity == 0 {
            return Err(ApiError::InvalidQuantity(quantity));
        }
        let token = self.token()?;
        let key = CartLineKey::new(product_id, color, size);

        {
            let _guard = self.lock_key(&key).await;
            if let Err(e) = self.inner.client.add_cart_product(&token, &key, quantity).await {
                tracing::error!(error = %e, key = %key, "Error adding to cart");
                return Err(e);
            }
        }

        let (encoded, units) = (key.encode(), quantity.to_string());
        add_breadcrumb(
            "cart",
            "Added item",
            Some(&[("key", encoded.as_str()), ("quantity", units.as_str())]),
        );
        self.refresh_cart_count().await;
        Ok(())
    }

    /// Set the quantity of the line at `key`; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingToken`] when signed out,
    /// [`ApiError::NotFound`] when no local line has `key`, or the request's
    /// error. The local line is unchanged on error.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn update_cart_item(&self, key: &CartLineKey, quantity: u32) -> Result<()> {
        let token = self.token()?;
        let _guard = self.lock_key(key).await;

        if self.line(key).is_none() {
            return Err(ApiError::NotFound(key.encode()));
        }

        if quantity == 0 {
            return self.delete_line(&token, key).await;
        }

        if let Err(e) = self
            .inner
            .client
            .update_cart_product(&token, key, quantity)
            .await
        {
            tracing::error!(error = %e, "Error updating cart");
            return Err(e);
        }

        let seq = self.next_seq();
        let mut state = self.write();
        if let Some(line) = state.lines.iter_mut().find(|line| line.key() == *key) {
            line.quantity = quantity;
        }
        state.touch(key, seq);
        drop(state);

        let (encoded, units) = (key.encode(), quantity.to_string());
        add_breadcrumb(
            "cart",
            "Updated quantity",
            Some(&[("key", encoded.as_str()), ("quantity", units.as_str())]),
        );
        Ok(())
    }

    /// Remove the line at `key` on the server, then locally.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingToken`] when signed out or the request's
    /// error. The local line is unchanged on error.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn remove_cart_item(&self, key: &CartLineKey) -> Result<()> {
        let token = self.token()?;
        let _guard = self.lock_key(key).await;
        self.delete_line(&token, key).await
    }

    /// Caller must hold the key lock.
    async fn delete_line(&self, token: &SecretString, key: &CartLineKey) -> Result<()> {
        if let Err(e) = self.inner.client.remove_cart_product(token, key).await {
            tracing::error!(error = %e, "Error removing item");
            return Err(e);
        }

        let seq = self.next_seq();
        let mut state = self.write();
        state.lines.retain(|line| line.key() != *key);
        state.touch(key, seq);
        drop(state);

        let encoded = key.encode();
        add_breadcrumb("cart", "Removed item", Some(&[("key", encoded.as_str())]));
        Ok(())
    }

    /// Empty the local cart without contacting the server.
    pub fn clear_cart(&self) {
        let seq = self.next_seq();
        let mut state = self.write();
        state.error = None;
        state.replace(seq, Vec::new());
    }

    /// Validate `form` and place the order; the local cart is cleared on
    /// success.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Form`] for invalid input, [`ApiError::EmptyCart`],
    /// [`ApiError::MissingToken`], or the request's error.
    #[instrument(skip_all)]
    pub async fn checkout(&self, form: &CheckoutForm) -> Result<()> {
        form.validate().map_err(ApiError::Form)?;
        if self.cart_count() == 0 {
            return Err(ApiError::EmptyCart);
        }
        let token = self.token()?;

        if let Err(e) = self.inner.client.checkout(&token, form).await {
            tracing::error!(error = %e, "Checkout failed");
            return Err(e);
        }

        add_breadcrumb("checkout", "Order placed", None);
        tracing::info!("Checkout completed");
        self.clear_cart();
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn token(&self) -> Result<SecretString> {
        self.inner.session.token().ok_or(ApiError::MissingToken)
    }

    fn next_seq(&self) -> u64 {
        self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Wait for exclusive use of `key`. Waiters are served in arrival order.
    async fn lock_key(&self, key: &CartLineKey) -> KeyGuard<'_> {
        let mutex = {
            let mut locks = self
                .inner
                .key_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        let guard = mutex.lock_owned().await;
        KeyGuard {
            store: &self.inner,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CartState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CartState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("state", &*self.read())
            .finish_non_exhaustive()
    }
}

/// Held for the duration of a mutation on one key. Dropping it releases the
/// key and forgets the key's mutex once nobody else is waiting on it.
struct KeyGuard<'a> {
    store: &'a CartStoreInner,
    key: CartLineKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self
            .store
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

/// Drop zero-quantity lines and repeated keys (first occurrence wins).
fn dedupe_lines(lines: Vec<CartLine>) -> Vec<CartLine> {
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter(|line| {
            let key = line.key();
            if line.quantity == 0 {
                tracing::warn!(key = %key, "Ignoring zero-quantity cart line");
                return false;
            }
            if !seen.insert(key.clone()) {
                tracing::warn!(key = %key, "Ignoring duplicate cart line");
                return false;
            }
            true
        })
        .collect()
}
