//! User Stream Router
//!
//! The user data stream is one connection shared by two independent
//! subscriptions: account updates and order updates. `UserStreamHandlers`
//! holds the two handler slots; `UserStreamRouter` inspects each raw payload
//! and forwards it to the matching slot.
//!
//! Payloads that match neither marker, or whose slot is empty, are dropped
//! without error. This happens normally while an unsubscribe races with
//! in-flight messages.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::events::{
    ACCOUNT_UPDATE_MARKER, AccountInfoEvent, JsonCodec, ORDER_UPDATE_MARKER, OrderUpdateEvent,
};
use crate::infrastructure::metrics::{self, DropReason};

/// Handler for account updates.
pub type AccountHandler = Arc<dyn Fn(AccountInfoEvent) + Send + Sync>;

/// Handler for order updates.
pub type OrderHandler = Arc<dyn Fn(OrderUpdateEvent) + Send + Sync>;

// =============================================================================
// Handler Slots
// =============================================================================

#[derive(Default)]
struct Slots {
    account: Option<AccountHandler>,
    order: Option<OrderHandler>,
}

/// The two user stream handler slots, guarded by one lock.
///
/// Handlers are cloned out of the lock before they are invoked.
#[derive(Default)]
pub struct UserStreamHandlers {
    slots: Mutex<Slots>,
}

impl UserStreamHandlers {
    /// Create empty slots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the account handler, replacing any previous one.
    pub fn set_account(&self, handler: AccountHandler) {
        self.slots.lock().account = Some(handler);
    }

    /// Store the order handler, replacing any previous one.
    pub fn set_order(&self, handler: OrderHandler) {
        self.slots.lock().order = Some(handler);
    }

    /// Clear the account slot.
    ///
    /// Returns `true` if a handler was removed and the order slot is empty,
    /// i.e. the shared connection is no longer needed.
    pub fn clear_account(&self) -> bool {
        let mut slots = self.slots.lock();
        slots.account.take().is_some() && slots.order.is_none()
    }

    /// Clear the order slot.
    ///
    /// Returns `true` if a handler was removed and the account slot is empty,
    /// i.e. the shared connection is no longer needed.
    pub fn clear_order(&self) -> bool {
        let mut slots = self.slots.lock();
        slots.order.take().is_some() && slots.account.is_none()
    }

    /// Clear the account slot only if it still holds `handler`.
    ///
    /// Returns `true` if the slot was cleared.
    pub fn revoke_account(&self, handler: &AccountHandler) -> bool {
        let mut slots = self.slots.lock();
        if slots.account.as_ref().is_some_and(|current| Arc::ptr_eq(current, handler)) {
            slots.account = None;
            return true;
        }
        false
    }

    /// Clear the order slot only if it still holds `handler`.
    ///
    /// Returns `true` if the slot was cleared.
    pub fn revoke_order(&self, handler: &OrderHandler) -> bool {
        let mut slots = self.slots.lock();
        if slots.order.as_ref().is_some_and(|current| Arc::ptr_eq(current, handler)) {
            slots.order = None;
            return true;
        }
        false
    }

    /// Clear both slots.
    pub fn clear_all(&self) {
        let mut slots = self.slots.lock();
        slots.account = None;
        slots.order = None;
    }

    /// Current account handler.
    #[must_use]
    pub fn account(&self) -> Option<AccountHandler> {
        self.slots.lock().account.clone()
    }

    /// Current order handler.
    #[must_use]
    pub fn order(&self) -> Option<OrderHandler> {
        self.slots.lock().order.clone()
    }

    /// Check if either slot is filled.
    #[must_use]
    pub fn any(&self) -> bool {
        let slots = self.slots.lock();
        slots.account.is_some() || slots.order.is_some()
    }
}

// =============================================================================
// Router
// =============================================================================

/// Demultiplexes user data stream payloads onto the handler slots.
#[derive(Clone)]
pub struct UserStreamRouter {
    handlers: Arc<UserStreamHandlers>,
    codec: JsonCodec,
}

impl UserStreamRouter {
    /// Create a router over shared handler slots.
    #[must_use]
    pub const fn new(handlers: Arc<UserStreamHandlers>) -> Self {
        Self {
            handlers,
            codec: JsonCodec::new(),
        }
    }

    /// Route one raw payload.
    pub fn route(&self, raw: &str) {
        if raw.contains(ACCOUNT_UPDATE_MARKER) {
            let Some(handler) = self.handlers.account() else {
                tracing::trace!("No account handler registered, dropping update");
                metrics::record_dropped(DropReason::NoHandler);
                return;
            };
            match self.codec.decode::<AccountInfoEvent>(raw) {
                Ok(event) => handler(event),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to decode account update");
                    metrics::record_decode_failure("account_update");
                }
            }
        } else if raw.contains(ORDER_UPDATE_MARKER) {
            let Some(handler) = self.handlers.order() else {
                tracing::trace!("No order handler registered, dropping update");
                metrics::record_dropped(DropReason::NoHandler);
                return;
            };
            match self.codec.decode::<OrderUpdateEvent>(raw) {
                Ok(event) => handler(event),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to decode order update");
                    metrics::record_decode_failure("order_update");
                }
            }
        } else {
            tracing::trace!("Ignoring unrecognized user stream payload");
            metrics::record_dropped(DropReason::Unrecognized);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
