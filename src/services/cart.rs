//! Session-scoped draft carts.
//!
//! A cart collects item lines before they are submitted as a checkout
//! request. Carts are keyed by an opaque session id supplied by the
//! caller, never shared between sessions, and held behind the
//! [`CartStore`] trait so the backing store can be swapped without
//! touching the handlers.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::Role;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct CartLine {
    pub item_id: Uuid,
    pub item_name: String,
    pub item_level: Role,
    pub quantity: i32,
    /// Availability at the time the line was added; used only to clamp
    /// the quantity, never as a reservation.
    pub available: i32,
}

/// Clamp a requested quantity into `[1, available]`.
fn clamp_quantity(requested: i32, available: i32) -> i32 {
    requested.clamp(1, available.max(1))
}

pub trait CartStore: Send + Sync {
    fn lines(&self, session_id: &str) -> Vec<CartLine>;

    /// Add a line, or raise the quantity of an existing line for the same
    /// item. The resulting quantity is clamped to the line's availability.
    fn add_line(&self, session_id: &str, line: CartLine) -> Vec<CartLine>;

    fn set_quantity(
        &self,
        session_id: &str,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<CartLine>, ServiceError>;

    fn remove_line(&self, session_id: &str, item_id: Uuid) -> Vec<CartLine>;

    fn clear(&self, session_id: &str);
}

/// Process-local store over a concurrent map. Carts vanish on restart,
/// which matches their draft nature.
#[derive(Default)]
pub struct MemoryCartStore {
    carts: DashMap<String, Vec<CartLine>>,
}

impl MemoryCartStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl CartStore for MemoryCartStore {
    fn lines(&self, session_id: &str) -> Vec<CartLine> {
        self.carts
            .get(session_id)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    fn add_line(&self, session_id: &str, mut line: CartLine) -> Vec<CartLine> {
        let mut cart = self.carts.entry(session_id.to_string()).or_default();
        match cart.iter_mut().find(|l| l.item_id == line.item_id) {
            Some(existing) => {
                existing.available = line.available;
                existing.quantity =
                    clamp_quantity(existing.quantity + line.quantity, line.available);
            }
            None => {
                line.quantity = clamp_quantity(line.quantity, line.available);
                cart.push(line);
            }
        }
        cart.clone()
    }

    fn set_quantity(
        &self,
        session_id: &str,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<CartLine>, ServiceError> {
        let mut cart = self
            .carts
            .get_mut(session_id)
            .ok_or_else(|| ServiceError::NotFound("Cart is empty".to_string()))?;
        let line = cart
            .iter_mut()
            .find(|l| l.item_id == item_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Item {} is not in the cart", item_id))
            })?;
        line.quantity = clamp_quantity(quantity, line.available);
        Ok(cart.clone())
    }

    fn remove_line(&self, session_id: &str, item_id: Uuid) -> Vec<CartLine> {
        if let Some(mut cart) = self.carts.get_mut(session_id) {
            cart.retain(|l| l.item_id != item_id);
            return cart.clone();
        }
        Vec::new()
    }

    fn clear(&self, session_id: &str) {
        self.carts.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(item_id: Uuid, quantity: i32, available: i32) -> CartLine {
        CartLine {
            item_id,
            item_name: "Tripod".to_string(),
            item_level: Role::Intern,
            quantity,
            available,
        }
    }

    #[test]
    fn quantity_clamps_to_available() {
        let store = MemoryCartStore::new();
        let item_id = Uuid::new_v4();

        let cart = store.add_line("s1", line(item_id, 99, 5));
        assert_eq!(cart[0].quantity, 5);

        let cart = store.set_quantity("s1", item_id, 0).unwrap();
        assert_eq!(cart[0].quantity, 1);

        let cart = store.set_quantity("s1", item_id, 3).unwrap();
        assert_eq!(cart[0].quantity, 3);
    }

    #[test]
    fn adding_same_item_merges_lines() {
        let store = MemoryCartStore::new();
        let item_id = Uuid::new_v4();

        store.add_line("s1", line(item_id, 2, 10));
        let cart = store.add_line("s1", line(item_id, 3, 10));

        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 5);
    }

    #[test]
    fn sessions_are_isolated() {
        let store = MemoryCartStore::new();
        store.add_line("s1", line(Uuid::new_v4(), 1, 3));

        assert_eq!(store.lines("s2").len(), 0);
        store.clear("s2");
        assert_eq!(store.lines("s1").len(), 1);
    }

    #[test]
    fn remove_and_clear() {
        let store = MemoryCartStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.add_line("s1", line(a, 1, 3));
        store.add_line("s1", line(b, 2, 3));

        let cart = store.remove_line("s1", a);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].item_id, b);

        store.clear("s1");
        assert!(store.lines("s1").is_empty());
    }

    #[test]
    fn set_quantity_for_missing_item_is_not_found() {
        let store = MemoryCartStore::new();
        store.add_line("s1", line(Uuid::new_v4(), 1, 3));
        let err = store.set_quantity("s1", Uuid::new_v4(), 2).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
