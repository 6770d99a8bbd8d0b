//! Arena owning every order that currently rests in the book.
//!
//! Price levels and the book only ever hold [`OrderHandle`]s; the order
//! itself lives in exactly one slot here, so a mutation through a handle is
//! visible to every structure that refers to it. Freed slots go on a LIFO
//! free list for better cache locality on reuse.

use std::collections::HashMap;

use crate::order::{Order, OrderId};

/// Index into the order pool.
///
/// Uses u32 to save space (supports up to 4 billion resting orders).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct OrderHandle(pub u32);

impl OrderHandle {
    /// Get raw index.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Slab of resting orders with an id index.
#[derive(Debug, Default)]
pub struct OrderPool {
    slots: Vec<Option<Order>>,
    /// LIFO free list for O(1) alloc/dealloc.
    free_list: Vec<u32>,
    by_id: HashMap<OrderId, OrderHandle>,
}

impl OrderPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for `capacity` resting orders.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            by_id: HashMap::with_capacity(capacity),
        }
    }

    /// Store an order and return its handle.
    ///
    /// # Panics
    /// Panics if an order with the same id is already stored.
    pub fn insert(&mut self, order: Order) -> OrderHandle {
        assert!(
            !self.by_id.contains_key(&order.order_id),
            "order {:?} is already resting",
            order.order_id
        );

        let handle = match self.free_list.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(order);
                OrderHandle(idx)
            }
            None => {
                assert!(self.slots.len() < u32::MAX as usize, "order pool exhausted");
                let idx = self.slots.len() as u32;
                self.slots.push(Some(order));
                OrderHandle(idx)
            }
        };
        self.by_id.insert(order.order_id, handle);
        handle
    }

    /// Remove an order, freeing its slot.
    ///
    /// # Panics
    /// Panics if the handle does not point at a live order.
    pub fn remove(&mut self, handle: OrderHandle) -> Order {
        let order = self.slots[handle.index()]
            .take()
            .unwrap_or_else(|| panic!("stale order handle {:?}", handle));
        self.by_id.remove(&order.order_id);
        self.free_list.push(handle.0);
        order
    }

    /// # Panics
    /// Panics if the handle does not point at a live order.
    #[inline]
    pub fn get(&self, handle: OrderHandle) -> &Order {
        self.slots[handle.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("stale order handle {:?}", handle))
    }

    /// # Panics
    /// Panics if the handle does not point at a live order.
    #[inline]
    pub fn get_mut(&mut self, handle: OrderHandle) -> &mut Order {
        self.slots[handle.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("stale order handle {:?}", handle))
    }

    /// Look up the handle of a resting order.
    #[inline]
    pub fn handle_of(&self, order_id: OrderId) -> Option<OrderHandle> {
        self.by_id.get(&order_id).copied()
    }

    /// Number of live orders.
    #[inline]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
