use std::collections::BTreeMap;

use shared::domain::{LineItem, MenuItemId};

/// Pre-order quantities keyed by menu item. A key is present exactly when its
/// quantity is at least one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    quantities: BTreeMap<MenuItemId, u32>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, item: MenuItemId) -> u32 {
        self.add(item, 1)
    }

    pub fn add(&mut self, item: MenuItemId, quantity: u32) -> u32 {
        if quantity == 0 {
            return self.quantity(item);
        }
        let entry = self.quantities.entry(item).or_insert(0);
        *entry = entry.saturating_add(quantity);
        *entry
    }

    /// Decrementing an absent item is a no-op.
    pub fn decrement(&mut self, item: MenuItemId) -> u32 {
        let Some(quantity) = self.quantities.get_mut(&item) else {
            return 0;
        };
        *quantity -= 1;
        let remaining = *quantity;
        if remaining == 0 {
            self.quantities.remove(&item);
        }
        remaining
    }

    pub fn quantity(&self, item: MenuItemId) -> u32 {
        self.quantities.get(&item).copied().unwrap_or(0)
    }

    pub fn contains(&self, item: MenuItemId) -> bool {
        self.quantities.contains_key(&item)
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    pub fn clear(&mut self) {
        self.quantities.clear();
    }

    pub fn line_items(&self) -> Vec<LineItem> {
        self.quantities
            .iter()
            .map(|(&menu_item_id, &quantity)| LineItem {
                menu_item_id,
                quantity,
            })
            .collect()
    }
}
