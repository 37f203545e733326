use std::collections::HashMap;

use shared::{
    domain::{MenuItem, MenuItemId, Reservation},
    protocol::{DetailLine, ReservationDetail},
};
use storage::ReservationStore;
use tracing::warn;

use crate::StoreError;

/// Read-only view of the menu used to validate pre-orders and price them.
#[derive(Debug, Clone, Default)]
pub struct MenuCatalog {
    items: Vec<MenuItem>,
    index: HashMap<MenuItemId, usize>,
}

impl MenuCatalog {
    pub fn new(items: Vec<MenuItem>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(position, item)| (item.id, position))
            .collect();
        Self { items, index }
    }

    pub async fn load(store: &dyn ReservationStore) -> Result<Self, StoreError> {
        let items = store.list_menu().await.map_err(StoreError)?;
        Ok(Self::new(items))
    }

    pub fn get(&self, id: MenuItemId) -> Option<&MenuItem> {
        self.index.get(&id).map(|&position| &self.items[position])
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Starters, mains, desserts, drinks; catalog order within a category.
    pub fn by_category(&self) -> Vec<MenuItem> {
        let mut items = self.items.clone();
        items.sort_by_key(|item| item.category);
        items
    }

    /// Resolves each line item against the menu. Items that have since left the
    /// menu are listed without a name or price and do not count toward the total.
    pub fn detail(&self, reservation: Reservation) -> ReservationDetail {
        let lines: Vec<DetailLine> = reservation
            .items
            .iter()
            .map(|line| match self.get(line.menu_item_id) {
                Some(item) => DetailLine {
                    menu_item_id: line.menu_item_id,
                    name: Some(item.name.clone()),
                    unit_price_cents: Some(item.price_cents),
                    quantity: line.quantity,
                    line_total_cents: item.price_cents.saturating_mul(i64::from(line.quantity)),
                },
                None => {
                    warn!(
                        reservation_id = reservation.id.0,
                        menu_item_id = line.menu_item_id.0,
                        "pre-ordered item is no longer on the menu"
                    );
                    DetailLine {
                        menu_item_id: line.menu_item_id,
                        name: None,
                        unit_price_cents: None,
                        quantity: line.quantity,
                        line_total_cents: 0,
                    }
                }
            })
            .collect();
        let total_cents = lines
            .iter()
            .map(|line| line.line_total_cents)
            .fold(0i64, i64::saturating_add);

        ReservationDetail {
            reservation,
            lines,
            total_cents,
        }
    }
}
