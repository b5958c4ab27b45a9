//! Warehouse stock keeping.

use std::collections::HashMap;

/// A single stock-keeping unit.
#[derive(Debug, Clone)]
pub struct Sku {
    pub code: String,
    quantity: u32,
}

/// Where a unit is shelved.
pub enum Location {
    Aisle(u8),
    Dock { bay: u16 },
    Unassigned,
}

pub trait Stocked {
    fn quantity(&self) -> u32;
    fn reorder_level(&self) -> u32;

    fn needs_restock(&self) -> bool {
        below(self.quantity(), self.reorder_level())
    }
}

impl Stocked for Sku {
    fn quantity(&self) -> u32 {
        self.quantity
    }

    fn reorder_level(&self) -> u32 {
        REORDER_FLOOR
    }
}

impl Sku {
    pub fn new(code: &str) -> Self {
        Sku { code: normalize(code), quantity: 0 }
    }

    pub fn receive(&mut self, units: u32) {
        self.quantity = self.quantity.saturating_add(units);
    }
}

fn below(value: u32, floor: u32) -> bool {
    value < floor
}

pub const REORDER_FLOOR: u32 = 12;

static WAREHOUSE: &str = "north";

pub type Ledger = HashMap<String, Sku>;

pub mod audit {
    pub fn count(ledger: &super::Ledger) -> usize {
        ledger.len()
    }
}
