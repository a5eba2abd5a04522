use serde::{Deserialize, Serialize};

/// Simulated time unit
pub type Tick = u64;

/// Sections every store opens with
pub const DEFAULT_CATALOG: [&str; 6] = [
    "electronics",
    "clothing",
    "furniture",
    "toys",
    "sporting goods",
    "books",
];

/// Stock each catalog section is seeded with
pub const INITIAL_STOCK: u32 = 5;

/// Catalog entries paired with their opening stock
pub fn default_catalog() -> Vec<(String, u32)> {
    DEFAULT_CATALOG
        .iter()
        .map(|name| (name.to_string(), INITIAL_STOCK))
        .collect()
}

/// Point-in-time view of one section, as seen by the delivery generator.
///
/// Not taken under the section lock, so it may already be stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionObservation {
    pub name: String,
    pub stock: u32,
    pub waiting: u32,
}

/// Stock levels recorded by the tick driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub tick: Tick,
    pub stock: Vec<(String, u32)>,
}

impl std::fmt::Display for StockSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}> Stock:", self.tick)?;
        for (name, stock) in &self.stock {
            write!(f, " {}={}", name, stock)?;
        }
        Ok(())
    }
}

/// Units that entered and left one section over a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTally {
    pub name: String,
    pub initial: u32,
    pub stocked: u64,
    pub sold: u64,
    pub remaining: u32,
}

impl SectionTally {
    /// True when opening stock plus restocks minus sales is what is left
    pub fn is_balanced(&self) -> bool {
        u64::from(self.initial) + self.stocked == self.sold + u64::from(self.remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_seeding() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 6);
        assert!(catalog.iter().all(|(_, stock)| *stock == INITIAL_STOCK));
        assert_eq!(catalog[4].0, "sporting goods");
    }

    #[test]
    fn test_snapshot_display() {
        let snapshot = StockSnapshot {
            tick: 100,
            stock: vec![("toys".to_string(), 3), ("books".to_string(), 0)],
        };
        assert_eq!(snapshot.to_string(), "<100> Stock: toys=3 books=0");
    }

    #[test]
    fn test_tally_balance() {
        let mut tally = SectionTally {
            name: "toys".to_string(),
            initial: 5,
            stocked: 4,
            sold: 6,
            remaining: 3,
        };
        assert!(tally.is_balanced());
        tally.remaining = 4;
        assert!(!tally.is_balanced());
    }
}
