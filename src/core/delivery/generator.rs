use crate::core::types::{SectionObservation, Tick};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A batch of items allocated across sections.
///
/// Lines keep the order they were allocated in, so the most demanded
/// sections come first. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    id: Uuid,
    created_at: Tick,
    lines: Vec<(String, u32)>,
}

impl Delivery {
    pub fn new(created_at: Tick, lines: Vec<(String, u32)>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at,
            lines,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> Tick {
        self.created_at
    }

    pub fn lines(&self) -> &[(String, u32)] {
        &self.lines
    }

    /// Units allocated to `section`, zero if it is not part of this delivery
    pub fn quantity(&self, section: &str) -> u32 {
        self.lines
            .iter()
            .filter(|(name, _)| name == section)
            .map(|(_, qty)| *qty)
            .sum()
    }

    pub fn total(&self) -> u32 {
        self.lines.iter().map(|(_, qty)| *qty).sum()
    }
}

impl std::fmt::Display for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Delivery {}:", self.id)?;
        for (name, qty) in self.lines.iter().filter(|(_, qty)| *qty > 0) {
            write!(f, " {}={}", name, qty)?;
        }
        Ok(())
    }
}

/// Splits a fixed budget of items across sections, favouring the ones
/// with the most customers waiting.
#[derive(Debug, Clone)]
pub struct DeliveryGenerator {
    batch_size: u32,
    section_capacity: u32,
}

impl DeliveryGenerator {
    pub fn new(batch_size: u32, section_capacity: u32) -> Self {
        Self {
            batch_size,
            section_capacity,
        }
    }

    /// Allocate one delivery against a (possibly stale) view of the store.
    ///
    /// The capacity check only uses the observed stock; concurrent changes
    /// can still push a section past capacity.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        observations: &[SectionObservation],
        created_at: Tick,
        rng: &mut R,
    ) -> Delivery {
        let mut ranked: Vec<&SectionObservation> = observations.iter().collect();
        // Stable sort keeps catalog order between equally busy sections.
        ranked.sort_by(|a, b| b.waiting.cmp(&a.waiting));

        let mut allocated = vec![0u32; ranked.len()];
        let mut remaining = self.batch_size;

        for _ in 0..self.batch_size {
            if remaining == 0 {
                break;
            }
            let mut any_headroom = false;
            for (slot, section) in ranked.iter().enumerate() {
                if remaining == 0 {
                    break;
                }
                let held = section.stock.saturating_add(allocated[slot]);
                if held >= self.section_capacity {
                    continue;
                }
                any_headroom = true;
                let headroom = self.section_capacity - held;
                let qty = rng.gen_range(0..=remaining.min(headroom));
                allocated[slot] += qty;
                remaining -= qty;
            }
            if !any_headroom {
                break;
            }
        }

        let lines = ranked
            .iter()
            .zip(allocated)
            .map(|(section, qty)| (section.name.clone(), qty))
            .collect();
        Delivery::new(created_at, lines)
    }
}
