use crate::core::errors::{ConfigError, SimError};
use crate::core::types::{SectionObservation, SectionTally};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

/// A named inventory bucket.
///
/// The stock count lives behind the section's own mutex; every change to it
/// happens while that lock is held. `visible_stock` mirrors the count so
/// reporting can read it without contending for the lock.
#[derive(Debug)]
pub struct Section {
    name: String,
    initial_stock: u32,
    stock: Mutex<u32>,
    restocked: Condvar,
    visible_stock: AtomicU32,
    units_stocked: AtomicU64,
    units_sold: AtomicU64,
    waiting: AtomicU32,
    occupancy: AtomicU32,
    peak_occupancy: AtomicU32,
}

impl Section {
    fn new(name: String, stock: u32) -> Self {
        Self {
            name,
            initial_stock: stock,
            stock: Mutex::new(stock),
            restocked: Condvar::new(),
            visible_stock: AtomicU32::new(stock),
            units_stocked: AtomicU64::new(0),
            units_sold: AtomicU64::new(0),
            waiting: AtomicU32::new(0),
            occupancy: AtomicU32::new(0),
            peak_occupancy: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last stock value written under the lock. May be stale.
    pub fn visible_stock(&self) -> u32 {
        self.visible_stock.load(Ordering::Acquire)
    }

    pub fn waiting(&self) -> u32 {
        self.waiting.load(Ordering::Relaxed)
    }

    /// Highest number of actors ever seen inside the lock-held region
    pub fn peak_occupancy(&self) -> u32 {
        self.peak_occupancy.load(Ordering::SeqCst)
    }

    /// Opening stock, units added and units sold, read under the lock
    pub fn tally(&self) -> Result<SectionTally, SimError> {
        let guard = self.lock()?;
        Ok(SectionTally {
            name: self.name.clone(),
            initial: self.initial_stock,
            stocked: self.units_stocked.load(Ordering::Relaxed),
            sold: self.units_sold.load(Ordering::Relaxed),
            remaining: guard.stock(),
        })
    }

    /// Acquire the section lock
    pub fn lock(&self) -> Result<SectionGuard<'_>, SimError> {
        let stock = self
            .stock
            .lock()
            .map_err(|_| SimError::internal(format!("lock for section '{}' is poisoned", self.name)))?;
        Ok(SectionGuard::enter(self, stock))
    }
}

/// Decrements the occupancy count when the holder leaves the section.
#[derive(Debug)]
struct Occupancy<'a>(&'a AtomicU32);

impl Drop for Occupancy<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Exclusive access to one section's stock.
///
/// Dropping the guard releases the section lock.
#[derive(Debug)]
pub struct SectionGuard<'a> {
    section: &'a Section,
    // Declared before `stock` so occupancy is released while the lock is still held.
    occupancy: Occupancy<'a>,
    stock: MutexGuard<'a, u32>,
}

impl<'a> SectionGuard<'a> {
    fn enter(section: &'a Section, stock: MutexGuard<'a, u32>) -> Self {
        let inside = section.occupancy.fetch_add(1, Ordering::SeqCst) + 1;
        section.peak_occupancy.fetch_max(inside, Ordering::SeqCst);
        Self {
            section,
            occupancy: Occupancy(&section.occupancy),
            stock,
        }
    }

    pub fn name(&self) -> &str {
        &self.section.name
    }

    pub fn stock(&self) -> u32 {
        *self.stock
    }

    /// Remove one unit if any is on the shelf
    pub fn try_take(&mut self) -> Result<bool, SimError> {
        if *self.stock == 0 {
            return Ok(false);
        }
        let remaining = self.stock.checked_sub(1).ok_or_else(|| {
            SimError::internal(format!("stock underflow in section '{}'", self.section.name))
        })?;
        self.store(remaining);
        self.section.units_sold.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Put `amount` units on the shelf and wake customers waiting here
    pub fn add_stock(&mut self, amount: u32) -> Result<(), SimError> {
        let total = self.stock.checked_add(amount).ok_or_else(|| {
            SimError::internal(format!(
                "stock overflow in section '{}' adding {}",
                self.section.name, amount
            ))
        })?;
        self.store(total);
        self.section
            .units_stocked
            .fetch_add(u64::from(amount), Ordering::Relaxed);
        if amount > 0 {
            self.section.restocked.notify_all();
        }
        Ok(())
    }

    /// Release the lock until the section is restocked or woken at run end.
    ///
    /// The caller must re-check its condition; wakeups may be spurious.
    pub fn wait(self) -> Result<SectionGuard<'a>, SimError> {
        let SectionGuard {
            section,
            occupancy,
            stock,
        } = self;
        drop(occupancy);
        let stock = section
            .restocked
            .wait(stock)
            .map_err(|_| SimError::internal(format!("lock for section '{}' is poisoned", section.name)))?;
        Ok(SectionGuard::enter(section, stock))
    }

    fn store(&mut self, value: u32) {
        *self.stock = value;
        self.section.visible_stock.store(value, Ordering::Release);
    }
}

/// Table of every section in the store, in catalog order
#[derive(Debug)]
pub struct SectionRegistry {
    sections: Vec<Section>,
    index: HashMap<String, usize>,
}

impl SectionRegistry {
    /// Build the registry from `(name, initial stock)` pairs
    pub fn new(catalog: Vec<(String, u32)>) -> Result<Self, ConfigError> {
        if catalog.is_empty() {
            return Err(ConfigError::OutOfRange {
                field: "catalog",
                reason: "at least one section is required".to_string(),
            });
        }

        let mut sections = Vec::with_capacity(catalog.len());
        let mut index = HashMap::with_capacity(catalog.len());
        for (name, stock) in catalog {
            if index.contains_key(&name) {
                return Err(ConfigError::OutOfRange {
                    field: "catalog",
                    reason: format!("section '{}' is listed twice", name),
                });
            }
            index.insert(name.clone(), sections.len());
            sections.push(Section::new(name, stock));
        }

        Ok(Self { sections, index })
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Result<&Section, SimError> {
        self.index
            .get(name)
            .map(|&i| &self.sections[i])
            .ok_or_else(|| SimError::internal(format!("unknown section '{}'", name)))
    }

    pub fn lock(&self, name: &str) -> Result<SectionGuard<'_>, SimError> {
        self.section(name)?.lock()
    }

    /// Atomically check for stock and remove one unit
    pub fn try_take(&self, name: &str) -> Result<bool, SimError> {
        self.lock(name)?.try_take()
    }

    pub fn add_stock(&self, name: &str, amount: u32) -> Result<(), SimError> {
        self.lock(name)?.add_stock(amount)
    }

    /// Stock per section without taking any lock. For display only.
    pub fn snapshot(&self) -> Vec<(String, u32)> {
        self.sections
            .iter()
            .map(|s| (s.name.clone(), s.visible_stock()))
            .collect()
    }

    /// Stock and demand per section, fed to the delivery generator
    pub fn observe(&self) -> Vec<SectionObservation> {
        self.sections
            .iter()
            .map(|s| SectionObservation {
                name: s.name.clone(),
                stock: s.visible_stock(),
                waiting: s.waiting(),
            })
            .collect()
    }

    pub fn increment_waiting(&self, name: &str) -> Result<(), SimError> {
        self.section(name)?.waiting.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn decrement_waiting(&self, name: &str) -> Result<(), SimError> {
        let section = self.section(name)?;
        // Only a hint, but it must never wrap.
        let _ = section
            .waiting
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |w| w.checked_sub(1));
        Ok(())
    }

    /// Per-section unit movements, in catalog order
    pub fn tallies(&self) -> Result<Vec<SectionTally>, SimError> {
        self.sections.iter().map(Section::tally).collect()
    }

    pub fn peak_occupancy(&self, name: &str) -> Result<u32, SimError> {
        Ok(self.section(name)?.peak_occupancy())
    }

    /// Wake every actor waiting on a restock.
    ///
    /// Notifies under each section's lock so a customer that checked the
    /// clock just before going to sleep cannot miss the wakeup.
    pub fn wake_all(&self) -> Result<(), SimError> {
        for section in &self.sections {
            let _guard = section.lock()?;
            section.restocked.notify_all();
        }
        Ok(())
    }
}
