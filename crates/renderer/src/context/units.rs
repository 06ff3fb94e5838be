use std::collections::{BTreeSet, HashMap};

use crate::error::BindError;
use crate::handles::TextureHandle;

/// Result of asking the unit table for a texture's unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UnitAssignment {
    pub unit: u32,
    /// The unit does not currently hold this texture on the device.
    pub needs_bind: bool,
}

/// Texture handle to unit table. The lowest free unit is handed out first and
/// stays with its texture until it is released from the context.
#[derive(Debug, Clone)]
pub(crate) struct TextureUnits {
    capacity: u32,
    next: u32,
    free: BTreeSet<u32>,
    assigned: HashMap<TextureHandle, u32>,
    bound: Vec<Option<TextureHandle>>,
}

impl TextureUnits {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            next: 0,
            free: BTreeSet::new(),
            assigned: HashMap::new(),
            bound: vec![None; capacity as usize],
        }
    }

    pub fn unit_of(&self, texture: TextureHandle) -> Option<u32> {
        self.assigned.get(&texture).copied()
    }

    pub fn assign(&mut self, texture: TextureHandle) -> Result<UnitAssignment, BindError> {
        if let Some(unit) = self.unit_of(texture) {
            return Ok(UnitAssignment {
                unit,
                needs_bind: self.bound[unit as usize] != Some(texture),
            });
        }
        let unit = match self.free.pop_first() {
            Some(unit) => unit,
            None if self.next < self.capacity => {
                self.next += 1;
                self.next - 1
            }
            None => {
                return Err(BindError::TextureUnitsExhausted {
                    capacity: self.capacity,
                })
            }
        };
        self.assigned.insert(texture, unit);
        tracing::debug!(%texture, unit, "assigned texture unit");
        Ok(UnitAssignment {
            unit,
            needs_bind: true,
        })
    }

    pub fn mark_bound(&mut self, unit: u32, texture: TextureHandle) {
        if let Some(slot) = self.bound.get_mut(unit as usize) {
            *slot = Some(texture);
        }
    }

    /// Forgets what the device holds for `texture` so the next draw rebinds it.
    pub fn invalidate(&mut self, texture: TextureHandle) {
        if let Some(unit) = self.unit_of(texture) {
            self.bound[unit as usize] = None;
        }
    }

    /// Returns the unit of a released texture to the pool.
    pub fn release(&mut self, texture: TextureHandle) {
        if let Some(unit) = self.assigned.remove(&texture) {
            self.bound[unit as usize] = None;
            self.free.insert(unit);
        }
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }
}
