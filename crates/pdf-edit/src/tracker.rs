//! Working page order for an editing session
//!
//! The tracker never touches the source bytes. It records which source page
//! each visible slot renders, how far it is rotated, and whether it has been
//! deleted. Every mutation validates its input in full before changing
//! anything, so a rejected call leaves the tracker untouched.

use crate::types::*;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageModificationTracker {
    entries: Vec<PageModification>,
    #[cfg_attr(feature = "serde", serde(skip))]
    generation: u64,
}

impl PageModificationTracker {
    /// Identity mapping over `page_count` source pages
    pub fn new(page_count: usize) -> Self {
        Self {
            entries: (0..page_count).map(PageModification::new).collect(),
            generation: 0,
        }
    }

    /// Build a tracker from explicit entries, checking every `original_index`
    /// against the source page count.
    pub fn from_entries(entries: Vec<PageModification>, page_count: usize) -> Result<Self> {
        let mut entries = entries;
        for entry in &mut entries {
            if entry.original_index >= page_count {
                return Err(EditError::PageIndexOutOfRange {
                    index: entry.original_index,
                    page_count,
                });
            }
            entry.rotation = normalize_rotation(entry.rotation as i64)?;
        }
        Ok(Self {
            entries,
            generation: 0,
        })
    }

    /// All slots, tombstones included
    pub fn entries(&self) -> &[PageModification] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bumped whenever the sequence of visible pages changes.
    ///
    /// Rotation alone does not count: previews carry their rotation and do
    /// not need re-rendering for it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Rearrange slots so that output position `i` holds the slot previously
    /// at `new_order[i]`.
    pub fn reorder(&mut self, new_order: &[usize]) -> Result<()> {
        let len = self.entries.len();
        if new_order.len() != len {
            return Err(EditError::InvalidOrder(format!(
                "expected {} positions, got {}",
                len,
                new_order.len()
            )));
        }

        let mut seen = vec![false; len];
        for &position in new_order {
            if position >= len {
                return Err(EditError::InvalidOrder(format!(
                    "position {} is out of range for {} pages",
                    position, len
                )));
            }
            if seen[position] {
                return Err(EditError::InvalidOrder(format!(
                    "position {} appears more than once",
                    position
                )));
            }
            seen[position] = true;
        }

        self.entries = new_order.iter().map(|&i| self.entries[i]).collect();
        self.touch();
        Ok(())
    }

    /// Tombstone the given positions. Already-deleted positions are left as is.
    pub fn delete(&mut self, positions: &[usize]) -> Result<()> {
        for &position in positions {
            self.check_position(position)?;
        }
        let mut changed = false;
        for &position in positions {
            changed |= !self.entries[position].deleted;
            self.entries[position].deleted = true;
        }
        if changed {
            self.touch();
        }
        Ok(())
    }

    /// Add `delta` degrees to the slot's rotation, modulo 360.
    pub fn rotate(&mut self, position: usize, delta: i32) -> Result<()> {
        self.check_position(position)?;
        if delta % 90 != 0 {
            return Err(EditError::InvalidRotation(delta.into()));
        }
        let entry = &mut self.entries[position];
        entry.rotation = normalize_rotation(entry.rotation as i64 + delta as i64)?;
        Ok(())
    }

    /// Insert a copy of the slot directly after it. Returns the new position.
    pub fn duplicate(&mut self, position: usize) -> Result<usize> {
        self.check_position(position)?;
        let copy = self.entries[position];
        self.entries.insert(position + 1, copy);
        self.touch();
        Ok(position + 1)
    }

    /// Slots that will appear in the output, in output order
    pub fn working_order(&self) -> Vec<PageModification> {
        self.entries.iter().filter(|e| !e.deleted).copied().collect()
    }

    /// Number of pages the output will contain
    pub fn visible_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.deleted).count()
    }

    fn check_position(&self, position: usize) -> Result<()> {
        if position >= self.entries.len() {
            return Err(EditError::PageIndexOutOfRange {
                index: position,
                page_count: self.entries.len(),
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}
