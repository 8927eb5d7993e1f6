//! Real and dummy diff slots
//!
//! Real diffs hold spans in application storage. Dummy diffs are
//! storage-less and always describe a full redraw. Each kind has a
//! primary/secondary pair swapped on promotion.

use super::buffer::DiffBuffer;

/// Stable handle on one of the four diff slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiffSlot {
    Real(u8),
    Dummy(u8),
}

pub struct DiffSet<'a> {
    real: [Option<DiffBuffer<'a>>; 2],
    dummy: [DiffBuffer<'a>; 2],
    current: usize,
    current_dummy: usize,
}

impl<'a> Default for DiffSet<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> DiffSet<'a> {
    pub fn new() -> Self {
        Self {
            real: [None, None],
            dummy: [DiffBuffer::dummy(), DiffBuffer::dummy()],
            current: 0,
            current_dummy: 0,
        }
    }

    /// Replace the real diff buffers; a lone buffer lands in the primary slot
    pub fn assign(&mut self, first: Option<DiffBuffer<'a>>, second: Option<DiffBuffer<'a>>) {
        let (first, second) = match (first, second) {
            (None, Some(b)) => (Some(b), None),
            other => other,
        };
        self.real = [first, second];
        self.current = 0;
        self.invalidate();
    }

    /// Number of real diff buffers
    pub fn count(&self) -> usize {
        self.real.iter().filter(|d| d.is_some()).count()
    }

    pub fn primary(&self) -> Option<DiffSlot> {
        self.real[self.current]
            .as_ref()
            .map(|_| DiffSlot::Real(self.current as u8))
    }

    pub fn secondary(&self) -> Option<DiffSlot> {
        let idx = 1 - self.current;
        self.real[idx].as_ref().map(|_| DiffSlot::Real(idx as u8))
    }

    pub fn dummy_primary(&self) -> DiffSlot {
        DiffSlot::Dummy(self.current_dummy as u8)
    }

    pub fn dummy_secondary(&self) -> DiffSlot {
        DiffSlot::Dummy((1 - self.current_dummy) as u8)
    }

    pub fn get(&self, slot: DiffSlot) -> Option<&DiffBuffer<'a>> {
        match slot {
            DiffSlot::Real(i) => self.real.get(i as usize).and_then(|d| d.as_ref()),
            DiffSlot::Dummy(i) => self.dummy.get(i as usize),
        }
    }

    pub fn get_mut(&mut self, slot: DiffSlot) -> Option<&mut DiffBuffer<'a>> {
        match slot {
            DiffSlot::Real(i) => self.real.get_mut(i as usize).and_then(|d| d.as_mut()),
            DiffSlot::Dummy(i) => self.dummy.get_mut(i as usize),
        }
    }

    /// Both real diffs at once, as (primary, secondary)
    pub fn real_pair_mut(&mut self) -> (Option<&mut DiffBuffer<'a>>, Option<&mut DiffBuffer<'a>>) {
        let [a, b] = &mut self.real;
        if self.current == 0 {
            (a.as_mut(), b.as_mut())
        } else {
            (b.as_mut(), a.as_mut())
        }
    }

    /// Exchange the real primary and secondary diffs
    pub fn swap(&mut self) {
        if self.count() == 2 {
            self.current = 1 - self.current;
        }
    }

    pub fn swap_dummy(&mut self) {
        self.current_dummy = 1 - self.current_dummy;
    }

    pub fn invalidate(&mut self) {
        for d in self.real.iter_mut().flatten() {
            d.invalidate();
        }
        for d in &mut self.dummy {
            d.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffSpan;
    use crate::framebuffer::Region;

    #[test]
    fn test_lone_diff_is_primary() {
        let mut storage = [DiffSpan::default(); 4];
        let mut set = DiffSet::new();
        set.assign(None, Some(DiffBuffer::new(&mut storage)));
        assert_eq!(set.count(), 1);
        assert_eq!(set.primary(), Some(DiffSlot::Real(0)));
        assert_eq!(set.secondary(), None);
    }

    #[test]
    fn test_swap_real_and_dummy() {
        let mut s1 = [DiffSpan::default(); 4];
        let mut s2 = [DiffSpan::default(); 4];
        let mut set = DiffSet::new();
        set.assign(Some(DiffBuffer::new(&mut s1)), Some(DiffBuffer::new(&mut s2)));
        set.swap();
        assert_eq!(set.primary(), Some(DiffSlot::Real(1)));
        assert_eq!(set.secondary(), Some(DiffSlot::Real(0)));

        let slot = set.dummy_secondary();
        set.get_mut(slot).unwrap().set_rows(Region::new(0, 0, 0, 0));
        set.swap_dummy();
        assert_eq!(set.dummy_primary(), slot);
        assert!(!set.get(slot).unwrap().is_empty());
    }
}
