//! Owned framebuffer slots and mirror tracking

use super::buffer::FrameBuffer;

/// Stable identifier of one of the two framebuffer slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferId(pub u8);

/// What the panel is known to display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MirrorState {
    /// Panel content is not held by any owned buffer
    #[default]
    Unknown,
    /// Panel content equals this buffer (or will, once the active transfer ends)
    Mirrors(BufferId),
}

/// How the frame staged in the secondary slot will be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Staged {
    /// Secondary diff holds the changes against the primary
    Diffed,
    /// Whole frame must be redrawn
    Full,
}

/// Up to two owned framebuffers with explicit primary/secondary roles
///
/// The primary slot is the reference the panel is diffed against. With two
/// buffers, the secondary slot receives frames submitted while a transfer
/// is running (triple buffering).
pub struct FrameBufferSet<'a> {
    slots: [Option<FrameBuffer<'a>>; 2],
    primary: usize,
    mirror: MirrorState,
    staged: Option<Staged>,
}

impl<'a> Default for FrameBufferSet<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> FrameBufferSet<'a> {
    pub const fn new() -> Self {
        Self {
            slots: [None, None],
            primary: 0,
            mirror: MirrorState::Unknown,
            staged: None,
        }
    }

    /// Replace the owned buffers
    ///
    /// A lone buffer always lands in the primary slot. New buffers are
    /// zeroed and the mirror is invalidated.
    pub fn assign(&mut self, first: Option<FrameBuffer<'a>>, second: Option<FrameBuffer<'a>>) {
        let (first, second) = match (first, second) {
            (None, Some(b)) => (Some(b), None),
            other => other,
        };
        self.slots = [first, second];
        for fb in self.slots.iter_mut().flatten() {
            fb.fill(0);
        }
        self.primary = 0;
        self.invalidate();
    }

    /// Number of owned buffers (0, 1 or 2)
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn primary_id(&self) -> Option<BufferId> {
        self.slots[self.primary]
            .as_ref()
            .map(|_| BufferId(self.primary as u8))
    }

    pub fn secondary_id(&self) -> Option<BufferId> {
        let idx = 1 - self.primary;
        self.slots[idx].as_ref().map(|_| BufferId(idx as u8))
    }

    pub fn get(&self, id: BufferId) -> Option<&FrameBuffer<'a>> {
        self.slots.get(id.0 as usize).and_then(|s| s.as_ref())
    }

    pub fn primary(&self) -> Option<&FrameBuffer<'a>> {
        self.slots[self.primary].as_ref()
    }

    pub fn primary_mut(&mut self) -> Option<&mut FrameBuffer<'a>> {
        self.slots[self.primary].as_mut()
    }

    /// Mutable access to both slots at once, as (primary, secondary)
    pub fn split_mut(&mut self) -> (Option<&mut FrameBuffer<'a>>, Option<&mut FrameBuffer<'a>>) {
        let [a, b] = &mut self.slots;
        if self.primary == 0 {
            (a.as_mut(), b.as_mut())
        } else {
            (b.as_mut(), a.as_mut())
        }
    }

    /// Exchange primary and secondary roles
    pub fn swap(&mut self) {
        if self.count() == 2 {
            self.primary = 1 - self.primary;
        }
    }

    pub fn mirror(&self) -> MirrorState {
        self.mirror
    }

    pub fn set_mirror(&mut self, mirror: MirrorState) {
        self.mirror = mirror;
    }

    /// Record that the panel will equal the primary buffer
    pub fn mirror_primary(&mut self) {
        self.mirror = match self.primary_id() {
            Some(id) => MirrorState::Mirrors(id),
            None => MirrorState::Unknown,
        };
    }

    /// True when the primary buffer matches the panel
    pub fn primary_is_mirror(&self) -> bool {
        matches!((self.mirror, self.primary_id()), (MirrorState::Mirrors(m), Some(p)) if m == p)
    }

    pub fn staged(&self) -> Option<Staged> {
        self.staged
    }

    pub fn stage(&mut self, staged: Staged) {
        self.staged = Some(staged);
    }

    pub fn take_staged(&mut self) -> Option<Staged> {
        self.staged.take()
    }

    /// Forget what the panel shows and drop any staged frame
    pub fn invalidate(&mut self) {
        self.mirror = MirrorState::Unknown;
        self.staged = None;
    }
}
