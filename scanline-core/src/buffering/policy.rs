//! Per-submit buffering decisions
//!
//! Pure functions of the driver's current situation. The display facade
//! carries out whatever plan comes back.

use crate::config::{BufferingMode, VsyncSpacing};

/// Which diff a transfer will consume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiffKind {
    /// Computed against the mirror
    Real,
    /// Full redraw
    Dummy,
}

/// Situation at the moment a full frame is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubmitContext {
    /// Effective buffering mode
    pub mode: BufferingMode,
    pub spacing: VsyncSpacing,
    /// A transfer is active
    pub busy: bool,
    /// Real diff buffers available (0..=2)
    pub diffs: usize,
    /// Primary buffer equals the panel (or will, when the active transfer ends)
    pub mirror_valid: bool,
    /// Caller asked for a full redraw
    pub force_full: bool,
}

/// What to do with a submitted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubmitPlan {
    /// Push the caller's buffer synchronously
    PushNow,
    /// Ignore the frame
    Drop,
    /// Copy into the primary buffer and start a transfer
    Launch { diff: DiffKind },
    /// Block until idle, then as [`SubmitPlan::Launch`]
    WaitThenLaunch { diff: DiffKind },
    /// Diff into the secondary diff against the untouched primary while the
    /// active transfer runs, then block, swap diffs, copy and launch
    DiffWhileBusy,
    /// Copy into the secondary buffer; the completion handler promotes it
    Stage { diff: DiffKind },
}

/// Decide how a full frame is handled
pub fn plan_submit(ctx: SubmitContext) -> SubmitPlan {
    if ctx.mode == BufferingMode::NoBuffering {
        return SubmitPlan::PushNow;
    }
    if ctx.busy && ctx.spacing.drops_when_busy() {
        return SubmitPlan::Drop;
    }

    let diffable = ctx.mirror_valid && !ctx.force_full;
    let launch_kind = if diffable && ctx.diffs >= 1 {
        DiffKind::Real
    } else {
        DiffKind::Dummy
    };

    match (ctx.mode, ctx.busy) {
        (_, false) => SubmitPlan::Launch { diff: launch_kind },
        (BufferingMode::TripleBuffering, true) => SubmitPlan::Stage {
            diff: if diffable && ctx.diffs == 2 {
                DiffKind::Real
            } else {
                DiffKind::Dummy
            },
        },
        (_, true) if ctx.diffs == 2 && launch_kind == DiffKind::Real => SubmitPlan::DiffWhileBusy,
        (_, true) => SubmitPlan::WaitThenLaunch { diff: launch_kind },
    }
}

/// Situation at the moment a region is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegionContext {
    pub mode: BufferingMode,
    pub diffs: usize,
    pub mirror_valid: bool,
    /// The primary diff holds region changes not yet sent
    pub backlog: bool,
    /// Caller wants the panel updated now
    pub redraw: bool,
}

/// Follow-up once a region has been copied into the primary buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionFollowUp {
    /// Push the rectangle synchronously; the mirror stays valid
    PushRect,
    /// Redraw the whole panel from the primary buffer
    LaunchFull,
    /// Leave the panel stale; the mirror becomes unknown
    Defer,
}

/// What to do with a submitted region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionPlan {
    /// Push the caller's rectangle synchronously
    PushNow,
    /// Block until idle, copy the region into the primary buffer, then follow up
    Copy { then: RegionFollowUp },
    /// Diff the region merged with the backlog into the secondary diff,
    /// then copy and swap; launch it or keep it as the new backlog
    Merge { launch: bool },
}

/// Decide how a region update is handled
pub fn plan_region(ctx: RegionContext) -> RegionPlan {
    if ctx.mode == BufferingMode::NoBuffering {
        return RegionPlan::PushNow;
    }
    if ctx.diffs == 2 && (ctx.mirror_valid || ctx.backlog) {
        return RegionPlan::Merge { launch: ctx.redraw };
    }
    let then = match (ctx.redraw, ctx.mirror_valid) {
        (false, _) => RegionFollowUp::Defer,
        (true, true) => RegionFollowUp::PushRect,
        (true, false) => RegionFollowUp::LaunchFull,
    };
    RegionPlan::Copy { then }
}
