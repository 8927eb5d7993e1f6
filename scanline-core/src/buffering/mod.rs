//! Buffering policy
//!
//! Decides, per submitted frame, whether to diff in place, stage into the
//! secondary buffer, block or drop.

pub mod policy;

pub use crate::config::BufferingMode;
pub use policy::{
    plan_region, plan_submit, DiffKind, RegionContext, RegionFollowUp, RegionPlan, SubmitContext,
    SubmitPlan,
};
