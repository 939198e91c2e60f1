//! Treatment-plan reports: a protocol, a transducer and a target combined
//! into the numbers an operator checks before handing the plan to a
//! beamformer and an acoustic solver.

pub mod io;
pub mod report;

pub use report::{build_report, GridSummary, MaterialSummary, PlanReport, PlanSummary, TargetRow};
