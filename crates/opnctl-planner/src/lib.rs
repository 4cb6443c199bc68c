pub mod diff;
pub mod error;
pub mod model;
pub mod planner;
pub mod risk;

pub use error::PlannerError;
pub use model::{Change, ChangeOp, Plan, PlanSummary, Risk, RiskSeverity, Wave};
pub use planner::{plan, plan_destruction};
