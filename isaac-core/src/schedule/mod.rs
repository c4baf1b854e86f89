//! Classifies an expression tree's kernel kind and splits it into a sequence
//! of materialized temporaries plus a final kernel (§4.2).

mod classify;
mod kind;
mod materialize;

pub use classify::classify;
pub use kind::Kind;
pub use materialize::{schedule, ScheduleResult, ScheduledKernel};
