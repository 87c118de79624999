mod engine;
mod error;
mod tax;
mod types;

pub use engine::{project, schedule_total};
pub use error::InputError;
pub use tax::{
    FicaBreakdown, Jurisdiction, TaxBracket, TaxBreakdown, TaxResult, bracket_tax, compute_tax,
    compute_tax_breakdown, fica_tax,
};
pub use types::{MAX_END_AGE, ProjectionInput, ProjectionOutput, ScheduleInterval};
