use thiserror::Error;

/// Reasons a projection request is rejected before it reaches the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("--end-age ({end_age}) must be > --current-age ({current_age})")]
    AgeRange { current_age: u32, end_age: u32 },
    #[error("--end-age ({end_age}) must be <= {max_age}")]
    Horizon { end_age: u32, max_age: u32 },
    #[error("--withdrawal-rate must be > 0")]
    WithdrawalRate,
    #[error("--inflation-rate must be > -100")]
    InflationRate,
    #[error("--{field} must be >= 0")]
    Negative { field: &'static str },
    #[error("--{field} must be between 0 and 100")]
    PercentRange { field: &'static str },
    #[error("--{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("{schedule} interval #{index} starts at {start_age}, after its end age {end_age}")]
    IntervalOrder {
        schedule: &'static str,
        index: usize,
        start_age: u32,
        end_age: u32,
    },
    #[error("{schedule} interval #{index} amount must be a finite number")]
    IntervalAmount { schedule: &'static str, index: usize },
    #[error("invalid interval '{0}', expected START:END:AMOUNT")]
    IntervalSyntax(String),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("unknown state '{0}', expected one of CA, AK, FL, NV, NH, SD, TN, TX, WA, WY")]
    UnknownJurisdiction(String),
}
