use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::InputError;
use super::tax::Jurisdiction;

/// An amount that applies every year from `start_age` to `end_age`, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInterval {
    pub start_age: u32,
    pub end_age: u32,
    pub amount: f64,
}

impl ScheduleInterval {
    pub fn new(start_age: u32, end_age: u32, amount: f64) -> Self {
        Self {
            start_age,
            end_age,
            amount,
        }
    }

    pub fn covers(&self, age: u32) -> bool {
        self.start_age <= age && age <= self.end_age
    }
}

impl fmt::Display for ScheduleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start_age, self.end_age, self.amount)
    }
}

impl FromStr for ScheduleInterval {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let syntax = || InputError::IntervalSyntax(s.to_string());
        let mut parts = s.split(':').map(str::trim);
        let (Some(start), Some(end), Some(amount), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(syntax());
        };
        Ok(Self {
            start_age: start.parse().map_err(|_| syntax())?,
            end_age: end.parse().map_err(|_| syntax())?,
            amount: amount.parse().map_err(|_| syntax())?,
        })
    }
}

/// Oldest age a projection may run to.
pub const MAX_END_AGE: u32 = 150;

/// Parameters of one projection run. Rates are fractions (0.08 for 8%),
/// money is in today's dollars.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionInput {
    pub current_age: u32,
    pub end_age: u32,
    pub current_net_worth: f64,
    pub annual_return: f64,
    pub inflation_rate: f64,
    pub withdrawal_rate: f64,
    pub employer_match: f64,
    pub backdoor_roth: f64,
    pub retirement_spending: f64,
    pub pre_tax_401k: f64,
    pub jurisdiction: Jurisdiction,
    pub income_schedule: Vec<ScheduleInterval>,
    pub spending_schedule: Vec<ScheduleInterval>,
    pub stop_at_fire: bool,
}

impl ProjectionInput {
    pub fn real_return_rate(&self) -> f64 {
        (1.0 + self.annual_return) / (1.0 + self.inflation_rate) - 1.0
    }

    pub fn required_savings(&self) -> f64 {
        self.retirement_spending / self.withdrawal_rate
    }

    pub fn fire_possible(&self) -> bool {
        self.withdrawal_rate <= self.real_return_rate()
    }

    /// Boundary checks for values the engine itself does not guard against.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.end_age <= self.current_age {
            return Err(InputError::AgeRange {
                current_age: self.current_age,
                end_age: self.end_age,
            });
        }
        if self.end_age > MAX_END_AGE {
            return Err(InputError::Horizon {
                end_age: self.end_age,
                max_age: MAX_END_AGE,
            });
        }

        for (field, value) in [
            ("current-net-worth", self.current_net_worth),
            ("annual-return", self.annual_return),
            ("inflation-rate", self.inflation_rate),
            ("withdrawal-rate", self.withdrawal_rate),
            ("employer-match", self.employer_match),
            ("backdoor-roth", self.backdoor_roth),
            ("retirement-spending", self.retirement_spending),
            ("pre-tax-401k", self.pre_tax_401k),
        ] {
            if !value.is_finite() {
                return Err(InputError::NonFinite { field });
            }
        }

        if self.withdrawal_rate <= 0.0 {
            return Err(InputError::WithdrawalRate);
        }
        if self.inflation_rate <= -1.0 {
            return Err(InputError::InflationRate);
        }

        for (field, value) in [
            ("retirement-spending", self.retirement_spending),
            ("pre-tax-401k", self.pre_tax_401k),
        ] {
            if value < 0.0 {
                return Err(InputError::Negative { field });
            }
        }
        for (field, rate) in [
            ("withdrawal-rate", self.withdrawal_rate),
            ("employer-match", self.employer_match),
            ("backdoor-roth", self.backdoor_roth),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(InputError::PercentRange { field });
            }
        }

        validate_schedule("income", &self.income_schedule)?;
        validate_schedule("spending", &self.spending_schedule)
    }
}

fn validate_schedule(
    schedule: &'static str,
    intervals: &[ScheduleInterval],
) -> Result<(), InputError> {
    for (index, interval) in intervals.iter().enumerate() {
        if interval.start_age > interval.end_age {
            return Err(InputError::IntervalOrder {
                schedule,
                index,
                start_age: interval.start_age,
                end_age: interval.end_age,
            });
        }
        if !interval.amount.is_finite() {
            return Err(InputError::IntervalAmount { schedule, index });
        }
    }
    Ok(())
}

/// Year-by-year trace of a projection. Every series has one entry per age in
/// `ages`; `after_tax_income` includes the employer match.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionOutput {
    pub ages: Vec<u32>,
    pub nominal_net_worth: Vec<f64>,
    pub real_net_worth: Vec<f64>,
    pub pre_tax_income: Vec<f64>,
    pub after_tax_income: Vec<f64>,
    pub spending: Vec<f64>,
    pub effective_tax_rate: Vec<f64>,
    pub savings: Vec<f64>,
    pub real_interest: Vec<f64>,
    pub fire_age: Option<u32>,
    pub required_savings: f64,
    pub real_return_rate: f64,
    pub fire_possible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
