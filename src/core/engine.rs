use tracing::{debug, warn};

use super::tax::compute_tax;
use super::types::{ProjectionInput, ProjectionOutput, ScheduleInterval};

#[derive(Debug, Clone, Copy, PartialEq)]
struct YearFlows {
    gross_income: f64,
    spending: f64,
}

#[derive(Debug, Clone, Copy)]
struct YearPoint {
    age: u32,
    gross_income: f64,
    available_income: f64,
    spending: f64,
    effective_tax_rate: f64,
    savings: f64,
    real_net_worth: f64,
    real_interest: f64,
}

struct YearlyAccumulator {
    ages: Vec<u32>,
    real_net_worth: Vec<f64>,
    pre_tax_income: Vec<f64>,
    after_tax_income: Vec<f64>,
    spending: Vec<f64>,
    effective_tax_rate: Vec<f64>,
    savings: Vec<f64>,
    real_interest: Vec<f64>,
}

impl YearlyAccumulator {
    fn new(year_count: usize) -> Self {
        let make = || Vec::with_capacity(year_count);
        Self {
            ages: Vec::with_capacity(year_count),
            real_net_worth: make(),
            pre_tax_income: make(),
            after_tax_income: make(),
            spending: make(),
            effective_tax_rate: make(),
            savings: make(),
            real_interest: make(),
        }
    }

    fn push(&mut self, point: YearPoint) {
        self.ages.push(point.age);
        self.real_net_worth.push(point.real_net_worth);
        self.pre_tax_income.push(point.gross_income);
        self.after_tax_income.push(point.available_income);
        self.spending.push(point.spending);
        self.effective_tax_rate.push(point.effective_tax_rate);
        self.savings.push(point.savings);
        self.real_interest.push(point.real_interest);
    }

    fn into_output(self, inputs: &ProjectionInput, fire_age: Option<u32>) -> ProjectionOutput {
        let growth = 1.0 + inputs.inflation_rate;
        let nominal_net_worth = self
            .real_net_worth
            .iter()
            .enumerate()
            .map(|(i, real)| real * growth.powi(i as i32))
            .collect();

        let real_return_rate = inputs.real_return_rate();
        let fire_possible = inputs.fire_possible();
        let error = (!fire_possible).then(|| {
            format!(
                "FIRE is not possible: Withdrawal rate ({:.1}%) exceeds real return rate ({:.1}%)",
                inputs.withdrawal_rate * 100.0,
                real_return_rate * 100.0
            )
        });

        ProjectionOutput {
            ages: self.ages,
            nominal_net_worth,
            real_net_worth: self.real_net_worth,
            pre_tax_income: self.pre_tax_income,
            after_tax_income: self.after_tax_income,
            spending: self.spending,
            effective_tax_rate: self.effective_tax_rate,
            savings: self.savings,
            real_interest: self.real_interest,
            fire_age: if fire_possible { fire_age } else { None },
            required_savings: inputs.required_savings(),
            real_return_rate,
            fire_possible,
            error,
        }
    }
}

/// Projects real and nominal net worth from `current_age` to `end_age` and
/// finds the first age at which it covers `retirement_spending` at the
/// chosen withdrawal rate.
///
/// The FIRE age is found on a first pass over the raw schedules. A second
/// pass produces the reported trace, switching to zero income and
/// `retirement_spending` from that age onward when `stop_at_fire` is set.
/// The FIRE age is not re-derived after the switch.
pub fn project(inputs: &ProjectionInput) -> ProjectionOutput {
    let fire_age = discover_fire_age(inputs);
    if let Some(age) = fire_age {
        debug!(fire_age = age, "FIRE threshold reached on discovery pass");
    }
    if !inputs.fire_possible() {
        warn!(
            withdrawal_rate = inputs.withdrawal_rate,
            real_return_rate = inputs.real_return_rate(),
            "withdrawal rate exceeds real return rate"
        );
    }

    let mut acc = YearlyAccumulator::new(year_count(inputs));
    let mut previous = None;
    for age in inputs.current_age..=inputs.end_age {
        let flows = year_flows(inputs, age, fire_age);
        let point = simulate_year(inputs, age, previous, flows);
        previous = Some(point.real_net_worth);
        acc.push(point);
    }

    acc.into_output(inputs, fire_age)
}

/// Sum of every interval covering `age`; zero when none does.
pub fn schedule_total(schedule: &[ScheduleInterval], age: u32) -> f64 {
    schedule
        .iter()
        .filter(|interval| interval.covers(age))
        .map(|interval| interval.amount)
        .sum()
}

fn year_count(inputs: &ProjectionInput) -> usize {
    (inputs.end_age.saturating_sub(inputs.current_age) as usize) + 1
}

fn discover_fire_age(inputs: &ProjectionInput) -> Option<u32> {
    let required = inputs.required_savings();
    let mut previous = None;
    for age in inputs.current_age..=inputs.end_age {
        let flows = year_flows(inputs, age, None);
        let point = simulate_year(inputs, age, previous, flows);
        if point.real_net_worth >= required {
            return Some(age);
        }
        previous = Some(point.real_net_worth);
    }
    None
}

fn year_flows(inputs: &ProjectionInput, age: u32, fire_age: Option<u32>) -> YearFlows {
    let retired = inputs.stop_at_fire && fire_age.is_some_and(|fire| age >= fire);
    if retired {
        return YearFlows {
            gross_income: 0.0,
            spending: inputs.retirement_spending,
        };
    }

    YearFlows {
        gross_income: schedule_total(&inputs.income_schedule, age),
        spending: schedule_total(&inputs.spending_schedule, age),
    }
}

fn simulate_year(
    inputs: &ProjectionInput,
    age: u32,
    previous_real: Option<f64>,
    flows: YearFlows,
) -> YearPoint {
    let tax = compute_tax(
        flows.gross_income,
        inputs.jurisdiction,
        inputs.pre_tax_401k,
        inputs.backdoor_roth,
        inputs.employer_match,
    );
    let savings = tax.total_available_income - flows.spending;

    // The opening year only records flows; the balance starts at net worth.
    let (real_net_worth, real_interest) = match previous_real {
        Some(previous) => {
            let interest = previous * inputs.real_return_rate();
            (previous + savings + interest, interest)
        }
        None => (inputs.current_net_worth, 0.0),
    };

    YearPoint {
        age,
        gross_income: flows.gross_income,
        available_income: tax.total_available_income,
        spending: flows.spending,
        effective_tax_rate: tax.effective_tax_rate_percent,
        savings,
        real_net_worth,
        real_interest,
    }
}
