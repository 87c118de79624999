use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::InputError;

/// One step of a progressive schedule: `rate` applies to income above `floor`
/// up to the next bracket's floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxBracket {
    pub floor: f64,
    pub rate: f64,
}

const fn bracket(floor: f64, rate: f64) -> TaxBracket {
    TaxBracket { floor, rate }
}

// 2024, single filer.
pub const FEDERAL_BRACKETS: [TaxBracket; 7] = [
    bracket(0.0, 0.10),
    bracket(11_600.0, 0.12),
    bracket(47_150.0, 0.22),
    bracket(100_525.0, 0.24),
    bracket(191_950.0, 0.32),
    bracket(243_725.0, 0.35),
    bracket(609_350.0, 0.37),
];
pub const FEDERAL_STANDARD_DEDUCTION: f64 = 14_600.0;

pub const CALIFORNIA_BRACKETS: [TaxBracket; 9] = [
    bracket(0.0, 0.01),
    bracket(10_757.0, 0.02),
    bracket(25_500.0, 0.04),
    bracket(40_246.0, 0.06),
    bracket(55_867.0, 0.08),
    bracket(70_607.0, 0.093),
    bracket(360_660.0, 0.103),
    bracket(432_788.0, 0.113),
    bracket(721_315.0, 0.123),
];
pub const CALIFORNIA_STANDARD_DEDUCTION: f64 = 5_540.0;

pub const SOCIAL_SECURITY_RATE: f64 = 0.062;
pub const SOCIAL_SECURITY_WAGE_BASE: f64 = 168_600.0;
pub const MEDICARE_RATE: f64 = 0.0145;
pub const ADDITIONAL_MEDICARE_RATE: f64 = 0.009;
pub const ADDITIONAL_MEDICARE_THRESHOLD: f64 = 200_000.0;

/// State of residence. Only California carries a bracket table; the rest are
/// modelled as paying no state income tax (NH included, which only taxes
/// interest and dividends).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Jurisdiction {
    #[default]
    Ca,
    Ak,
    Fl,
    Nv,
    Nh,
    Sd,
    Tn,
    Tx,
    Wa,
    Wy,
}

impl Jurisdiction {
    pub const ALL: [Jurisdiction; 10] = [
        Jurisdiction::Ca,
        Jurisdiction::Ak,
        Jurisdiction::Fl,
        Jurisdiction::Nv,
        Jurisdiction::Nh,
        Jurisdiction::Sd,
        Jurisdiction::Tn,
        Jurisdiction::Tx,
        Jurisdiction::Wa,
        Jurisdiction::Wy,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Jurisdiction::Ca => "CA",
            Jurisdiction::Ak => "AK",
            Jurisdiction::Fl => "FL",
            Jurisdiction::Nv => "NV",
            Jurisdiction::Nh => "NH",
            Jurisdiction::Sd => "SD",
            Jurisdiction::Tn => "TN",
            Jurisdiction::Tx => "TX",
            Jurisdiction::Wa => "WA",
            Jurisdiction::Wy => "WY",
        }
    }

    pub fn brackets(self) -> &'static [TaxBracket] {
        match self {
            Jurisdiction::Ca => &CALIFORNIA_BRACKETS,
            _ => &[],
        }
    }

    pub fn standard_deduction(self) -> f64 {
        match self {
            Jurisdiction::Ca => CALIFORNIA_STANDARD_DEDUCTION,
            _ => 0.0,
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Jurisdiction {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Jurisdiction::ALL
            .into_iter()
            .find(|j| j.code().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| InputError::UnknownJurisdiction(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FicaBreakdown {
    pub social_security: f64,
    pub medicare: f64,
    pub additional_medicare: f64,
}

impl FicaBreakdown {
    pub fn total(self) -> f64 {
        self.social_security + self.medicare + self.additional_medicare
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub federal: f64,
    pub state: f64,
    pub fica: FicaBreakdown,
    pub total: f64,
    pub after_tax_income: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxResult {
    pub after_tax_income: f64,
    pub effective_tax_rate_percent: f64,
    pub total_available_income: f64,
}

impl TaxResult {
    const ZERO: TaxResult = TaxResult {
        after_tax_income: 0.0,
        effective_tax_rate_percent: 0.0,
        total_available_income: 0.0,
    };
}

/// Progressive tax on `taxable`, walking brackets from the top floor down and
/// clamping the remaining income to each floor as it is consumed.
pub fn bracket_tax(taxable: f64, brackets: &[TaxBracket]) -> f64 {
    let mut tax = 0.0;
    let mut remaining = taxable;
    for bracket in brackets.iter().rev() {
        if taxable > bracket.floor {
            tax += (remaining - bracket.floor) * bracket.rate;
            remaining = bracket.floor;
        }
    }
    tax
}

pub fn fica_tax(gross: f64) -> FicaBreakdown {
    FicaBreakdown {
        social_security: gross.min(SOCIAL_SECURITY_WAGE_BASE) * SOCIAL_SECURITY_RATE,
        medicare: gross * MEDICARE_RATE,
        additional_medicare: (gross - ADDITIONAL_MEDICARE_THRESHOLD).max(0.0)
            * ADDITIONAL_MEDICARE_RATE,
    }
}

/// Itemised federal, state and payroll tax for one year of earned income.
pub fn compute_tax_breakdown(
    gross: f64,
    jurisdiction: Jurisdiction,
    pre_tax_401k: f64,
) -> TaxBreakdown {
    let federal_taxable = gross - pre_tax_401k - FEDERAL_STANDARD_DEDUCTION;
    let state_taxable = gross - pre_tax_401k - jurisdiction.standard_deduction();

    let federal = bracket_tax(federal_taxable, &FEDERAL_BRACKETS);
    let state = bracket_tax(state_taxable, jurisdiction.brackets());
    let fica = fica_tax(gross);

    let total = federal + state + fica.total();
    TaxBreakdown {
        federal,
        state,
        fica,
        total,
        after_tax_income: gross - total,
    }
}

/// After-tax income and effective rate for `gross`. Non-positive income
/// yields an all-zero result.
///
/// `_backdoor_roth` is part of the calculator's contract but does not change
/// the tax owed under the current model.
pub fn compute_tax(
    gross: f64,
    jurisdiction: Jurisdiction,
    pre_tax_401k: f64,
    _backdoor_roth: f64,
    employer_match: f64,
) -> TaxResult {
    if gross <= 0.0 {
        return TaxResult::ZERO;
    }

    let breakdown = compute_tax_breakdown(gross, jurisdiction, pre_tax_401k);
    TaxResult {
        after_tax_income: breakdown.after_tax_income,
        effective_tax_rate_percent: breakdown.total / gross * 100.0,
        total_available_income: breakdown.after_tax_income + gross * employer_match,
    }
}
