use super::error::SimulationError;
use super::types::{HoldingRecord, IncomeTaxBreakdown, TaxBracket};

const PERSONAL_ALLOWANCE: f64 = 12_570.0;
const ALLOWANCE_TAPER_START: f64 = 100_000.0;
const BASIC_RATE_LIMIT: f64 = 50_270.0;
const HIGHER_RATE_LIMIT: f64 = 125_140.0;
const BASIC_RATE: f64 = 0.20;
const HIGHER_RATE: f64 = 0.40;
const ADDITIONAL_RATE: f64 = 0.45;

const NI_PRIMARY_THRESHOLD: f64 = 12_570.0;
const NI_UPPER_EARNINGS_LIMIT: f64 = 50_270.0;
const NI_MAIN_RATE: f64 = 0.08;
const NI_UPPER_RATE: f64 = 0.02;

pub const CGT_ALLOWANCE: f64 = 3_000.0;
const CGT_HIGHER_RETAINED: f64 = 0.76;
const CGT_OTHER_RETAINED: f64 = 0.82;

pub const DIVIDEND_ALLOWANCE: f64 = 500.0;
const DIVIDEND_HIGHER_RETAINED: f64 = 0.6625;
const DIVIDEND_BASIC_RETAINED: f64 = 0.9125;

/// Rounds to two decimal places, halves to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

pub fn tapered_personal_allowance(gross_income: f64) -> f64 {
    if gross_income > ALLOWANCE_TAPER_START {
        (PERSONAL_ALLOWANCE - (gross_income - ALLOWANCE_TAPER_START) / 2.0).max(0.0)
    } else {
        PERSONAL_ALLOWANCE
    }
}

/// Income tax and National Insurance on one year's gross income.
///
/// Bands are applied top-down against a shrinking cursor, so each band only sees the slice of
/// income that falls inside it. NI ignores the allowance taper.
pub fn income_tax(gross_income: f64) -> IncomeTaxBreakdown {
    let allowance = tapered_personal_allowance(gross_income);

    let mut remaining = gross_income;
    let mut tax = 0.0;
    if remaining > HIGHER_RATE_LIMIT {
        tax += (remaining - HIGHER_RATE_LIMIT) * ADDITIONAL_RATE;
        remaining = HIGHER_RATE_LIMIT;
    }
    if remaining > BASIC_RATE_LIMIT {
        tax += (remaining - BASIC_RATE_LIMIT) * HIGHER_RATE;
        remaining = BASIC_RATE_LIMIT;
    }
    if remaining > allowance {
        tax += (remaining - allowance) * BASIC_RATE;
    }

    let national_insurance = national_insurance(gross_income);

    IncomeTaxBreakdown {
        gross_income,
        tax: round2(tax),
        national_insurance: round2(national_insurance),
        net_pay: round2(gross_income - tax - national_insurance),
    }
}

fn national_insurance(gross_income: f64) -> f64 {
    if gross_income > NI_UPPER_EARNINGS_LIMIT {
        (NI_UPPER_EARNINGS_LIMIT - NI_PRIMARY_THRESHOLD) * NI_MAIN_RATE
            + (gross_income - NI_UPPER_EARNINGS_LIMIT) * NI_UPPER_RATE
    } else if gross_income > NI_PRIMARY_THRESHOLD {
        (gross_income - NI_PRIMARY_THRESHOLD) * NI_MAIN_RATE
    } else {
        0.0
    }
}

/// Capital gains tracked across the years of one run.
///
/// Once the running total reaches the allowance the excess is taxed and the running total
/// drops back to the allowance itself, not to zero.
#[derive(Debug, Clone)]
pub struct CapitalGainsTax {
    running_gains: f64,
    allowance: f64,
    bracket: TaxBracket,
}

impl CapitalGainsTax {
    pub fn new(bracket: TaxBracket) -> Self {
        Self {
            running_gains: 0.0,
            allowance: CGT_ALLOWANCE,
            bracket,
        }
    }

    pub fn running_gains(&self) -> f64 {
        self.running_gains
    }

    pub fn apply_gain(&mut self, gain: f64) -> f64 {
        self.running_gains += gain;
        if self.running_gains < self.allowance {
            return gain;
        }

        let taxable = self.running_gains - self.allowance;
        self.running_gains = self.allowance;
        let retained = match self.bracket {
            TaxBracket::Higher => CGT_HIGHER_RETAINED,
            TaxBracket::Basic | TaxBracket::Additional => CGT_OTHER_RETAINED,
        };
        taxable * retained + self.allowance
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DividendAllocation {
    pub total_paid_out: f64,
    pub allowance_remaining: f64,
}

fn dividend_retained_share(bracket: TaxBracket) -> Result<f64, SimulationError> {
    match bracket {
        TaxBracket::Higher => Ok(DIVIDEND_HIGHER_RETAINED),
        TaxBracket::Basic => Ok(DIVIDEND_BASIC_RETAINED),
        TaxBracket::Additional => Err(SimulationError::UnhandledTaxBracket(bracket)),
    }
}

/// Pays or reinvests one year of dividends across `lots`, in order.
///
/// The 500 allowance is shared by the whole pass and shrinks by each lot's gross dividend.
/// New lot values are committed only once every lot has been processed.
pub fn allocate_dividends<'a, I>(
    lots: I,
    bracket: TaxBracket,
) -> Result<DividendAllocation, SimulationError>
where
    I: IntoIterator<Item = &'a mut HoldingRecord>,
{
    let retained = dividend_retained_share(bracket)?;
    let lots: Vec<&mut HoldingRecord> = lots.into_iter().collect();

    let mut allowance = DIVIDEND_ALLOWANCE;
    let mut total_paid_out = 0.0;
    let mut updated = Vec::with_capacity(lots.len());

    for lot in &lots {
        let gross_dividend = lot.value * lot.yield_rate.ratio();
        let after_tax = (gross_dividend - allowance) * retained;

        if lot.accumulating {
            updated.push(lot.value + after_tax + allowance);
        } else {
            updated.push(lot.value);
            total_paid_out += after_tax + allowance;
        }

        allowance = (allowance - gross_dividend).max(0.0);
    }

    for (lot, new_value) in lots.into_iter().zip(updated) {
        lot.value = new_value;
    }

    Ok(DividendAllocation {
        total_paid_out,
        allowance_remaining: allowance,
    })
}
