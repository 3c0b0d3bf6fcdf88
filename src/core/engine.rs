use tracing::{debug, info, warn};

use super::error::SimulationError;
use super::growth::{apply_premium_bond_growth, apply_yield_growth};
use super::tax::{CapitalGainsTax, allocate_dividends, income_tax};
use super::types::{
    DividendIncomeTreatment, Holding, IncomeType, NetWorthSeries, PREMIUM_BONDS_KEY, Portfolio,
    SalarySchedule, SimulationInputs, SimulationResult, SimulationWarning, YearResult,
};
use super::withdrawal::withdraw;

/// Longest projection a single run accepts.
pub const MAX_HORIZON_YEARS: u32 = 200;

#[derive(Debug, Clone, Copy)]
struct FixedIncome {
    rental_income: f64,
    property_value: f64,
    other_asset_value: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct GrowthOutcome {
    non_taxable_gains: f64,
    premium_bond_overflow: f64,
    taxable_growth: f64,
}

/// Runs one full projection over `inputs.horizon_years`.
///
/// The seed portfolio in `inputs` is copied; the run owns and mutates its copy only.
pub fn run_simulation(inputs: &SimulationInputs) -> Result<SimulationResult, SimulationError> {
    validate_inputs(inputs)?;

    let fixed = fixed_income(inputs);
    let mut portfolio = inputs.portfolio.clone();
    let mut cgt = CapitalGainsTax::new(inputs.tax_bracket);

    let seed_net_worth = fixed.property_value + fixed.other_asset_value + portfolio.total_value();
    let mut net_worth: NetWorthSeries = Vec::with_capacity(inputs.horizon_years as usize);
    net_worth.push(seed_net_worth);

    let mut years = Vec::with_capacity(inputs.horizon_years.saturating_sub(1) as usize);
    let mut warnings = Vec::new();

    info!(
        horizon_years = inputs.horizon_years,
        seed_net_worth, "starting net worth projection"
    );

    for year in 1..inputs.horizon_years {
        let result = simulate_year(inputs, year, &fixed, &mut portfolio, &mut cgt)?;

        if result.withdrawal_shortfall > 0.0 {
            warn!(
                year,
                shortfall = result.withdrawal_shortfall,
                "portfolio could not cover the yearly withdrawal"
            );
            warnings.push(SimulationWarning::UnmetWithdrawal {
                year,
                shortfall: result.withdrawal_shortfall,
            });
        }

        debug!(
            year,
            net_worth = result.net_worth,
            portfolio_value = result.portfolio_value,
            "simulated year"
        );
        net_worth.push(result.net_worth);
        years.push(result);
    }

    info!(
        final_net_worth = net_worth.last().copied().unwrap_or(seed_net_worth),
        warnings = warnings.len(),
        "finished net worth projection"
    );

    Ok(SimulationResult {
        net_worth,
        years,
        warnings,
    })
}

/// Runs each salary schedule against its own copy of the same seed.
pub fn compare_scenarios(
    base: &SimulationInputs,
    salaries: &[SalarySchedule],
) -> Result<Vec<SimulationResult>, SimulationError> {
    salaries
        .iter()
        .map(|salary| {
            let mut inputs = base.clone();
            inputs.salary = salary.clone();
            run_simulation(&inputs)
        })
        .collect()
}

/// Discounts a nominal series: entry `k` is scaled by `(1 - rate)^(k + 1)`.
pub fn discount_for_inflation(series: &[f64], rate: f64) -> NetWorthSeries {
    series
        .iter()
        .enumerate()
        .map(|(idx, value)| value * (1.0 - rate).powi(idx as i32 + 1))
        .collect()
}

fn simulate_year(
    inputs: &SimulationInputs,
    year: u32,
    fixed: &FixedIncome,
    portfolio: &mut Portfolio,
    cgt: &mut CapitalGainsTax,
) -> Result<YearResult, SimulationError> {
    let salary = inputs.salary.salary_for_year(year, inputs.horizon_years)
        + fixed.rental_income
        + inputs.state_pension;

    let dividend_lots = portfolio
        .holdings
        .values_mut()
        .filter_map(|holding| match holding {
            Holding::Lots(lots) => Some(lots.iter_mut()),
            Holding::Single(_) => None,
        })
        .flatten();
    let dividends = allocate_dividends(dividend_lots, inputs.tax_bracket)?;

    // Rental income is already inside `salary`; the taxed base adds it once more.
    let tax = income_tax(salary + fixed.rental_income + dividends.total_paid_out);
    let net_income = match inputs.dividend_income {
        DividendIncomeTreatment::DoubleCounted => tax.net_pay + dividends.total_paid_out,
        DividendIncomeTreatment::SingleCounted => tax.net_pay,
    };

    let withdrawal = withdraw(
        portfolio,
        inputs.money_needed_per_year,
        &inputs.withdrawal_order,
    );

    let growth = apply_growth(portfolio, inputs.premium_bond_ceiling);
    let taxable_growth_after_cgt = if growth.taxable_growth > 0.0 {
        cgt.apply_gain(growth.taxable_growth)
    } else {
        0.0
    };

    let cost_due = inputs.periodic_cost_interval > 0 && year % inputs.periodic_cost_interval == 0;
    let periodic_cost = if cost_due { inputs.periodic_cost } else { 0.0 };

    let portfolio_value = portfolio.total_value();
    let net_worth = growth.non_taxable_gains - periodic_cost
        + portfolio_value
        + fixed.other_asset_value
        + salary
        + fixed.property_value;

    Ok(YearResult {
        year,
        salary,
        dividends_paid_out: dividends.total_paid_out,
        income_tax: tax,
        net_income,
        withdrawn: withdrawal.withdrawn,
        withdrawal_shortfall: withdrawal.shortfall,
        premium_bond_overflow: growth.premium_bond_overflow,
        taxable_growth: growth.taxable_growth,
        taxable_growth_after_cgt,
        capital_gains_running_total: cgt.running_gains(),
        periodic_cost,
        portfolio_value,
        net_worth,
    })
}

fn apply_growth(portfolio: &mut Portfolio, premium_bond_ceiling: f64) -> GrowthOutcome {
    let mut outcome = GrowthOutcome::default();

    for (key, holding) in portfolio.holdings.iter_mut() {
        let Holding::Single(record) = holding else {
            continue;
        };

        if key == PREMIUM_BONDS_KEY {
            let overflow = apply_premium_bond_growth(record, premium_bond_ceiling, true);
            outcome.premium_bond_overflow += overflow;
            outcome.non_taxable_gains += overflow;
            continue;
        }

        let growth = apply_yield_growth(record);
        if !record.tax_free && record.income_type == IncomeType::CapitalGains {
            outcome.taxable_growth += growth;
        }
    }

    outcome
}

fn fixed_income(inputs: &SimulationInputs) -> FixedIncome {
    let owned = inputs.properties.values().filter(|property| property.owned);
    let (rental_income, property_value) =
        owned.fold((0.0, 0.0), |(rent, value), property| {
            (rent + property.rent, value + property.value)
        });

    FixedIncome {
        rental_income,
        property_value,
        other_asset_value: inputs.other_assets.values().map(|asset| asset.value).sum(),
    }
}

fn validate_inputs(inputs: &SimulationInputs) -> Result<(), SimulationError> {
    if inputs.horizon_years == 0 || inputs.horizon_years > MAX_HORIZON_YEARS {
        return Err(SimulationError::InvalidInput(format!(
            "horizon must cover between 1 and {MAX_HORIZON_YEARS} years"
        )));
    }

    for (name, value) in [
        ("money needed per year", inputs.money_needed_per_year),
        ("state pension", inputs.state_pension),
        ("periodic cost", inputs.periodic_cost),
        ("premium bond ceiling", inputs.premium_bond_ceiling),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(SimulationError::InvalidInput(format!(
                "{name} must be a finite amount >= 0"
            )));
        }
    }

    let salaries = match &inputs.salary {
        SalarySchedule::Fixed(amount) => std::slice::from_ref(amount),
        SalarySchedule::Yearly(amounts) => amounts.as_slice(),
    };
    if salaries.iter().any(|amount| !amount.is_finite() || *amount < 0.0) {
        return Err(SimulationError::InvalidInput(
            "salary must be a finite amount >= 0 for every year".to_string(),
        ));
    }

    for (key, property) in &inputs.properties {
        if !property.rent.is_finite() || !property.value.is_finite() {
            return Err(SimulationError::InvalidInput(format!(
                "property {key} must have finite rent and value"
            )));
        }
    }
    for (key, asset) in &inputs.other_assets {
        if !asset.value.is_finite() {
            return Err(SimulationError::InvalidInput(format!(
                "other asset {key} must have a finite value"
            )));
        }
    }

    validate_portfolio(&inputs.portfolio)
}

pub fn validate_portfolio(portfolio: &Portfolio) -> Result<(), SimulationError> {
    for (key, holding) in &portfolio.holdings {
        for record in holding.records() {
            let reason = if !record.value.is_finite() || record.value < 0.0 {
                Some(format!("value {} must be a finite amount >= 0", record.value))
            } else if !record.yield_rate.ratio().is_finite() || record.yield_rate.ratio() < 0.0 {
                Some(format!(
                    "yield {} must be a finite ratio >= 0",
                    record.yield_rate.ratio()
                ))
            } else {
                None
            };

            if let Some(reason) = reason {
                return Err(SimulationError::InvalidHolding {
                    key: key.clone(),
                    reason,
                });
            }
        }
    }
    Ok(())
}
