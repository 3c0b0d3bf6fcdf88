mod engine;
mod error;
mod growth;
mod tax;
mod types;
mod withdrawal;

pub use engine::{
    MAX_HORIZON_YEARS, compare_scenarios, discount_for_inflation, run_simulation,
    validate_portfolio,
};
pub use error::SimulationError;
pub use growth::{PREMIUM_BOND_CEILING, apply_premium_bond_growth, apply_yield_growth};
pub use tax::{
    CGT_ALLOWANCE, CapitalGainsTax, DIVIDEND_ALLOWANCE, DividendAllocation, allocate_dividends,
    income_tax, round2,
};
pub use types::{
    DividendIncomeTreatment, Holding, HoldingRecord, IncomeTaxBreakdown, IncomeType,
    NetWorthSeries, OtherAssetRecord, PREMIUM_BONDS_KEY, Portfolio, PropertyRecord,
    SalarySchedule, SimulationInputs, SimulationResult, SimulationWarning, TaxBracket, YearResult,
    YieldRate,
};
pub use withdrawal::{WithdrawalOutcome, withdraw};
