use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const PREMIUM_BONDS_KEY: &str = "premium_bonds";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeType {
    CapitalGains,
    Income,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxBracket {
    Basic,
    Higher,
    Additional,
}

/// How dividend income enters the reported net income for a year.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DividendIncomeTreatment {
    /// Dividends are part of the taxed base and are added again afterwards.
    DoubleCounted,
    /// Dividends only enter through the taxed base.
    SingleCounted,
}

/// Annual yield as a ratio (0.035 for 3.5%).
///
/// Deserializes from either a percent string (`"3.5%"`) or a bare number taken as a ratio.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawYield", into = "f64")]
pub struct YieldRate(f64);

impl YieldRate {
    pub fn from_ratio(ratio: f64) -> Self {
        Self(ratio)
    }

    pub fn ratio(self) -> f64 {
        self.0
    }

    pub fn parse_percent(text: &str) -> Result<Self, String> {
        let trimmed = text.trim();
        let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
        let percent = number
            .parse::<f64>()
            .map_err(|e| format!("invalid yield {text:?}: {e}"))?;
        Ok(Self(percent / 100.0))
    }
}

impl From<YieldRate> for f64 {
    fn from(value: YieldRate) -> Self {
        value.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawYield {
    Ratio(f64),
    Text(String),
}

impl TryFrom<RawYield> for YieldRate {
    type Error = String;

    fn try_from(value: RawYield) -> Result<Self, Self::Error> {
        match value {
            RawYield::Ratio(ratio) => Ok(Self(ratio)),
            RawYield::Text(text) => Self::parse_percent(&text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRecord {
    pub value: f64,
    #[serde(default)]
    pub tax_free: bool,
    #[serde(rename = "yield")]
    pub yield_rate: YieldRate,
    pub income_type: IncomeType,
    #[serde(default)]
    pub accumulating: bool,
}

impl HoldingRecord {
    pub fn new(value: f64, tax_free: bool, yield_rate: f64, income_type: IncomeType) -> Self {
        Self {
            value,
            tax_free,
            yield_rate: YieldRate::from_ratio(yield_rate),
            income_type,
            accumulating: false,
        }
    }

    pub fn dividend_lot(value: f64, yield_rate: f64, accumulating: bool) -> Self {
        Self {
            value,
            tax_free: false,
            yield_rate: YieldRate::from_ratio(yield_rate),
            income_type: IncomeType::Income,
            accumulating,
        }
    }
}

/// One portfolio entry: a single account or an ordered list of lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Holding {
    Single(HoldingRecord),
    Lots(Vec<HoldingRecord>),
}

impl Holding {
    pub fn total_value(&self) -> f64 {
        match self {
            Holding::Single(record) => record.value,
            Holding::Lots(lots) => lots.iter().map(|lot| lot.value).sum(),
        }
    }

    pub fn records(&self) -> &[HoldingRecord] {
        match self {
            Holding::Single(record) => std::slice::from_ref(record),
            Holding::Lots(lots) => lots,
        }
    }

    pub fn records_mut(&mut self) -> &mut [HoldingRecord] {
        match self {
            Holding::Single(record) => std::slice::from_mut(record),
            Holding::Lots(lots) => lots,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Portfolio {
    pub holdings: BTreeMap<String, Holding>,
}

impl Portfolio {
    pub fn insert(&mut self, key: impl Into<String>, holding: Holding) {
        self.holdings.insert(key.into(), holding);
    }

    pub fn total_value(&self) -> f64 {
        self.holdings.values().map(Holding::total_value).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub owned: bool,
    #[serde(default)]
    pub rent: f64,
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherAssetRecord {
    #[serde(default = "default_owned")]
    pub owned: bool,
    pub value: f64,
}

fn default_owned() -> bool {
    true
}

/// Yearly salary: a fixed amount for every year of the horizon or an explicit list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SalarySchedule {
    Fixed(f64),
    Yearly(Vec<f64>),
}

impl SalarySchedule {
    /// Salary for simulated year `year`; zero once the schedule has run out.
    pub fn salary_for_year(&self, year: u32, horizon_years: u32) -> f64 {
        match self {
            SalarySchedule::Fixed(amount) if year < horizon_years => *amount,
            SalarySchedule::Fixed(_) => 0.0,
            SalarySchedule::Yearly(amounts) => amounts.get(year as usize).copied().unwrap_or(0.0),
        }
    }
}

impl Default for SalarySchedule {
    fn default() -> Self {
        SalarySchedule::Yearly(Vec::new())
    }
}

#[derive(Debug, Clone)]
pub struct SimulationInputs {
    pub salary: SalarySchedule,
    pub properties: BTreeMap<String, PropertyRecord>,
    pub portfolio: Portfolio,
    pub money_needed_per_year: f64,
    pub other_assets: BTreeMap<String, OtherAssetRecord>,
    pub withdrawal_order: Vec<String>,
    pub tax_bracket: TaxBracket,
    pub horizon_years: u32,
    pub state_pension: f64,
    pub periodic_cost: f64,
    pub periodic_cost_interval: u32,
    pub premium_bond_ceiling: f64,
    pub dividend_income: DividendIncomeTreatment,
}

pub type NetWorthSeries = Vec<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeTaxBreakdown {
    pub gross_income: f64,
    pub tax: f64,
    pub national_insurance: f64,
    pub net_pay: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearResult {
    pub year: u32,
    pub salary: f64,
    pub dividends_paid_out: f64,
    pub income_tax: IncomeTaxBreakdown,
    pub net_income: f64,
    pub withdrawn: f64,
    pub withdrawal_shortfall: f64,
    pub premium_bond_overflow: f64,
    pub taxable_growth: f64,
    pub taxable_growth_after_cgt: f64,
    pub capital_gains_running_total: f64,
    pub periodic_cost: f64,
    pub portfolio_value: f64,
    pub net_worth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SimulationWarning {
    #[serde(rename_all = "camelCase")]
    UnmetWithdrawal { year: u32, shortfall: f64 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub net_worth: NetWorthSeries,
    pub years: Vec<YearResult>,
    pub warnings: Vec<SimulationWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn yield_parses_percent_strings_and_ratios() {
        assert_approx(YieldRate::parse_percent("3.5%").expect("percent").ratio(), 0.035);
        assert_approx(YieldRate::parse_percent(" 0.01 % ").expect("spaces").ratio(), 0.0001);
        assert!(YieldRate::parse_percent("three").is_err());

        let text: YieldRate = serde_json::from_str("\"5%\"").expect("string yield");
        assert_approx(text.ratio(), 0.05);
        let ratio: YieldRate = serde_json::from_str("0.075").expect("numeric yield");
        assert_approx(ratio.ratio(), 0.075);
    }

    #[test]
    fn portfolio_resolves_single_and_lot_holdings() {
        let json = r#"{
          "cash_isa": {"value": 67000, "taxFree": true, "yield": "3.5%", "incomeType": "capital_gains"},
          "dividend_stocks": [
            {"value": 80000, "yield": "5%", "incomeType": "income", "accumulating": false},
            {"value": 80000, "yield": "5%", "incomeType": "income", "accumulating": true}
          ]
        }"#;
        let portfolio: Portfolio = serde_json::from_str(json).expect("portfolio should parse");

        assert!(matches!(portfolio.holdings.get("cash_isa"), Some(Holding::Single(_))));
        match portfolio.holdings.get("dividend_stocks") {
            Some(Holding::Lots(lots)) => {
                assert_eq!(lots.len(), 2);
                assert!(!lots[0].accumulating);
                assert!(lots[1].accumulating);
            }
            other => panic!("expected lots, got {other:?}"),
        }
        assert_approx(portfolio.total_value(), 227_000.0);
    }

    #[test]
    fn salary_schedule_pays_nothing_past_its_end() {
        let yearly = SalarySchedule::Yearly(vec![10.0, 20.0]);
        assert_approx(yearly.salary_for_year(1, 20), 20.0);
        assert_approx(yearly.salary_for_year(2, 20), 0.0);

        let fixed = SalarySchedule::Fixed(50.0);
        assert_approx(fixed.salary_for_year(19, 20), 50.0);
        assert_approx(fixed.salary_for_year(20, 20), 0.0);

        let parsed: SalarySchedule = serde_json::from_str("[1, 2, 3]").expect("list salary");
        assert_eq!(parsed, SalarySchedule::Yearly(vec![1.0, 2.0, 3.0]));
        let parsed: SalarySchedule = serde_json::from_str("42000").expect("fixed salary");
        assert_eq!(parsed, SalarySchedule::Fixed(42_000.0));
    }
}
