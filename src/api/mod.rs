use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    DividendIncomeTreatment, Holding, HoldingRecord, IncomeType, MAX_HORIZON_YEARS,
    OtherAssetRecord, PREMIUM_BONDS_KEY, Portfolio, PropertyRecord, SalarySchedule,
    SimulationError, SimulationInputs, SimulationResult, SimulationWarning, TaxBracket,
    YearResult, compare_scenarios, discount_for_inflation, run_simulation,
};

const DEFAULT_WITHDRAWAL_ORDER: &str =
    "current_account,cash_isa,savings,dividend_stocks,premium_bonds,pension";

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliTaxBracket {
    Basic,
    Higher,
    Additional,
}

impl From<CliTaxBracket> for TaxBracket {
    fn from(value: CliTaxBracket) -> Self {
        match value {
            CliTaxBracket::Basic => TaxBracket::Basic,
            CliTaxBracket::Higher => TaxBracket::Higher,
            CliTaxBracket::Additional => TaxBracket::Additional,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliDividendIncome {
    DoubleCounted,
    SingleCounted,
}

impl From<CliDividendIncome> for DividendIncomeTreatment {
    fn from(value: CliDividendIncome) -> Self {
        match value {
            CliDividendIncome::DoubleCounted => DividendIncomeTreatment::DoubleCounted,
            CliDividendIncome::SingleCounted => DividendIncomeTreatment::SingleCounted,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiTaxBracket {
    #[serde(alias = "basic-rate", alias = "basic_rate")]
    Basic,
    #[serde(alias = "higher-rate", alias = "higher_rate")]
    Higher,
    #[serde(alias = "additional-rate", alias = "additional_rate")]
    Additional,
}

impl From<ApiTaxBracket> for CliTaxBracket {
    fn from(value: ApiTaxBracket) -> Self {
        match value {
            ApiTaxBracket::Basic => CliTaxBracket::Basic,
            ApiTaxBracket::Higher => CliTaxBracket::Higher,
            ApiTaxBracket::Additional => CliTaxBracket::Additional,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiDividendIncome {
    #[serde(alias = "doubleCounted", alias = "double_counted")]
    DoubleCounted,
    #[serde(alias = "singleCounted", alias = "single_counted")]
    SingleCounted,
}

impl From<ApiDividendIncome> for CliDividendIncome {
    fn from(value: ApiDividendIncome) -> Self {
        match value {
            ApiDividendIncome::DoubleCounted => CliDividendIncome::DoubleCounted,
            ApiDividendIncome::SingleCounted => CliDividendIncome::SingleCounted,
        }
    }
}

/// Starting portfolio, properties and other assets for a run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedFile {
    portfolio: Portfolio,
    #[serde(default)]
    properties: BTreeMap<String, PropertyRecord>,
    #[serde(default)]
    other_assets: BTreeMap<String, OtherAssetRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    salary: Option<SalarySchedule>,
    money_needed: Option<f64>,
    horizon_years: Option<u32>,
    state_pension: Option<f64>,
    periodic_cost: Option<f64>,
    periodic_cost_interval: Option<u32>,
    tax_bracket: Option<ApiTaxBracket>,
    withdrawal_order: Option<Vec<String>>,
    inflation_rate: Option<f64>,
    premium_bond_ceiling: Option<f64>,
    dividend_income: Option<ApiDividendIncome>,

    portfolio: Option<Portfolio>,
    properties: Option<BTreeMap<String, PropertyRecord>>,
    other_assets: Option<BTreeMap<String, OtherAssetRecord>>,
}

/// Query-string form of [`SimulatePayload`]: scalar overrides only, salary is a fixed amount.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulateQuery {
    salary: Option<f64>,
    money_needed: Option<f64>,
    horizon_years: Option<u32>,
    state_pension: Option<f64>,
    periodic_cost: Option<f64>,
    periodic_cost_interval: Option<u32>,
    tax_bracket: Option<ApiTaxBracket>,
    inflation_rate: Option<f64>,
    premium_bond_ceiling: Option<f64>,
    dividend_income: Option<ApiDividendIncome>,
}

impl From<SimulateQuery> for SimulatePayload {
    fn from(query: SimulateQuery) -> Self {
        SimulatePayload {
            salary: query.salary.map(SalarySchedule::Fixed),
            money_needed: query.money_needed,
            horizon_years: query.horizon_years,
            state_pension: query.state_pension,
            periodic_cost: query.periodic_cost,
            periodic_cost_interval: query.periodic_cost_interval,
            tax_bracket: query.tax_bracket,
            inflation_rate: query.inflation_rate,
            premium_bond_ceiling: query.premium_bond_ceiling,
            dividend_income: query.dividend_income,
            ..SimulatePayload::default()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComparePayload {
    #[serde(flatten)]
    base: SimulatePayload,
    scenarios: Vec<SalarySchedule>,
}

#[derive(Parser, Debug)]
#[command(
    name = "networth",
    about = "Deterministic net worth projection (cash, ISA, premium bonds, dividend lots, pension)"
)]
struct Cli {
    #[arg(
        long,
        value_delimiter = ',',
        help = "Yearly salaries, comma separated; entry N is paid in simulated year N"
    )]
    salary: Vec<f64>,
    #[arg(
        long,
        conflicts_with = "salary",
        help = "Fixed salary paid in every simulated year"
    )]
    fixed_salary: Option<f64>,
    #[arg(long, default_value_t = 45000.0, help = "Cash withdrawn from the portfolio each year")]
    money_needed: f64,
    #[arg(long, default_value_t = 20, help = "Number of net worth entries, seed year included (1 to 200)")]
    horizon_years: u32,
    #[arg(long, default_value_t = 12500.0, help = "Annual state pension")]
    state_pension: f64,
    #[arg(long, default_value_t = 8000.0, help = "Cost deducted every --periodic-cost-interval years")]
    periodic_cost: f64,
    #[arg(long, default_value_t = 5, help = "Years between periodic costs; 0 disables them")]
    periodic_cost_interval: u32,
    #[arg(long, value_enum, default_value_t = CliTaxBracket::Higher)]
    tax_bracket: CliTaxBracket,
    #[arg(
        long,
        value_delimiter = ',',
        default_value = DEFAULT_WITHDRAWAL_ORDER,
        help = "Asset keys to withdraw from, highest priority first"
    )]
    withdrawal_order: Vec<String>,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "Inflation in percent used to discount the reported series"
    )]
    inflation_rate: f64,
    #[arg(long, default_value_t = 50000.0, help = "Maximum premium bond holding")]
    premium_bond_ceiling: f64,
    #[arg(
        long,
        value_enum,
        default_value_t = CliDividendIncome::DoubleCounted,
        help = "Whether dividends are added again on top of net pay in the yearly trace"
    )]
    dividend_income: CliDividendIncome,
    #[arg(
        long,
        help = "JSON file with portfolio, properties and otherAssets; defaults to the demo seed"
    )]
    portfolio_file: Option<PathBuf>,
    #[arg(long, help = "Print the full result as JSON")]
    json: bool,
}

#[derive(Debug)]
struct ApiRequest {
    inputs: SimulationInputs,
    inflation_rate: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    tax_bracket: TaxBracket,
    horizon_years: u32,
    inflation_rate: f64,
    net_worth: Vec<f64>,
    real_net_worth: Vec<f64>,
    years: Vec<YearResult>,
    warnings: Vec<SimulationWarning>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioResponse {
    salary: SalarySchedule,
    net_worth: Vec<f64>,
    real_net_worth: Vec<f64>,
    warnings: Vec<SimulationWarning>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    inflation_rate: f64,
    scenarios: Vec<ScenarioResponse>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: Cli, seed: SeedFile) -> Result<ApiRequest, String> {
    if cli.horizon_years == 0 || cli.horizon_years > MAX_HORIZON_YEARS {
        return Err(format!(
            "--horizon-years must be between 1 and {MAX_HORIZON_YEARS}"
        ));
    }

    for (name, value) in [
        ("--money-needed", cli.money_needed),
        ("--state-pension", cli.state_pension),
        ("--periodic-cost", cli.periodic_cost),
        ("--premium-bond-ceiling", cli.premium_bond_ceiling),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    if !(0.0..100.0).contains(&cli.inflation_rate) {
        return Err("--inflation-rate must be between 0 and 100".to_string());
    }

    if cli.salary.iter().any(|s| !s.is_finite() || *s < 0.0) {
        return Err("--salary entries must be >= 0".to_string());
    }

    let salary = match cli.fixed_salary {
        Some(_) if !cli.salary.is_empty() => {
            return Err("--fixed-salary cannot be combined with --salary".to_string());
        }
        Some(amount) if !amount.is_finite() || amount < 0.0 => {
            return Err("--fixed-salary must be >= 0".to_string());
        }
        Some(amount) => SalarySchedule::Fixed(amount),
        None => SalarySchedule::Yearly(cli.salary),
    };

    let withdrawal_order: Vec<String> = cli
        .withdrawal_order
        .into_iter()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect();
    if withdrawal_order.is_empty() && cli.money_needed > 0.0 {
        return Err("--withdrawal-order must name at least one asset".to_string());
    }

    for property in seed.properties.values() {
        if property.rent < 0.0 || property.value < 0.0 {
            return Err("property rent and value must be >= 0".to_string());
        }
    }

    let inputs = SimulationInputs {
        salary,
        properties: seed.properties,
        portfolio: seed.portfolio,
        money_needed_per_year: cli.money_needed,
        other_assets: seed.other_assets,
        withdrawal_order,
        tax_bracket: cli.tax_bracket.into(),
        horizon_years: cli.horizon_years,
        state_pension: cli.state_pension,
        periodic_cost: cli.periodic_cost,
        periodic_cost_interval: cli.periodic_cost_interval,
        premium_bond_ceiling: cli.premium_bond_ceiling,
        dividend_income: cli.dividend_income.into(),
    };

    crate::core::validate_portfolio(&inputs.portfolio).map_err(|e| e.to_string())?;

    Ok(ApiRequest {
        inputs,
        inflation_rate: cli.inflation_rate / 100.0,
    })
}

fn load_seed(path: Option<&PathBuf>) -> Result<SeedFile, String> {
    let Some(path) = path else {
        return Ok(demo_seed());
    };
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read --portfolio-file {}: {e}", path.display()))?;
    serde_json::from_str(&text)
        .map_err(|e| format!("invalid --portfolio-file {}: {e}", path.display()))
}

/// Runs the command-line projection and prints the result.
pub fn run_cli<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let as_json = cli.json;
    let seed = load_seed(cli.portfolio_file.as_ref())?;
    let request = build_inputs(cli, seed)?;
    let result = run_simulation(&request.inputs).map_err(|e| e.to_string())?;
    let response = build_simulate_response(&request, result);

    if as_json {
        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| format!("cannot serialize result: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    println!("{:>4} {:>16} {:>16}", "Year", "Net worth", "Real net worth");
    for (year, (nominal, real)) in response
        .net_worth
        .iter()
        .zip(response.real_net_worth.iter())
        .enumerate()
    {
        println!("{year:>4} {nominal:>16.2} {real:>16.2}");
    }
    for warning in &response.warnings {
        match warning {
            SimulationWarning::UnmetWithdrawal { year, shortfall } => {
                println!("warning: year {year} withdrawal short by {shortfall:.2}");
            }
        }
    }
    Ok(())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/compare", post(compare_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "net worth HTTP API listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(query): Query<SimulateQuery>) -> Response {
    simulate_handler_impl(query.into()).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match run_simulation(&request.inputs) {
        Ok(result) => json_response(StatusCode::OK, build_simulate_response(&request, result)),
        Err(err) => simulation_error_response(&err),
    }
}

async fn compare_handler(Json(payload): Json<ComparePayload>) -> Response {
    if payload.scenarios.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "scenarios must not be empty");
    }

    let request = match api_request_from_payload(payload.base) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match compare_scenarios(&request.inputs, &payload.scenarios) {
        Ok(results) => json_response(
            StatusCode::OK,
            build_compare_response(&request, payload.scenarios, results),
        ),
        Err(err) => simulation_error_response(&err),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn simulation_error_response(err: &SimulationError) -> Response {
    let status = match err {
        SimulationError::InvalidHolding { .. } | SimulationError::InvalidInput(_) => {
            StatusCode::BAD_REQUEST
        }
        SimulationError::UnhandledTaxBracket(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    error_response(status, &err.to_string())
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();
    let mut seed = demo_seed();

    if let Some(v) = payload.salary {
        match v {
            SalarySchedule::Fixed(amount) => cli.fixed_salary = Some(amount),
            SalarySchedule::Yearly(amounts) => cli.salary = amounts,
        }
    }
    if let Some(v) = payload.money_needed {
        cli.money_needed = v;
    }
    if let Some(v) = payload.horizon_years {
        cli.horizon_years = v;
    }
    if let Some(v) = payload.state_pension {
        cli.state_pension = v;
    }
    if let Some(v) = payload.periodic_cost {
        cli.periodic_cost = v;
    }
    if let Some(v) = payload.periodic_cost_interval {
        cli.periodic_cost_interval = v;
    }
    if let Some(v) = payload.tax_bracket {
        cli.tax_bracket = v.into();
    }
    if let Some(v) = payload.withdrawal_order {
        cli.withdrawal_order = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.premium_bond_ceiling {
        cli.premium_bond_ceiling = v;
    }
    if let Some(v) = payload.dividend_income {
        cli.dividend_income = v.into();
    }

    if let Some(v) = payload.portfolio {
        seed.portfolio = v;
    }
    if let Some(v) = payload.properties {
        seed.properties = v;
    }
    if let Some(v) = payload.other_assets {
        seed.other_assets = v;
    }

    build_inputs(cli, seed)
}

fn default_cli_for_api() -> Cli {
    Cli {
        salary: Vec::new(),
        fixed_salary: None,
        money_needed: 45_000.0,
        horizon_years: 20,
        state_pension: 12_500.0,
        periodic_cost: 8_000.0,
        periodic_cost_interval: 5,
        tax_bracket: CliTaxBracket::Higher,
        withdrawal_order: DEFAULT_WITHDRAWAL_ORDER
            .split(',')
            .map(str::to_string)
            .collect(),
        inflation_rate: 4.0,
        premium_bond_ceiling: 50_000.0,
        dividend_income: CliDividendIncome::DoubleCounted,
        portfolio_file: None,
        json: false,
    }
}

fn demo_seed() -> SeedFile {
    let mut portfolio = Portfolio::default();
    portfolio.insert(
        "cash_isa",
        Holding::Single(HoldingRecord::new(67_000.0, true, 0.035, IncomeType::CapitalGains)),
    );
    portfolio.insert(
        "savings",
        Holding::Single(HoldingRecord::new(214_109.0, false, 0.035, IncomeType::CapitalGains)),
    );
    portfolio.insert(
        "current_account",
        Holding::Single(HoldingRecord::new(22_440.0, false, 0.0001, IncomeType::CapitalGains)),
    );
    portfolio.insert(
        "pension",
        Holding::Single(HoldingRecord::new(670_000.0, false, 0.075, IncomeType::Income)),
    );
    portfolio.insert(
        PREMIUM_BONDS_KEY,
        Holding::Single(HoldingRecord::new(50_000.0, true, 0.035, IncomeType::CapitalGains)),
    );
    portfolio.insert(
        "dividend_stocks",
        Holding::Lots(vec![
            HoldingRecord::dividend_lot(80_000.0, 0.05, false),
            HoldingRecord::dividend_lot(80_000.0, 0.05, true),
        ]),
    );

    let mut properties = BTreeMap::new();
    properties.insert(
        "property1".to_string(),
        PropertyRecord {
            owned: true,
            rent: 0.0,
            value: 0.0,
        },
    );
    properties.insert(
        "property2".to_string(),
        PropertyRecord {
            owned: true,
            rent: 9_600.0,
            value: 0.0,
        },
    );

    let mut other_assets = BTreeMap::new();
    other_assets.insert(
        "cars".to_string(),
        OtherAssetRecord {
            owned: true,
            value: 0.0,
        },
    );

    SeedFile {
        portfolio,
        properties,
        other_assets,
    }
}

fn build_simulate_response(request: &ApiRequest, result: SimulationResult) -> SimulateResponse {
    SimulateResponse {
        tax_bracket: request.inputs.tax_bracket,
        horizon_years: request.inputs.horizon_years,
        inflation_rate: request.inflation_rate,
        real_net_worth: discount_for_inflation(&result.net_worth, request.inflation_rate),
        net_worth: result.net_worth,
        years: result.years,
        warnings: result.warnings,
    }
}

fn build_compare_response(
    request: &ApiRequest,
    salaries: Vec<SalarySchedule>,
    results: Vec<SimulationResult>,
) -> CompareResponse {
    let scenarios = salaries
        .into_iter()
        .zip(results)
        .map(|(salary, result)| ScenarioResponse {
            salary,
            real_net_worth: discount_for_inflation(&result.net_worth, request.inflation_rate),
            net_worth: result.net_worth,
            warnings: result.warnings,
        })
        .collect();

    CompareResponse {
        inflation_rate: request.inflation_rate,
        scenarios,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn cli_defaults_match_api_defaults() {
        let cli = Cli::parse_from(["networth"]);
        let defaults = default_cli_for_api();

        assert!(cli.salary.is_empty());
        assert_approx(cli.money_needed, defaults.money_needed);
        assert_eq!(cli.horizon_years, defaults.horizon_years);
        assert_approx(cli.state_pension, defaults.state_pension);
        assert_approx(cli.periodic_cost, defaults.periodic_cost);
        assert_eq!(cli.periodic_cost_interval, defaults.periodic_cost_interval);
        assert_eq!(cli.tax_bracket, defaults.tax_bracket);
        assert_eq!(cli.withdrawal_order, defaults.withdrawal_order);
        assert_approx(cli.inflation_rate, defaults.inflation_rate);
        assert_eq!(cli.dividend_income, defaults.dividend_income);
    }

    #[test]
    fn cli_parses_salary_list_and_withdrawal_order() {
        let cli = Cli::parse_from([
            "networth",
            "--salary",
            "78000,111000,108000",
            "--withdrawal-order",
            "savings,pension",
            "--tax-bracket",
            "basic",
        ]);
        let request = build_inputs(cli, demo_seed()).expect("valid inputs");

        assert_eq!(
            request.inputs.salary,
            SalarySchedule::Yearly(vec![78_000.0, 111_000.0, 108_000.0])
        );
        assert_eq!(
            request.inputs.withdrawal_order,
            vec!["savings".to_string(), "pension".to_string()]
        );
        assert_eq!(request.inputs.tax_bracket, TaxBracket::Basic);
    }

    #[test]
    fn build_inputs_converts_inflation_percent() {
        let request = build_inputs(sample_cli(), demo_seed()).expect("valid inputs");
        assert_approx(request.inflation_rate, 0.04);
    }

    #[test]
    fn build_inputs_rejects_negative_money_needed() {
        let mut cli = sample_cli();
        cli.money_needed = -1.0;
        let err = build_inputs(cli, demo_seed()).expect_err("must reject negative spend");
        assert!(err.contains("--money-needed"));
    }

    #[test]
    fn build_inputs_rejects_zero_horizon() {
        let mut cli = sample_cli();
        cli.horizon_years = 0;
        let err = build_inputs(cli, demo_seed()).expect_err("must reject empty horizon");
        assert!(err.contains("--horizon-years"));
    }

    #[test]
    fn build_inputs_rejects_horizon_beyond_limit() {
        let err = api_request_from_json(r#"{"horizonYears": 4294967295}"#)
            .expect_err("must reject oversized horizon");
        assert!(err.contains("--horizon-years"));

        let mut cli = sample_cli();
        cli.horizon_years = MAX_HORIZON_YEARS;
        assert!(build_inputs(cli, demo_seed()).is_ok());
    }

    #[tokio::test]
    async fn oversized_horizon_is_a_bad_request() {
        let payload = SimulatePayload {
            horizon_years: Some(u32::MAX),
            ..SimulatePayload::default()
        };
        let response = simulate_handler_impl(payload).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let uri: axum::http::Uri = "/api/simulate?horizonYears=4294967295"
            .parse()
            .expect("valid uri");
        let Query(query) = Query::<SimulateQuery>::try_from_uri(&uri).expect("query parses");
        let response = simulate_handler_impl(query.into()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn query_string_sets_fixed_salary_and_scalars() {
        let uri: axum::http::Uri =
            "/api/simulate?salary=50000&horizonYears=10&moneyNeeded=1000&taxBracket=basic"
                .parse()
                .expect("valid uri");
        let Query(query) = Query::<SimulateQuery>::try_from_uri(&uri).expect("query parses");
        let request = api_request_from_payload(query.into()).expect("valid overrides");

        assert_eq!(request.inputs.salary, SalarySchedule::Fixed(50_000.0));
        assert_eq!(request.inputs.horizon_years, 10);
        assert_approx(request.inputs.money_needed_per_year, 1_000.0);
        assert_eq!(request.inputs.tax_bracket, TaxBracket::Basic);
    }

    #[test]
    fn build_inputs_rejects_both_salary_forms() {
        let mut cli = sample_cli();
        cli.salary = vec![10_000.0];
        cli.fixed_salary = Some(10_000.0);
        let err = build_inputs(cli, demo_seed()).expect_err("must reject two salary forms");
        assert!(err.contains("--fixed-salary"));
    }

    #[test]
    fn build_inputs_rejects_empty_withdrawal_order_when_spending() {
        let mut cli = sample_cli();
        cli.withdrawal_order = vec![" ".to_string()];
        let err = build_inputs(cli, demo_seed()).expect_err("must reject empty order");
        assert!(err.contains("--withdrawal-order"));
    }

    #[test]
    fn build_inputs_rejects_negative_holding() {
        let mut seed = demo_seed();
        seed.portfolio.insert(
            "savings",
            Holding::Single(HoldingRecord::new(-5.0, false, 0.0, IncomeType::CapitalGains)),
        );
        let err = build_inputs(sample_cli(), seed).expect_err("must reject negative holding");
        assert!(err.contains("savings"));
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "salary": [0, 109200, 155400],
          "moneyNeeded": 40000,
          "horizonYears": 10,
          "statePension": 11000,
          "periodicCost": 5000,
          "periodicCostInterval": 4,
          "taxBracket": "basic",
          "withdrawalOrder": ["savings", "cash_isa"],
          "inflationRate": 2.5,
          "premiumBondCeiling": 40000,
          "dividendIncome": "single-counted",
          "portfolio": {
            "savings": {"value": 1000, "yield": "3.5%", "incomeType": "capital_gains"},
            "cash_isa": {"value": 2000, "taxFree": true, "yield": 0.02, "incomeType": "capital_gains"}
          },
          "otherAssets": {"car": {"value": 7000}}
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let inputs = request.inputs;

        assert_eq!(
            inputs.salary,
            SalarySchedule::Yearly(vec![0.0, 109_200.0, 155_400.0])
        );
        assert_approx(inputs.money_needed_per_year, 40_000.0);
        assert_eq!(inputs.horizon_years, 10);
        assert_approx(inputs.state_pension, 11_000.0);
        assert_approx(inputs.periodic_cost, 5_000.0);
        assert_eq!(inputs.periodic_cost_interval, 4);
        assert_eq!(inputs.tax_bracket, TaxBracket::Basic);
        assert_eq!(inputs.withdrawal_order, vec!["savings", "cash_isa"]);
        assert_approx(request.inflation_rate, 0.025);
        assert_approx(inputs.premium_bond_ceiling, 40_000.0);
        assert_eq!(inputs.dividend_income, DividendIncomeTreatment::SingleCounted);
        assert_approx(inputs.portfolio.total_value(), 3_000.0);
        assert_approx(inputs.other_assets["car"].value, 7_000.0);
        assert!(inputs.other_assets["car"].owned);
        // Properties fall back to the demo seed.
        assert_eq!(inputs.properties.len(), 2);
    }

    #[test]
    fn api_request_from_json_accepts_fixed_salary() {
        let request = api_request_from_json(r#"{"salary": 50000}"#).expect("json should parse");
        assert_eq!(request.inputs.salary, SalarySchedule::Fixed(50_000.0));
    }

    #[test]
    fn api_request_from_json_rejects_bad_yield() {
        let err = api_request_from_json(
            r#"{"portfolio": {"savings": {"value": 1, "yield": "lots", "incomeType": "income"}}}"#,
        )
        .expect_err("yield must parse");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn compare_payload_flattens_base_fields() {
        let json = r#"{
          "moneyNeeded": 1000,
          "scenarios": [[0, 50000], 0]
        }"#;
        let payload = serde_json::from_str::<ComparePayload>(json).expect("json should parse");
        assert_eq!(payload.base.money_needed, Some(1_000.0));
        assert_eq!(
            payload.scenarios,
            vec![
                SalarySchedule::Yearly(vec![0.0, 50_000.0]),
                SalarySchedule::Fixed(0.0)
            ]
        );
    }

    #[test]
    fn demo_seed_projection_has_full_horizon_and_seed_value() {
        let request = build_inputs(sample_cli(), demo_seed()).expect("valid inputs");
        let result = run_simulation(&request.inputs).expect("demo seed should simulate");

        assert_eq!(result.net_worth.len(), 20);
        assert_approx(result.net_worth[0], 1_183_549.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let mut cli = sample_cli();
        cli.horizon_years = 3;
        let request = build_inputs(cli, demo_seed()).expect("valid inputs");
        let result = run_simulation(&request.inputs).expect("valid run");
        let response = build_simulate_response(&request, result);

        assert_eq!(response.real_net_worth.len(), 3);
        assert_approx(response.real_net_worth[0], response.net_worth[0] * 0.96);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"netWorth\""));
        assert!(json.contains("\"realNetWorth\""));
        assert!(json.contains("\"years\""));
        assert!(json.contains("\"dividendsPaidOut\""));
        assert!(json.contains("\"nationalInsurance\""));
        assert!(json.contains("\"premiumBondOverflow\""));
        assert!(json.contains("\"capitalGainsRunningTotal\""));
        assert!(json.contains("\"taxBracket\":\"higher\""));
    }

    #[test]
    fn compare_response_keeps_scenario_order() {
        let mut cli = sample_cli();
        cli.horizon_years = 4;
        let request = build_inputs(cli, demo_seed()).expect("valid inputs");
        let salaries = vec![SalarySchedule::Fixed(100_000.0), SalarySchedule::Fixed(0.0)];
        let results = compare_scenarios(&request.inputs, &salaries).expect("valid runs");
        let response = build_compare_response(&request, salaries, results);

        assert_eq!(response.scenarios.len(), 2);
        assert_eq!(response.scenarios[0].salary, SalarySchedule::Fixed(100_000.0));
        assert_approx(
            response.scenarios[0].net_worth[1] - response.scenarios[1].net_worth[1],
            100_000.0,
        );
    }
}
