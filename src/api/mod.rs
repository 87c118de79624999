use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::{
    InputError, Jurisdiction, ProjectionInput, ScheduleInterval, TaxBreakdown, TaxResult,
    compute_tax, compute_tax_breakdown, project,
};

#[derive(Debug, Parser)]
#[command(
    name = "fire_projection",
    about = "FIRE age projection with federal, FICA and state income tax"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one projection and print it as JSON
    Project(ProjectArgs),
    /// Serve the JSON API over HTTP
    Serve {
        #[arg(default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    #[arg(long, default_value_t = 23)]
    current_age: u32,
    #[arg(long, default_value_t = 50)]
    end_age: u32,
    #[arg(long, default_value_t = 70_000.0, allow_negative_numbers = true)]
    current_net_worth: f64,
    #[arg(
        long,
        default_value_t = 8.0,
        allow_negative_numbers = true,
        help = "Expected nominal annual return in percent, e.g. 8"
    )]
    annual_return: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        allow_negative_numbers = true,
        help = "Annual inflation in percent"
    )]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 100_000.0,
        help = "Annual spending in retirement, in today's dollars"
    )]
    retirement_spending: f64,
    #[arg(long, default_value_t = 4.0, help = "Safe withdrawal rate in percent")]
    withdrawal_rate: f64,
    #[arg(long = "state", default_value_t = Jurisdiction::Ca)]
    jurisdiction: Jurisdiction,
    #[arg(
        long,
        default_value_t = 23_000.0,
        help = "Annual pre-tax 401(k) contribution"
    )]
    pre_tax_401k: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Employer match as a percent of gross income"
    )]
    employer_match: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Backdoor Roth as a percent of gross income (no tax effect)"
    )]
    backdoor_roth: f64,
    #[arg(
        long = "income",
        value_name = "START:END:AMOUNT",
        default_values_t = default_income_schedule(),
        help = "Gross income over an inclusive age range; repeat to add overlapping ranges"
    )]
    income: Vec<ScheduleInterval>,
    #[arg(
        long = "spending",
        value_name = "START:END:AMOUNT",
        default_values_t = default_spending_schedule(),
        help = "Spending over an inclusive age range; repeat to add overlapping ranges"
    )]
    spending: Vec<ScheduleInterval>,
    #[arg(
        long,
        help = "Switch to zero income and retirement spending from the FIRE age"
    )]
    stop_at_fire: bool,
}

fn default_income_schedule() -> Vec<ScheduleInterval> {
    vec![
        ScheduleInterval::new(23, 25, 230_000.0),
        ScheduleInterval::new(26, 30, 300_000.0),
        ScheduleInterval::new(31, 40, 400_000.0),
    ]
}

fn default_spending_schedule() -> Vec<ScheduleInterval> {
    vec![ScheduleInterval::new(23, 50, 100_000.0)]
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("failed to serialize projection: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    current_age: Option<u32>,
    end_age: Option<u32>,
    current_net_worth: Option<f64>,
    annual_return: Option<f64>,
    inflation_rate: Option<f64>,
    retirement_spending: Option<f64>,
    withdrawal_rate: Option<f64>,
    state: Option<String>,
    pre_tax_401k: Option<f64>,
    employer_match: Option<f64>,
    backdoor_roth: Option<f64>,
    stop_at_fire: Option<bool>,
    yearly_income: Option<Vec<ScheduleInterval>>,
    yearly_spending: Option<Vec<ScheduleInterval>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TaxQuery {
    gross: Option<f64>,
    state: Option<String>,
    pre_tax_401k: Option<f64>,
    backdoor_roth: Option<f64>,
    employer_match: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaxQuoteResponse {
    state: Jurisdiction,
    gross: f64,
    breakdown: TaxBreakdown,
    #[serde(flatten)]
    result: TaxResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Converts percent-valued arguments into fractional rates and validates the
/// result.
fn build_inputs(args: ProjectArgs) -> Result<ProjectionInput, InputError> {
    let inputs = ProjectionInput {
        current_age: args.current_age,
        end_age: args.end_age,
        current_net_worth: args.current_net_worth,
        annual_return: args.annual_return / 100.0,
        inflation_rate: args.inflation_rate / 100.0,
        withdrawal_rate: args.withdrawal_rate / 100.0,
        employer_match: args.employer_match / 100.0,
        backdoor_roth: args.backdoor_roth / 100.0,
        retirement_spending: args.retirement_spending,
        pre_tax_401k: args.pre_tax_401k,
        jurisdiction: args.jurisdiction,
        income_schedule: args.income,
        spending_schedule: args.spending,
        stop_at_fire: args.stop_at_fire,
    };
    inputs.validate()?;
    Ok(inputs)
}

pub fn projection_json(args: ProjectArgs) -> Result<String, CliError> {
    let inputs = build_inputs(args)?;
    let output = project(&inputs);
    Ok(serde_json::to_string_pretty(&output)?)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "FIRE projection API listening");
    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route("/api/tax", get(tax_handler))
        .fallback(not_found_handler)
}

async fn health_handler() -> Response {
    with_cache_control("ok")
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

fn project_handler_impl(payload: ProjectPayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(err) => {
            warn!(%err, "rejected projection request");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    let output = project(&inputs);
    debug!(
        years = output.ages.len(),
        fire_age = ?output.fire_age,
        "projection complete"
    );
    json_response(StatusCode::OK, output)
}

async fn tax_handler(Query(query): Query<TaxQuery>) -> Response {
    match tax_quote(query) {
        Ok(quote) => json_response(StatusCode::OK, quote),
        Err(err) => {
            warn!(%err, "rejected tax request");
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
    }
}

fn tax_quote(query: TaxQuery) -> Result<TaxQuoteResponse, InputError> {
    let gross = query.gross.ok_or(InputError::Missing("gross"))?;
    let state = match query.state {
        Some(code) => code.parse()?,
        None => Jurisdiction::default(),
    };
    let pre_tax_401k = query.pre_tax_401k.unwrap_or(0.0);
    let backdoor_roth = query.backdoor_roth.unwrap_or(0.0) / 100.0;
    let employer_match = query.employer_match.unwrap_or(0.0) / 100.0;

    for (field, value) in [
        ("gross", gross),
        ("pre-tax-401k", pre_tax_401k),
        ("backdoor-roth", backdoor_roth),
        ("employer-match", employer_match),
    ] {
        if !value.is_finite() {
            return Err(InputError::NonFinite { field });
        }
    }

    Ok(TaxQuoteResponse {
        state,
        gross,
        breakdown: compute_tax_breakdown(gross.max(0.0), state, pre_tax_401k),
        result: compute_tax(gross, state, pre_tax_401k, backdoor_roth, employer_match),
    })
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn inputs_from_json(json: &str) -> Result<ProjectionInput, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload).map_err(|e| e.to_string())
}

/// Overlays the fields present in `payload` on the calculator defaults.
fn inputs_from_payload(payload: ProjectPayload) -> Result<ProjectionInput, InputError> {
    let mut args = default_args_for_api();

    if let Some(v) = payload.current_age {
        args.current_age = v;
    }
    if let Some(v) = payload.end_age {
        args.end_age = v;
    }
    if let Some(v) = payload.current_net_worth {
        args.current_net_worth = v;
    }
    if let Some(v) = payload.annual_return {
        args.annual_return = v;
    }
    if let Some(v) = payload.inflation_rate {
        args.inflation_rate = v;
    }
    if let Some(v) = payload.retirement_spending {
        args.retirement_spending = v;
    }
    if let Some(v) = payload.withdrawal_rate {
        args.withdrawal_rate = v;
    }
    if let Some(v) = payload.state {
        args.jurisdiction = v.parse()?;
    }
    if let Some(v) = payload.pre_tax_401k {
        args.pre_tax_401k = v;
    }
    if let Some(v) = payload.employer_match {
        args.employer_match = v;
    }
    if let Some(v) = payload.backdoor_roth {
        args.backdoor_roth = v;
    }
    if let Some(v) = payload.stop_at_fire {
        args.stop_at_fire = v;
    }
    if let Some(v) = payload.yearly_income {
        args.income = v;
    }
    if let Some(v) = payload.yearly_spending {
        args.spending = v;
    }

    build_inputs(args)
}

fn default_args_for_api() -> ProjectArgs {
    ProjectArgs {
        current_age: 23,
        end_age: 50,
        current_net_worth: 70_000.0,
        annual_return: 8.0,
        inflation_rate: 3.0,
        retirement_spending: 100_000.0,
        withdrawal_rate: 4.0,
        jurisdiction: Jurisdiction::Ca,
        pre_tax_401k: 23_000.0,
        employer_match: 5.0,
        backdoor_roth: 0.0,
        income: default_income_schedule(),
        spending: default_spending_schedule(),
        stop_at_fire: false,
    }
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

    fn sample_args() -> ProjectArgs {
        default_args_for_api()
    }

    fn parse_project_args(extra: &[&str]) -> ProjectArgs {
        let argv = ["fire_projection", "project"].into_iter().chain(extra.iter().copied());
        match Cli::try_parse_from(argv).expect("arguments should parse").command {
            Command::Project(args) => args,
            other => panic!("expected project command, got {other:?}"),
        }
    }

    #[test]
    fn build_inputs_converts_percentages_to_fractions() {
        let inputs = build_inputs(sample_args()).expect("valid inputs");
        assert_approx(inputs.annual_return, 0.08);
        assert_approx(inputs.inflation_rate, 0.03);
        assert_approx(inputs.withdrawal_rate, 0.04);
        assert_approx(inputs.employer_match, 0.05);
        assert_approx(inputs.backdoor_roth, 0.0);
        assert_approx(inputs.pre_tax_401k, 23_000.0);
        assert_eq!(inputs.jurisdiction, Jurisdiction::Ca);
        assert_eq!(inputs.income_schedule.len(), 3);
    }

    #[test]
    fn build_inputs_rejects_inverted_age_range() {
        let mut args = sample_args();
        args.end_age = 23;
        let err = build_inputs(args).expect_err("must reject end age <= current age");
        assert!(err.to_string().contains("--end-age"));
    }

    #[test]
    fn inputs_from_json_rejects_unbounded_horizon() {
        let err = inputs_from_json(r#"{"currentAge": 0, "endAge": 4000000000}"#)
            .expect_err("must reject an end age beyond the cap");
        assert!(err.contains("--end-age (4000000000) must be <= 150"));
    }

    #[test]
    fn build_inputs_rejects_negative_employer_match() {
        let mut args = sample_args();
        args.employer_match = -5.0;
        let err = build_inputs(args).expect_err("must reject negative match");
        assert_eq!(
            err,
            InputError::PercentRange {
                field: "employer-match"
            }
        );
        assert_eq!(err.to_string(), "--employer-match must be between 0 and 100");
    }

    #[test]
    fn build_inputs_rejects_zero_withdrawal_rate() {
        let mut args = sample_args();
        args.withdrawal_rate = 0.0;
        let err = build_inputs(args).expect_err("must reject zero withdrawal rate");
        assert_eq!(err, InputError::WithdrawalRate);
    }

    #[test]
    fn cli_defaults_match_api_defaults() {
        let parsed = build_inputs(parse_project_args(&[])).expect("valid inputs");
        let defaults = build_inputs(sample_args()).expect("valid inputs");
        assert_eq!(parsed, defaults);
    }

    #[test]
    fn cli_parses_repeated_intervals_and_state() {
        let args = parse_project_args(&[
            "--income",
            "30:40:100000",
            "--income",
            "35:45:20000",
            "--spending",
            "30:60:50000",
            "--state",
            "tx",
            "--current-age",
            "30",
            "--end-age",
            "60",
            "--current-net-worth=-5000",
            "--stop-at-fire",
        ]);
        let inputs = build_inputs(args).expect("valid inputs");

        assert_eq!(
            inputs.income_schedule,
            vec![
                ScheduleInterval::new(30, 40, 100_000.0),
                ScheduleInterval::new(35, 45, 20_000.0),
            ]
        );
        assert_eq!(
            inputs.spending_schedule,
            vec![ScheduleInterval::new(30, 60, 50_000.0)]
        );
        assert_eq!(inputs.jurisdiction, Jurisdiction::Tx);
        assert_approx(inputs.current_net_worth, -5_000.0);
        assert!(inputs.stop_at_fire);
    }

    #[test]
    fn cli_rejects_malformed_interval_and_unknown_state() {
        let bad_interval =
            Cli::try_parse_from(["fire_projection", "project", "--income", "30-40-1000"]);
        assert!(bad_interval.is_err());

        let bad_state = Cli::try_parse_from(["fire_projection", "project", "--state", "NY"]);
        assert!(bad_state.is_err());
    }

    #[test]
    fn cli_parses_serve_port() {
        let cli = Cli::try_parse_from(["fire_projection", "serve", "9000"]).expect("parses");
        assert!(matches!(cli.command, Command::Serve { port: 9000 }));

        let cli = Cli::try_parse_from(["fire_projection", "serve"]).expect("parses");
        assert!(matches!(cli.command, Command::Serve { port: 8080 }));
    }

    #[test]
    fn inputs_from_json_parses_web_keys() {
        let json = r#"{
          "currentAge": 30,
          "endAge": 65,
          "currentNetWorth": 150000,
          "annualReturn": 7,
          "inflationRate": 2.5,
          "retirementSpending": 60000,
          "withdrawalRate": 3.5,
          "state": "wa",
          "preTax401k": 20000,
          "employerMatch": 4,
          "backdoorRoth": 3,
          "stopAtFire": true,
          "yearlyIncome": [
            {"startAge": 30, "endAge": 45, "amount": 180000},
            {"startAge": 40, "endAge": 50, "amount": 25000}
          ],
          "yearlySpending": [
            {"startAge": 30, "endAge": 65, "amount": 70000}
          ]
        }"#;
        let inputs = inputs_from_json(json).expect("json should parse");

        assert_eq!(inputs.current_age, 30);
        assert_eq!(inputs.end_age, 65);
        assert_approx(inputs.current_net_worth, 150_000.0);
        assert_approx(inputs.annual_return, 0.07);
        assert_approx(inputs.inflation_rate, 0.025);
        assert_approx(inputs.retirement_spending, 60_000.0);
        assert_approx(inputs.withdrawal_rate, 0.035);
        assert_eq!(inputs.jurisdiction, Jurisdiction::Wa);
        assert_approx(inputs.pre_tax_401k, 20_000.0);
        assert_approx(inputs.employer_match, 0.04);
        assert_approx(inputs.backdoor_roth, 0.03);
        assert!(inputs.stop_at_fire);
        assert_eq!(inputs.income_schedule.len(), 2);
        assert_eq!(
            inputs.spending_schedule,
            vec![ScheduleInterval::new(30, 65, 70_000.0)]
        );
    }

    #[test]
    fn inputs_from_json_uses_defaults_for_missing_fields() {
        let inputs = inputs_from_json("{}").expect("empty payload is valid");
        assert_eq!(inputs, build_inputs(sample_args()).expect("valid inputs"));
    }

    #[test]
    fn inputs_from_json_rejects_unknown_state_and_bad_interval() {
        let err = inputs_from_json(r#"{"state": "NY"}"#).expect_err("unknown state");
        assert!(err.contains("unknown state 'NY'"));

        let err = inputs_from_json(r#"{"yearlySpending": [{"startAge": 40, "endAge": 30, "amount": 1}]}"#)
            .expect_err("inverted interval");
        assert!(err.contains("spending interval #0"));
    }

    #[test]
    fn projection_response_serialization_contains_expected_fields() {
        let inputs = build_inputs(sample_args()).expect("valid inputs");
        let output = project(&inputs);
        let json = serde_json::to_string(&output).expect("response should serialize");

        for key in [
            "\"ages\"",
            "\"nominalNetWorth\"",
            "\"realNetWorth\"",
            "\"preTaxIncome\"",
            "\"afterTaxIncome\"",
            "\"spending\"",
            "\"effectiveTaxRate\"",
            "\"savings\"",
            "\"realInterest\"",
            "\"fireAge\"",
            "\"requiredSavings\"",
            "\"realReturnRate\"",
            "\"firePossible\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn infeasible_projection_serializes_error_message() {
        let mut args = sample_args();
        args.withdrawal_rate = 6.0;
        let output = project(&build_inputs(args).expect("valid inputs"));
        let value = serde_json::to_value(&output).expect("response should serialize");

        assert!(value["fireAge"].is_null());
        assert!(
            value["error"]
                .as_str()
                .is_some_and(|e| e.starts_with("FIRE is not possible"))
        );
    }

    #[test]
    fn projection_json_prints_pretty_output() {
        let json = projection_json(sample_args()).expect("valid projection");
        let value: serde_json::Value = serde_json::from_str(&json).expect("round-trips");
        assert_eq!(value["ages"].as_array().map(Vec::len), Some(28));
        assert!(
            value["requiredSavings"]
                .as_f64()
                .is_some_and(|v| (v - 2_500_000.0).abs() < 1e-6)
        );
    }

    #[test]
    fn tax_quote_itemises_and_defaults_to_california() {
        let quote = tax_quote(TaxQuery {
            gross: Some(250_000.0),
            pre_tax_401k: Some(23_000.0),
            employer_match: Some(5.0),
            ..TaxQuery::default()
        })
        .expect("valid query");

        assert_eq!(quote.state, Jurisdiction::Ca);
        assert!(quote.breakdown.state > 0.0);
        assert_approx(
            quote.result.total_available_income,
            quote.breakdown.after_tax_income + 12_500.0,
        );

        let json = serde_json::to_string(&quote).expect("serializes");
        for key in [
            "\"state\":\"CA\"",
            "\"breakdown\"",
            "\"fica\"",
            "\"socialSecurity\"",
            "\"effectiveTaxRatePercent\"",
            "\"totalAvailableIncome\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }

    #[test]
    fn tax_quote_requires_gross_and_known_state() {
        let err = tax_quote(TaxQuery::default()).expect_err("gross is required");
        assert_eq!(err, InputError::Missing("gross"));

        let err = tax_quote(TaxQuery {
            gross: Some(1.0),
            state: Some("ZZ".to_string()),
            ..TaxQuery::default()
        })
        .expect_err("unknown state");
        assert_eq!(err, InputError::UnknownJurisdiction("ZZ".to_string()));
    }

    #[test]
    fn tax_quote_for_no_tax_state_has_zero_state_component() {
        let quote = tax_quote(TaxQuery {
            gross: Some(500_000.0),
            state: Some("fl".to_string()),
            ..TaxQuery::default()
        })
        .expect("valid query");
        assert_eq!(quote.state, Jurisdiction::Fl);
        assert_eq!(quote.breakdown.state, 0.0);
    }
}
