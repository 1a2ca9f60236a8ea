use std::collections::BTreeMap;
use std::io::Write;

use budget_calib::bins::{ExpandSpec, build_bins, expand_bins};
use budget_calib::domain::{
    CalibConfig, CategoryRow, Coupling, FitParams, Period, PriceRow, Shard, StatusFilter, TailConfig, YearPolicy,
};
use budget_calib::error::ErrorKind;
use budget_calib::fit::{AnchorObservation, couple_samples, fit_anchored};
use budget_calib::io::{load_category_rows, load_price_rows, write_ranked_csv, write_selection_json};
use budget_calib::search::{Progress, run_search};

fn masses(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn spec(alpha: f64, min_threshold: f64) -> ExpandSpec {
    ExpandSpec {
        points_per_bin: 9,
        open_lower_floor: 0.0,
        alpha,
        tail: TailConfig {
            min_threshold,
            max_cdf: 0.99,
        },
    }
}

/// Income bands 120/80/20 and price bands 70/90/60, alpha 1.8, comonotonic,
/// anchored at log(220000) with weight 4.
fn scenario_fit() -> FitParams {
    let income_bins = build_bins(&masses(&[("0-50K", 120.0), ("50K-100K", 80.0), ("100K+", 20.0)])).unwrap();
    let price_bins = build_bins(&masses(&[("0-120K", 70.0), ("120K-250K", 90.0), ("250K+", 60.0)])).unwrap();
    let income = expand_bins(&income_bins, &spec(1.8, 100_000.0)).unwrap();
    let price = expand_bins(&price_bins, &spec(1.8, 250_000.0)).unwrap();

    let series = couple_samples(&income, &price, 99, Coupling::Comonotonic).unwrap();
    let anchor = AnchorObservation::at_mean_log_x(&series, 220_000.0_f64.ln(), 4.0).unwrap();
    fit_anchored(&series, Some(anchor)).unwrap().params
}

#[test]
fn end_to_end_scenario_is_bit_for_bit_deterministic() {
    let first = scenario_fit();
    let second = scenario_fit();

    assert!(first.scale.is_finite() && first.scale > 0.0);
    assert!(first.exponent.is_finite() && first.exponent > 0.0);
    assert!(first.sigma.is_finite() && first.sigma >= 0.0);
    assert_eq!(first.mu, 0.0);

    assert_eq!(first.scale.to_bits(), second.scale.to_bits());
    assert_eq!(first.exponent.to_bits(), second.exponent.to_bits());
    assert_eq!(first.sigma.to_bits(), second.sigma.to_bits());
}

/// Scenario fit recorded from an exact weighted least squares solve of the
/// same quantile series. The tolerance only absorbs SVD rounding; any change
/// to the quantile rule, tail formula or anchor placement moves these values
/// far outside it.
const PINNED_SCALE: f64 = 3.7491591874911214;
const PINNED_EXPONENT: f64 = 1.0034794540807401;
const PINNED_SIGMA: f64 = 0.1850492726259162;

fn assert_pinned(name: &str, got: f64, want: f64) {
    let rel = ((got - want) / want).abs();
    assert!(rel < 1e-9, "{name}: got {got:e}, pinned {want:e} (rel err {rel:e})");
}

#[test]
fn end_to_end_scenario_matches_pinned_fit() {
    let fit = scenario_fit();
    assert_pinned("scale", fit.scale, PINNED_SCALE);
    assert_pinned("exponent", fit.exponent, PINNED_EXPONENT);
    assert_pinned("sigma", fit.sigma, PINNED_SIGMA);
}

fn category_rows() -> Vec<CategoryRow> {
    let bands = [
        ("income", "0-50K", 120.0),
        ("income", "50K-100K", 80.0),
        ("income", "100K+", 20.0),
        ("price", "0-120K", 70.0),
        ("price", "120K-250K", 90.0),
        ("price", "250K+", 60.0),
        ("price", "Total", 220.0),
    ];
    let mut rows = Vec::new();
    for year in [2023, 2024] {
        for (group, category, count) in bands {
            // Split each count over two regions so aggregation has work to do.
            for region in ["north", "south"] {
                rows.push(CategoryRow {
                    group: group.to_string(),
                    category: category.to_string(),
                    region: region.to_string(),
                    period: Period::year(year),
                    count: count / 2.0 + if year == 2024 { 1.0 } else { 0.0 },
                });
            }
        }
    }
    rows
}

fn price_rows() -> Vec<PriceRow> {
    let mut rows = Vec::new();
    for year in [2023, 2024] {
        for (i, price) in [95_000.0, 140_000.0, 180_000.0, 210_000.0, 260_000.0, 320_000.0, 450_000.0]
            .into_iter()
            .enumerate()
        {
            rows.push(PriceRow {
                price: price * if year == 2024 { 1.04 } else { 1.0 },
                year: Some(year),
                status_code: if i % 2 == 0 { "A" } else { "B" }.to_string(),
            });
        }
    }
    rows
}

fn config(workers: usize) -> CalibConfig {
    let mut config = CalibConfig::default();
    config.fit_years = vec![2023, 2024];
    config.target_year = 2024;
    config.workers = workers;
    config.search.status_filters = vec![StatusFilter::All, StatusFilter::Only("A".to_string())];
    config.search.year_policies = vec![YearPolicy::TargetYear, YearPolicy::Pooled];
    config.search.tail_alphas = vec![1.8, 2.6];
    config.search.couplings = vec![Coupling::Comonotonic, Coupling::Independent];
    config.guardrails.hard_p95_cap = 1e6;
    config.guardrails.exponent_max = 10.0;
    config.guardrails.income_checkpoints = vec![40_000.0, 60_000.0];
    config.max_degradation = 1e6;
    config
}

#[test]
fn search_is_identical_across_worker_counts() {
    let cats = category_rows();
    let prices = price_rows();

    let serial = run_search(&config(1), &cats, &prices, &mut |_| {}).unwrap();

    let mut seen: Vec<Progress> = Vec::new();
    let parallel = run_search(&config(4), &cats, &prices, &mut |p| seen.push(p)).unwrap();

    assert_eq!(serial.ranked, parallel.ranked);
    assert_eq!(serial.selected, parallel.selected);
    assert_eq!(serial.baseline_best_fit.to_bits(), parallel.baseline_best_fit.to_bits());

    assert_eq!(parallel.total_tasks, 2 * 2 * 2 * 2 * 3);
    assert_eq!(seen.len(), parallel.total_tasks);
    assert!(seen.windows(2).all(|w| w[0].processed <= w[1].processed));
    assert_eq!(seen.last().map(|p| p.processed), Some(parallel.total_tasks));
}

#[test]
fn selected_variant_is_eligible_and_ranked_first_among_eligible() {
    let outcome = run_search(&config(2), &category_rows(), &price_rows(), &mut |_| {}).unwrap();
    let selected = &outcome.selected;
    assert!(selected.guardrails.passed);
    assert_eq!(selected.fit.mu, 0.0);
    assert!(selected.fit_degradation_vs_baseline.is_some());
    assert!(outcome.ranked.iter().all(|r| r.fit_degradation_vs_baseline.is_some()));

    let first_eligible = outcome
        .ranked
        .iter()
        .find(|r| r.guardrails.passed)
        .unwrap();
    assert_eq!(first_eligible.key, selected.key);
    assert!(outcome.baseline_best_fit <= selected.worst_year_fit);
}

#[test]
fn impossible_guardrails_report_near_misses() {
    let mut config = config(1);
    config.guardrails.exponent_max = -5.0;
    config.near_miss_count = 3;
    let err = run_search(&config, &category_rows(), &price_rows(), &mut |_| {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEligible);
    assert_eq!(err.exit_code(), 5);
    assert!(err.message().contains("EXPONENT"));
    assert!(err.message().contains("1. status="));
}

#[test]
fn configured_baseline_skips_relaxed_rerun() {
    let mut config = config(1);
    config.baseline_best_fit = Some(0.0);
    let outcome = run_search(&config, &category_rows(), &price_rows(), &mut |_| {}).unwrap();
    assert_eq!(outcome.baseline_best_fit, 0.0);
    assert!(outcome.ranked.iter().all(|r| r.fit_degradation_vs_baseline == Some(0.0)));
}

#[test]
fn sharding_restricts_the_dispatched_tasks() {
    let mut config = config(1);
    config.shard = Some(Shard { index: 0, count: 5 });
    let outcome = run_search(&config, &category_rows(), &price_rows(), &mut |_| {}).unwrap();
    assert_eq!(outcome.total_tasks, 10);
    assert_eq!(outcome.ranked.len() + outcome.skipped.len(), 10);
}

#[test]
fn missing_price_year_is_insufficient_data() {
    let mut prices = price_rows();
    prices.retain(|p| p.year != Some(2023));
    let err = run_search(&config(1), &category_rows(), &prices, &mut |_| {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientData);
}

#[test]
fn empty_axis_is_rejected_before_evaluation() {
    let mut config = config(1);
    config.search.couplings.clear();
    let err = run_search(&config, &category_rows(), &price_rows(), &mut |_| {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn csv_inputs_and_exports_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();

    let cats_path = dir.path().join("categories.csv");
    let mut f = std::fs::File::create(&cats_path).unwrap();
    writeln!(f, "group,category,region,year,quarter,month,count").unwrap();
    for r in category_rows() {
        writeln!(f, "{},{},{},{},,,{}", r.group, r.category, r.region, r.period.year, r.count).unwrap();
    }
    drop(f);

    let prices_path = dir.path().join("prices.csv");
    let mut f = std::fs::File::create(&prices_path).unwrap();
    writeln!(f, "price,year,status").unwrap();
    for r in price_rows() {
        writeln!(f, "{},{},{}", r.price, r.year.unwrap(), r.status_code).unwrap();
    }
    drop(f);

    let cats = load_category_rows(&cats_path).unwrap();
    let prices = load_price_rows(&prices_path).unwrap();
    assert!(cats.row_errors.is_empty());
    assert_eq!(cats.rows.len(), category_rows().len());
    assert_eq!(prices.rows.len(), price_rows().len());

    let config = config(1);
    let outcome = run_search(&config, &cats.rows, &prices.rows, &mut |_| {}).unwrap();

    let csv_path = dir.path().join("ranked.csv");
    write_ranked_csv(&csv_path, &outcome.ranked).unwrap();
    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.get(0), Some("rank"));
    assert_eq!(reader.records().count(), outcome.ranked.len());

    let json_path = dir.path().join("selection.json");
    write_selection_json(&json_path, &outcome, &config).unwrap();
    let text = std::fs::read_to_string(&json_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["tool"], "calib");
    assert!(value["generated_at"].is_string());
    assert_eq!(value["selected"]["fit"]["mu"], 0.0);
}
