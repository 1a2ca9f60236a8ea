use budget_calib::bins::{ExpandSpec, expand_bins, pareto_tail_points};
use budget_calib::domain::{
    Bin, Coupling, FitParams, GuardrailConfig, Interval, PairedQuantileSeries, TailConfig, WeightedSample,
};
use budget_calib::fit::{GuardrailMode, couple_series, evaluate_guardrails, fit_anchored, p95_multiple, AnchorObservation};
use budget_calib::math::weighted_quantiles;
use budget_calib::search::fit_degradation;
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

const MIN_PROPTEST_CASES: u32 = 256;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

/// Strictly increasing positive series built from a start and positive steps.
fn ascending(start: f64, steps: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(steps.len() + 1);
    let mut v = start;
    out.push(v);
    for s in steps {
        v += s;
        out.push(v);
    }
    out
}

fn guardrail_config() -> GuardrailConfig {
    GuardrailConfig {
        hard_p95_cap: 15.0,
        exponent_max: 1.0,
        sigma_low: 0.25,
        sigma_high: 0.65,
        income_checkpoints: vec![25_000.0, 50_000.0, 100_000.0],
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        .. ProptestConfig::default()
    })]

    #[test]
    fn raising_alpha_lowers_the_tail_maximum(
        x_min in 1_000.0f64..1_000_000.0,
        alpha in 0.5f64..4.0,
        delta in 0.05f64..2.0,
        max_cdf in 0.5f64..0.999,
        n in 1usize..20,
    ) {
        let heavy = pareto_tail_points(x_min, alpha, max_cdf, n);
        let light = pareto_tail_points(x_min, alpha + delta, max_cdf, n);
        let heavy_max = heavy.iter().copied().fold(f64::MIN, f64::max);
        let light_max = light.iter().copied().fold(f64::MIN, f64::max);
        prop_assert!(light_max < heavy_max);
        prop_assert!(heavy.iter().all(|x| x.is_finite() && *x >= x_min));

        let bins = [Bin {
            label: "tail".to_string(),
            interval: Interval::OpenUpper { lower: x_min },
            mass: 10.0,
        }];
        let spec = |a: f64| ExpandSpec {
            points_per_bin: n,
            open_lower_floor: 0.0,
            alpha: a,
            tail: TailConfig { min_threshold: 0.0, max_cdf },
        };
        let heavy_sample = expand_bins(&bins, &spec(alpha)).unwrap();
        let light_sample = expand_bins(&bins, &spec(alpha + delta)).unwrap();
        prop_assert!(light_sample.max_value().unwrap() < heavy_sample.max_value().unwrap());
        prop_assert!((heavy_sample.total_weight() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn constant_bin_expands_to_its_value(
        v in 1.0f64..1e6,
        mass in 0.1f64..1e4,
        n in 1usize..15,
    ) {
        let bins = [Bin {
            label: "point".to_string(),
            interval: Interval::Closed { lower: v, upper: v },
            mass,
        }];
        let spec = ExpandSpec {
            points_per_bin: n,
            open_lower_floor: 0.0,
            alpha: 2.0,
            tail: TailConfig { min_threshold: 0.0, max_cdf: 0.99 },
        };
        let sample = expand_bins(&bins, &spec).unwrap();
        // A zero-width bin collapses to one point carrying the whole mass,
        // which has the same quantiles as n equal points of mass / n.
        prop_assert_eq!(sample.len(), 1);
        prop_assert!(sample.values.iter().all(|x| *x == v));
        prop_assert!((sample.total_weight() - mass).abs() <= 1e-9 * mass);
        let q = weighted_quantiles(&sample, n + 1).unwrap();
        prop_assert!(q.iter().all(|x| *x == v));
    }

    #[test]
    fn closed_bin_weights_sum_to_mass(
        lower in 0.0f64..1e5,
        width in 1.0f64..1e5,
        mass in 0.1f64..1e4,
        n in 1usize..15,
    ) {
        let bins = [Bin {
            label: "band".to_string(),
            interval: Interval::Closed { lower, upper: lower + width },
            mass,
        }];
        let spec = ExpandSpec {
            points_per_bin: n,
            open_lower_floor: 0.0,
            alpha: 2.0,
            tail: TailConfig { min_threshold: 0.0, max_cdf: 0.99 },
        };
        let sample = expand_bins(&bins, &spec).unwrap();
        prop_assert_eq!(sample.len(), n);
        prop_assert!((sample.total_weight() - mass).abs() <= 1e-9 * mass);
        prop_assert!(sample.values.iter().all(|x| *x > lower && *x < lower + width));
    }

    #[test]
    fn quantile_series_is_sorted_and_bounded(
        values in prop::collection::vec(1.0f64..1e6, 1..60),
        m in 2usize..120,
    ) {
        let sample = WeightedSample {
            weights: values.iter().map(|v| 1.0 + (v % 3.0)).collect(),
            values: values.clone(),
        };
        let q = weighted_quantiles(&sample, m).unwrap();
        prop_assert_eq!(q.len(), m);
        prop_assert!(q.windows(2).all(|w| w[0] <= w[1]));
        let lo = values.iter().copied().fold(f64::MAX, f64::min);
        let hi = values.iter().copied().fold(f64::MIN, f64::max);
        prop_assert!(q.iter().all(|x| *x >= lo && *x <= hi));
    }

    #[test]
    fn monotone_couplings_bracket_independent_sigma(
        x0 in 1_000.0f64..50_000.0,
        y0 in 1_000.0f64..50_000.0,
        x_steps in prop::collection::vec(10.0f64..20_000.0, 5..40),
        y_scale in prop::collection::vec(0.5f64..3.0, 5..40),
    ) {
        let len = x_steps.len().min(y_scale.len());
        let x = ascending(x0, &x_steps[..len]);
        let y_steps: Vec<f64> = x_steps[..len].iter().zip(&y_scale[..len]).map(|(s, k)| s * k).collect();
        let y = ascending(y0, &y_steps);

        let sigma = |c: Coupling| {
            let series = couple_series(&x, &y, c).unwrap();
            fit_anchored(&series, None).unwrap().params.sigma
        };
        let co = couple_series(&x, &y, Coupling::Comonotonic).unwrap();
        let counter = couple_series(&x, &y, Coupling::Countermonotonic).unwrap();
        prop_assert_ne!(co.y, counter.y);

        let s_co = sigma(Coupling::Comonotonic);
        let s_counter = sigma(Coupling::Countermonotonic);
        let s_ind = sigma(Coupling::Independent);
        prop_assert!(s_ind + 1e-9 >= s_co.min(s_counter));
    }

    #[test]
    fn regression_recovers_exact_power_laws(
        scale in 0.1f64..100.0,
        exponent in -2.0f64..2.0,
        x0 in 1_000.0f64..20_000.0,
        steps in prop::collection::vec(100.0f64..20_000.0, 3..30),
        anchor_weight in 0.0f64..50.0,
    ) {
        let x = ascending(x0, &steps);
        let y: Vec<f64> = x.iter().map(|v| scale * v.powf(exponent)).collect();
        let series = PairedQuantileSeries { x, y };

        let log_x = (x0 * 2.0).ln();
        let anchor = AnchorObservation {
            log_x,
            log_y: scale.ln() + exponent * log_x,
            weight: anchor_weight,
        };
        let fit = fit_anchored(&series, Some(anchor)).unwrap();
        prop_assert!((fit.params.exponent - exponent).abs() < 1e-6);
        prop_assert!((fit.params.scale / scale - 1.0).abs() < 1e-5);
        prop_assert_eq!(fit.params.mu, 0.0);
    }

    #[test]
    fn nonzero_mu_always_fails(mu in 1e-9f64..1.0, negative in any::<bool>()) {
        let params = FitParams {
            scale: 4.0 / 50_000.0_f64.powf(-0.1),
            exponent: 0.9,
            mu: if negative { -mu } else { mu },
            sigma: 0.4,
        };
        let out = evaluate_guardrails(&params, &guardrail_config(), GuardrailMode::Strict);
        prop_assert!(!out.passed);
        prop_assert!(out.hard_failures.iter().any(|f| f.contains("BUY_MU")));
    }

    #[test]
    fn exponent_over_cap_always_fails(excess in 1e-6f64..3.0) {
        let params = FitParams {
            scale: 1.0,
            exponent: 1.0 + excess,
            mu: 0.0,
            sigma: 0.4,
        };
        let out = evaluate_guardrails(&params, &guardrail_config(), GuardrailMode::Strict);
        prop_assert!(!out.passed);
        prop_assert!(out.hard_failures.iter().any(|f| f.contains("EXPONENT")));
    }

    #[test]
    fn p95_at_or_over_cap_always_fails(sigma in 0.0f64..1.5, factor in 0.2f64..=1.0) {
        let params = FitParams {
            scale: 4.0 / 50_000.0_f64.powf(-0.1),
            exponent: 0.9,
            mu: 0.0,
            sigma,
        };
        let mut config = guardrail_config();
        config.hard_p95_cap = p95_multiple(&params, 50_000.0) * factor;
        let out = evaluate_guardrails(&params, &config, GuardrailMode::Strict);
        prop_assert!(!out.passed);
        prop_assert!(out.hard_failures.iter().any(|f| f.contains("P95_MULTIPLE")));
    }

    #[test]
    fn degradation_is_exact_at_one_and_two_baselines(b in 1e-9f64..1e6) {
        prop_assert_eq!(fit_degradation(b, b), 0.0);
        prop_assert_eq!(fit_degradation(2.0 * b, b), 1.0);
        prop_assert_eq!(fit_degradation(3.0 * b, -b), 0.0);
    }
}
