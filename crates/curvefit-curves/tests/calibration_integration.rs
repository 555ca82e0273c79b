//! Integration test: recover known curves from the par quotes they generate.
//!
//! Market quotes are produced by pricing instruments off a reference curve
//! set, then the curves are recalibrated from a shifted start point.
//!
//! | Curve   | Node times (years)              | Zero yields                          |
//! |---------|---------------------------------|--------------------------------------|
//! | Funding | 1, 2, 5, 10, 20, 31             | 2.1%, 3.6%, 6.0%, 5.4%, 4.9%, 4.4%   |
//! | Libor   | 0.5, 1, 2, 5, 10, 20, 31        | 1.0%, 2.0%, 3.5%, 6.0%, 5.5%, 5.0%, 4.5% |

use approx::assert_relative_eq;
use curvefit_curves::calibration::{
    BootstrapOrchestrator, CalibrationConfig, CalibrationData, CalibrationStage, CurveNodeSpec,
    Decomposition, JacobianMethod, NodeSensitivity, RootFinderKind,
};
use curvefit_curves::instruments::{Cash, FixedFloatSwap, Fra, FxForward, Instrument};
use curvefit_curves::pricing::{InstrumentCalculator, ParRateCalculator, PresentValueCalculator};
use curvefit_curves::{CurveBundle, CurveError, FxMatrix, InterpolationMethod, YieldCurve};
use nalgebra::DVector;

const FUNDING_TIMES: [f64; 6] = [1.0, 2.0, 5.0, 10.0, 20.0, 31.0];
const FUNDING_YIELDS: [f64; 6] = [0.021, 0.036, 0.06, 0.054, 0.049, 0.044];
const LIBOR_TIMES: [f64; 7] = [0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 31.0];
const LIBOR_YIELDS: [f64; 7] = [0.01, 0.02, 0.035, 0.06, 0.055, 0.05, 0.045];

const ROOT_FINDERS: [RootFinderKind; 3] = [
    RootFinderKind::Newton,
    RootFinderKind::Broyden,
    RootFinderKind::ShermanMorrison,
];

fn config() -> CalibrationConfig {
    CalibrationConfig::default()
        .with_abs_tolerance(1e-11)
        .with_rel_tolerance(1e-12)
        .with_max_iterations(200)
}

/// A calibration problem together with the node yields that solve it.
struct Problem {
    data: CalibrationData,
    expected: Vec<f64>,
}

/// Reprices `instruments` on `curves` and stores the par quotes on them.
fn quoted(instruments: Vec<Instrument>, curves: &CurveBundle) -> (Vec<Instrument>, Vec<f64>) {
    let quotes: Vec<f64> = instruments
        .iter()
        .map(|i| ParRateCalculator.value(i, curves).unwrap())
        .collect();
    let instruments = instruments
        .iter()
        .zip(&quotes)
        .map(|(i, &q)| i.with_quote(q))
        .collect();
    (instruments, quotes)
}

/// One Libor curve: a 6M deposit and swaps out to 30Y, nodes at the maturities.
fn single_curve(method: InterpolationMethod) -> Problem {
    let reference = YieldCurve::new(
        "LIBOR",
        LIBOR_TIMES.to_vec(),
        LIBOR_YIELDS.to_vec(),
        InterpolationMethod::Linear,
    )
    .unwrap();

    let maturities: Vec<f64> = [1, 2, 3, 4, 6, 8, 10, 14, 20, 30, 40, 50, 60]
        .iter()
        .map(|&k| 0.5 * f64::from(k))
        .collect();
    let expected: Vec<f64> = maturities
        .iter()
        .map(|&t| reference.zero_rate(t).unwrap())
        .collect();

    let spec = CurveNodeSpec::new("LIBOR", maturities.clone(), method);
    let truth: CurveBundle = [spec.build(&expected).unwrap()].into_iter().collect();

    let instruments = maturities
        .iter()
        .map(|&t| {
            if t <= 0.5 {
                Instrument::Cash(Cash::new("LIBOR", t, 0.0))
            } else {
                Instrument::Swap(FixedFloatSwap::new("LIBOR", "LIBOR", t, 0.0))
            }
        })
        .collect();
    let (instruments, quotes) = quoted(instruments, &truth);

    Problem {
        data: CalibrationData::new(instruments, quotes, vec![spec], CurveBundle::new()).unwrap(),
        expected,
    }
}

/// Funding and Libor curves solved together; Libor swaps discount on funding.
fn double_curve() -> Problem {
    let funding = CurveNodeSpec::new("OIS", FUNDING_TIMES.to_vec(), InterpolationMethod::Linear);
    let libor = CurveNodeSpec::new("LIBOR", LIBOR_TIMES.to_vec(), InterpolationMethod::Linear);
    let truth: CurveBundle = [
        funding.build(&FUNDING_YIELDS).unwrap(),
        libor.build(&LIBOR_YIELDS).unwrap(),
    ]
    .into_iter()
    .collect();

    let mut instruments = vec![Instrument::Cash(Cash::new("OIS", 1.0, 0.0))];
    for &t in &FUNDING_TIMES[1..] {
        instruments.push(Instrument::Swap(FixedFloatSwap::new("OIS", "OIS", t, 0.0)));
    }
    instruments.push(Instrument::Cash(Cash::new("LIBOR", 0.5, 0.0)));
    instruments.push(Instrument::Fra(Fra::new("OIS", "LIBOR", 0.5, 1.0, 0.0)));
    for &t in &LIBOR_TIMES[2..] {
        instruments.push(Instrument::Swap(FixedFloatSwap::new("OIS", "LIBOR", t, 0.0)));
    }
    let (instruments, quotes) = quoted(instruments, &truth);

    let expected = FUNDING_YIELDS.iter().chain(&LIBOR_YIELDS).copied().collect();
    Problem {
        data: CalibrationData::new(instruments, quotes, vec![funding, libor], CurveBundle::new())
            .unwrap(),
        expected,
    }
}

fn shifted(values: &[f64], shift: f64) -> DVector<f64> {
    DVector::from_iterator(values.len(), values.iter().map(|v| v + shift))
}

fn assert_recovered(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_relative_eq!(*a, *e, epsilon = 1e-8);
    }
}

#[test]
fn test_single_curve_round_trip() {
    let problem = single_curve(InterpolationMethod::Linear);
    let start = shifted(&problem.expected, 0.02);

    for finder in ROOT_FINDERS {
        for jacobian in [JacobianMethod::Analytic, JacobianMethod::FiniteDifference] {
            let output = BootstrapOrchestrator::new(ParRateCalculator)
                .with_config(config().with_root_finder(finder).with_jacobian(jacobian))
                .calibrate(&problem.data, Some(&start))
                .unwrap_or_else(|e| panic!("{finder} / {jacobian:?}: {e}"));

            assert_eq!(output.root_finder, finder);
            assert!(output.residual < 1e-9);
            assert_recovered(&output.parameters, &problem.expected);
        }
    }
}

#[test]
fn test_single_curve_cubic_spline() {
    let problem = single_curve(InterpolationMethod::CubicSpline);
    let start = shifted(&problem.expected, 0.02);

    for node_sensitivity in [NodeSensitivity::Analytic, NodeSensitivity::FiniteDifference] {
        let output = BootstrapOrchestrator::new(ParRateCalculator)
            .with_config(config().with_node_sensitivity(node_sensitivity))
            .calibrate(&problem.data, Some(&start))
            .unwrap();
        assert_recovered(&output.parameters, &problem.expected);
    }
}

#[test]
fn test_double_curve_round_trip() {
    let problem = double_curve();
    let start = shifted(&problem.expected, 0.01);

    for finder in ROOT_FINDERS {
        for jacobian in [JacobianMethod::Analytic, JacobianMethod::FiniteDifference] {
            let output = BootstrapOrchestrator::new(ParRateCalculator)
                .with_config(config().with_root_finder(finder).with_jacobian(jacobian))
                .calibrate(&problem.data, Some(&start))
                .unwrap_or_else(|e| panic!("{finder} / {jacobian:?}: {e}"));
            assert_recovered(&output.parameters, &problem.expected);

            let ois = output.curves.get("OIS").unwrap();
            let libor = output.curves.get("LIBOR").unwrap();
            assert_eq!(ois.times(), &FUNDING_TIMES);
            assert_eq!(libor.times(), &LIBOR_TIMES);
        }
    }
}

#[test]
fn test_present_value_targets() {
    // Same quotes, valued as swaps struck at par: every target is zero.
    let problem = double_curve();
    let targets = vec![0.0; problem.data.parameter_count()];
    let data = CalibrationData::new(
        problem.data.instruments().to_vec(),
        targets,
        problem.data.unknown_curves().to_vec(),
        CurveBundle::new(),
    )
    .unwrap();

    let output = BootstrapOrchestrator::new(PresentValueCalculator)
        .with_config(config())
        .calibrate(&data, Some(&shifted(&problem.expected, 0.01)))
        .unwrap();
    assert_recovered(&output.parameters, &problem.expected);
}

#[test]
fn test_restart_from_solution_is_immediate() {
    let problem = double_curve();
    let orchestrator = BootstrapOrchestrator::new(ParRateCalculator).with_config(config());

    let first = orchestrator
        .calibrate(&problem.data, Some(&shifted(&problem.expected, 0.01)))
        .unwrap();
    assert!(first.iterations > 1);

    let restart = DVector::from_vec(first.parameters.clone());
    let second = orchestrator.calibrate(&problem.data, Some(&restart)).unwrap();
    assert!(second.iterations <= 2);
    assert_recovered(&second.parameters, &first.parameters);
}

#[test]
fn test_final_jacobian_matches_recomputation() {
    let problem = double_curve();
    let orchestrator = BootstrapOrchestrator::new(ParRateCalculator).with_config(config());
    let output = orchestrator
        .calibrate(&problem.data, Some(&shifted(&problem.expected, 0.01)))
        .unwrap();

    let n = problem.data.parameter_count();
    let jacobian = output.jacobian_matrix().unwrap();
    assert_eq!(jacobian.shape(), (n, n));

    let x = DVector::from_vec(output.parameters.clone());
    let recomputed = orchestrator.jacobian_at(&problem.data, &x).unwrap();
    for (a, b) in jacobian.iter().zip(recomputed.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-14);
    }
    // The 1Y funding deposit reads a single node.
    assert_eq!(jacobian[(0, 1)], 0.0);
}

#[test]
fn test_duplicate_node_time_rejected() {
    let spec = CurveNodeSpec::new("OIS", vec![1.0, 2.0, 2.0], InterpolationMethod::Linear);
    let instruments = [1.0, 2.0, 3.0]
        .iter()
        .map(|&t| Instrument::Cash(Cash::new("OIS", t, 0.03)))
        .collect();
    let result = CalibrationData::new(instruments, vec![0.03; 3], vec![spec], CurveBundle::new());
    assert!(matches!(
        result,
        Err(CurveError::DuplicateNodeTime { time, .. }) if time == 2.0
    ));
}

#[test]
fn test_instruments_at_same_node_time_rejected() {
    // Two deposits on the same date would leave the 2Y node undetermined.
    let spec = CurveNodeSpec::new("OIS", vec![1.0, 2.0], InterpolationMethod::Linear);
    let instruments = vec![
        Instrument::Cash(Cash::new("OIS", 1.0, 0.03)),
        Instrument::Cash(Cash::new("OIS", 1.0, 0.03)),
    ];
    let result = CalibrationData::new(instruments, vec![0.03, 0.03], vec![spec], CurveBundle::new());
    match result {
        Err(err @ CurveError::InvalidArgument { .. }) => {
            assert!(err.to_string().contains("OIS"));
        }
        other => panic!("expected an invalid argument, got {other:?}"),
    }
}

#[test]
fn test_svd_decomposition_matches_lu() {
    let problem = single_curve(InterpolationMethod::Linear);
    let start = shifted(&problem.expected, 0.02);
    let solve = |decomposition| {
        BootstrapOrchestrator::new(ParRateCalculator)
            .with_config(config().with_decomposition(decomposition))
            .calibrate(&problem.data, Some(&start))
            .unwrap()
    };

    let lu = solve(Decomposition::Lu);
    let svd = solve(Decomposition::Svd);
    for (a, b) in lu.parameters.iter().zip(&svd.parameters) {
        assert_relative_eq!(*a, *b, epsilon = 1e-10);
    }
}

#[test]
fn test_non_convergence_reports_failure() {
    let problem = double_curve();
    let result = BootstrapOrchestrator::new(ParRateCalculator)
        .with_config(config().with_max_iterations(1))
        .calibrate(&problem.data, Some(&shifted(&problem.expected, 0.05)));

    match result {
        Err(CurveError::CalibrationFailure {
            iterations,
            residual,
            message,
        }) => {
            assert_eq!(iterations, 1);
            assert!(residual > 1e-11);
            assert!(message.contains("Newton"));
        }
        other => panic!("expected a calibration failure, got {other:?}"),
    }
}

mod fx_chain {
    use super::*;

    const NODES: [f64; 3] = [1.0, 2.0, 5.0];
    const USD_YIELDS: [f64; 3] = [0.03, 0.032, 0.035];
    const EUR_YIELDS: [f64; 3] = [0.01, 0.012, 0.015];
    const EUR_USD: f64 = 1.10;

    fn fx() -> FxMatrix {
        let mut fx = FxMatrix::new("USD");
        fx.add_rate("EUR", "USD", EUR_USD).unwrap();
        fx
    }

    fn usd_spec() -> CurveNodeSpec {
        CurveNodeSpec::new("USD-OIS", NODES.to_vec(), InterpolationMethod::Linear)
    }

    fn eur_spec() -> CurveNodeSpec {
        CurveNodeSpec::new("EUR-OIS", NODES.to_vec(), InterpolationMethod::Linear)
    }

    /// USD deposits and EUR/USD forwards priced off the reference curves.
    fn stages() -> Vec<CalibrationStage> {
        let curves: CurveBundle = [
            usd_spec().build(&USD_YIELDS).unwrap(),
            eur_spec().build(&EUR_YIELDS).unwrap(),
        ]
        .into_iter()
        .collect();
        let truth = curves.with_fx(fx());

        let deposits = NODES
            .iter()
            .map(|&t| Instrument::Cash(Cash::new("USD-OIS", t, 0.0)))
            .collect();
        let forwards = NODES
            .iter()
            .map(|&t| {
                Instrument::FxForward(FxForward::new("EUR-OIS", "USD-OIS", "EUR", "USD", t, 1.0))
            })
            .collect();
        let (deposits, deposit_quotes) = quoted(deposits, &truth);
        let (forwards, forward_quotes) = quoted(forwards, &truth);

        vec![
            CalibrationStage::new("usd", vec![usd_spec()], deposits, deposit_quotes),
            CalibrationStage::new("eur", vec![eur_spec()], forwards, forward_quotes).with_fx(fx()),
        ]
    }

    fn orchestrator() -> BootstrapOrchestrator {
        BootstrapOrchestrator::new(ParRateCalculator)
            .with_config(config().with_abs_tolerance(1e-13).with_rel_tolerance(0.0))
    }

    #[test]
    fn test_chain_recovers_both_curves() {
        let chain = orchestrator()
            .calibrate_chain(&CurveBundle::new(), stages())
            .unwrap();

        assert_eq!(chain.stages.len(), 2);
        assert!(chain.stages[0].transitions.is_empty());
        assert_recovered(&chain.stages[0].output.parameters, &USD_YIELDS);
        assert_recovered(&chain.stages[1].output.parameters, &EUR_YIELDS);

        assert!(chain.curves.contains("USD-OIS"));
        assert!(chain.curves.contains("EUR-OIS"));
        assert_relative_eq!(chain.curves.fx_rate("EUR", "USD").unwrap(), EUR_USD);
    }

    #[test]
    fn test_transition_matrix_matches_recalibration() {
        let chain = orchestrator()
            .calibrate_chain(&CurveBundle::new(), stages())
            .unwrap();
        let transition = &chain.stages[1].transitions["USD-OIS"];
        assert_eq!(transition.shape(), (3, 3));

        // Forwards at the node dates tie each EUR node to the USD node of the same date.
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(transition[(i, j)], expected, epsilon = 1e-10);
            }
        }

        let usd = chain.curves.get("USD-OIS").unwrap();
        let eur_stage = stages().pop().unwrap();
        let recalibrate = |curve: YieldCurve| {
            let known: CurveBundle = [curve].into_iter().collect();
            let data = CalibrationData::new(
                eur_stage.instruments.clone(),
                eur_stage.market_values.clone(),
                eur_stage.unknown_curves.clone(),
                known.with_fx(fx()),
            )
            .unwrap();
            orchestrator().calibrate(&data, None).unwrap().parameters
        };

        let h = 1e-5;
        for j in 0..3 {
            let up = recalibrate(usd.bumped(j, h).unwrap());
            let down = recalibrate(usd.bumped(j, -h).unwrap());
            for i in 0..3 {
                let bumped = (up[i] - down[i]) / (2.0 * h);
                assert_relative_eq!(transition[(i, j)], bumped, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_initial_curves_get_no_transition() {
        let usd = usd_spec().build(&USD_YIELDS).unwrap();
        let initial: CurveBundle = [usd].into_iter().collect();
        let eur_only = stages().pop().unwrap();

        let chain = orchestrator().calibrate_chain(&initial, vec![eur_only]).unwrap();
        assert!(chain.stages[0].transitions.is_empty());
        assert_recovered(&chain.stages[0].output.parameters, &EUR_YIELDS);
    }

    #[test]
    fn test_missing_fx_rate_is_rejected() {
        let mut stages = stages();
        let eur = stages.pop().unwrap();
        let without_fx = CalibrationStage::new(
            eur.name,
            eur.unknown_curves,
            eur.instruments,
            eur.market_values,
        );
        stages.push(without_fx);

        let result = orchestrator().calibrate_chain(&CurveBundle::new(), stages);
        assert!(result.unwrap_err().is_invalid_argument());
    }
}
