//! Calibrate command implementation.
//!
//! Solves the curves of a request file and prints the node yields, and
//! optionally the final Jacobian and chain transition matrices.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;
use tabled::Tabled;

use curvefit_curves::calibration::{
    BootstrapOrchestrator, CalibrationConfig, CalibrationOutput, ChainOutput, CurveNodeSpec,
    Decomposition, JacobianMethod, RootFinderKind,
};
use curvefit_curves::CurveBundle;

use crate::cli::OutputFormat;
use crate::commands::config::{load_or_default, settings_path};
use crate::error::CliResult;
use crate::output::{format_percent, print_header, print_json, print_matrix, print_output, KeyValue};
use crate::request::CalibrationRequest;

/// Arguments for the calibrate command.
#[derive(Args, Debug)]
pub struct CalibrateArgs {
    /// Path to the TOML request file
    pub request: PathBuf,

    /// Settings file used when the request has no [config] table
    #[arg(long, env = "CURVEFIT_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Root finder
    #[arg(long, value_enum)]
    pub root_finder: Option<RootFinderChoice>,

    /// Jacobian method
    #[arg(long, value_enum)]
    pub jacobian: Option<JacobianChoice>,

    /// Linear decomposition
    #[arg(long, value_enum)]
    pub decomposition: Option<DecompositionChoice>,

    /// Absolute tolerance on the pricing discrepancies
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Maximum root finder iterations
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Print the final Jacobian (and transition matrices for chains)
    #[arg(long)]
    pub show_jacobian: bool,
}

/// Root finder choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RootFinderChoice {
    /// Newton with a full Jacobian every iteration
    Newton,
    /// Broyden rank-one Jacobian updates
    Broyden,
    /// Broyden updates on the inverse Jacobian
    #[value(name = "sherman-morrison")]
    ShermanMorrison,
}

impl From<RootFinderChoice> for RootFinderKind {
    fn from(choice: RootFinderChoice) -> Self {
        match choice {
            RootFinderChoice::Newton => RootFinderKind::Newton,
            RootFinderChoice::Broyden => RootFinderKind::Broyden,
            RootFinderChoice::ShermanMorrison => RootFinderKind::ShermanMorrison,
        }
    }
}

/// Jacobian method choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JacobianChoice {
    /// Calculator sensitivities
    Analytic,
    /// Finite differences
    #[value(name = "finite-difference")]
    FiniteDifference,
}

impl From<JacobianChoice> for JacobianMethod {
    fn from(choice: JacobianChoice) -> Self {
        match choice {
            JacobianChoice::Analytic => JacobianMethod::Analytic,
            JacobianChoice::FiniteDifference => JacobianMethod::FiniteDifference,
        }
    }
}

/// Decomposition choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DecompositionChoice {
    /// LU with partial pivoting (SVD fallback when singular)
    Lu,
    /// Singular value decomposition
    Svd,
}

impl From<DecompositionChoice> for Decomposition {
    fn from(choice: DecompositionChoice) -> Self {
        match choice {
            DecompositionChoice::Lu => Decomposition::Lu,
            DecompositionChoice::Svd => Decomposition::Svd,
        }
    }
}

/// One curve node in the output.
#[derive(Debug, Clone, Serialize, Tabled)]
struct NodeRow {
    #[tabled(rename = "Curve")]
    curve: String,
    #[tabled(rename = "Time")]
    time: f64,
    #[tabled(rename = "Zero Yield")]
    #[serde(skip)]
    zero_yield_display: String,
    #[tabled(skip)]
    zero_yield: f64,
    #[tabled(rename = "Discount Factor")]
    discount_factor: f64,
}

/// JSON form of one calibrated curve.
#[derive(Debug, Serialize)]
struct CurveReport {
    name: String,
    interpolation: String,
    times: Vec<f64>,
    yields: Vec<f64>,
    discount_factors: Vec<f64>,
}

/// JSON form of one calibration.
#[derive(Debug, Serialize)]
struct CalibrationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
    root_finder: String,
    iterations: u32,
    residual: f64,
    parameters: Vec<f64>,
    curves: Vec<CurveReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jacobian: Option<Vec<Vec<f64>>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    transitions: BTreeMap<String, Vec<Vec<f64>>>,
}

/// Execute the calibrate command.
pub fn execute(args: CalibrateArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let request = CalibrationRequest::from_file(&args.request)?;
    let config = resolve_config(&args, &request)?;
    let calculator = request.calculator.calculator();
    let orchestrator = BootstrapOrchestrator::from_shared(calculator.clone()).with_config(config);

    tracing::info!(
        request = %args.request.display(),
        nodes = request.node_count(),
        chain = request.is_chain(),
        "calibrating"
    );

    let reports = if request.is_chain() {
        let chain = orchestrator.calibrate_chain(
            &request.known_bundle()?,
            request.stages(calculator.as_ref()),
        )?;
        chain_reports(&chain, &request, args.show_jacobian)?
    } else {
        let data = request.calibration_data(calculator.as_ref())?;
        let output = orchestrator.calibrate(&data, None)?;
        vec![report(None, &output, &request.curves, args.show_jacobian)?]
    };

    print_reports(&reports, format, quiet)
}

/// Request `[config]`, else the settings file; then command-line overrides.
fn resolve_config(args: &CalibrateArgs, request: &CalibrationRequest) -> CliResult<CalibrationConfig> {
    let mut config = match request.config {
        Some(config) => config,
        None => load_or_default(&settings_path(args.config.clone())?)?,
    };
    if let Some(choice) = args.root_finder {
        config = config.with_root_finder(choice.into());
    }
    if let Some(choice) = args.jacobian {
        config = config.with_jacobian(choice.into());
    }
    if let Some(choice) = args.decomposition {
        config = config.with_decomposition(choice.into());
    }
    if let Some(tolerance) = args.tolerance {
        config = config.with_abs_tolerance(tolerance);
    }
    if let Some(max_iterations) = args.max_iterations {
        config = config.with_max_iterations(max_iterations);
    }
    if args.show_jacobian {
        config = config.with_return_jacobian(true);
    }
    config.validate()?;
    Ok(config)
}

/// Curve reports in unknown-vector order, so they line up with the Jacobian.
fn curve_reports(curves: &CurveBundle, order: &[CurveNodeSpec]) -> CliResult<Vec<CurveReport>> {
    order
        .iter()
        .map(|spec| -> CliResult<CurveReport> {
            let curve = curves.get(&spec.name)?;
            let discount_factors = curve
                .times()
                .iter()
                .map(|&t| curve.discount_factor(t))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CurveReport {
                name: curve.name().to_string(),
                interpolation: curve.method().to_string(),
                times: curve.times().to_vec(),
                yields: curve.yields().to_vec(),
                discount_factors,
            })
        })
        .collect()
}

fn report(
    stage: Option<String>,
    output: &CalibrationOutput,
    order: &[CurveNodeSpec],
    show_jacobian: bool,
) -> CliResult<CalibrationReport> {
    let n = output.parameter_count();
    let jacobian = if show_jacobian {
        output
            .jacobian
            .as_ref()
            .map(|values| values.chunks(n.max(1)).map(<[f64]>::to_vec).collect())
    } else {
        None
    };
    Ok(CalibrationReport {
        stage,
        root_finder: output.root_finder.to_string(),
        iterations: output.iterations,
        residual: output.residual,
        parameters: output.parameters.clone(),
        curves: curve_reports(&output.curves, order)?,
        jacobian,
        transitions: BTreeMap::new(),
    })
}

fn chain_reports(
    chain: &ChainOutput,
    request: &CalibrationRequest,
    show_jacobian: bool,
) -> CliResult<Vec<CalibrationReport>> {
    chain
        .stages
        .iter()
        .zip(&request.stages)
        .map(|(stage, stage_request)| -> CliResult<CalibrationReport> {
            let mut stage_report = report(
                Some(stage.name.clone()),
                &stage.output,
                &stage_request.curves,
                show_jacobian,
            )?;
            if show_jacobian {
                stage_report.transitions = stage
                    .transitions
                    .iter()
                    .map(|(name, matrix)| {
                        let rows: Vec<Vec<f64>> = matrix
                            .row_iter()
                            .map(|row| row.iter().copied().collect())
                            .collect();
                        (name.clone(), rows)
                    })
                    .collect();
            }
            Ok(stage_report)
        })
        .collect()
}

fn node_rows(reports: &[CalibrationReport]) -> Vec<NodeRow> {
    reports
        .iter()
        .flat_map(|report| &report.curves)
        .flat_map(|curve| {
            curve
                .times
                .iter()
                .zip(&curve.yields)
                .zip(&curve.discount_factors)
                .map(|((&time, &zero_yield), &discount_factor)| NodeRow {
                    curve: curve.name.clone(),
                    time,
                    zero_yield_display: format_percent(zero_yield),
                    zero_yield,
                    discount_factor,
                })
        })
        .collect()
}

/// Row and column labels `curve@time` for a stage's unknowns.
fn node_labels(report: &CalibrationReport) -> Vec<String> {
    report
        .curves
        .iter()
        .flat_map(|curve| curve.times.iter().map(move |t| format!("{}@{t}", curve.name)))
        .collect()
}

fn print_reports(reports: &[CalibrationReport], format: OutputFormat, quiet: bool) -> Result<()> {
    match format {
        OutputFormat::Table => {
            for report in reports {
                if !quiet {
                    let title = match &report.stage {
                        Some(stage) => format!("Stage '{stage}'"),
                        None => "Calibration Summary".to_string(),
                    };
                    print_header(&title);
                    let summary = vec![
                        KeyValue::new("Root finder", report.root_finder.clone()),
                        KeyValue::new("Iterations", report.iterations.to_string()),
                        KeyValue::new("Residual", format!("{:.3e}", report.residual)),
                        KeyValue::new("Parameters", report.parameters.len().to_string()),
                    ];
                    print_output(&summary, format)?;
                }
                print_output(&node_rows(std::slice::from_ref(report)), format)?;

                let labels = node_labels(report);
                if let Some(jacobian) = &report.jacobian {
                    if !quiet {
                        print_header("Jacobian");
                    }
                    print_matrix(&labels, &labels, jacobian);
                }
                for (upstream, matrix) in &report.transitions {
                    if !quiet {
                        print_header(&format!("Transition to '{upstream}'"));
                    }
                    let columns: Vec<String> =
                        (0..matrix.first().map_or(0, Vec::len)).map(|j| format!("{upstream}[{j}]")).collect();
                    print_matrix(&labels, &columns, matrix);
                }
            }
            Ok(())
        }
        OutputFormat::Json => {
            if let [single] = reports {
                if single.stage.is_none() {
                    return print_json(single);
                }
            }
            print_json(reports)
        }
        OutputFormat::Csv => print_output(&node_rows(reports), format),
        OutputFormat::Minimal => {
            for report in reports {
                let values: Vec<String> = report.parameters.iter().map(|v| format!("{v:.12}")).collect();
                println!("{}", values.join(" "));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(request: &str) -> CalibrateArgs {
        CalibrateArgs {
            request: PathBuf::from(request),
            config: None,
            root_finder: None,
            jacobian: None,
            decomposition: None,
            tolerance: None,
            max_iterations: None,
            show_jacobian: false,
        }
    }

    const REQUEST: &str = r#"
        [config]
        root_finder = "broyden"
        max_iterations = 40

        [[curves]]
        name = "USD-OIS"
        times = [1.0]

        [[instruments]]
        type = "cash"
        curve = "USD-OIS"
        maturity = 1.0
        rate = 0.03
    "#;

    #[test]
    fn test_flags_override_request_config() {
        let request = CalibrationRequest::from_toml_str(REQUEST).unwrap();

        let config = resolve_config(&args("unused.toml"), &request).unwrap();
        assert_eq!(config.root_finder, RootFinderKind::Broyden);
        assert_eq!(config.max_iterations, 40);

        let mut overridden = args("unused.toml");
        overridden.root_finder = Some(RootFinderChoice::ShermanMorrison);
        overridden.tolerance = Some(1e-12);
        let config = resolve_config(&overridden, &request).unwrap();
        assert_eq!(config.root_finder, RootFinderKind::ShermanMorrison);
        assert_eq!(config.abs_tolerance, 1e-12);
        assert_eq!(config.max_iterations, 40);

        overridden.max_iterations = Some(0);
        assert!(resolve_config(&overridden, &request).is_err());
    }

    #[test]
    fn test_report_layout() {
        let request = CalibrationRequest::from_toml_str(REQUEST).unwrap();
        let calculator = request.calculator.calculator();
        let data = request.calibration_data(calculator.as_ref()).unwrap();
        let output = BootstrapOrchestrator::from_shared(calculator)
            .calibrate(&data, None)
            .unwrap();

        let calibrated = report(None, &output, &request.curves, true).unwrap();
        assert_eq!(calibrated.curves.len(), 1);
        // d(par rate)/d(zero yield) of a deposit is 1 / DF.
        let jacobian = calibrated.jacobian.as_ref().unwrap();
        assert_eq!(jacobian.len(), 1);
        assert!((jacobian[0][0] - 1.03).abs() < 1e-6);
        assert_eq!(node_labels(&calibrated), vec!["USD-OIS@1".to_string()]);

        let rows = node_rows(std::slice::from_ref(&calibrated));
        assert_eq!(rows.len(), 1);
        assert!((rows[0].discount_factor - 1.0 / 1.03).abs() < 1e-7);
    }
}
