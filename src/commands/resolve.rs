use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ResolveArgs;
use crate::model::{ResolvedParameters, SettingsDocument};
use crate::settings::{SettingsResolution, match_window, resolve_settings};
use crate::util::read_json;

#[derive(Debug, Serialize)]
struct ResolveResponse {
    angle: f64,
    window_min: f64,
    window_max: f64,
    instrument: String,
    matched_row: String,
    parameters: ResolvedParameters,
}

pub fn run(args: ResolveArgs) -> Result<()> {
    let document: SettingsDocument = read_json(&args.settings)?;
    let resolution = resolve_settings(&document, args.angle, &args.instrument)
        .with_context(|| format!("failed to resolve settings from {}", args.settings.display()))?;

    info!(angle = args.angle, matched_row = %resolution.matched_row, "resolved per-angle settings");

    if args.json {
        write_json_response(&args, resolution)
    } else {
        write_text_response(&args, &resolution)
    }
}

fn write_json_response(args: &ResolveArgs, resolution: SettingsResolution) -> Result<()> {
    let (window_min, window_max) = match_window(args.angle);
    let response = ResolveResponse {
        angle: args.angle,
        window_min,
        window_max,
        instrument: args.instrument.clone(),
        matched_row: resolution.matched_row,
        parameters: resolution.parameters,
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, &response)
        .context("failed to serialize resolve json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(args: &ResolveArgs, resolution: &SettingsResolution) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    render_text(&mut output, args.angle, resolution)?;
    output.flush()?;
    Ok(())
}

fn render_text(output: &mut impl Write, angle: f64, resolution: &SettingsResolution) -> Result<()> {
    let (window_min, window_max) = match_window(angle);
    let p = &resolution.parameters;

    writeln!(output, "Angle: {angle} (window {window_min:.6}..={window_max:.6})")?;
    writeln!(output, "Matched: {}", resolution.matched_row)?;
    writeln!(output, "\tAnalysisMode\t{}", p.analysis_mode)?;
    writeln!(output, "\tFirstTransmissionRunList\t{}", p.first_transmission_run_list)?;
    writeln!(output, "\tSecondTransmissionRunList\t{}", p.second_transmission_run_list)?;
    writeln!(
        output,
        "\tTransmissionProcessingInstructions\t{}",
        p.transmission_processing_instructions
    )?;
    writeln!(output, "\tProcessingInstructions\t{}", p.processing_instructions)?;
    writeln!(output, "\tStartOverlap\t{}", p.start_overlap)?;
    writeln!(output, "\tEndOverlap\t{}", p.end_overlap)?;
    writeln!(output, "\tScaleRHSWorkspace\t{}", p.scale_rhs_workspace)?;
    writeln!(
        output,
        "\tMonitorIntegrationWavelength\t{}..{}",
        p.monitor_integration_wavelength_min, p.monitor_integration_wavelength_max
    )?;
    writeln!(
        output,
        "\tMonitorBackgroundWavelength\t{}..{}",
        p.monitor_background_wavelength_min, p.monitor_background_wavelength_max
    )?;
    writeln!(output, "\tWavelength\t{}..{}", p.wavelength_min, p.wavelength_max)?;
    writeln!(output, "\tI0MonitorIndex\t{}", p.i_zero_monitor_index)?;
    writeln!(output, "\tDetectorCorrectionType\t{}", p.detector_correction_type)?;

    Ok(())
}
