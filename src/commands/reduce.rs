use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::angle::resolve_angle;
use crate::cli::ReduceArgs;
use crate::mantid::{MantidProcess, ReductionBackend, ReductionRequest, nexus_path};
use crate::model::{ReductionRunManifest, SettingsDocument, SettingsProvenance};
use crate::settings::resolve_settings;
use crate::util::{
    copy_into_directory, ensure_directory, now_utc_string, read_json, sha256_file,
    utc_compact_string, write_json_pretty,
};

const MANIFEST_VERSION: u32 = 1;

pub fn run(args: ReduceArgs) -> Result<()> {
    let backend = MantidProcess::new(args.backend.python.clone());
    if let Some(manifest_path) = execute(&args, &backend)? {
        info!(path = %manifest_path.display(), "wrote reduction manifest");
    }
    Ok(())
}

/// Run one reduction against `backend`. Returns the manifest path, or `None`
/// for a dry run.
pub fn execute(args: &ReduceArgs, backend: &dyn ReductionBackend) -> Result<Option<PathBuf>> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("reduce-{}", utc_compact_string(started_ts));

    info!(
        input = %args.input_file.display(),
        output_dir = %args.output_dir.display(),
        run_id = %run_id,
        "starting reduction"
    );

    let document: SettingsDocument = read_json(&args.settings)?;

    let angle = resolve_angle(
        backend,
        &args.input_file,
        &args.instrument,
        &args.backend.log_name,
    )
    .with_context(|| format!("failed to resolve angle for {}", args.input_file.display()))?;
    info!(run = %angle.run.run_name, theta = angle.theta, readbacks = angle.readback_count, "resolved sample angle");

    let resolution = resolve_settings(&document, angle.theta, &args.instrument)
        .with_context(|| format!("failed to resolve settings from {}", args.settings.display()))?;
    info!(
        matched_row = %resolution.matched_row,
        match_kind = ?resolution.match_kind,
        analysis_mode = %resolution.parameters.analysis_mode,
        first_transmission = %resolution.parameters.first_transmission_run_list,
        second_transmission = %resolution.parameters.second_transmission_run_list,
        detector_correction = %resolution.parameters.detector_correction_type,
        "resolved per-angle settings"
    );

    if args.dry_run {
        info!(run = %angle.run.run_name, "dry-run complete, reduction skipped");
        return Ok(None);
    }

    ensure_directory(&args.output_dir)?;

    let request = ReductionRequest {
        run: angle.run.clone(),
        input_file: args.input_file.clone(),
        theta: angle.theta,
        parameters: resolution.parameters.clone(),
    };
    let outputs = backend
        .reduce_and_save(&request, &args.output_dir)
        .with_context(|| format!("reduction failed for {}", angle.run.run_name))?;

    for workspace in [&outputs.output_workspace, &outputs.output_workspace_binned] {
        let path = nexus_path(&args.output_dir, workspace);
        if !path.exists() {
            warn!(path = %path.display(), "expected output file missing");
        }
    }

    let copied_settings = copy_into_directory(&args.settings, &args.output_dir)?;
    let settings_sha256 = sha256_file(&copied_settings)?;
    info!(path = %copied_settings.display(), "copied settings file");

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.output_dir
            .join(format!("reduction_{}.json", angle.run.run_name))
    });

    let manifest = ReductionRunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id,
        status: "completed".to_string(),
        started_at,
        finished_at: now_utc_string(),
        command: render_reduce_command(args),
        input_file: args.input_file.display().to_string(),
        output_dir: args.output_dir.display().to_string(),
        run: angle.run,
        theta: angle.theta,
        matched_row: resolution.matched_row,
        settings: SettingsProvenance {
            source_path: args.settings.display().to_string(),
            copied_to: copied_settings.display().to_string(),
            sha256: settings_sha256,
        },
        parameters: resolution.parameters,
        outputs,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(run = %manifest.run.run_name, files = manifest.outputs.files.len(), "reduction completed");

    Ok(Some(manifest_path))
}

fn render_reduce_command(args: &ReduceArgs) -> String {
    let mut command = vec![
        "inter-reduce".to_string(),
        "reduce".to_string(),
        "--input-file".to_string(),
        args.input_file.display().to_string(),
        "--output-dir".to_string(),
        args.output_dir.display().to_string(),
        "--settings".to_string(),
        args.settings.display().to_string(),
        "--instrument".to_string(),
        args.instrument.clone(),
        "--python".to_string(),
        args.backend.python.display().to_string(),
        "--log-name".to_string(),
        args.backend.log_name.clone(),
    ];

    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if args.dry_run {
        command.push("--dry-run".to_string());
    }

    command.join(" ")
}
