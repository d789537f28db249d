use anyhow::{Context, Result};
use tracing::info;

use crate::angle::resolve_angle;
use crate::cli::AngleArgs;
use crate::mantid::MantidProcess;

pub fn run(args: AngleArgs) -> Result<()> {
    let backend = MantidProcess::new(args.backend.python.clone());
    let angle = resolve_angle(
        &backend,
        &args.input_file,
        &args.instrument,
        &args.backend.log_name,
    )
    .with_context(|| format!("failed to resolve angle for {}", args.input_file.display()))?;

    info!(
        run = %angle.run.run_name,
        theta = angle.theta,
        readbacks = angle.readback_count,
        "resolved sample angle"
    );
    println!("{}\t{}", angle.run.run_name, angle.theta);

    Ok(())
}
