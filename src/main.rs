use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rs_workspace_control::config::StartupConfig;
use rs_workspace_control::controller::WorkspaceController;
use rs_workspace_control::display_loop::HeadlessLoop;
use rs_workspace_control::kinematic_tree::KinematicTree;
use rs_workspace_control::robots;
use rs_workspace_control::sub_chain::SubChain;
use rs_workspace_control::utils::format_joints;

/// Follow the sinusoidal reference with the tip of the redundant arm, keeping the joints
/// near the middle of their ranges.
#[derive(Parser, Debug)]
#[command(name = "rs-workspace-control")]
#[command(about = "Resolved-rate workspace control of a redundant arm, without the window")]
struct Args {
    /// Robot description. The built-in seven joint arm is used if not given.
    #[arg(long)]
    urdf: Option<PathBuf>,

    /// Controller setup (YAML). Defaults suit the built-in arm.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds to run
    #[arg(long, default_value = "5.0")]
    duration: f64,

    /// Frames per second
    #[arg(long, default_value = "60.0")]
    rate: f64,

    /// Pace the frames by the wall clock
    #[arg(long)]
    realtime: bool,

    /// Log every frame
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG overrides --verbose if set
    let level = if args.verbose { "debug" } else { "info" };
    let default_filter = format!("rs_workspace_control={level}");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let tree: KinematicTree = match &args.urdf {
        Some(path) => rs_workspace_control::urdf::from_urdf_file(path)
            .with_context(|| format!("Failed to read robot from {}", path.display()))?,
        None => robots::seven_dof_arm(),
    };
    let config = match &args.config {
        Some(path) => StartupConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?,
        None => StartupConfig::seven_dof_arm(),
    };
    info!("Configuration:\n{}", config.to_yaml());

    let chain = SubChain::chain_by_name(&tree, config.root.as_deref(), &config.tip)
        .context("Failed to select the controlled chain")?;
    let q = config.initial_configuration(&tree)
        .context("Failed to set the initial configuration")?;

    let mut controller = WorkspaceController::new(&tree, chain, config.options, config.solver, q)?;

    let duration = Duration::try_from_secs_f64(args.duration)
        .with_context(|| format!("Invalid duration {}", args.duration))?;
    let frame_loop = HeadlessLoop { realtime: args.realtime, ..HeadlessLoop::new(args.rate, duration) };
    let summary = frame_loop.run(&mut controller).context("Control loop stopped")?;

    info!("{} frames, {} updates", summary.frames, summary.updates);
    if let Some(report) = controller.last_report() {
        info!("Final tracking error: {:.6} m, {:.6} rad", report.position_error, report.angle_error);
    }
    let mut q_subset = vec![0.0; controller.chain().config_count()];
    tree.config_get(controller.chain().configs(), controller.configuration(), &mut q_subset)?;
    info!("Final joints (deg): {}", format_joints(&q_subset));
    Ok(())
}
