use std::process::ExitCode;

use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut engine = match app.scenario.build_engine() {
        Ok(engine) => engine,
        Err(err) => {
            error!(
                path = %app.scenario_path.display(),
                error = %err,
                "scenario_setup_failed"
            );
            return ExitCode::FAILURE;
        }
    };
    let summary = app.scenario.run(&mut engine);
    info!(
        scenario = app.scenario.display_name(),
        ticks = summary.ticks,
        zone_changes = summary.zone_changes.len(),
        battery_depletions = summary.battery_depletions,
        tints_applied = summary.tints_applied,
        tints_cleared = summary.tints_cleared,
        final_level = summary.final_level,
        final_zone = %summary.final_zone,
        "scenario_finished"
    );
    for line in engine.debug_snapshot().render_lines() {
        info!("{line}");
    }

    ExitCode::SUCCESS
}
