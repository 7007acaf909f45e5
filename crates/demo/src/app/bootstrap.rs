use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::scenario::{Scenario, ScenarioError};

pub(crate) const SCENARIO_ENV_VAR: &str = "GLOAM_SCENARIO";
const DEFAULT_SCENARIO_REL_PATH: [&str; 3] = ["assets", "scenarios", "crypt.json"];

#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error(
        "Could not find assets/scenarios/crypt.json above {start_dir}\n\
Set {env_var} to a scenario file, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/scenario.json\""
    )]
    ScenarioNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

pub(crate) struct AppWiring {
    pub(crate) scenario_path: PathBuf,
    pub(crate) scenario: Scenario,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Gloam Lighting Demo ===");

    let scenario_path = resolve_scenario_path()?;
    let scenario = Scenario::load(&scenario_path)?;
    info!(
        path = %scenario_path.display(),
        scenario = scenario.display_name(),
        steps = scenario.steps.len(),
        "scenario_loaded"
    );

    Ok(AppWiring {
        scenario_path,
        scenario,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn resolve_scenario_path() -> Result<PathBuf, StartupError> {
    match env::var(SCENARIO_ENV_VAR) {
        Ok(value) => Ok(PathBuf::from(value)),
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe.parent().map(Path::to_path_buf).unwrap_or_default();
            let search_roots = env::current_dir().into_iter().chain([exe_dir.clone()]);
            for start in search_roots {
                if let Some(found) = find_default_scenario(&start) {
                    return Ok(found);
                }
            }
            Err(StartupError::ScenarioNotFound {
                start_dir: exe_dir,
                env_var: SCENARIO_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: SCENARIO_ENV_VAR,
            source,
        }),
    }
}

fn find_default_scenario(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|candidate| {
        let path = DEFAULT_SCENARIO_REL_PATH
            .iter()
            .fold(candidate.to_path_buf(), |path, part| path.join(part));
        path.is_file().then_some(path)
    })
}
