use std::path::{Path, PathBuf};

use tracing::debug;
use tst_core::{Document, EnvironmentFacts};

const CONFIG_FILE: &str = "CCAST_.CFG";
const REPOSITORY_OPTION: &str = "VCAST_REPOSITORY:";

/// A requirements gateway is present when the environment's parent directory
/// holds a `CCAST_.CFG` whose `VCAST_REPOSITORY:` points at a repository with
/// `requirements_gateway/requirements.json`.
pub(crate) fn requirements_gateway_exists(enviro_path: &Path) -> bool {
    let Some(parent) = enviro_path.parent() else {
        return false;
    };
    let cfg_path = parent.join(CONFIG_FILE);
    let contents = match std::fs::read_to_string(&cfg_path) {
        Ok(contents) => contents,
        Err(e) => {
            debug!("no configuration at {}: {e}", cfg_path.display());
            return false;
        }
    };
    let Some(repository) = repository_path(&contents) else {
        debug!("{REPOSITORY_OPTION} missing or empty in {}", cfg_path.display());
        return false;
    };
    let requirements = repository.join("requirements_gateway").join("requirements.json");
    let found = requirements.is_file();
    if !found {
        debug!("requirements.json not found at {}", requirements.display());
    }
    found
}

// the value may itself contain colons (drive letters)
fn repository_path(cfg: &str) -> Option<PathBuf> {
    cfg.lines()
        .find_map(|line| line.strip_prefix(REPOSITORY_OPTION))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Facts for a script at `script`. A script that names no environment has no
/// gateway; an unknown location leaves the facts unknown.
pub(crate) fn script_facts(script: Option<&Path>, document: &Document) -> EnvironmentFacts {
    let Some(dir) = script.map(|p| p.parent().unwrap_or(Path::new(""))) else {
        return EnvironmentFacts::default();
    };
    let present = document
        .environment_name()
        .is_some_and(|name| requirements_gateway_exists(&dir.join(name)));
    EnvironmentFacts::default().with_requirements_gateway(present)
}
