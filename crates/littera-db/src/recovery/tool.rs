//! Locates the write-ahead log reset tool.

use std::fs;
use std::path::{Path, PathBuf};

use littera_config::{ClusterConfig, executable_name};
use tracing::debug;

use super::{RECOVERY_TARGET, RecoveryActionError};

/// File stem of the reset tool.
pub const RESET_TOOL_STEM: &str = "pg_resetwal";

const KNOWN_PREFIXES: &[&str] = &[
    "/opt/homebrew/bin",
    "/usr/local/bin",
    "/usr/bin",
    "/usr/local/pgsql/bin",
    "/Applications/Postgres.app/Contents/Versions/latest/bin",
];

const DEBIAN_VERSIONS_DIR: &str = "/usr/lib/postgresql";

/// Where to look for the reset tool beyond the configured hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetToolSearch {
    search_path: bool,
    prefixes: Vec<PathBuf>,
}

impl ResetToolSearch {
    /// Consults `PATH` and the usual installation prefixes.
    #[must_use]
    pub fn system() -> Self {
        let mut prefixes: Vec<PathBuf> = KNOWN_PREFIXES.iter().map(PathBuf::from).collect();
        prefixes.extend(versioned_prefixes(Path::new(DEBIAN_VERSIONS_DIR)));
        Self {
            search_path: true,
            prefixes,
        }
    }

    /// Consults only the given prefixes, never `PATH`.
    #[must_use]
    pub fn only(prefixes: Vec<PathBuf>) -> Self {
        Self {
            search_path: false,
            prefixes,
        }
    }
}

impl Default for ResetToolSearch {
    fn default() -> Self {
        Self::system()
    }
}

/// Finds the reset tool using [`ResetToolSearch::system`].
///
/// # Errors
///
/// Returns [`RecoveryActionError::ToolNotFound`] listing every location
/// checked.
pub fn locate_reset_tool(config: &ClusterConfig) -> Result<PathBuf, RecoveryActionError> {
    locate_reset_tool_with(config, &ResetToolSearch::system())
}

/// Finds the reset tool: the configured hint, the control executable's
/// directory, `PATH`, then the search prefixes.
///
/// # Errors
///
/// Returns [`RecoveryActionError::ToolNotFound`] listing every location
/// checked.
pub fn locate_reset_tool_with(
    config: &ClusterConfig,
    search: &ResetToolSearch,
) -> Result<PathBuf, RecoveryActionError> {
    let name = executable_name(RESET_TOOL_STEM);
    let mut searched = Vec::new();

    let mut candidates: Vec<PathBuf> = Vec::new();
    candidates.extend(config.reset_exe_path().map(Path::to_path_buf));
    candidates.extend(
        config
            .control_exe_path()
            .parent()
            .map(|dir| dir.join(&name)),
    );
    for candidate in candidates {
        if let Some(found) = check(&candidate, &mut searched) {
            return Ok(found);
        }
    }

    if search.search_path {
        match which::which(&name) {
            Ok(found) => return Ok(found),
            Err(_) => searched.push(PathBuf::from(format!("$PATH/{name}"))),
        }
    }

    for prefix in &search.prefixes {
        if let Some(found) = check(&prefix.join(&name), &mut searched) {
            return Ok(found);
        }
    }

    Err(RecoveryActionError::ToolNotFound { searched })
}

fn check(candidate: &Path, searched: &mut Vec<PathBuf>) -> Option<PathBuf> {
    if candidate.is_file() {
        debug!(target: RECOVERY_TARGET, tool = %candidate.display(), "found reset tool");
        return Some(candidate.to_path_buf());
    }
    searched.push(candidate.to_path_buf());
    None
}

/// `bin` directories of side-by-side installations, newest version first.
fn versioned_prefixes(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut versions: Vec<(u32, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let version = entry.file_name().to_str()?.parse::<u32>().ok()?;
            Some((version, entry.path().join("bin")))
        })
        .collect();
    versions.sort_by(|left, right| right.0.cmp(&left.0));
    versions.into_iter().map(|(_, path)| path).collect()
}
