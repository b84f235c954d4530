// src/infra/paths.rs — Path management
//
// All paths respect the EDITARENA_HOME environment variable for isolation.
// When EDITARENA_HOME is set, config and data both live under that directory.
// When unset, config uses ~/.editarena/ and data uses the platform data dir.

use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<ProjectDirs> = OnceLock::new();

fn project_dirs() -> &'static ProjectDirs {
    PROJECT_DIRS.get_or_init(|| {
        ProjectDirs::from("", "", "editarena").expect("Could not determine home directory")
    })
}

/// Returns the EDITARENA_HOME override, if set.
fn arena_home() -> Option<PathBuf> {
    std::env::var_os("EDITARENA_HOME").map(PathBuf::from)
}

/// Configuration directory: $EDITARENA_HOME/ or ~/.editarena/
pub fn config_dir() -> PathBuf {
    if let Some(home) = arena_home() {
        return home;
    }
    dirs_home().join(".editarena")
}

/// Data directory: $EDITARENA_HOME/data/ or the platform-local data dir.
pub fn data_dir() -> PathBuf {
    if let Some(home) = arena_home() {
        return home.join("data");
    }
    project_dirs().data_local_dir().to_path_buf()
}

/// Home directory
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .expect("Could not determine home directory")
        .home_dir()
        .to_path_buf()
}

/// Database path
pub fn db_path() -> PathBuf {
    data_dir().join("editarena.db")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    for dir in [config_dir(), data_dir()] {
        tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
}
