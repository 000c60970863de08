use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use scholar_core::config::{PROJECT_DIR, ProjectConfig, store_path};
use scholar_core::db::migrations::current_schema_version;
use scholar_core::db::open_store;
use serde::Serialize;

use crate::output::{OutputMode, pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Reinitialize even if `.scholar/` already exists. The store is kept;
    /// the config file is rewritten with defaults.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "scholar.db\nscholar.db-wal\nscholar.db-shm\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    root: String,
    store: String,
    config: String,
    schema_version: u32,
}

/// Execute `scholar init`. Creates the project skeleton:
///
/// ```text
/// .scholar/
///   config.toml   (default project config)
///   scholar.db    (migrated SQLite store)
///   .gitignore    (store files)
/// ```
///
/// # Errors
///
/// Returns an error if `.scholar/` already exists and `--force` is not set,
/// or if any filesystem or store operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let dir = project_root.join(PROJECT_DIR);
    if dir.exists() && !args.force {
        bail!("{PROJECT_DIR}/ already exists. Use `scholar init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config_path = dir.join("config.toml");
    let config = toml::to_string_pretty(&ProjectConfig::default())
        .context("Failed to render default config")?;
    std::fs::write(&config_path, config)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let db_path = store_path(project_root);
    let conn = open_store(&db_path)?;
    let schema_version = current_schema_version(&conn)?;

    let out = InitOutput {
        root: project_root.display().to_string(),
        store: db_path.display().to_string(),
        config: config_path.display().to_string(),
        schema_version,
    };

    render_mode(
        output,
        &out,
        |o, w| writeln!(w, "initialized\t{}\t{}", o.store, o.schema_version),
        |o, w| {
            writeln!(w, "✓ Initialized {PROJECT_DIR}/ project structure.")?;
            writeln!(w)?;
            pretty_kv(w, "Store", &o.store)?;
            pretty_kv(w, "Config", &o.config)?;
            pretty_kv(w, "Schema", format!("v{}", o.schema_version))?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  scholar import papers.json")?;
            writeln!(w, "  scholar search \"graph neural networks\"")
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_core::config::load_project_config;
    use tempfile::TempDir;

    #[test]
    fn init_creates_store_and_config() {
        let dir = TempDir::new().expect("tempdir");
        run_init(&InitArgs { force: false }, OutputMode::Json, dir.path()).expect("init");

        assert!(dir.path().join(".scholar/config.toml").is_file());
        assert!(dir.path().join(".scholar/scholar.db").is_file());
        let config = load_project_config(dir.path()).expect("config parses");
        assert_eq!(config.search.rrf_k, 60);
    }

    #[test]
    fn init_refuses_to_clobber_without_force() {
        let dir = TempDir::new().expect("tempdir");
        run_init(&InitArgs { force: false }, OutputMode::Json, dir.path()).expect("init");
        assert!(run_init(&InitArgs { force: false }, OutputMode::Json, dir.path()).is_err());
        run_init(&InitArgs { force: true }, OutputMode::Json, dir.path()).expect("force");
    }
}
