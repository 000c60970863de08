use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Directory (relative to the project root) holding the store and config.
pub const PROJECT_DIR: &str = ".scholar";

/// Store database file name inside [`PROJECT_DIR`].
pub const STORE_FILE: &str = "scholar.db";

/// Path of the `SQLite` store for a project root.
#[must_use]
pub fn store_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join(STORE_FILE)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub recommend: RecommendConfig,
}

/// How lexical and vector result lists are merged into one ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FusionStrategy {
    /// Min-max normalize each list, then take a weighted sum.
    #[default]
    WeightedScore,
    /// Reciprocal Rank Fusion over list positions.
    Rrf,
}

impl FusionStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WeightedScore => "weighted-score",
            Self::Rrf => "rrf",
        }
    }
}

impl fmt::Display for FusionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FusionStrategy {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "weighted-score" | "weighted" | "score" => Ok(Self::WeightedScore),
            "rrf" => Ok(Self::Rrf),
            other => bail!("unknown fusion strategy '{other}' (expected weighted-score or rrf)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub fusion: FusionStrategy,
    #[serde(default = "default_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,
    /// Each index is asked for `limit * oversample` candidates before fusion.
    #[serde(default = "default_oversample")]
    pub oversample: usize,
    #[serde(default = "default_true")]
    pub semantic: bool,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fusion: FusionStrategy::default(),
            lexical_weight: default_weight(),
            vector_weight: default_weight(),
            rrf_k: default_rrf_k(),
            oversample: default_oversample(),
            semantic: default_true(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    #[serde(default = "default_trending_window_days")]
    pub trending_window_days: u32,
    /// Feedback at or above this rating counts as positive engagement.
    #[serde(default = "default_min_positive_rating")]
    pub min_positive_rating: f64,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            trending_window_days: default_trending_window_days(),
            min_positive_rating: default_min_positive_rating(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

/// Load `.scholar/config.toml`, falling back to defaults when it is absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the per-user config from the OS config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("scholar/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

const fn default_true() -> bool {
    true
}

const fn default_weight() -> f64 {
    0.5
}

const fn default_rrf_k() -> u32 {
    60
}

const fn default_oversample() -> usize {
    4
}

const fn default_embedding_dim() -> usize {
    384
}

const fn default_trending_window_days() -> u32 {
    30
}

const fn default_min_positive_rating() -> f64 {
    3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cfg = load_project_config(dir.path()).expect("load should succeed");
        assert_eq!(cfg.search.fusion, FusionStrategy::WeightedScore);
        assert!((cfg.search.lexical_weight - 0.5).abs() < f64::EPSILON);
        assert!((cfg.search.vector_weight - 0.5).abs() < f64::EPSILON);
        assert_eq!(cfg.search.rrf_k, 60);
        assert_eq!(cfg.search.oversample, 4);
        assert!(cfg.search.semantic);
        assert_eq!(cfg.search.embedding_dim, 384);
        assert_eq!(cfg.recommend.trending_window_days, 30);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let scholar_dir = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&scholar_dir).expect("create .scholar");
        std::fs::write(
            scholar_dir.join("config.toml"),
            "[search]\nfusion = \"rrf\"\nrrf_k = 20\n",
        )
        .expect("write config");

        let cfg = load_project_config(dir.path()).expect("load");
        assert_eq!(cfg.search.fusion, FusionStrategy::Rrf);
        assert_eq!(cfg.search.rrf_k, 20);
        assert_eq!(cfg.search.oversample, 4);
        assert_eq!(cfg.recommend.trending_window_days, 30);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let scholar_dir = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&scholar_dir).expect("create .scholar");
        std::fs::write(scholar_dir.join("config.toml"), "[search\nfusion = ")
            .expect("write config");

        let err = load_project_config(dir.path()).expect_err("parse should fail");
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn fusion_strategy_parses_aliases() {
        assert_eq!(
            "weighted-score".parse::<FusionStrategy>().expect("parse"),
            FusionStrategy::WeightedScore
        );
        assert_eq!(
            " RRF ".parse::<FusionStrategy>().expect("parse"),
            FusionStrategy::Rrf
        );
        assert!("borda".parse::<FusionStrategy>().is_err());
    }

    #[test]
    fn fusion_strategy_serializes_kebab_case() {
        let json = serde_json::to_string(&FusionStrategy::WeightedScore).expect("serialize");
        assert_eq!(json, "\"weighted-score\"");
        assert_eq!(FusionStrategy::Rrf.to_string(), "rrf");
    }

    #[test]
    fn store_path_lives_under_project_dir() {
        let path = store_path(Path::new("/tmp/proj"));
        assert_eq!(path, PathBuf::from("/tmp/proj/.scholar/scholar.db"));
    }
}
