use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target_directory: PathBuf,
    pub ignore_directories: Vec<String>,
    pub ignore_files: Vec<String>,
    pub file_extensions: Vec<String>,
    pub max_file_size: usize,
    pub remote: RemoteConfig,
    pub analysis: AnalysisConfig,
    pub layout: LayoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub api_base_url: String,
    pub raw_base_url: String,
    pub token: Option<String>,
    pub concurrency: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub parallel: bool,
    /// Upper bound on extraction workers; 0 means one per CPU.
    pub max_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub block: BlockLayoutConfig,
    pub force: ForceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockLayoutConfig {
    pub canvas_width: f64,
    pub block_width: f64,
    pub block_height: f64,
    pub gap: f64,
    pub band_header: f64,
    pub margin: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    pub width: u32,
    pub height: u32,
    pub link_distance: f64,
    pub link_strength: f64,
    pub charge_strength: f64,
    /// Barnes-Hut opening angle; 0 computes every pair exactly.
    pub theta: f64,
    pub center_strength: f64,
    pub collision_padding: f64,
    pub base_radius: f64,
    pub radius_per_complexity: f64,
    pub max_radius_bonus: f64,
    pub velocity_decay: f64,
    pub alpha_min: f64,
    pub energy_threshold: f64,
    pub max_ticks: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_directory: PathBuf::from("."),
            ignore_directories: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "dist".to_string(),
                "build".to_string(),
                "out".to_string(),
                "target".to_string(),
                "coverage".to_string(),
                ".next".to_string(),
                ".nuxt".to_string(),
                ".cache".to_string(),
                "__pycache__".to_string(),
                ".venv".to_string(),
                "venv".to_string(),
                "vendor".to_string(),
                ".idea".to_string(),
                ".vscode".to_string(),
            ],
            ignore_files: vec![
                "package-lock.json".to_string(),
                "yarn.lock".to_string(),
                "pnpm-lock.yaml".to_string(),
                "composer.lock".to_string(),
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
            ],
            file_extensions: vec![
                "js".to_string(),
                "jsx".to_string(),
                "mjs".to_string(),
                "cjs".to_string(),
                "ts".to_string(),
                "tsx".to_string(),
                "py".to_string(),
                "c".to_string(),
                "h".to_string(),
                "cpp".to_string(),
                "cc".to_string(),
                "cxx".to_string(),
                "hpp".to_string(),
                "json".to_string(),
                "css".to_string(),
                "scss".to_string(),
                "html".to_string(),
                "htm".to_string(),
                "md".to_string(),
                "yaml".to_string(),
                "yml".to_string(),
            ],
            max_file_size: 1024 * 1024, // 1MB
            remote: RemoteConfig::default(),
            analysis: AnalysisConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            raw_base_url: "https://raw.githubusercontent.com".to_string(),
            token: None,
            concurrency: 8,
            timeout_seconds: 30,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_threads: 0,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            block: BlockLayoutConfig::default(),
            force: ForceConfig::default(),
        }
    }
}

impl Default for BlockLayoutConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1200.0,
            block_width: 220.0,
            block_height: 110.0,
            gap: 30.0,
            band_header: 40.0,
            margin: 40.0,
        }
    }
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 640,
            link_distance: 100.0,
            link_strength: 0.3,
            charge_strength: -300.0,
            theta: 0.9,
            center_strength: 0.05,
            collision_padding: 6.0,
            base_radius: 20.0,
            radius_per_complexity: 2.0,
            max_radius_bonus: 20.0,
            velocity_decay: 0.4,
            alpha_min: 0.001,
            energy_threshold: 0.05,
            max_ticks: 600,
        }
    }
}

impl Config {
    /// Get the default config file path (~/.arch-mapper.toml)
    pub fn default_config_path() -> crate::Result<PathBuf> {
        let home_dir = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(PathBuf::from(home_dir).join(".arch-mapper.toml"))
    }

    /// Load config from the default location, falling back to defaults if it doesn't exist
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::default_config_path()?;

        let mut config = if config_path.exists() {
            info!(path = %config_path.display(), "loading configuration");
            Self::from_file(&config_path)?
        } else {
            info!(path = %config_path.display(), "no config file found, using defaults");
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific file path
    pub fn from_file(path: &PathBuf) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Token from the environment fills in when the file leaves it unset.
    fn apply_env(&mut self) {
        if self.remote.token.is_none() {
            self.remote.token = env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        }
    }

    /// Save config to a file
    pub fn to_file(&self, path: &PathBuf) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create a config file with all available options documented
    pub fn create_documented_config() -> String {
        r#"# arch-mapper configuration file

# Directory analyzed when no --path or --repo is given
target_directory = "."

# Directory names skipped anywhere in the tree
ignore_directories = [
    "node_modules", ".git", "dist", "build", "out", "target", "coverage",
    ".next", ".nuxt", ".cache", "__pycache__", ".venv", "venv", "vendor",
    ".idea", ".vscode"
]

# Exact file names skipped
ignore_files = ["package-lock.json", "yarn.lock", "pnpm-lock.yaml", "composer.lock", ".DS_Store", "Thumbs.db"]

# Extensions handed to the language extractors
file_extensions = [
    "js", "jsx", "mjs", "cjs", "ts", "tsx", "py",
    "c", "h", "cpp", "cc", "cxx", "hpp",
    "json", "css", "scss", "html", "htm", "md", "yaml", "yml"
]

# Maximum file size to analyze (in bytes, default 1MB)
max_file_size = 1048576

[remote]
api_base_url = "https://api.github.com"
raw_base_url = "https://raw.githubusercontent.com"
# Bearer token for private repositories and higher rate limits.
# Falls back to the GITHUB_TOKEN environment variable.
# token = "ghp_..."
# Maximum concurrent file downloads
concurrency = 8
timeout_seconds = 30

[analysis]
# Extract files on a worker pool
parallel = true
# 0 = one worker per CPU
max_threads = 0

[layout.block]
canvas_width = 1200.0
block_width = 220.0
block_height = 110.0
gap = 30.0
band_header = 40.0
margin = 40.0

[layout.force]
width = 960
height = 640
link_distance = 100.0
link_strength = 0.3
charge_strength = -300.0
# Barnes-Hut approximation for repulsion; 0 = exact (slow on large graphs)
theta = 0.9
center_strength = 0.05
collision_padding = 6.0
base_radius = 20.0
radius_per_complexity = 2.0
max_radius_bonus = 20.0
velocity_decay = 0.4
alpha_min = 0.001
energy_threshold = 0.05
max_ticks = 600
"#
        .to_string()
    }
}
