//! Engine configuration (spec §6.4, ambient)

use std::time::Duration;

/// The boilerplate bootstrap document (spec §6.4 default `state_bootstrap`).
pub const DEFAULT_STATE_BOOTSTRAP: &str = "\
## 現在の状態
## アクティブなFlow
## 保留中のInput
## 最近の活動
## 注意事項
";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default: number of logical CPUs.
    pub max_concurrency: usize,
    /// `None` means unbounded.
    pub queue_capacity: Option<usize>,
    pub drain_timeout: Duration,
    /// `None` means no per-workflow timeout unless overridden on the
    /// definition itself.
    pub default_workflow_timeout: Option<Duration>,
    pub state_bootstrap: String,
    /// Optional path to a declarative driver configuration file. Parsing
    /// it is a deployment concern; the engine only carries the path.
    pub driver_registry_path: Option<String>,
    /// Bound on recursive self-trigger emission depth (spec §4.8.1).
    pub max_emission_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            queue_capacity: None,
            drain_timeout: Duration::from_secs(30),
            default_workflow_timeout: None,
            state_bootstrap: DEFAULT_STATE_BOOTSTRAP.to_string(),
            driver_registry_path: None,
            max_emission_depth: 10,
        }
    }
}
