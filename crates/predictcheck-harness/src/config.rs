use std::time::Duration;

pub const DEFAULT_SERVER: &str = "http://localhost:9876";
pub const DEFAULT_DATA_DIR: &str = "convert_predict_data";

/// Which models to check, on which backends, against which fixture server.
#[derive(Clone, Debug)]
pub struct SuiteConfig {
    pub server: String,
    pub data_dir: String,
    pub models: Vec<String>,
    pub backends: Vec<String>,
    /// Overrides the active backend's default tolerance.
    pub epsilon: Option<f64>,
    pub timeout: Duration,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            data_dir: DEFAULT_DATA_DIR.to_string(),
            models: Vec::new(),
            backends: vec!["cpu".to_string()],
            epsilon: None,
            timeout: Duration::from_secs(60),
        }
    }
}
