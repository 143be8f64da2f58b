use metrics_exporter_prometheus::PrometheusHandle;
use screening::config::ScreeningConfig;
use screening::error::AppError;
use screening::methodology::schema::{default_params, default_template, read_json_document};
use screening::methodology::{build_root_methodology, RootMethodology};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Where the root methodology comes from. Unset paths fall back to the built-in
/// template and parameters.
#[derive(Debug, Clone, Default)]
pub(crate) struct MethodologySource {
    pub(crate) template: Option<PathBuf>,
    pub(crate) params: Option<PathBuf>,
}

impl MethodologySource {
    pub(crate) fn from_config(config: &ScreeningConfig) -> Self {
        Self {
            template: config.template_path.clone(),
            params: config.params_path.clone(),
        }
    }

    /// Command-line paths win over configured ones.
    pub(crate) fn overridden_by(
        mut self,
        template: Option<PathBuf>,
        params: Option<PathBuf>,
    ) -> Self {
        if template.is_some() {
            self.template = template;
        }
        if params.is_some() {
            self.params = params;
        }
        self
    }

    pub(crate) fn load(&self) -> Result<RootMethodology, AppError> {
        let template = match &self.template {
            Some(path) => read_json_document(path)?,
            None => default_template(),
        };

        let params = match &self.params {
            Some(path) => read_json_document(path)?,
            None => default_params(),
        };
        let root = build_root_methodology(&template, &params)?;

        info!(
            version = root.version(),
            template = %describe(self.template.as_deref()),
            params = %describe(self.params.as_deref()),
            "root methodology loaded"
        );
        Ok(root)
    }
}

fn describe(path: Option<&Path>) -> String {
    path.map(|path| path.display().to_string())
        .unwrap_or_else(|| "built-in".to_string())
}

/// Read a JSON file into any deserializable payload.
pub(crate) fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
