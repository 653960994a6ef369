//! Doctor - tokenizer availability checks

use anyhow::Result;

use crate::core::model::{Diagnostic, ResultItem, ResultSet};
use crate::core::render::{RenderConfig, Renderer};
use crate::core::tokenizer::{encoding_status, TokenModel};

/// Availability of one BPE encoding
#[derive(Debug, Clone)]
pub struct EncodingStatus {
    pub name: String,
    pub available: bool,
    /// Models that count with this encoding
    pub models: Vec<String>,
    pub error: Option<String>,
}

impl EncodingStatus {
    pub fn to_result_item(&self) -> ResultItem {
        let status = if self.available { "✓" } else { "✗" };
        let message = format!(
            "{} {} (used by {})",
            status,
            self.name,
            self.models.join(", ")
        );

        match &self.error {
            Some(error) => ResultItem::error(Diagnostic::new("ENCODING_UNAVAILABLE", error))
                .with_path(&self.name)
                .with_excerpt(format!(
                    "{}\n  Note: counts fall back to the heuristic estimate",
                    message
                )),
            None => ResultItem::item(&self.name, 0).with_excerpt(message),
        }
    }
}

/// Load every encoding and report which ones work
pub fn check_encodings() -> Vec<EncodingStatus> {
    encoding_status()
        .into_iter()
        .map(|(name, error)| {
            let models = TokenModel::available_models()
                .iter()
                .filter_map(|m| m.parse::<TokenModel>().ok())
                .filter(|model| model.encoding().map(|e| e.label()) == Some(name))
                .map(|model| model.to_string())
                .collect();
            EncodingStatus {
                name: name.to_string(),
                available: error.is_none(),
                models,
                error,
            }
        })
        .collect()
}

/// Run the doctor command
pub fn run_doctor(render_config: RenderConfig) -> Result<()> {
    let statuses = check_encodings();
    let result_set: ResultSet = statuses.iter().map(EncodingStatus::to_result_item).collect();

    let renderer = Renderer::with_config(render_config);
    println!("{}", renderer.render(&result_set));

    if statuses.iter().any(|s| !s.available) {
        eprintln!("\n⚠️  Some encodings failed to load; token counts will be estimated.");
    }

    Ok(())
}
