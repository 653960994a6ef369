//! Renderer module
//!
//! Renders ResultSet to different output formats: jsonl, json, md, raw

use crate::core::model::{Kind, ResultItem, ResultSet};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Json,
    Markdown,
    Raw,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" => Ok(OutputFormat::Jsonl),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            "raw" => Ok(OutputFormat::Raw),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Render configuration combining format and options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl RenderConfig {
    pub fn with_pretty(format: OutputFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }
}

/// Renderer for result sets
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a result set to a string
    pub fn render(&self, result_set: &ResultSet) -> String {
        match self.config.format {
            OutputFormat::Jsonl => self.render_jsonl(result_set),
            OutputFormat::Json => self.render_json(result_set),
            OutputFormat::Markdown => self.render_markdown(result_set),
            OutputFormat::Raw => self.render_raw(result_set),
        }
    }

    /// One JSON object per line
    fn render_jsonl(&self, result_set: &ResultSet) -> String {
        result_set
            .items
            .iter()
            .filter_map(|item| {
                if self.config.pretty {
                    serde_json::to_string_pretty(item).ok()
                } else {
                    serde_json::to_string(item).ok()
                }
            })
            .collect::<Vec<_>>()
            .join(if self.config.pretty { "\n\n" } else { "\n" })
    }

    fn render_json(&self, result_set: &ResultSet) -> String {
        if self.config.pretty {
            serde_json::to_string_pretty(&result_set.items).unwrap_or_else(|_| "[]".to_string())
        } else {
            serde_json::to_string(&result_set.items).unwrap_or_else(|_| "[]".to_string())
        }
    }

    /// Render as Markdown, one section per record kind
    fn render_markdown(&self, result_set: &ResultSet) -> String {
        let mut output = String::new();

        let of_kind = |kind: Kind| -> Vec<&ResultItem> {
            result_set
                .items
                .iter()
                .filter(|item| item.kind == kind)
                .collect()
        };

        let errors = of_kind(Kind::Error);
        if !errors.is_empty() {
            output.push_str("## Errors\n\n");
            for item in errors {
                for error in &item.errors {
                    output.push_str(&format!("- **{}**: {}", error.code, error.message));
                    if let Some(path) = &item.path {
                        output.push_str(&format!(" (`{}`)", path));
                    }
                    output.push('\n');
                }
            }
            output.push('\n');
        }

        let warnings = of_kind(Kind::Warning);
        if !warnings.is_empty() {
            output.push_str("## Warnings\n\n");
            for item in warnings {
                let path = item.path.as_deref().unwrap_or("-");
                for warning in &item.errors {
                    output.push_str(&format!(
                        "- `{}` **{}**: {}\n",
                        path, warning.code, warning.message
                    ));
                }
            }
            output.push('\n');
        }

        let items = of_kind(Kind::Item);
        if !items.is_empty() {
            output.push_str("## Items\n\n");
            for item in items {
                if let Some(path) = &item.path {
                    output.push_str(&format!("- `{}`", path));
                    if let Some(size) = item.size {
                        output.push_str(&format!(" ({} tokens)", size));
                    }
                    if item.meta.lossy {
                        output.push_str(" [lossy]");
                    }
                    output.push('\n');
                }
            }
            output.push('\n');
        }

        let chunks = of_kind(Kind::Chunk);
        if !chunks.is_empty() {
            output.push_str("## Chunks\n\n");
            for item in chunks {
                self.render_chunk_md(&mut output, item);
            }
        }

        let unplaced = of_kind(Kind::Unplaced);
        if !unplaced.is_empty() {
            output.push_str("## Unplaced\n\n");
            for item in unplaced {
                output.push_str(&format!(
                    "- `{}` ({} tokens): {}\n",
                    item.path.as_deref().unwrap_or("-"),
                    item.size.unwrap_or(0),
                    item.excerpt.as_deref().unwrap_or("")
                ));
            }
            output.push('\n');
        }

        output
    }

    fn render_chunk_md(&self, output: &mut String, item: &ResultItem) {
        output.push_str(&format!(
            "### Chunk {} ({} tokens)\n",
            item.chunk.unwrap_or(0),
            item.size.unwrap_or(0)
        ));

        let members = item
            .data
            .as_ref()
            .and_then(|data| data.get("members"))
            .and_then(|members| members.as_array());
        if let Some(members) = members {
            output.push('\n');
            for member in members.iter().filter_map(|m| m.as_str()) {
                output.push_str(&format!("- `{}`\n", member));
            }
        }

        if let Some(excerpt) = &item.excerpt {
            output.push_str("\n```\n");
            output.push_str(excerpt);
            if !excerpt.ends_with('\n') {
                output.push('\n');
            }
            output.push_str("```\n");
        }

        output.push('\n');
    }

    /// Raw mode: chunk texts only, for piping into another tool
    fn render_raw(&self, result_set: &ResultSet) -> String {
        result_set
            .items
            .iter()
            .filter(|item| item.kind == Kind::Chunk)
            .filter_map(|item| item.excerpt.clone())
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}
