//! Handlebars rendering with shell-safe escaping.

use super::TemplateSource;
use crate::bundler::{
    error::{Error, Result},
    utils::shell,
};
use handlebars::Handlebars;
use std::path::Path;

/// Renders template sources against a configuration context.
///
/// Every `{{value}}` expansion is shell-quoted, since the rendered files are
/// shell scripts or files sourced by a shell, several of which run as root at
/// install time. Use `{{{value}}}` only for values that are validated to be
/// plain words (such as the package name). Rendering is strict: a reference
/// to a key absent from the context fails instead of expanding to nothing.
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl TemplateRenderer {
    /// Creates a renderer in strict mode with shell escaping.
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(shell::quote);
        Self { handlebars }
    }

    /// Renders inline template text; `name` identifies it in errors.
    pub fn render_str(
        &self,
        name: &str,
        template: &str,
        context: &serde_json::Value,
    ) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| Error::TemplateRender {
                template: name.to_string(),
                reason: e.to_string(),
            })
    }

    /// Reads and renders a template file.
    pub async fn render_file(&self, path: &Path, context: &serde_json::Value) -> Result<String> {
        let template = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::TemplateRender {
                template: path.display().to_string(),
                reason: format!("cannot read template source: {e}"),
            })?;
        self.render_str(&path.display().to_string(), &template, context)
    }

    /// Renders any template source.
    pub async fn render_source(
        &self,
        source: &TemplateSource,
        context: &serde_json::Value,
    ) -> Result<String> {
        match source {
            TemplateSource::Inline(text) => self.render_str("<inline>", text, context),
            TemplateSource::File(path) => self.render_file(path, context).await,
        }
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_are_shell_quoted() {
        let renderer = TemplateRenderer::new();
        let out = renderer
            .render_str(
                "hook",
                "DESCRIPTION={{description}}\nNAME={{{name}}}\n",
                &json!({ "description": "pwned\"; rm -rf / #", "name": "my-app" }),
            )
            .unwrap();
        assert_eq!(out, "DESCRIPTION='pwned\"; rm -rf / #'\nNAME=my-app\n");
    }

    #[test]
    fn missing_keys_fail_rendering() {
        let renderer = TemplateRenderer::new();
        let err = renderer
            .render_str("runner", "exec {{command}}", &json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::TemplateRender { ref template, .. } if template == "runner"));
    }

    #[tokio::test]
    async fn missing_source_file_is_a_render_error() {
        let renderer = TemplateRenderer::new();
        let err = renderer
            .render_file(Path::new("/nonexistent/default.hbs"), &json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot read template source"));
    }
}
