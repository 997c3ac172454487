//! The sandboxed template-rendering substrate (spec.md §4.1, C1).
//!
//! Templates use double-brace interpolation, filters, and `for`/`if`
//! control blocks, grounded on the `tera` engine (the templating crate
//! found in the example pack). Tera never gives templates access to
//! arbitrary host values or methods — only to the [`tera::Value`] tree
//! built from a [`Namespace`] — so attribute access and reflection are
//! forbidden by construction, and Tera raises rather than silently
//! stringifying `None` when a referenced variable is missing from context.

pub mod namespace;

use std::collections::HashMap;
use std::sync::Mutex;
use tera::Tera;
use thiserror::Error;

pub use namespace::Namespace;

/// Rendered output is truncated beyond this many characters (spec.md §4.1).
pub const DEFAULT_CHAR_CAP: usize = 200_000;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template parse error: {0}")]
    Parse(String),
    #[error("template render error (undefined variable or sandbox violation): {0}")]
    Render(String),
}

/// One sandboxed templating environment per renderer instance; template
/// bodies are registered (compiled) on first use and reused by content hash
/// so repeated units (loop iterations, resumed steps) don't recompile.
pub struct Renderer {
    tera: Mutex<Tera>,
    registered: Mutex<HashMap<u64, String>>,
    char_cap: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(DEFAULT_CHAR_CAP)
    }
}

impl Renderer {
    pub fn new(char_cap: usize) -> Self {
        Self {
            tera: Mutex::new(Tera::default()),
            registered: Mutex::new(HashMap::new()),
            char_cap,
        }
    }

    fn template_key(body: &str) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        body.hash(&mut hasher);
        hasher.finish()
    }

    /// Renders `template_text` against `namespace`, truncating the result
    /// to this renderer's character cap. Non-suspending (spec.md §5).
    pub fn render(&self, template_text: &str, namespace: &Namespace) -> Result<String, TemplateError> {
        let key = Self::template_key(template_text);
        let name = {
            let mut registered = self.registered.lock().expect("renderer registry poisoned");
            if let Some(name) = registered.get(&key) {
                name.clone()
            } else {
                let name = format!("unit_{key:x}");
                let mut tera = self.tera.lock().expect("renderer poisoned");
                tera.add_raw_template(&name, template_text)
                    .map_err(|e| TemplateError::Parse(e.to_string()))?;
                registered.insert(key, name.clone());
                name
            }
        };

        let ctx = tera::Context::from_value(namespace.to_value())
            .map_err(|e| TemplateError::Render(e.to_string()))?;

        let rendered = {
            let tera = self.tera.lock().expect("renderer poisoned");
            tera.render(&name, &ctx)
                .map_err(|e| TemplateError::Render(format_tera_chain(&e)))?
        };

        Ok(truncate_chars(&rendered, self.char_cap))
    }

    /// Evaluates a boolean template expression, used by graph conditional
    /// edges (spec.md §4.6.5). The literal `"else"` is handled by the
    /// caller before reaching this, never rendered as a template.
    pub fn render_bool(&self, expr: &str, namespace: &Namespace) -> Result<bool, TemplateError> {
        let wrapped = format!("{{%- if {expr} -%}}true{{%- else -%}}false{{%- endif -%}}");
        let rendered = self.render(&wrapped, namespace)?;
        Ok(rendered.trim() == "true")
    }
}

fn format_tera_chain(err: &tera::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(s) = source {
        parts.push(s.to_string());
        source = s.source();
    }
    parts.join(": ")
}

fn truncate_chars(s: &str, cap: usize) -> String {
    if s.chars().count() <= cap {
        s.to_string()
    } else {
        s.chars().take(cap).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns_with(key: &str, value: serde_json::Value) -> Namespace {
        let mut ns = Namespace::new();
        ns.set(key, value);
        ns
    }

    #[test]
    fn renders_simple_interpolation() {
        let renderer = Renderer::default();
        let ns = ns_with("topic", serde_json::json!("rust"));
        let out = renderer.render("hello {{ topic }}", &ns).unwrap();
        assert_eq!(out, "hello rust");
    }

    #[test]
    fn undefined_variable_is_a_template_error() {
        let renderer = Renderer::default();
        let ns = Namespace::new();
        let err = renderer.render("{{ nope }}", &ns).unwrap_err();
        assert!(matches!(err, TemplateError::Render(_)));
    }

    #[test]
    fn truncates_to_char_cap() {
        let renderer = Renderer::new(5);
        let ns = ns_with("x", serde_json::json!("abcdefghij"));
        let out = renderer.render("{{ x }}", &ns).unwrap();
        assert_eq!(out, "abcde");
    }

    #[test]
    fn for_and_if_blocks_work() {
        let renderer = Renderer::default();
        let ns = ns_with("items", serde_json::json!(["a", "b", "c"]));
        let out = renderer
            .render("{% for i in items %}{{ i }}{% endfor %}", &ns)
            .unwrap();
        assert_eq!(out, "abc");
    }

    #[test]
    fn render_bool_evaluates_condition() {
        let renderer = Renderer::default();
        let ns = ns_with("flag", serde_json::json!(true));
        assert!(renderer.render_bool("flag", &ns).unwrap());
    }

    #[test]
    fn repeated_render_reuses_cached_template() {
        let renderer = Renderer::default();
        let ns1 = ns_with("topic", serde_json::json!("a"));
        let ns2 = ns_with("topic", serde_json::json!("b"));
        assert_eq!(renderer.render("{{ topic }}", &ns1).unwrap(), "a");
        assert_eq!(renderer.render("{{ topic }}", &ns2).unwrap(), "b");
        assert_eq!(renderer.registered.lock().unwrap().len(), 1);
    }
}
