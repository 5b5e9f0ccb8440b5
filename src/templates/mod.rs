//! Built-in templates using the Tera template engine
//!
//! Templates are embedded in the binary. Autoescaping is off so URLs stay
//! readable; user text goes through the `html` filter instead.

use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::error::BuildError;
use crate::helpers::escape_html;

/// Template renderer with the embedded default templates
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self, BuildError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("default/layout.html")),
            ("post.html", include_str!("default/post.html")),
            ("list.html", include_str!("default/list.html")),
            ("tags.html", include_str!("default/tags.html")),
        ])?;

        tera.register_filter("html", html_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String, BuildError> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera filter: escape text for use in HTML
fn html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = match value {
        tera::Value::String(s) => s.clone(),
        tera::Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(tera::Value::String(escape_html(&s)))
}

// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub home_url: String,
    pub tags_url: String,
    pub featured_url: String,
    pub feed_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagLink {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub slug: String,
    pub title: String,
    pub url: String,
    /// ISO date, `YYYY-MM-DD`
    pub date: String,
    pub date_display: String,
    pub excerpt: Option<String>,
    pub tags: Vec<TagLink>,
    pub featured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavPost {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagData {
    pub name: String,
    pub url: String,
    pub count: usize,
}
