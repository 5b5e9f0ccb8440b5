//! Markdown rendering with optional syntax highlighting

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::HighlightConfig;
use crate::helpers::escape_html;

/// Marker separating the excerpt from the rest of a post
const MORE_MARKER: &str = "<!-- more -->";

/// Markdown renderer.
///
/// Rendering never fails: input pulldown-cmark cannot make sense of is
/// rendered as text.
pub struct MarkdownRenderer {
    highlighter: Option<Highlighter>,
}

struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
    theme_name: String,
    line_numbers: bool,
}

impl MarkdownRenderer {
    /// Renderer that leaves code blocks verbatim
    pub fn new() -> Self {
        Self { highlighter: None }
    }

    /// Create from the highlight settings
    pub fn with_options(config: &HighlightConfig) -> Self {
        if !config.enable {
            return Self::new();
        }

        let mut theme_set = ThemeSet::load_defaults();
        let theme = theme_set.themes.remove(&config.theme).or_else(|| {
            tracing::warn!(
                "Unknown highlight theme {:?}, using the first bundled theme",
                config.theme
            );
            theme_set.themes.into_values().next()
        });

        let highlighter = theme.map(|theme| Highlighter {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
            theme_name: config.theme.clone(),
            line_numbers: config.line_number,
        });

        Self { highlighter }
    }

    /// Identifies the settings that affect rendered output
    pub fn fingerprint(&self) -> String {
        match &self.highlighter {
            Some(h) => format!(
                "{}:highlight:{}:{}",
                env!("CARGO_PKG_VERSION"),
                h.theme_name,
                h.line_numbers
            ),
            None => format!("{}:plain", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Render markdown to HTML
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, parser_options());

        let mut html_output = String::with_capacity(markdown.len() + markdown.len() / 2);

        let Some(highlighter) = &self.highlighter else {
            html::push_html(&mut html_output, parser);
            return html_output;
        };

        let mut events: Vec<Event> = Vec::new();
        let mut in_code_block = false;
        let mut code_block_lang: Option<String> = None;
        let mut code_block_content = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_block_lang = match kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().map(str::to_string)
                        }
                        CodeBlockKind::Indented => None,
                    };
                    code_block_content.clear();
                }
                Event::End(TagEnd::CodeBlock) => {
                    let highlighted =
                        highlighter.highlight(&code_block_content, code_block_lang.as_deref());
                    events.push(Event::Html(CowStr::from(highlighted)));
                    in_code_block = false;
                    code_block_lang = None;
                }
                Event::Text(text) if in_code_block => {
                    code_block_content.push_str(&text);
                }
                _ if in_code_block => {}
                _ => events.push(event),
            }
        }

        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Markdown before the `<!-- more -->` marker, if the body has one.
    /// Markers inside code blocks and code spans are not HTML and don't count.
    pub fn split_excerpt(content: &str) -> Option<&str> {
        let pos = Parser::new_ext(content, parser_options())
            .into_offset_iter()
            .find_map(|(event, range)| match event {
                Event::Html(_) | Event::InlineHtml(_) => content
                    .get(range.clone())
                    .and_then(|raw| raw.find(MORE_MARKER))
                    .map(|offset| range.start + offset),
                _ => None,
            })?;
        let excerpt = content[..pos].trim();
        (!excerpt.is_empty()).then_some(excerpt)
    }

    /// Plain-text excerpt derived from the `<!-- more -->` marker
    pub fn excerpt_text(content: &str) -> Option<String> {
        let excerpt = Self::split_excerpt(content)?;
        let text = Self::plain_text(excerpt);
        (!text.is_empty()).then_some(text)
    }

    /// Text content of markdown with whitespace collapsed. Raw HTML is dropped
    /// and nothing is escaped.
    pub fn plain_text(markdown: &str) -> String {
        let mut text = String::with_capacity(markdown.len());
        for event in Parser::new_ext(markdown, parser_options()) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak
                | Event::HardBreak
                | Event::End(
                    TagEnd::Paragraph
                    | TagEnd::Heading(_)
                    | TagEnd::Item
                    | TagEnd::CodeBlock
                    | TagEnd::TableCell,
                ) => text.push(' '),
                _ => {}
            }
        }
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// YAML metadata blocks stay disabled: front matter is split off before rendering
fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    /// Highlight a code block
    fn highlight(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.unwrap_or("text");

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let lang = escape_html(lang);
        match highlighted_html_for_string(code, &self.syntax_set, syntax, &self.theme) {
            Ok(highlighted) if self.line_numbers => {
                add_line_numbers(&highlighted, code, &lang)
            }
            Ok(highlighted) => {
                format!(r#"<figure class="highlight {}">{}</figure>"#, lang, highlighted)
            }
            Err(e) => {
                tracing::debug!("Highlighting failed for {} block: {}", lang, e);
                format!(
                    r#"<pre><code class="language-{}">{}</code></pre>"#,
                    lang,
                    escape_html(code)
                )
            }
        }
    }
}

/// Wrap highlighted code in a table with a line-number gutter
fn add_line_numbers(highlighted: &str, code: &str, lang: &str) -> String {
    let line_count = code.lines().count().max(1);
    let gutter = (1..=line_count)
        .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code">{}</td></tr></table></figure>"#,
        lang, gutter, highlighted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highlighting(line_number: bool) -> MarkdownRenderer {
        MarkdownRenderer::with_options(&HighlightConfig {
            enable: true,
            line_number,
            ..Default::default()
        })
    }

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("# Hello World\n\nThis is *a* [test](https://example.com).");
        assert!(html.contains("<h1>Hello World</h1>"));
        assert!(html.contains("<em>a</em>"));
        assert!(html.contains(r#"<a href="https://example.com">test</a>"#));
    }

    #[test]
    fn test_lists_quotes_images() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("- one\n- two\n\n1. first\n\n> quoted\n\n![alt](/img.png)");
        assert!(html.contains("<ul>"));
        assert!(html.contains("<ol>"));
        assert!(html.contains("<blockquote>"));
        assert!(html.contains(r#"<img src="/img.png" alt="alt" />"#));
    }

    #[test]
    fn test_code_block_kept_verbatim() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```php\n// **not bold** <b>\n$x = 1;\n```");
        assert!(html.contains(r#"<pre><code class="language-php">"#));
        assert!(html.contains("**not bold** &lt;b&gt;"));
        assert!(!html.contains("<strong>"));
    }

    #[test]
    fn test_raw_html_passthrough() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("<table><tr><td>cell</td></tr></table>\n\nafter");
        assert!(html.contains("<table><tr><td>cell</td></tr></table>"));
        assert!(html.contains("<p>after</p>"));
    }

    #[test]
    fn test_malformed_markdown_degrades() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("*unclosed emphasis and [broken link(\n\n```\nnever closed");
        assert!(html.contains("unclosed emphasis"));
        assert!(html.contains("never closed"));
    }

    #[test]
    fn test_highlighted_code_block() {
        let html = highlighting(false).render("```rust\nfn main() {}\n```");
        assert!(html.contains(r#"<figure class="highlight rust">"#));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_highlight_line_numbers() {
        let html = highlighting(true).render("```sh\necho one\necho two\n```");
        assert!(html.contains(r#"<span class="line-number">2</span>"#));
        assert!(!html.contains(r#"<span class="line-number">3</span>"#));
    }

    #[test]
    fn test_fingerprint_tracks_settings() {
        assert_ne!(
            MarkdownRenderer::new().fingerprint(),
            highlighting(false).fingerprint()
        );
        assert_ne!(
            highlighting(true).fingerprint(),
            highlighting(false).fingerprint()
        );
    }

    #[test]
    fn test_split_excerpt() {
        let content = "This is excerpt.\n<!-- more -->\nThis is more content.";
        assert_eq!(
            MarkdownRenderer::split_excerpt(content),
            Some("This is excerpt.")
        );
        assert_eq!(MarkdownRenderer::split_excerpt("No marker here"), None);
    }

    #[test]
    fn test_split_excerpt_ignores_marker_in_code() {
        let content = "Writing HTML.\n\n```html\n<!-- more -->\n```\n\nAlso `<!-- more -->` inline.\n\n<!-- more -->\nRest.";
        assert_eq!(
            MarkdownRenderer::split_excerpt(content),
            Some("Writing HTML.\n\n```html\n<!-- more -->\n```\n\nAlso `<!-- more -->` inline.")
        );
        assert_eq!(
            MarkdownRenderer::split_excerpt("```\n<!-- more -->\n```\nafter"),
            None
        );
    }

    #[test]
    fn test_excerpt_text_strips_markup() {
        let text = MarkdownRenderer::excerpt_text(
            "Intro with **bold**\nand a [link](/x).\n\n<!-- more -->\nrest",
        )
        .unwrap();
        assert_eq!(text, "Intro with bold and a link.");
    }

    #[test]
    fn test_plain_text_is_not_escaped() {
        let text = MarkdownRenderer::plain_text("# Tom & Jerry\n\nUse `a<b` here.");
        assert_eq!(text, "Tom & Jerry Use a<b here.");
        assert_eq!(
            MarkdownRenderer::excerpt_text("Tom & Jerry use `a<b`.\n\n<!-- more -->\nrest"),
            Some("Tom & Jerry use a<b.".to_string())
        );
    }
}
