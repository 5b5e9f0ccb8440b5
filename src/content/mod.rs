//! Content module - posts, their front matter and rendering

mod frontmatter;
mod markdown;
mod post;
pub mod repository;

pub use frontmatter::{parse_date_string, FrontMatter};
pub use markdown::MarkdownRenderer;
pub use post::{slug_from_path, Post, SourceFile, Tag};
pub use repository::PostRepository;
