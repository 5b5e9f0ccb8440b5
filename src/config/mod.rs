//! Configuration module

mod site;

pub use site::CacheConfig;
pub use site::FeedConfig;
pub use site::HighlightConfig;
pub use site::SearchConfig;
pub use site::SiteConfig;
