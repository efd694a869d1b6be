// src/ingest/providers/mod.rs
pub mod file;
pub mod news_rss;
pub mod reddit;
pub mod twitter;

pub use file::FileCollector;
pub use news_rss::NewsRssCollector;
pub use reddit::RedditCollector;
pub use twitter::TwitterCollector;
