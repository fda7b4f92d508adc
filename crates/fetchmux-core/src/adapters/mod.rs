mod crawler;
mod reader;

pub use crawler::BrowserCrawlAdapter;
pub use reader::DocumentReaderAdapter;
