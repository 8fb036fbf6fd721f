pub mod fetcher;
pub mod parser;
pub mod store;

pub use fetcher::ReqwestFetcher;
pub use parser::MarkdownPageParser;
pub use store::JsonLinesStore;
