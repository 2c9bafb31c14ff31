pub mod structs;
pub mod feed;
pub mod news;

pub use structs::{FeedItem, FeedPlan, Instrument, Language, Market};
pub use feed::{FeedSource, GoogleNewsFeed};
pub use news::NewsFetcher;
