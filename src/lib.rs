pub use clean::{DefaultDocumentCleaner, DocumentCleaner};
pub use cloud::WordCloud;
pub use collect::collect_post_ids;
pub use error::ShuiyuanError;
pub use forum::{read_cookie, Config, ConfigBuilder, Forum};
pub use keywords::{KeywordAnalyzer, KeywordFrequency, KeywordFrequencyTable};
pub use pipeline::{Pipeline, Report};
pub use post::{CleanedPost, PostReference};
pub use stopwords::StopWords;
pub use storage::OutputStore;

pub mod clean;
pub mod cloud;
pub mod collect;
pub mod emoji;
pub mod error;
pub mod forum;
pub mod keywords;
pub mod pipeline;
pub mod post;
pub mod stopwords;
pub mod storage;

/// Re-exported to implement custom cleaners.
pub use select;
