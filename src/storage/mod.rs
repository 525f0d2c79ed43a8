mod analytics;
mod articles;
mod categories;
mod feeds;
mod logs;
mod schema;
mod types;

pub use articles::{WindowOrder, MAX_PAGE_SIZE};
pub use schema::Database;
pub use types::{
    Article, ArticleDetail, ArticlePage, ArticleQuery, Category, CategoryWithCount,
    DatabaseError, FeedSource, NewReport, Pagination, Report, ReportMeta, SourceExists,
    SourceUpdate, SourceWithCount, Statistics, Summary, SystemLog, WordCount,
    WordFrequencySnapshot,
};
