pub mod csv;
pub mod labels;
pub mod series;
pub mod source;

pub use csv::CsvConnector;
pub use labels::{InMemoryLabelStore, LabelStore, SqliteLabelStore};
pub use series::{BarSeries, SeriesQuality};
pub use source::{CsvDirectorySource, InMemorySource, MarketDataSource};
