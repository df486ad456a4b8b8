//! Post-processing of collected tweets: lexicon sentiment and trend counts.
//!
//! Both passes are stateless and run over the final, already deduplicated
//! tweet set handed over by the scraper.

pub mod error;
pub mod scorer;
pub mod trends;

pub use error::AnalysisError;
pub use scorer::{summarize_sentiment, Lexicon, SentimentLabel, SentimentSummary};
pub use trends::{detect_trends, SpikeInfo, TrendReport};
