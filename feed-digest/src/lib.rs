pub mod types;
pub mod config;
pub mod utils;
pub mod state;
pub mod traits;
pub mod fetcher;
pub mod parser;
pub mod aggregator;
pub mod oracle;
pub mod prompts;
pub mod scoring;
pub mod digest;
pub mod delivery;
pub mod pipeline;

pub use types::*;
pub use config::{Args, PipelineConfig};
pub use state::FingerprintStore;
pub use traits::{FeedSource, NotificationSink};
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use oracle::{build_oracle, Oracle, OracleProvider};
pub use delivery::{DeliveryConfig, DeliveryOutcome, WebhookSink};
pub use pipeline::{DigestPipeline, PipelineBuilder, RunOutcome};
