pub mod fallback;
pub mod gateway;
pub mod store;

pub use gateway::GraphGateway;
pub use store::SqliteCompanyGraph;

/// Relationship edges below this weight are noise for the neighborhood view.
pub const MIN_RELATIONSHIP_WEIGHT: f64 = 3.0;

/// Cap on substring-search results.
pub const SEARCH_LIMIT: usize = 20;

/// Cap on member-name samples per sector aggregate.
pub const SECTOR_SAMPLE_SIZE: usize = 5;

/// Number of top sectors returned by the aggregation view.
pub const SECTOR_AGGREGATION_LIMIT: usize = 10;
