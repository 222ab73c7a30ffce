mod api;

pub use api::{AdminStatsResponse, EchoResponse, HealthResponse, PageResponse, PostSummary};
