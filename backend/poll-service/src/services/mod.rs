pub mod analytics;
pub mod poll_service;

pub use analytics::{summarize, Analytics, AnalyticsService};
pub use poll_service::PollService;
