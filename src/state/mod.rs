//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: lifecycle of one crawl run (idle, running, completed, cancelled, failed)
//! - `FetchStatus`: last outcome of fetching a URL, as kept in the fetch ledger

mod crawl_state;
mod fetch_status;

pub use crawl_state::CrawlState;
pub use fetch_status::FetchStatus;
