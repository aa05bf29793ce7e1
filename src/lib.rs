//! Cookie-replay collection toolkit for the X/Twitter private API. Read
//! queries and reply aggregation, persisted as timestamped JSON/CSV files.

pub mod config;
pub mod cookies;
pub mod page;
pub mod pipeline;
pub mod queries;
pub mod records;
pub mod replies;
pub mod session;
pub mod sink;
