//! quakescope - Earthquake catalog API and filter-driven catalog explorer.
//!
//! The server side turns dashboard filters into parameterized PostGIS
//! queries ([`query`], [`store`], [`server`]). The client side keeps one
//! dashboard's filter session ([`filters`]) and feeds the loaded events to
//! analytics, compare mode and export.

pub mod analytics;
pub mod cli;
pub mod client;
pub mod compare;
pub mod errors;
pub mod export;
pub mod filters;
pub mod models;
pub mod output;
pub mod query;
pub mod server;
pub mod store;
