pub mod api;
pub mod config;
pub mod extract;
pub mod humanize;
pub mod ledger;
pub mod observability;
pub mod storage;
pub mod tracker;
pub mod worker;
