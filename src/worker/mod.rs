//! Job runner and the download collaborator
//!
//! Each accepted job gets its own tokio task running [`runner::run_job`],
//! which calls the extractor, hands every item to a [`Downloader`], and
//! retires the job into history when it is done.

mod download;
mod guard;
pub mod http;
pub mod runner;

pub use download::{DownloadError, DownloadOptions, Downloader, DownloaderSettings};
pub use http::{HttpConfig, HttpDownloader};
pub use runner::{RunnerContext, Tally, run_job};
