pub mod chrome;
pub mod page;

use async_trait::async_trait;
use chrono::NaiveDate;
use url::Url;

use crate::models::Credentials;
use crate::utils::error::Result;

pub use chrome::{ChromeLauncher, ChromeSiteAdapter};

/// One open session against the booking site.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SiteAdapter: Send {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<bool>;
    async fn verify_ready_page(&mut self) -> Result<bool>;
    async fn search(&mut self, key: &str) -> Result<bool>;
    async fn select_first_result(&mut self) -> Result<bool>;
    async fn read_earliest_available_date(&mut self) -> Result<Option<NaiveDate>>;
    async fn navigate_back(&mut self) -> Result<bool>;
    async fn detect_access_challenge(&mut self) -> Result<bool>;
    async fn reload(&mut self) -> Result<()>;
    fn current_location(&self) -> Option<Url>;
    /// Release the session. Called exactly once on every exit path.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn SiteAdapter>>;
}
