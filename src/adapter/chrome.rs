use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::page;
use super::{SessionLauncher, SiteAdapter};
use crate::config::BrowserConfig;
use crate::models::Credentials;
use crate::utils::error::{AppError, Result};

const URL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Long enough to outlast a challenge cooldown without Chrome tearing down
/// the idle session.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

fn browser_err(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Browser(format!("{}: {}", context, e))
}

pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn SiteAdapter>> {
        let config = self.config.clone();
        let adapter = tokio::task::spawn_blocking(move || ChromeSiteAdapter::start(config))
            .await
            .map_err(|e| browser_err("launch task failed", e))??;
        Ok(Box::new(adapter))
    }
}

pub struct ChromeSiteAdapter {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    config: BrowserConfig,
}

impl ChromeSiteAdapter {
    fn start(config: BrowserConfig) -> Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false)
            .window_size(Some((1366, 900)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
            ])
            .build()
            .map_err(|e| browser_err("Failed to create launch options", e))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options).map_err(|e| browser_err("Failed to launch browser", e))?;
        let tab = browser.new_tab().map_err(|e| browser_err("Failed to create tab", e))?;

        if let Some(user_agent) = &config.user_agent {
            tab.set_user_agent(user_agent, None, None)
                .map_err(|e| browser_err("Failed to set user agent", e))?;
        }
        tab.enable_stealth_mode()
            .map_err(|e| browser_err("Failed to enable stealth mode", e))?;

        info!(headless = config.headless, "Browser session started");

        Ok(Self {
            browser: Some(browser),
            tab,
            config,
        })
    }

    async fn with_tab<T, F>(&self, action: F) -> Result<T>
    where
        F: FnOnce(Arc<Tab>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || action(tab))
            .await
            .map_err(|e| browser_err("browser task failed", e))?
    }

    async fn click(&self, selector: &str, via_script: bool) -> Result<()> {
        let selector = selector.to_string();
        let timeout = self.config.element_timeout();
        self.with_tab(move |tab| {
            let element = tab
                .wait_for_element_with_custom_timeout(&selector, timeout)
                .map_err(|_| AppError::ElementNotFound { selector: selector.clone() })?;
            if via_script {
                element
                    .call_js_fn("function() { this.click(); }", vec![], false)
                    .map_err(|e| browser_err("script click failed", e))?;
            } else {
                element.click().map_err(|e| browser_err("click failed", e))?;
            }
            Ok(())
        })
        .await
    }

    /// Focuses and clears a field, then types into it one character at a time.
    async fn type_like_human(&self, selector: &str, text: &str) -> Result<()> {
        let target = selector.to_string();
        let timeout = self.config.element_timeout();
        self.with_tab(move |tab| {
            let element = tab
                .wait_for_element_with_custom_timeout(&target, timeout)
                .map_err(|_| AppError::ElementNotFound { selector: target.clone() })?;
            element.click().map_err(|e| browser_err("focus failed", e))?;
            element
                .call_js_fn("function() { this.value = ''; }", vec![], false)
                .map_err(|e| browser_err("clear failed", e))?;
            Ok(())
        })
        .await?;

        let typing = self.config.typing();
        for ch in text.chars() {
            let key = ch.to_string();
            self.with_tab(move |tab| {
                tab.type_str(&key).map_err(|e| browser_err("typing failed", e))?;
                Ok(())
            })
            .await?;
            typing.pause().await;
        }
        Ok(())
    }

    async fn page_html(&self) -> Result<String> {
        self.with_tab(|tab| tab.get_content().map_err(|e| browser_err("Failed to read page", e)))
            .await
    }

    async fn wait_for_calendar_url(&self) -> bool {
        let deadline = Instant::now() + self.config.element_timeout();
        loop {
            if self.tab.get_url().contains(&self.config.calendar_url_fragment) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(URL_POLL_INTERVAL).await;
        }
    }

    async fn dump_page(&self, html: &str) {
        let Some(dir) = &self.config.debug_dump_dir else {
            return;
        };
        let path = dir.join(format!("calendar-timeout-{}.html", Utc::now().format("%Y%m%d-%H%M%S")));
        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, html).await
        }
        .await;
        match written {
            Ok(()) => info!(path = %path.display(), "Saved calendar page for debugging"),
            Err(e) => warn!("Could not save calendar page to {}: {}", path.display(), e),
        }
    }
}

#[async_trait]
impl SiteAdapter for ChromeSiteAdapter {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<bool> {
        let url = self.config.start_url.clone();
        debug!(%url, "Opening start page");
        self.with_tab(move |tab| {
            tab.navigate_to(&url).map_err(|e| browser_err("Navigation failed", e))?;
            tab.wait_until_navigated().map_err(|e| browser_err("Page load failed", e))?;
            Ok(())
        })
        .await?;
        self.config.settle().pause().await;

        let selectors = self.config.selectors.clone();
        self.click(&selectors.appointment_type, false).await?;
        self.type_like_human(&selectors.permit_number, &credentials.permit_number).await?;
        self.type_like_human(&selectors.date_of_birth, &credentials.date_of_birth).await?;
        self.click(&selectors.submit, false).await?;
        self.config.settle().pause().await;

        Ok(true)
    }

    async fn verify_ready_page(&mut self) -> Result<bool> {
        let xpath = format!("//*[contains(text(), \"{}\")]", self.config.ready_page_text);
        let timeout = self.config.element_timeout();
        let found = self
            .with_tab(move |tab| Ok(tab.wait_for_xpath_with_custom_timeout(&xpath, timeout).is_ok()))
            .await?;
        if !found {
            warn!(url = %self.tab.get_url(), "Ready page text not found");
        }
        Ok(found)
    }

    async fn search(&mut self, key: &str) -> Result<bool> {
        let selectors = self.config.selectors.clone();
        self.type_like_human(&selectors.search_input, key).await?;
        self.click(&selectors.search_button, false).await?;
        self.config.settle().pause().await;
        Ok(true)
    }

    async fn select_first_result(&mut self) -> Result<bool> {
        let selector = self.config.selectors.first_result.clone();
        self.click(&selector, true).await?;
        self.config.settle().pause().await;
        Ok(true)
    }

    async fn read_earliest_available_date(&mut self) -> Result<Option<NaiveDate>> {
        if !self.wait_for_calendar_url().await {
            warn!(url = %self.tab.get_url(), "Calendar page did not open");
            return Ok(None);
        }

        let segment = self.config.selectors.calendar.segment.clone();
        let timeout = self.config.calendar_timeout();
        let rendered = self
            .with_tab(move |tab| Ok(tab.wait_for_element_with_custom_timeout(&segment, timeout).is_ok()))
            .await?;

        let html = self.page_html().await?;
        if !rendered {
            warn!("Calendar did not render within {:?}", timeout);
            self.dump_page(&html).await;
            return Ok(None);
        }

        page::earliest_open_date(&html, &self.config.selectors.calendar, &self.config.open_slot_labels)
    }

    async fn navigate_back(&mut self) -> Result<bool> {
        let selector = self.config.selectors.back_button.clone();
        match self.click(&selector, true).await {
            Ok(()) => {
                self.config.settle().pause().await;
                Ok(true)
            }
            Err(e) => {
                warn!("Back navigation failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn detect_access_challenge(&mut self) -> Result<bool> {
        let html = self.page_html().await?;
        Ok(page::has_access_challenge(&html, &self.config.challenge_selectors))
    }

    async fn reload(&mut self) -> Result<()> {
        self.with_tab(|tab| {
            tab.reload(false, None).map_err(|e| browser_err("Reload failed", e))?;
            tab.wait_until_navigated().map_err(|e| browser_err("Page load failed", e))?;
            Ok(())
        })
        .await
    }

    fn current_location(&self) -> Option<Url> {
        Url::parse(&self.tab.get_url()).ok()
    }

    async fn close(&mut self) -> Result<()> {
        let Some(browser) = self.browser.take() else {
            return Ok(());
        };
        let closed = self
            .with_tab(|tab| tab.close(true).map(|_| ()).map_err(|e| browser_err("Failed to close tab", e)))
            .await;
        drop(browser);
        debug!("Browser session closed");
        closed
    }
}
