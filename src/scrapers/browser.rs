use crate::scrapers::onthehouse::USER_AGENT;
use crate::scrapers::traits::{Renderer, SessionFactory};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::spawn_blocking;
use tracing::{debug, info};

/// A headless Chrome tab exposed as a `Renderer`.
///
/// headless_chrome is blocking, so every call runs on the blocking pool.
pub struct ChromeRenderer {
    // keeps the Chrome process alive for as long as the tab is in use
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeRenderer {
    /// Launch Chrome and open a single tab
    pub fn launch(headless: bool) -> Result<Self> {
        info!("Launching {} Chrome...", if headless { "headless" } else { "visible" });

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_user_agent(USER_AGENT, Some("en-AU,en;q=0.9"), None)
            .context("Failed to set user agent")?;

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    async fn with_tab<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        spawn_blocking(move || f(&tab))
            .await
            .context("Browser task panicked")?
    }
}

/// Script that POSTs `payload` to `url` from inside the page and returns the
/// response body as a JSON string.
fn in_page_post_script(url: &str, payload: &Value) -> Result<String> {
    let url = serde_json::to_string(url)?;
    let body = serde_json::to_string(&payload.to_string())?;
    Ok(format!(
        r#"(async () => {{
            const response = await fetch({url}, {{
                method: 'POST',
                credentials: 'include',
                headers: {{ 'accept': 'application/json', 'content-type': 'application/json' }},
                body: {body},
            }});
            if (!response.ok) {{
                throw new Error(`HTTP ${{response.status}}: ${{response.statusText}}`);
            }}
            return JSON.stringify(await response.json());
        }})()"#
    ))
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn goto(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        debug!("Navigating to {}", url);
        self.with_tab(move |tab| {
            tab.navigate_to(&url)
                .with_context(|| format!("Failed to navigate to {}", url))?;
            tab.wait_until_navigated()
                .with_context(|| format!("Navigation timeout for {}", url))?;
            Ok(())
        })
        .await
    }

    async fn current_url(&self) -> Result<String> {
        self.with_tab(|tab| Ok(tab.get_url())).await
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            tab.wait_for_element_with_custom_timeout(&selector, timeout)
                .with_context(|| format!("Timed out waiting for {}", selector))?;
            Ok(())
        })
        .await
    }

    async fn content(&self) -> Result<String> {
        self.with_tab(|tab| tab.get_content().context("Failed to read page HTML"))
            .await
    }

    async fn post_json(&self, url: &str, payload: &Value) -> Result<Value> {
        let script = in_page_post_script(url, payload)?;
        let raw = self
            .with_tab(move |tab| {
                let result = tab
                    .evaluate(&script, true)
                    .context("In-page request failed")?;
                result
                    .value
                    .and_then(|v| v.as_str().map(str::to_string))
                    .ok_or_else(|| anyhow!("In-page request returned no body"))
            })
            .await?;
        serde_json::from_str(&raw).context("In-page request returned invalid JSON")
    }
}

/// Launches one Chrome session per area
pub struct ChromeLauncher {
    headless: bool,
}

impl ChromeLauncher {
    pub fn new(headless: bool) -> Self {
        Self { headless }
    }
}

#[async_trait]
impl SessionFactory for ChromeLauncher {
    async fn open(&self) -> Result<Arc<dyn Renderer>> {
        let headless = self.headless;
        let renderer = spawn_blocking(move || ChromeRenderer::launch(headless))
            .await
            .context("Browser launch task panicked")??;
        Ok(Arc::new(renderer))
    }
}
