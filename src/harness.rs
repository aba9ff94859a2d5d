//! Binding scenarios to browsers.
//!
//! A [`Scenario`] is pure data; the [`Harness`] is what executes one: it connects a
//! [`Client`] for the chosen [`Browser`], sizes the window, navigates, runs the steps in
//! order, and hands screenshots to the baseline comparison. The browser's name is appended
//! to the scenario's case tags, so the same scenario produces separately-keyed artifacts per
//! browser.

use crate::client::Client;
use crate::error::{self, RunError};
use crate::gesture::Drag;
use crate::scenario::{CaseTags, Scenario, Step};
use crate::shot;
use crate::wd::{Capabilities, Locator};
use log::{debug, info};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
use crate::ClientBuilder;

/// Default bound on the mean per-channel difference a screenshot may have from its baseline.
///
/// Browsers do not rasterize identically across platforms and driver versions, so exact
/// equality is too strict; this tolerates sub-perceptual noise while still catching any
/// visible regression.
pub const DEFAULT_THRESHOLD: f64 = 0.002;

// The page contract: the loaded page exposes a global map object with an idle-callback
// registration. Arming stores the signal in a flag the harness can poll.
const ARM_IDLE_FLAG: &str =
    "window.__idle = false; window.gjsmap.onIdle(function () { window.__idle = true; });";
const IDLE_FLAG: &str = "window.__idle === true";

/// Which browser executes a scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Browser {
    /// Firefox, driven through geckodriver.
    Firefox,
    /// Chrome or Chromium, driven through chromedriver.
    Chrome,
}

impl Browser {
    /// The literal tag appended to a scenario's case tags for artifact naming.
    pub fn tag(self) -> &'static str {
        match self {
            Browser::Firefox => "firefox",
            Browser::Chrome => "chrome",
        }
    }

    /// The conventional local endpoint of this browser's driver.
    pub fn default_webdriver_url(self) -> &'static str {
        match self {
            Browser::Firefox => "http://localhost:4444",
            Browser::Chrome => "http://localhost:9515",
        }
    }

    /// Headless capabilities for this browser.
    pub fn capabilities(self) -> Capabilities {
        match self {
            Browser::Firefox => {
                let mut caps = serde_json::map::Map::new();
                let opts = serde_json::json!({ "args": ["--headless"] });
                caps.insert("moz:firefoxOptions".to_string(), opts);
                caps
            }
            Browser::Chrome => {
                let mut caps = serde_json::map::Map::new();
                let opts = serde_json::json!({
                    "args": ["--headless", "--disable-gpu", "--no-sandbox", "--disable-dev-shm-usage"],
                });
                caps.insert("goog:chromeOptions".to_string(), opts);
                caps
            }
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firefox" => Ok(Browser::Firefox),
            "chrome" => Ok(Browser::Chrome),
            other => Err(format!("unsupported browser backend {}", other)),
        }
    }
}

/// Executes scenarios against browsers and compares their screenshots.
///
/// ```no_run
/// use diorama::{Browser, Harness, Scenario};
///
/// # async fn run() -> Result<(), diorama::error::RunError> {
/// let harness = Harness::new("http://localhost:8000/".parse().unwrap())
///     .baseline_dir("tests/baselines");
///
/// let draw = Scenario::new("osmLayer", "osmLayer/index.html")
///     .revision(6)
///     .screenshot("osmDraw");
///
/// harness.run(Browser::Firefox, &draw).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Harness {
    base_url: url::Url,
    webdriver_url: Option<String>,
    baseline_dir: PathBuf,
    threshold: f64,
}

impl Harness {
    /// Create a harness whose scenario pages are served under `base_url`.
    ///
    /// Defaults: the browser's conventional driver endpoint, a `baselines` directory
    /// relative to the working directory, and [`DEFAULT_THRESHOLD`].
    pub fn new(base_url: url::Url) -> Self {
        Harness {
            base_url,
            webdriver_url: None,
            baseline_dir: PathBuf::from("baselines"),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Override the WebDriver server to connect to, instead of the browser's default.
    pub fn webdriver_url(mut self, url: impl Into<String>) -> Self {
        self.webdriver_url = Some(url.into());
        self
    }

    /// Set the directory baseline images are stored under.
    pub fn baseline_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.baseline_dir = dir.into();
        self
    }

    /// Set the mean-difference threshold screenshots are compared with.
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Run `scenario` in `browser`.
    ///
    /// This connects a fresh session, executes every step in order, and closes the session
    /// whether or not the steps succeeded. The first failing step aborts the run; there is
    /// no retrying.
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    #[cfg_attr(docsrs, doc(cfg(any(feature = "native-tls", feature = "rustls-tls"))))]
    pub async fn run(&self, browser: Browser, scenario: &Scenario) -> Result<(), RunError> {
        let webdriver = self
            .webdriver_url
            .as_deref()
            .unwrap_or_else(|| browser.default_webdriver_url());
        let client = Self::connect(webdriver, browser.capabilities()).await?;
        self.run_with(client, browser.tag(), scenario).await
    }

    /// Run `scenario` over an already-established `client`.
    ///
    /// Useful when the session needs a custom connector or capabilities the [`Browser`]
    /// presets don't cover. `browser_tag` is appended to the scenario's case tags exactly as
    /// [`Harness::run`] would append the browser's name. The client is closed when the run
    /// finishes.
    pub async fn run_with(
        &self,
        client: Client,
        browser_tag: &str,
        scenario: &Scenario,
    ) -> Result<(), RunError> {
        let tags = scenario.tags().with(browser_tag);
        info!("{}: loading {}", tags, scenario.page());

        let result = self.drive(&client, &tags, scenario).await;
        let closed = client.close().await;
        result?;
        closed?;
        Ok(())
    }

    #[cfg(feature = "native-tls")]
    async fn connect(
        webdriver: &str,
        cap: Capabilities,
    ) -> Result<Client, error::NewSessionError> {
        ClientBuilder::native().capabilities(cap).connect(webdriver).await
    }

    #[cfg(all(feature = "rustls-tls", not(feature = "native-tls")))]
    async fn connect(
        webdriver: &str,
        cap: Capabilities,
    ) -> Result<Client, error::NewSessionError> {
        ClientBuilder::rustls()
            .map_err(error::NewSessionError::Lost)?
            .capabilities(cap)
            .connect(webdriver)
            .await
    }

    async fn drive(
        &self,
        client: &Client,
        tags: &CaseTags,
        scenario: &Scenario,
    ) -> Result<(), RunError> {
        // the window is sized before navigation, so the page renders at its intended
        // viewport from the first frame
        let viewport = scenario.viewport();
        client
            .set_window_size(viewport.width, viewport.height)
            .await?;

        let url = self
            .base_url
            .join(scenario.page())
            .map_err(error::CmdError::from)?;
        client.goto(url.as_str()).await?;
        client.wait().for_document_ready().await?;

        for step in scenario.steps() {
            match step {
                Step::Drag { selector, offset } => {
                    debug!("{}: drag {} by {:?}", tags, selector, offset);
                    let elem = client.find(Locator::Css(selector)).await?;
                    client.perform(Drag::on(&elem).by(offset.0, offset.1)).await?;
                    client.release_actions().await?;
                }
                Step::WaitForIdle { timeout } => {
                    debug!("{}: waiting for idle (at most {:?})", tags, timeout);
                    self.wait_for_idle(client, *timeout).await?;
                }
                Step::Screenshot(spec) => {
                    let revision = spec.revision.unwrap_or_else(|| scenario.default_revision());
                    debug!("{}: screenshot {} rev {}", tags, spec.name, revision);
                    let png = client.screenshot().await?;
                    shot::compare(
                        &self.baseline_dir,
                        tags,
                        &spec.name,
                        revision,
                        &png,
                        self.threshold,
                    )?;
                }
            }
        }

        Ok(())
    }

    /// Arm the page's idle flag and poll it until it flips, or fail at the bound.
    async fn wait_for_idle(&self, client: &Client, timeout: Duration) -> Result<(), RunError> {
        client.execute(ARM_IDLE_FLAG, vec![]).await?;
        match client
            .wait()
            .at_most(timeout)
            .for_script_truthy(IDLE_FLAG)
            .await
        {
            Ok(()) => Ok(()),
            Err(error::CmdError::WaitTimeout) => Err(RunError::IdleTimeout(timeout)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_tags_are_the_literal_names() {
        assert_eq!(Browser::Firefox.tag(), "firefox");
        assert_eq!(Browser::Chrome.tag(), "chrome");
        assert_eq!("firefox".parse::<Browser>().unwrap(), Browser::Firefox);
        assert_eq!("chrome".parse::<Browser>().unwrap(), Browser::Chrome);
        assert!("safari".parse::<Browser>().is_err());
    }

    #[test]
    fn drivers_default_to_their_conventional_ports() {
        assert_eq!(
            Browser::Firefox.default_webdriver_url(),
            "http://localhost:4444"
        );
        assert_eq!(
            Browser::Chrome.default_webdriver_url(),
            "http://localhost:9515"
        );
    }

    #[test]
    fn capabilities_request_headless_sessions() {
        let caps = Browser::Firefox.capabilities();
        assert_eq!(
            caps["moz:firefoxOptions"]["args"][0].as_str(),
            Some("--headless")
        );

        let caps = Browser::Chrome.capabilities();
        assert_eq!(
            caps["goog:chromeOptions"]["args"][0].as_str(),
            Some("--headless")
        );
    }
}
