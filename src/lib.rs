//! Scenario-driven screenshot regression testing for browser-rendered pages through
//! [WebDriver].
//!
//! This crate drives a real, headless browser through a fixed *scenario* -- load a page at a
//! fixed viewport, optionally interact with it, wait for it to settle -- and then compares a
//! screenshot of the result against a stored, revision-tagged baseline image. It exists for
//! pages whose output is an actual rendering (map tiles, WebGL points, canvas drawing),
//! where "did anything change?" is a question about pixels rather than DOM state.
//!
//! The pieces are deliberately separable:
//!
//! - A [`Scenario`] describes *what* to test: the page URL, the viewport (640x480 unless
//!   overridden), an ordered list of steps (drag, idle-wait, screenshot), and the baseline
//!   revision to compare against. It is plain data and knows nothing about browsers.
//! - A [`Harness`] describes *where* to test: the base URL serving the pages, the WebDriver
//!   endpoint, the baseline directory, and the comparison threshold. [`Harness::run`] binds
//!   a scenario to a [`Browser`], extending the scenario's case tags with the browser's name
//!   so each browser keeps its own baselines.
//! - A [`Client`] is the underlying WebDriver session handle, exposing just the operations
//!   scenarios consume: navigation, window sizing, script execution, element lookup, a drag
//!   gesture, and screenshot capture. You rarely need it directly, but it is public for
//!   custom steps and custom connectors.
//!
//! # Examples
//!
//! These examples assume a [WebDriver compatible] process is running on port 4444 (a quick
//! way to get one is to run [`geckodriver`] at the command line), and something serving the
//! scenario pages on port 8000.
//!
//! Describing and running the canonical map-pan scenario:
//!
//! ```no_run
//! use diorama::{Browser, Harness, Scenario};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), diorama::error::RunError> {
//!     let harness = Harness::new("http://localhost:8000/".parse().unwrap())
//!         .baseline_dir("tests/baselines");
//!
//!     // drag the map, wait for tiles to settle, then compare against revision 6
//!     let pan = Scenario::new("osmLayer", "osmLayer/index.html")
//!         .revision(6)
//!         .drag("#map", (200, 150))
//!         .wait_for_idle()
//!         .screenshot("osmPan");
//!
//!     harness.run(Browser::Firefox, &pan).await?;
//!     harness.run(Browser::Chrome, &pan).await
//! }
//! ```
//!
//! The first run has no baselines to compare against; run it once with the environment
//! variable `DIORAMA_BLESS=all` to record the captures as baselines, commit those, and
//! subsequent runs compare against them.
//!
//! Driving the browser by hand for a custom step:
//!
//! ```no_run
//! use diorama::{ClientBuilder, Locator};
//! use diorama::gesture::Drag;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClientBuilder::native().connect("http://localhost:4444").await?;
//!
//! client.set_window_size(640, 480).await?;
//! client.goto("http://localhost:8000/osmLayer/index.html").await?;
//! client.wait().for_document_ready().await?;
//!
//! let map = client.find(Locator::Css("#map")).await?;
//! client.perform(Drag::on(&map).by(200, 150)).await?;
//! client.release_actions().await?;
//!
//! let png = client.screenshot().await?;
//! assert!(!png.is_empty());
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Every wait in this crate is bounded: if a page never reports idle, the wait fails with a
//! timeout error after its configured bound (5 seconds for idle waits by default) rather
//! than hanging the test run.
//!
//! [WebDriver]: https://www.w3.org/TR/webdriver/
//! [WebDriver compatible]: https://developer.mozilla.org/en-US/docs/Web/WebDriver
//! [`geckodriver`]: https://github.com/mozilla/geckodriver
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![warn(missing_debug_implementations, rust_2018_idioms)]

use crate::session::Session;
use hyper_util::client::legacy::connect;

/// Error types.
pub mod error;
pub mod gesture;
pub mod wait;
pub mod wd;

mod client;
mod elements;
mod harness;
mod scenario;
mod session;
mod shot;

pub use crate::client::Client;
pub use crate::elements::Element;
pub use crate::harness::{Browser, Harness, DEFAULT_THRESHOLD};
pub use crate::scenario::{
    CaseTags, Scenario, ShotSpec, Step, Viewport, DEFAULT_IDLE_TIMEOUT, DEFAULT_VIEWPORT,
};
pub use crate::shot::BLESS_ENV;
pub use crate::wd::{Capabilities, Locator, WebDriverCompatibleCommand};

/// A builder for [`Client`] instances.
///
/// The builder chooses the HTTPS connector used to talk to the WebDriver server, and carries
/// the capabilities requested for the browser session.
#[derive(Clone, Debug)]
pub struct ClientBuilder<C>
where
    C: connect::Connect + Clone + Send + Sync + 'static,
{
    capabilities: Capabilities,
    connector: C,
}

#[cfg(feature = "native-tls")]
#[cfg_attr(docsrs, doc(cfg(feature = "native-tls")))]
impl ClientBuilder<hyper_tls::HttpsConnector<connect::HttpConnector>> {
    /// Build a `Client` that connects via a platform-native TLS library.
    pub fn native() -> Self {
        Self::new(hyper_tls::HttpsConnector::new())
    }
}

#[cfg(feature = "rustls-tls")]
#[cfg_attr(docsrs, doc(cfg(feature = "rustls-tls")))]
impl ClientBuilder<hyper_rustls::HttpsConnector<connect::HttpConnector>> {
    /// Build a `Client` that connects via rustls, using the platform's certificate roots.
    pub fn rustls() -> Result<Self, std::io::Error> {
        Ok(Self::new(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()?
                .https_or_http()
                .enable_http1()
                .build(),
        ))
    }
}

impl<C> ClientBuilder<C>
where
    C: connect::Connect + Clone + Send + Sync + 'static,
{
    /// Build a `Client` that connects using the given HTTPS connector.
    pub fn new(connector: C) -> Self {
        Self {
            capabilities: Capabilities::new(),
            connector,
        }
    }

    /// Pass the given [WebDriver capabilities] to the browser.
    ///
    /// The requested capabilities will be augmented so that the browser waits for pages to
    /// load before returning from navigation.
    ///
    /// [WebDriver capabilities]: https://www.w3.org/TR/webdriver/#capabilities
    pub fn capabilities(mut self, cap: Capabilities) -> Self {
        self.capabilities = cap;
        self
    }

    /// Connect to the WebDriver host running at the given address, and start a session.
    pub async fn connect(&self, webdriver: &str) -> Result<Client, error::NewSessionError> {
        Session::with_capabilities_and_connector(
            webdriver,
            &self.capabilities,
            self.connector.clone(),
        )
        .await
    }
}
