//! Handles to elements on the page under test.

use crate::client::Client;

/// A single DOM element on the current page.
///
/// Note that there is a lot of subtlety in how you can interact with an element through
/// WebDriver, which [the WebDriver standard goes into detail on][1]. The same goes for
/// inspecting [element state][2].
///
/// [1]: https://www.w3.org/TR/webdriver1/#element-interaction
/// [2]: https://www.w3.org/TR/webdriver1/#element-state
#[derive(Clone, Debug)]
pub struct Element {
    pub(crate) client: Client,
    pub(crate) element: webdriver::common::WebElement,
}

impl Element {
    /// Get back the [`Client`] hosting this `Element`.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the element's WebDriver reference id, as used in pointer-action origins.
    pub fn element_id(&self) -> &str {
        &self.element.0
    }
}
