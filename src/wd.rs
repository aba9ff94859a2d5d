//! WebDriver types and declarations.

use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use url::{ParseError, Url};
use webdriver::command::{NewSessionParameters, VoidWebDriverExtensionCommand, WebDriverCommand};

/// A command that can be sent to the WebDriver server.
///
/// The standard commands the harness issues already implement this; implement it yourself to
/// send custom payloads through [`Client::issue_cmd()`](crate::Client::issue_cmd), as the
/// gesture module does for pointer-action sequences.
pub trait WebDriverCompatibleCommand: Debug + Send + Sync {
    /// The endpoint to send the request to.
    fn endpoint(&self, base_url: &Url, session_id: Option<&str>) -> Result<Url, ParseError>;

    /// The HTTP request method to use, and the request body for the request.
    ///
    /// The `request_url` will be the one returned from the `endpoint()` method above.
    fn method_and_body(&self, request_url: &Url) -> (Method, Option<String>);

    /// Return true if this command starts a new WebDriver session.
    fn is_new_session(&self) -> bool {
        false
    }

    /// Return true if this command requests a session speaking only the legacy
    /// (JSON Wire) protocol.
    fn is_legacy(&self) -> bool {
        false
    }
}

pub(crate) type Wcmd = WebDriverCommand<VoidWebDriverExtensionCommand>;

impl WebDriverCompatibleCommand for Wcmd {
    /// This mapping is essentially that of <https://www.w3.org/TR/webdriver/#list-of-endpoints>,
    /// restricted to the commands the harness issues.
    fn endpoint(&self, base_url: &Url, session_id: Option<&str>) -> Result<Url, ParseError> {
        if let WebDriverCommand::NewSession(..) = self {
            return base_url.join("session");
        }
        if let WebDriverCommand::Status = self {
            return base_url.join("status");
        }

        let session = session_id.expect("webdriver command issued without a session");
        if let WebDriverCommand::DeleteSession = self {
            return base_url.join(&format!("session/{}", session));
        }

        let base = base_url.join(&format!("session/{}/", session))?;
        match self {
            WebDriverCommand::Get(..) | WebDriverCommand::GetCurrentUrl => base.join("url"),
            WebDriverCommand::GetTitle => base.join("title"),
            WebDriverCommand::ExecuteScript(..) => base.join("execute/sync"),
            WebDriverCommand::FindElement(..) => base.join("element"),
            WebDriverCommand::SetWindowRect(..) | WebDriverCommand::GetWindowRect => {
                base.join("window/rect")
            }
            WebDriverCommand::TakeScreenshot => base.join("screenshot"),
            WebDriverCommand::ReleaseActions => base.join("actions"),
            _ => unimplemented!(),
        }
    }

    fn method_and_body(&self, request_url: &Url) -> (Method, Option<String>) {
        let mut method = Method::GET;
        let mut body = None;

        match self {
            WebDriverCommand::NewSession(NewSessionParameters::Spec(conf)) => {
                // credentials in the webdriver url (e.g. hosted grids) ride along in the body
                let mut also = String::new();
                if !request_url.username().is_empty() {
                    also.push_str(&format!(
                        r#", "user": {}"#,
                        serde_json::to_string(request_url.username()).unwrap()
                    ));
                }
                if let Some(pwd) = request_url.password() {
                    also.push_str(&format!(
                        r#", "password": {}"#,
                        serde_json::to_string(pwd).unwrap()
                    ));
                }
                body = Some(format!(
                    r#"{{"capabilities": {}{}}}"#,
                    serde_json::to_string(conf).unwrap(),
                    also
                ));
                method = Method::POST;
            }
            WebDriverCommand::NewSession(NewSessionParameters::Legacy(conf)) => {
                body = Some(serde_json::to_string(conf).unwrap());
                method = Method::POST;
            }
            WebDriverCommand::Get(params) => {
                body = Some(serde_json::to_string(params).unwrap());
                method = Method::POST;
            }
            WebDriverCommand::ExecuteScript(params) => {
                body = Some(serde_json::to_string(params).unwrap());
                method = Method::POST;
            }
            WebDriverCommand::FindElement(loc) => {
                body = Some(serde_json::to_string(loc).unwrap());
                method = Method::POST;
            }
            WebDriverCommand::SetWindowRect(params) => {
                body = Some(serde_json::to_string(params).unwrap());
                method = Method::POST;
            }
            WebDriverCommand::ReleaseActions | WebDriverCommand::DeleteSession => {
                method = Method::DELETE;
            }
            _ => {}
        }

        (method, body)
    }

    fn is_new_session(&self) -> bool {
        matches!(self, WebDriverCommand::NewSession(..))
    }

    fn is_legacy(&self) -> bool {
        matches!(
            self,
            WebDriverCommand::NewSession(NewSessionParameters::Legacy(..))
        )
    }
}

/// Dynamic set of [WebDriver capabilities][1].
///
/// [1]: https://www.w3.org/TR/webdriver/#dfn-capability
pub type Capabilities = serde_json::Map<String, serde_json::Value>;

/// An element locator.
///
/// See [the specification][1] for more details.
///
/// [1]: https://www.w3.org/TR/webdriver1/#locator-strategies
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Locator<'a> {
    /// Find an element matching the given [CSS selector][1].
    ///
    /// [1]: https://developer.mozilla.org/en-US/docs/Web/CSS/CSS_Selectors
    Css(&'a str),

    /// Find an element using the given [`id`][1].
    ///
    /// [1]: https://developer.mozilla.org/en-US/docs/Web/HTML/Global_attributes/id
    Id(&'a str),

    /// Find an element using the given [XPath expression][1].
    ///
    /// [1]: https://developer.mozilla.org/en-US/docs/Web/XPath
    XPath(&'a str),
}

impl<'a> Locator<'a> {
    pub(crate) fn into_parameters(self) -> webdriver::command::LocatorParameters {
        use webdriver::command::LocatorParameters;
        use webdriver::common::LocatorStrategy;

        match self {
            Locator::Css(s) => LocatorParameters {
                using: LocatorStrategy::CSSSelector,
                value: s.to_string(),
            },
            Locator::Id(s) => LocatorParameters {
                using: LocatorStrategy::XPath,
                value: format!("//*[@id=\"{}\"]", s),
            },
            Locator::XPath(s) => LocatorParameters {
                using: LocatorStrategy::XPath,
                value: s.to_string(),
            },
        }
    }
}

/// The WebDriver status as returned by [`Client::status()`](crate::Client::status).
///
/// See [8.3 Status](https://www.w3.org/TR/webdriver1/#status) of the WebDriver standard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDriverStatus {
    /// True if the webdriver is ready to start a new session.
    ///
    /// NOTE: Geckodriver will return `false` if a session has already started, since it
    ///       only supports a single session.
    pub ready: bool,
    /// The current status message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use webdriver::command::WebDriverCommand;

    fn base() -> Url {
        Url::parse("http://localhost:4444/").unwrap()
    }

    #[test]
    fn session_scoped_endpoints() {
        let cmd: Wcmd = WebDriverCommand::TakeScreenshot;
        let url = cmd.endpoint(&base(), Some("deadbeef")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4444/session/deadbeef/screenshot");

        let cmd: Wcmd = WebDriverCommand::GetCurrentUrl;
        let url = cmd.endpoint(&base(), Some("deadbeef")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4444/session/deadbeef/url");

        let cmd: Wcmd = WebDriverCommand::ReleaseActions;
        let url = cmd.endpoint(&base(), Some("deadbeef")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4444/session/deadbeef/actions");
        let (method, body) = cmd.method_and_body(&url);
        assert_eq!(method, Method::DELETE);
        assert!(body.is_none());
    }

    #[test]
    fn status_is_not_session_scoped() {
        let cmd: Wcmd = WebDriverCommand::Status;
        let url = cmd.endpoint(&base(), None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4444/status");
    }

    #[test]
    fn id_locator_goes_through_xpath() {
        let params = Locator::Id("map").into_parameters();
        assert_eq!(params.value, r#"//*[@id="map"]"#);
    }
}
