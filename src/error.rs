use hyper::Error as HError;
use hyper_util::client::legacy::Error as HLError;
use serde::Serialize;
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::io::Error as IOError;
use std::path::PathBuf;
use std::time::Duration;
use url::ParseError;
use webdriver::error as webdriver;

/// An error occurred while attempting to establish a session for a new `Client`.
#[derive(Debug)]
pub enum NewSessionError {
    /// The given WebDriver URL is invalid.
    BadWebdriverUrl(ParseError),
    /// The WebDriver server could not be reached.
    Failed(HLError),
    /// The connection to the WebDriver server was lost.
    Lost(IOError),
    /// The server did not give a WebDriver-conforming response.
    NotW3C(serde_json::Value),
    /// The WebDriver server refused to create a new session.
    SessionNotCreated(WebDriver),
}

impl Error for NewSessionError {
    fn description(&self) -> &str {
        match *self {
            NewSessionError::BadWebdriverUrl(..) => "webdriver url is invalid",
            NewSessionError::Failed(..) => "webdriver server did not respond",
            NewSessionError::Lost(..) => "webdriver server disconnected",
            NewSessionError::NotW3C(..) => "webdriver server gave non-conformant response",
            NewSessionError::SessionNotCreated(..) => "webdriver did not create session",
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        match *self {
            NewSessionError::BadWebdriverUrl(ref e) => Some(e),
            NewSessionError::Failed(ref e) => Some(e),
            NewSessionError::Lost(ref e) => Some(e),
            NewSessionError::NotW3C(..) => None,
            NewSessionError::SessionNotCreated(ref e) => Some(e),
        }
    }
}

impl fmt::Display for NewSessionError {
    #[allow(deprecated)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.description())?;
        match *self {
            NewSessionError::BadWebdriverUrl(ref e) => write!(f, "{}", e),
            NewSessionError::Failed(ref e) => write!(f, "{}", e),
            NewSessionError::Lost(ref e) => write!(f, "{}", e),
            NewSessionError::NotW3C(ref e) => write!(f, "{:?}", e),
            NewSessionError::SessionNotCreated(ref e) => write!(f, "{}", e),
        }
    }
}

/// An error occurred while executing some browser action.
#[derive(Debug)]
pub enum CmdError {
    /// A standard WebDriver error occurred.
    ///
    /// See [the spec] for details about what each of these errors represent. Note that for
    /// convenience `NoSuchElement` has been extracted into its own top-level variant.
    ///
    /// [the spec]: https://www.w3.org/TR/webdriver/#handling-errors
    Standard(WebDriver),

    /// No element was found matching the given locator.
    ///
    /// This variant lifts the ["no such element"] error variant from `Standard` to simplify
    /// checking for it in user code.
    ///
    /// ["no such element"]: https://www.w3.org/TR/webdriver/#dfn-no-such-element
    NoSuchElement(WebDriver),

    /// A bad URL was encountered during parsing.
    ///
    /// This normally happens when joining a page path onto the harness base URL, or when the
    /// current URL is requested but the URL in question is invalid or otherwise malformed.
    BadUrl(ParseError),

    /// A request to the WebDriver server failed.
    Failed(HLError),

    /// Reading a response from the WebDriver server failed.
    Http(HError),

    /// The connection to the WebDriver server was lost.
    Lost(IOError),

    /// The WebDriver server responded with a non-standard, non-JSON reply.
    NotJson(String),

    /// The WebDriver server responded to a command with an invalid JSON response.
    Json(serde_json::Error),

    /// The WebDriver server produced a response that does not conform to the [W3C WebDriver
    /// specification][spec].
    ///
    /// [spec]: https://www.w3.org/TR/webdriver/
    NotW3C(serde_json::Value),

    /// A function was invoked with an invalid argument.
    InvalidArgument(String, String),

    /// Could not decode a base64 screenshot payload.
    ImageDecodeError(::base64::DecodeError),

    /// Timeout of a wait condition.
    ///
    /// Any of the consuming methods on [`Wait`](crate::wait::Wait) may return this error,
    /// indicating that the condition did not become true within the configured bound.
    WaitTimeout,
}

impl CmdError {
    /// Returns true if this error indicates that a matching element was not found.
    pub fn is_miss(&self) -> bool {
        matches!(self, CmdError::NoSuchElement(..))
    }

    pub(crate) fn from_webdriver_error(e: webdriver::WebDriverError) -> Self {
        match e {
            webdriver::WebDriverError {
                error: webdriver::ErrorStatus::NoSuchElement,
                ..
            } => CmdError::NoSuchElement(WebDriver::from_upstream_error(e)),
            _ => CmdError::Standard(WebDriver::from_upstream_error(e)),
        }
    }
}

impl Error for CmdError {
    fn description(&self) -> &str {
        match *self {
            CmdError::Standard(..) => "webdriver returned error",
            CmdError::NoSuchElement(..) => "no element found matching selector",
            CmdError::BadUrl(..) => "bad url provided",
            CmdError::Failed(..) => "webdriver could not be reached",
            CmdError::Http(..) => "error reading webdriver response",
            CmdError::Lost(..) => "webdriver connection lost",
            CmdError::NotJson(..) => "webdriver returned invalid response",
            CmdError::Json(..) => "webdriver returned incoherent response",
            CmdError::NotW3C(..) => "webdriver returned non-conforming response",
            CmdError::InvalidArgument(..) => "invalid argument provided",
            CmdError::ImageDecodeError(..) => "error decoding image",
            CmdError::WaitTimeout => "timeout waiting on condition",
        }
    }

    fn cause(&self) -> Option<&dyn Error> {
        match *self {
            CmdError::Standard(ref e) | CmdError::NoSuchElement(ref e) => Some(e),
            CmdError::BadUrl(ref e) => Some(e),
            CmdError::Failed(ref e) => Some(e),
            CmdError::Http(ref e) => Some(e),
            CmdError::Lost(ref e) => Some(e),
            CmdError::Json(ref e) => Some(e),
            CmdError::ImageDecodeError(ref e) => Some(e),
            CmdError::NotJson(_)
            | CmdError::NotW3C(_)
            | CmdError::InvalidArgument(..)
            | CmdError::WaitTimeout => None,
        }
    }
}

impl fmt::Display for CmdError {
    #[allow(deprecated)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.description())?;
        match *self {
            CmdError::Standard(ref e) | CmdError::NoSuchElement(ref e) => write!(f, "{}", e),
            CmdError::BadUrl(ref e) => write!(f, "{}", e),
            CmdError::Failed(ref e) => write!(f, "{}", e),
            CmdError::Http(ref e) => write!(f, "{}", e),
            CmdError::Lost(ref e) => write!(f, "{}", e),
            CmdError::NotJson(ref e) => write!(f, "{}", e),
            CmdError::Json(ref e) => write!(f, "{}", e),
            CmdError::NotW3C(ref e) => write!(f, "{:?}", e),
            CmdError::ImageDecodeError(ref e) => write!(f, "{:?}", e),
            CmdError::InvalidArgument(ref arg, ref msg) => {
                write!(f, "Invalid argument `{}`: {}", arg, msg)
            }
            CmdError::WaitTimeout => Ok(()),
        }
    }
}

impl From<IOError> for CmdError {
    fn from(e: IOError) -> Self {
        CmdError::Lost(e)
    }
}

impl From<ParseError> for CmdError {
    fn from(e: ParseError) -> Self {
        CmdError::BadUrl(e)
    }
}

impl From<HLError> for CmdError {
    fn from(e: HLError) -> Self {
        CmdError::Failed(e)
    }
}

impl From<HError> for CmdError {
    fn from(e: HError) -> Self {
        CmdError::Http(e)
    }
}

impl From<serde_json::Error> for CmdError {
    fn from(e: serde_json::Error) -> Self {
        CmdError::Json(e)
    }
}

/// An error raised while comparing a captured screenshot against its baseline.
///
/// None of these are recovered from; they propagate as test failures to the runner.
#[derive(Debug)]
pub enum ScreenshotError {
    /// No baseline image exists for this `(case, name, revision)` key.
    ///
    /// The capture has been written next to where the baseline was expected, so it can be
    /// inspected and blessed.
    MissingBaseline {
        /// Where the baseline was expected.
        baseline: PathBuf,
        /// Where the capture was written.
        capture: PathBuf,
    },
    /// The capture and the baseline have different dimensions.
    SizeMismatch {
        /// Baseline (width, height).
        expected: (u32, u32),
        /// Capture (width, height).
        actual: (u32, u32),
    },
    /// The capture differs from the baseline beyond the configured threshold.
    Mismatch {
        /// Mean absolute per-channel difference, normalized to `[0, 1]`.
        mean: f64,
        /// The configured threshold the mean exceeded.
        threshold: f64,
        /// Where the differing capture was written.
        capture: PathBuf,
    },
    /// Reading or writing a baseline or capture file failed.
    Io(IOError),
    /// Decoding a baseline or capture image failed.
    Image(image::ImageError),
}

impl Error for ScreenshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            ScreenshotError::Io(ref e) => Some(e),
            ScreenshotError::Image(ref e) => Some(e),
            ScreenshotError::MissingBaseline { .. }
            | ScreenshotError::SizeMismatch { .. }
            | ScreenshotError::Mismatch { .. } => None,
        }
    }
}

impl fmt::Display for ScreenshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ScreenshotError::MissingBaseline {
                ref baseline,
                ref capture,
            } => write!(
                f,
                "no baseline image at {}; capture written to {}",
                baseline.display(),
                capture.display()
            ),
            ScreenshotError::SizeMismatch { expected, actual } => write!(
                f,
                "screenshot is {}x{} but baseline is {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
            ScreenshotError::Mismatch {
                mean,
                threshold,
                ref capture,
            } => write!(
                f,
                "screenshot differs from baseline (mean {} > threshold {}); capture written to {}",
                mean,
                threshold,
                capture.display()
            ),
            ScreenshotError::Io(ref e) => write!(f, "screenshot i/o failed: {}", e),
            ScreenshotError::Image(ref e) => write!(f, "screenshot decode failed: {}", e),
        }
    }
}

impl From<IOError> for ScreenshotError {
    fn from(e: IOError) -> Self {
        ScreenshotError::Io(e)
    }
}

impl From<image::ImageError> for ScreenshotError {
    fn from(e: image::ImageError) -> Self {
        ScreenshotError::Image(e)
    }
}

/// An error raised while running a [`Scenario`](crate::Scenario) against a browser.
#[derive(Debug)]
pub enum RunError {
    /// Establishing the browser session failed.
    Session(NewSessionError),
    /// A WebDriver command issued by a step failed.
    Cmd(CmdError),
    /// A screenshot comparison step failed.
    Screenshot(ScreenshotError),
    /// The page did not report idle within the configured bound.
    IdleTimeout(Duration),
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            RunError::Session(ref e) => Some(e),
            RunError::Cmd(ref e) => Some(e),
            RunError::Screenshot(ref e) => Some(e),
            RunError::IdleTimeout(..) => None,
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RunError::Session(ref e) => write!(f, "failed to establish session: {}", e),
            RunError::Cmd(ref e) => write!(f, "scenario step failed: {}", e),
            RunError::Screenshot(ref e) => write!(f, "{}", e),
            RunError::IdleTimeout(bound) => {
                write!(f, "page did not report idle within {:?}", bound)
            }
        }
    }
}

impl From<NewSessionError> for RunError {
    fn from(e: NewSessionError) -> Self {
        RunError::Session(e)
    }
}

impl From<CmdError> for RunError {
    fn from(e: CmdError) -> Self {
        RunError::Cmd(e)
    }
}

impl From<ScreenshotError> for RunError {
    fn from(e: ScreenshotError) -> Self {
        RunError::Screenshot(e)
    }
}

/// Error returned by WebDriver.
#[derive(Debug, Serialize)]
pub struct WebDriver {
    /// Code of this error provided by WebDriver.
    ///
    /// Intentionally made private, so library users cannot match on it.
    pub(crate) error: webdriver::ErrorStatus,

    /// Description of this error provided by WebDriver.
    pub message: Cow<'static, str>,

    /// Stacktrace of this error provided by WebDriver.
    pub stacktrace: Cow<'static, str>,
}

impl fmt::Display for WebDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for WebDriver {}

impl WebDriver {
    pub(crate) fn from_upstream_error(e: webdriver::WebDriverError) -> Self {
        Self {
            error: e.error,
            message: e.message,
            stacktrace: e.stack,
        }
    }

    /// Returns [code] of this error provided by WebDriver.
    ///
    /// [code]: https://www.w3.org/TR/webdriver/#dfn-error-code
    pub fn error(&self) -> &'static str {
        self.error.error_code()
    }

    /// Returns [HTTP Status] of this error provided by WebDriver.
    ///
    /// [HTTP Status]: https://www.w3.org/TR/webdriver/#dfn-error-code
    pub fn http_status(&self) -> http::StatusCode {
        // `webdriver` still depends on `http` 0.2, so bridge its `StatusCode` to the
        // `http` 1.x type this crate's public API exposes. The numeric code is identical.
        http::StatusCode::from_u16(self.error.http_status().as_u16())
            .expect("webdriver produced an invalid HTTP status code")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_display_error_doesnt_stackoverflow() {
        println!("{}", CmdError::NotJson("test".to_string()));
        println!("{}", NewSessionError::Lost(IOError::last_os_error()));
        println!("{}", RunError::IdleTimeout(Duration::from_secs(5)));
    }
}
