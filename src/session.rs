use crate::client::Client;
use crate::error;
use crate::wd::{Capabilities, WebDriverCompatibleCommand, Wcmd};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use futures_util::FutureExt;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy as hyper_legacy;
use hyper_util::client::legacy::connect;
use hyper_util::rt::TokioExecutor;
use serde_json::Value as Json;
use std::io;
use tokio::sync::{mpsc, oneshot};
use webdriver::command::WebDriverCommand;
use webdriver::error::{ErrorStatus, WebDriverError};

pub(crate) type Ack = oneshot::Sender<Result<Json, error::CmdError>>;

#[derive(Debug)]
pub(crate) enum Cmd {
    GetSessionId,
    Shutdown,
    Persist,
    WebDriver(Box<dyn WebDriverCompatibleCommand>),
}

impl From<Wcmd> for Cmd {
    fn from(o: Wcmd) -> Self {
        Cmd::WebDriver(Box::new(o))
    }
}

#[derive(Debug)]
pub(crate) struct Task {
    pub(crate) request: Cmd,
    pub(crate) ack: Ack,
}

/// The session loop. One spawned task owns the HTTP connection to the WebDriver server and
/// processes commands one at a time, in the order clients issue them.
pub(crate) struct Session<C>
where
    C: connect::Connect + Clone + Send + Sync + 'static,
{
    rx: mpsc::UnboundedReceiver<Task>,
    client: hyper_legacy::Client<C, Full<Bytes>>,
    wdb: url::Url,
    session: Option<String>,
    legacy: bool,
    persist: bool,
}

impl<C> Session<C>
where
    C: connect::Connect + Clone + Send + Sync + 'static,
{
    async fn run(mut self) {
        while let Some(Task { request, ack }) = self.rx.recv().await {
            match request {
                Cmd::GetSessionId => {
                    let _ = ack.send(Ok(self
                        .session
                        .clone()
                        .map(Json::String)
                        .unwrap_or(Json::Null)));
                }
                Cmd::Persist => {
                    self.persist = true;
                    let _ = ack.send(Ok(Json::Null));
                }
                Cmd::Shutdown => {
                    self.shutdown().await;
                    let _ = ack.send(Ok(Json::Null));
                    return;
                }
                Cmd::WebDriver(request) => {
                    // a client setup that fell back to legacy params pins the whole
                    // session to the legacy protocol
                    if request.is_legacy() {
                        self.legacy = true;
                    }
                    let try_extract_session = self.session.is_none();
                    let rsp = self.issue_wd_cmd(&*request).await;
                    if try_extract_session {
                        // we can safely assume this is a response to NewSession,
                        // so pick out the session id -- we'll need it for every
                        // endpoint from here on
                        if let Ok(Json::Object(ref v)) = rsp {
                            if let Some(session_id) = v.get("sessionId").and_then(Json::as_str) {
                                self.session = Some(session_id.to_string());
                            }
                        }
                    }
                    let _ = ack.send(rsp);
                }
            }
        }

        // all clients dropped without an explicit close
        if !self.persist {
            self.shutdown().await;
        }
    }

    async fn shutdown(&mut self) {
        if let Some(session_id) = self.session.take() {
            if let Ok(url) = self.wdb.join(&format!("session/{}", session_id)) {
                let req = hyper::Request::delete(url.as_str())
                    .body(Full::new(Bytes::new()))
                    .expect("failed to construct session delete request");
                let _ = self.client.request(req).await;
            }
        }
    }

    fn map_handshake_response(
        response: Result<Json, error::CmdError>,
    ) -> Result<(), error::NewSessionError> {
        match response {
            Ok(Json::Object(mut v)) => {
                // NOTE: remove so we can re-insert and return if something's wrong
                if let Some(session_id) = v.remove("sessionId") {
                    if session_id.is_string() {
                        return Ok(());
                    }
                    v.insert("sessionId".to_string(), session_id);
                }
                Err(error::NewSessionError::NotW3C(Json::Object(v)))
            }
            Ok(v) | Err(error::CmdError::NotW3C(v)) => Err(error::NewSessionError::NotW3C(v)),
            Err(error::CmdError::Failed(e)) => Err(error::NewSessionError::Failed(e)),
            Err(error::CmdError::Lost(e)) => Err(error::NewSessionError::Lost(e)),
            Err(error::CmdError::Http(e)) => {
                Err(error::NewSessionError::Lost(io::Error::other(e)))
            }
            Err(error::CmdError::NotJson(v)) => {
                Err(error::NewSessionError::NotW3C(Json::String(v)))
            }
            Err(error::CmdError::Standard(e)) if e.error == ErrorStatus::SessionNotCreated => {
                Err(error::NewSessionError::SessionNotCreated(e))
            }
            Err(e) => {
                panic!("unexpected webdriver error; {}", e);
            }
        }
    }

    pub(crate) async fn with_capabilities_and_connector(
        webdriver: &str,
        cap: &Capabilities,
        connector: C,
    ) -> Result<Client, error::NewSessionError> {
        // Where is the WebDriver server?
        let wdb = webdriver
            .parse::<url::Url>()
            .map_err(error::NewSessionError::BadWebdriverUrl)?;

        let client = hyper_legacy::Client::builder(TokioExecutor::new()).build(connector);

        // We're going to need a channel for sending requests to the WebDriver host
        let (tx, rx) = mpsc::unbounded_channel();

        // Set up our WebDriver session.
        tokio::spawn(
            Session {
                rx,
                client,
                wdb,
                session: None,
                legacy: false,
                persist: false,
            }
            .run(),
        );

        // now that the session loop is running, let's do the handshake
        let client = Client {
            tx,
            is_legacy: false,
        };

        // Create a new session for this client
        // https://www.w3.org/TR/webdriver/#dfn-new-session
        // https://www.w3.org/TR/webdriver/#capabilities
        //  - we want the browser to wait for the page to load
        let mut cap = cap.to_owned();
        cap.insert("pageLoadStrategy".to_string(), Json::from("normal"));

        // make chrome comply with w3c
        cap.entry("goog:chromeOptions".to_string())
            .or_insert_with(|| Json::Object(serde_json::Map::new()))
            .as_object_mut()
            .expect("goog:chromeOptions wasn't a JSON object")
            .insert("w3c".to_string(), Json::from(true));

        let session_config = webdriver::capabilities::SpecNewSessionParameters {
            alwaysMatch: cap.clone(),
            firstMatch: vec![webdriver::capabilities::Capabilities::new()],
        };
        let spec = webdriver::command::NewSessionParameters::Spec(session_config);

        match client
            .issue(WebDriverCommand::NewSession(spec))
            .map(Self::map_handshake_response)
            .await
        {
            Ok(_) => Ok(client),
            Err(error::NewSessionError::NotW3C(json)) => {
                // maybe try legacy mode?
                let mut legacy = false;
                match json {
                    Json::String(ref err) if err.starts_with("Missing Command Parameter") => {
                        // ghostdriver
                        legacy = true;
                    }
                    Json::Object(ref err) => {
                        legacy = err
                            .get("message")
                            .and_then(|m| m.as_str())
                            .map(|s| {
                                // chromedriver < 2.29 || chromedriver == 2.29 || saucelabs
                                s.contains("cannot find dict 'desiredCapabilities'")
                                    || s.contains("Missing or invalid capabilities")
                                    || s.contains("Unexpected server error.")
                            })
                            .unwrap_or(false);
                    }
                    _ => {}
                }

                if !legacy {
                    return Err(error::NewSessionError::NotW3C(json));
                }

                // we're dealing with an implementation that only supports the legacy
                // WebDriver protocol:
                // https://www.selenium.dev/documentation/legacy/json_wire_protocol/
                let session_config = webdriver::capabilities::LegacyNewSessionParameters {
                    desired: cap,
                    required: webdriver::capabilities::Capabilities::new(),
                };
                let spec = webdriver::command::NewSessionParameters::Legacy(session_config);

                // try again with a legacy client
                client
                    .issue(WebDriverCommand::NewSession(spec))
                    .map(Self::map_handshake_response)
                    .await?;

                Ok(Client {
                    tx: client.tx.clone(),
                    is_legacy: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Helper for issuing a WebDriver command, and then reading and parsing the response.
    ///
    /// Since most command parameters can already be turned directly into JSON, this is mostly
    /// a matter of picking the right URL and method from [the spec], and stuffing the JSON
    /// encoded arguments (if any) into the body.
    ///
    /// [the spec]: https://www.w3.org/TR/webdriver/#list-of-endpoints
    async fn issue_wd_cmd(
        &self,
        cmd: &dyn WebDriverCompatibleCommand,
    ) -> Result<Json, error::CmdError> {
        let mut url = cmd.endpoint(&self.wdb, self.session.as_deref())?;
        // legacy implementations predate the execute/sync split
        if self.legacy {
            if let Some(base) = url.as_str().strip_suffix("execute/sync") {
                url = url::Url::parse(&format!("{}execute", base))?;
            }
        }

        let (method, body) = cmd.method_and_body(&url);

        // issue the command to the webdriver server
        let mut req = hyper::Request::builder().method(method).uri(url.as_str());
        if !url.username().is_empty() || url.password().is_some() {
            req = req.header(
                hyper::header::AUTHORIZATION,
                format!(
                    "Basic {}",
                    BASE64_STANDARD.encode(format!(
                        "{}:{}",
                        url.username(),
                        url.password().unwrap_or("")
                    ))
                ),
            );
        }

        let req = if let Some(body) = body {
            req = req.header(hyper::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
            req = req.header(hyper::header::CONTENT_LENGTH, body.len());
            req.body(Full::new(Bytes::from(body)))
        } else {
            req.body(Full::new(Bytes::new()))
        }
        .expect("failed to construct webdriver request");

        let rsp = self.client.request(req).await?;

        // keep track of result status (.into_body() consumes the response)
        let status = rsp.status();

        // check that the server sent us json
        let ctype = rsp
            .headers()
            .get(hyper::header::CONTENT_TYPE)
            .and_then(|ctype| ctype.to_str().ok()?.parse::<mime::Mime>().ok());

        // What did the server send us?
        let body = rsp.into_body().collect().await?.to_bytes();
        let body = String::from_utf8(body.to_vec())
            .map_err(|e| error::CmdError::NotJson(format!("{}", e)))?;

        match ctype {
            Some(ref ctype)
                if ctype.type_() == mime::APPLICATION_JSON.type_()
                    && ctype.subtype() == mime::APPLICATION_JSON.subtype() => {}
            _ => {
                // nope, something else...
                return Err(error::CmdError::NotJson(body));
            }
        }

        let is_new_session = cmd.is_new_session();
        let mut is_success = status.is_success();
        let mut legacy_status = 0;

        // https://www.w3.org/TR/webdriver/#dfn-send-a-response
        // NOTE: the standard specifies that even errors use the "Send a Response" steps
        let body = match serde_json::from_str(&body)? {
            Json::Object(mut v) => {
                if self.legacy {
                    match v.get("status").and_then(Json::as_u64) {
                        Some(status) => {
                            legacy_status = status;
                            is_success = legacy_status == 0;
                        }
                        None => return Err(error::CmdError::NotW3C(Json::Object(v))),
                    }
                }

                if self.legacy && is_new_session {
                    // legacy implementations do not wrap sessionId inside "value"
                    Ok(Json::Object(v))
                } else {
                    v.remove("value")
                        .ok_or_else(|| error::CmdError::NotW3C(Json::Object(v)))
                }
            }
            v => Err(error::CmdError::NotW3C(v)),
        }?;

        if is_success {
            return Ok(body);
        }

        // https://www.w3.org/TR/webdriver/#dfn-send-an-error
        // https://www.w3.org/TR/webdriver/#handling-errors
        let mut body = match body {
            Json::Object(o) => o,
            j => return Err(error::CmdError::NotW3C(j)),
        };

        // phantomjs injects a *huge* field with the entire screen contents -- remove that
        body.remove("screen");

        let es = if self.legacy {
            // old clients use status codes instead of "error", and we now have to map them
            // https://www.selenium.dev/documentation/legacy/json_wire_protocol/#response-status-codes
            if !body.contains_key("message") || !body["message"].is_string() {
                return Err(error::CmdError::NotW3C(Json::Object(body)));
            }
            match legacy_status {
                6 | 33 => ErrorStatus::SessionNotCreated,
                7 => ErrorStatus::NoSuchElement,
                8 => ErrorStatus::NoSuchFrame,
                9 => ErrorStatus::UnknownCommand,
                10 => ErrorStatus::StaleElementReference,
                11 => ErrorStatus::ElementNotInteractable,
                12 => ErrorStatus::InvalidElementState,
                13 => ErrorStatus::UnknownError,
                15 => ErrorStatus::ElementNotSelectable,
                17 => ErrorStatus::JavascriptError,
                19 | 32 => ErrorStatus::InvalidSelector,
                21 => ErrorStatus::Timeout,
                23 => ErrorStatus::NoSuchWindow,
                24 => ErrorStatus::InvalidCookieDomain,
                25 => ErrorStatus::UnableToSetCookie,
                26 => ErrorStatus::UnexpectedAlertOpen,
                27 => ErrorStatus::NoSuchAlert,
                28 => ErrorStatus::ScriptTimeout,
                29 => ErrorStatus::InvalidCoordinates,
                34 => ErrorStatus::MoveTargetOutOfBounds,
                _ => return Err(error::CmdError::NotW3C(Json::Object(body))),
            }
        } else {
            if !body.contains_key("error")
                || !body.contains_key("message")
                || !body["error"].is_string()
                || !body["message"].is_string()
            {
                return Err(error::CmdError::NotW3C(Json::Object(body)));
            }

            use hyper::StatusCode;
            let error = body["error"].as_str().unwrap();
            match status {
                StatusCode::BAD_REQUEST => match error {
                    "element click intercepted" => ErrorStatus::ElementClickIntercepted,
                    "element not selectable" => ErrorStatus::ElementNotSelectable,
                    "element not interactable" => ErrorStatus::ElementNotInteractable,
                    "insecure certificate" => ErrorStatus::InsecureCertificate,
                    "invalid argument" => ErrorStatus::InvalidArgument,
                    "invalid cookie domain" => ErrorStatus::InvalidCookieDomain,
                    "invalid coordinates" => ErrorStatus::InvalidCoordinates,
                    "invalid element state" => ErrorStatus::InvalidElementState,
                    "invalid selector" => ErrorStatus::InvalidSelector,
                    "no such alert" => ErrorStatus::NoSuchAlert,
                    "no such frame" => ErrorStatus::NoSuchFrame,
                    "no such window" => ErrorStatus::NoSuchWindow,
                    "stale element reference" => ErrorStatus::StaleElementReference,
                    _ => return Err(error::CmdError::NotW3C(Json::Object(body))),
                },
                StatusCode::NOT_FOUND => match error {
                    "unknown command" => ErrorStatus::UnknownCommand,
                    "no such cookie" => ErrorStatus::NoSuchCookie,
                    "invalid session id" => ErrorStatus::InvalidSessionId,
                    "no such element" => ErrorStatus::NoSuchElement,
                    _ => return Err(error::CmdError::NotW3C(Json::Object(body))),
                },
                StatusCode::INTERNAL_SERVER_ERROR => match error {
                    "javascript error" => ErrorStatus::JavascriptError,
                    "move target out of bounds" => ErrorStatus::MoveTargetOutOfBounds,
                    "session not created" => ErrorStatus::SessionNotCreated,
                    "unable to set cookie" => ErrorStatus::UnableToSetCookie,
                    "unable to capture screen" => ErrorStatus::UnableToCaptureScreen,
                    "unexpected alert open" => ErrorStatus::UnexpectedAlertOpen,
                    "unknown error" => ErrorStatus::UnknownError,
                    "unsupported operation" => ErrorStatus::UnsupportedOperation,
                    _ => return Err(error::CmdError::NotW3C(Json::Object(body))),
                },
                StatusCode::REQUEST_TIMEOUT => match error {
                    "timeout" => ErrorStatus::Timeout,
                    "script timeout" => ErrorStatus::ScriptTimeout,
                    _ => return Err(error::CmdError::NotW3C(Json::Object(body))),
                },
                StatusCode::METHOD_NOT_ALLOWED => match error {
                    "unknown method" => ErrorStatus::UnknownMethod,
                    _ => return Err(error::CmdError::NotW3C(Json::Object(body))),
                },
                _ => return Err(error::CmdError::NotW3C(Json::Object(body))),
            }
        };

        let message = body["message"].as_str().unwrap().to_string();
        Err(error::CmdError::from_webdriver_error(WebDriverError::new(
            es, message,
        )))
    }
}
