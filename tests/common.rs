//! Helpers shared by the scenario test suites.
//!
//! Scenario tests need live geckodriver/chromedriver processes on their conventional ports,
//! so they are gated behind `DIORAMA_WEBDRIVER_TESTS=1` and skip themselves otherwise. On a
//! first run there are no baseline images yet; run once with `DIORAMA_BLESS=all` to record
//! them, then commit `tests/baselines`.
#![allow(dead_code)]

use diorama::Harness;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

/// Env var gating tests that need live webdriver processes: `1`, `all`, or a
/// comma-separated list of browser names.
pub const WEBDRIVER_ENV: &str = "DIORAMA_WEBDRIVER_TESTS";

pub fn webdriver_tests_enabled(browser: &str) -> bool {
    match std::env::var(WEBDRIVER_ENV) {
        Ok(v) => v == "1" || v == "all" || v.split(',').any(|b| b == browser),
        Err(_) => false,
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A harness serving `tests/pages` from the given port, with baselines under
/// `tests/baselines`.
pub fn harness(port: u16) -> Harness {
    Harness::new(format!("http://localhost:{}/", port).parse().unwrap()).baseline_dir(
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("baselines"),
    )
}

pub fn handle_test_error(
    res: Result<Result<(), diorama::error::RunError>, Box<dyn std::any::Any + Send>>,
) -> bool {
    match res {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            eprintln!("scenario failed to run: {}", e);
            false
        }
        Err(e) => {
            if let Some(e) = e.downcast_ref::<diorama::error::RunError>() {
                eprintln!("scenario panicked: {:?}", e);
            } else {
                eprintln!("scenario panicked; an assertion probably failed");
            }
            false
        }
    }
}

/// Run a scenario in the given browser, with the page server and harness set up around it.
#[macro_export]
macro_rules! tester {
    // The first expression should produce a `Scenario`, the second a `Browser`.
    ($scenario:expr, $browser:expr) => {{
        let browser = $browser;
        if !crate::common::webdriver_tests_enabled(browser.tag()) {
            eprintln!(
                "skipping scenario test; set {}=1 to enable",
                crate::common::WEBDRIVER_ENV
            );
            return;
        }
        crate::common::init_logging();

        let port = crate::common::setup_server();
        let scenario = $scenario;
        let harness = crate::common::harness(port);

        // run in its own thread to catch panics
        let res = std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(harness.run(browser, &scenario))
        })
        .join();
        assert!(crate::common::handle_test_error(res));
    }};
}

/// Sets up the page server and returns the port it bound to.
pub fn setup_server() -> u16 {
    let (tx, rx) = std::sync::mpsc::channel();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("failed to bind page server");
            tx.send(listener.local_addr().unwrap().port())
                .expect("to be able to send the port");

            loop {
                let stream = match listener.accept().await {
                    Ok((stream, _)) => stream,
                    Err(_) => continue,
                };
                tokio::spawn(async move {
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service_fn(serve_page))
                        .await;
                });
            }
        });
    });

    rx.recv().expect("to get the bound port")
}

/// Serves files under `tests/pages`.
async fn serve_page(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().trim_start_matches('/');
    if path.is_empty() || path.split('/').any(|seg| seg == "..") {
        return Ok(not_found());
    }

    let file = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("pages")
        .join(path);
    match tokio::fs::read(&file).await {
        Ok(contents) => {
            let ctype = match file.extension().and_then(|e| e.to_str()) {
                Some("html") => "text/html; charset=utf-8",
                Some("js") => "text/javascript",
                Some("css") => "text/css",
                Some("png") => "image/png",
                _ => "application/octet-stream",
            };
            Ok(Response::builder()
                .header(hyper::header::CONTENT_TYPE, ctype)
                .body(Full::new(Bytes::from(contents)))
                .unwrap())
        }
        Err(_) => Ok(not_found()),
    }
}

fn not_found() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::new()))
        .unwrap()
}
