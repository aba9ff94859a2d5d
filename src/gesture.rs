//! Pointer gestures for scenario interactions.
//!
//! The only gesture scenarios perform is a mouse drag: press on an element, move by an
//! offset, release. The sequence is serialized directly as a W3C [actions] payload and sent
//! through the [`WebDriverCompatibleCommand`] seam, so the virtual mouse behaves exactly as
//! the standard prescribes on both geckodriver and chromedriver.
//!
//! [actions]: https://www.w3.org/TR/webdriver1/#actions

use crate::elements::Element;
use crate::wd::WebDriverCompatibleCommand;
use http::Method;
use serde_json::json;
use std::time::Duration;
use url::{ParseError, Url};
use webdriver::common::ELEMENT_KEY;

/// The mouse button index for the left (primary) button.
pub const MOUSE_BUTTON_LEFT: u64 = 0;

const DEFAULT_MOVE_DURATION: Duration = Duration::from_millis(250);

/// A mouse drag gesture.
///
/// The pointer first moves to the center of the origin element, presses the left button,
/// moves by the configured offset over the configured duration, and releases.
///
/// ```no_run
/// # use diorama::{Client, Locator, gesture::Drag};
/// # async fn pan(client: &Client) -> Result<(), diorama::error::CmdError> {
/// let map = client.find(Locator::Css("#map")).await?;
/// client.perform(Drag::on(&map).by(200, 150)).await?;
/// client.release_actions().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Drag {
    origin: String,
    dx: i64,
    dy: i64,
    duration: Duration,
}

impl Drag {
    /// Start a drag on the center of the given element.
    pub fn on(element: &Element) -> Self {
        Self::on_element_id(element.element_id())
    }

    /// Start a drag on the center of the element with the given WebDriver reference id.
    pub fn on_element_id(id: impl Into<String>) -> Self {
        Self {
            origin: id.into(),
            dx: 0,
            dy: 0,
            duration: DEFAULT_MOVE_DURATION,
        }
    }

    /// Set the drag offset in pixels, relative to where the pointer pressed.
    pub fn by(mut self, dx: i64, dy: i64) -> Self {
        self.dx = dx;
        self.dy = dy;
        self
    }

    /// Set the duration of the pointer move. Drivers interpolate intermediate pointer events
    /// over this span, which is what lets pages observe the drag as a gesture rather than a
    /// teleport.
    pub fn over(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

impl WebDriverCompatibleCommand for Drag {
    fn endpoint(&self, base_url: &Url, session_id: Option<&str>) -> Result<Url, ParseError> {
        base_url.join(&format!(
            "session/{}/actions",
            session_id.expect("gesture issued without a session")
        ))
    }

    fn method_and_body(&self, _request_url: &Url) -> (Method, Option<String>) {
        let mut origin = serde_json::Map::new();
        origin.insert(
            ELEMENT_KEY.to_string(),
            serde_json::Value::String(self.origin.clone()),
        );

        let payload = json!({
            "actions": [{
                "type": "pointer",
                "id": "mouse",
                "parameters": { "pointerType": "mouse" },
                "actions": [
                    { "type": "pointerMove", "duration": 0, "origin": origin, "x": 0, "y": 0 },
                    { "type": "pointerDown", "button": MOUSE_BUTTON_LEFT },
                    {
                        "type": "pointerMove",
                        "duration": self.duration.as_millis() as u64,
                        "origin": "pointer",
                        "x": self.dx,
                        "y": self.dy,
                    },
                    { "type": "pointerUp", "button": MOUSE_BUTTON_LEFT },
                ],
            }],
        });

        (Method::POST, Some(payload.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as Json;

    #[test]
    fn drag_posts_to_the_actions_endpoint() {
        let drag = Drag::on_element_id("abc123").by(200, 150);
        let base = Url::parse("http://localhost:4444/").unwrap();
        let url = drag.endpoint(&base, Some("deadbeef")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4444/session/deadbeef/actions");

        let (method, body) = drag.method_and_body(&url);
        assert_eq!(method, Method::POST);
        assert!(body.is_some());
    }

    #[test]
    fn drag_sequence_is_press_move_release() {
        let drag = Drag::on_element_id("abc123")
            .by(200, 150)
            .over(Duration::from_millis(500));
        let base = Url::parse("http://localhost:4444/").unwrap();
        let url = drag.endpoint(&base, Some("deadbeef")).unwrap();
        let (_, body) = drag.method_and_body(&url);
        let payload: Json = serde_json::from_str(&body.unwrap()).unwrap();

        let seq = &payload["actions"][0];
        assert_eq!(seq["type"], "pointer");
        assert_eq!(seq["parameters"]["pointerType"], "mouse");

        let actions = seq["actions"].as_array().unwrap();
        let kinds: Vec<&str> = actions
            .iter()
            .map(|a| a["type"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            ["pointerMove", "pointerDown", "pointerMove", "pointerUp"]
        );

        // the first move targets the element, the second is relative to the pointer
        assert_eq!(actions[0]["origin"][ELEMENT_KEY], "abc123");
        assert_eq!(actions[2]["origin"], "pointer");
        assert_eq!(actions[2]["x"], 200);
        assert_eq!(actions[2]["y"], 150);
        assert_eq!(actions[2]["duration"], 500);
    }
}
