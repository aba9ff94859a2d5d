//! The tiled-map scenarios: a plain draw, and a pan that must settle before capture.

use diorama::{Browser, Scenario};
use serial_test::serial;

mod common;

fn osm_draw() -> Scenario {
    Scenario::new("osmLayer", "osmLayer/index.html").screenshot_at_revision("osmDraw", 6)
}

/// Drag must be followed by an idle wait before the capture; tiles are still loading right
/// after the pointer is released.
fn osm_pan() -> Scenario {
    Scenario::new("osmLayer", "osmLayer/index.html")
        .drag("#map", (200, 150))
        .wait_for_idle()
        .screenshot_at_revision("osmPan", 6)
}

mod firefox {
    use super::*;

    #[test]
    #[serial]
    fn osm_draw_matches_baseline() {
        tester!(osm_draw(), Browser::Firefox);
    }

    #[test]
    #[serial]
    fn osm_pan_matches_baseline() {
        tester!(osm_pan(), Browser::Firefox);
    }
}

mod chrome {
    use super::*;

    #[test]
    #[serial]
    fn osm_draw_matches_baseline() {
        tester!(osm_draw(), Browser::Chrome);
    }

    #[test]
    #[serial]
    fn osm_pan_matches_baseline() {
        tester!(osm_pan(), Browser::Chrome);
    }
}
