//! The unfilled-points scene: load the page, capture, compare.

use diorama::{Browser, Scenario};
use serial_test::serial;

mod common;

fn gl_points() -> Scenario {
    Scenario::new("glPointsNoFill", "glPointsNoFill/index.html")
        .revision(6)
        .screenshot("drawGlPointsNoFill")
}

mod firefox {
    use super::*;

    #[test]
    #[serial]
    fn draw_gl_points_no_fill() {
        tester!(gl_points(), Browser::Firefox);
    }
}

mod chrome {
    use super::*;

    #[test]
    #[serial]
    fn draw_gl_points_no_fill() {
        tester!(gl_points(), Browser::Chrome);
    }
}
