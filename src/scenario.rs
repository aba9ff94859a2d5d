//! Scenario descriptions.
//!
//! A [`Scenario`] says *what* to test -- which page to load, at which viewport, which
//! interactions to perform, and which screenshots to compare -- independent of which browser
//! executes it. The [`Harness`](crate::Harness) binds a scenario to a concrete browser at run
//! time, so the same description drives Firefox and Chrome unchanged.

use std::fmt;
use std::time::Duration;

/// Default viewport scenario pages are rendered at.
pub const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 640,
    height: 480,
};

/// Default bound on an idle wait.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Ordered tags naming a test case.
///
/// The tag tuple keys every screenshot artifact the case produces. It is immutable once
/// constructed; [`CaseTags::with`] returns an *extended copy*, which is how the runner
/// appends the browser's name without disturbing the scenario's own identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CaseTags(Vec<String>);

impl CaseTags {
    /// Construct a tag tuple from the given parts.
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CaseTags(tags.into_iter().map(Into::into).collect())
    }

    /// Return a copy of this tuple with one more tag appended.
    pub fn with(&self, tag: impl Into<String>) -> Self {
        let mut tags = self.0.clone();
        tags.push(tag.into());
        CaseTags(tags)
    }

    /// Iterate over the tags in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no tags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CaseTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// The browser window size a scenario renders at, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        DEFAULT_VIEWPORT
    }
}

/// A screenshot comparison requested by a scenario step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShotSpec {
    /// The shot name, e.g. `"osmPan"`.
    pub name: String,
    /// Which baseline revision to compare against. `None` falls back to the scenario's
    /// default revision.
    pub revision: Option<u32>,
}

/// One step of a scenario, executed in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Drag the element matching `selector` by `offset` pixels.
    Drag {
        /// CSS selector of the element to drag.
        selector: String,
        /// `(dx, dy)` offset in pixels.
        offset: (i64, i64),
    },
    /// Wait for the page's map to report idle, up to `timeout`.
    WaitForIdle {
        /// Bound on the wait.
        timeout: Duration,
    },
    /// Capture a screenshot and compare it against its baseline.
    Screenshot(ShotSpec),
}

/// A complete scenario: page, viewport, interaction sequence, screenshot comparisons.
///
/// ```
/// use diorama::Scenario;
///
/// let pan = Scenario::new("osmLayer", "osmLayer/index.html")
///     .revision(6)
///     .drag("#map", (200, 150))
///     .wait_for_idle()
///     .screenshot("osmPan");
/// ```
#[derive(Clone, Debug)]
pub struct Scenario {
    tags: CaseTags,
    page: String,
    viewport: Viewport,
    revision: u32,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a scenario named by `tag` that loads `page` (a URL relative to the harness
    /// base URL) at the default 640x480 viewport.
    pub fn new(tag: impl Into<String>, page: impl Into<String>) -> Self {
        Scenario {
            tags: CaseTags::new([tag.into()]),
            page: page.into(),
            viewport: Viewport::default(),
            revision: 0,
            steps: Vec::new(),
        }
    }

    /// Append another tag to the case identity.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags = self.tags.with(tag);
        self
    }

    /// Override the viewport size.
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Viewport { width, height };
        self
    }

    /// Set the default baseline revision for this scenario's screenshots.
    pub fn revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    /// Add a drag step on the element matching `selector`, by `offset` pixels.
    pub fn drag(mut self, selector: impl Into<String>, offset: (i64, i64)) -> Self {
        self.steps.push(Step::Drag {
            selector: selector.into(),
            offset,
        });
        self
    }

    /// Add an idle-wait step with the default 5 second bound.
    pub fn wait_for_idle(self) -> Self {
        self.wait_for_idle_at_most(DEFAULT_IDLE_TIMEOUT)
    }

    /// Add an idle-wait step with an explicit bound.
    pub fn wait_for_idle_at_most(mut self, timeout: Duration) -> Self {
        self.steps.push(Step::WaitForIdle { timeout });
        self
    }

    /// Add a screenshot comparison against the scenario's default revision.
    pub fn screenshot(mut self, name: impl Into<String>) -> Self {
        self.steps.push(Step::Screenshot(ShotSpec {
            name: name.into(),
            revision: None,
        }));
        self
    }

    /// Add a screenshot comparison against an explicit baseline revision.
    pub fn screenshot_at_revision(mut self, name: impl Into<String>, revision: u32) -> Self {
        self.steps.push(Step::Screenshot(ShotSpec {
            name: name.into(),
            revision: Some(revision),
        }));
        self
    }

    /// The case tags naming this scenario.
    pub fn tags(&self) -> &CaseTags {
        &self.tags
    }

    /// The page this scenario loads, relative to the harness base URL.
    pub fn page(&self) -> &str {
        &self.page
    }

    /// The viewport this scenario renders at.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// The default baseline revision for this scenario's screenshots.
    pub fn default_revision(&self) -> u32 {
        self.revision
    }

    /// The steps, in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenarios_default_to_640_by_480() {
        let s = Scenario::new("osmLayer", "osmLayer/index.html");
        assert_eq!(
            s.viewport(),
            Viewport {
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn with_extends_a_copy_and_leaves_the_original_alone() {
        let tags = CaseTags::new(["osmLayer"]);
        let extended = tags.with("firefox");

        assert_eq!(tags.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.iter().collect::<Vec<_>>(), ["osmLayer", "firefox"]);
        assert_eq!(extended.to_string(), "osmLayer/firefox");
    }

    #[test]
    fn steps_preserve_declaration_order() {
        let s = Scenario::new("osmLayer", "osmLayer/index.html")
            .revision(6)
            .drag("#map", (200, 150))
            .wait_for_idle()
            .screenshot("osmPan");

        match s.steps() {
            [Step::Drag { selector, offset }, Step::WaitForIdle { timeout }, Step::Screenshot(shot)] =>
            {
                assert_eq!(selector, "#map");
                assert_eq!(*offset, (200, 150));
                assert_eq!(*timeout, Duration::from_secs(5));
                assert_eq!(shot.name, "osmPan");
                assert_eq!(shot.revision, None);
            }
            steps => panic!("unexpected steps: {:?}", steps),
        }
    }

    #[test]
    fn explicit_shot_revision_overrides_the_default() {
        let s = Scenario::new("osmLayer", "osmLayer/index.html")
            .revision(6)
            .screenshot_at_revision("osmDraw", 7);

        match s.steps() {
            [Step::Screenshot(shot)] => assert_eq!(shot.revision, Some(7)),
            steps => panic!("unexpected steps: {:?}", steps),
        }
        assert_eq!(s.default_revision(), 6);
    }
}
