//! Screenshot comparison against revision-keyed baselines.
//!
//! Baselines live under the harness baseline directory, keyed by the extended case tags, the
//! shot name, and the baseline revision:
//!
//! ```text
//! <baseline_dir>/osmLayer/firefox/osmPan.rev6.png
//! ```
//!
//! When a comparison fails, the capture is written next to the baseline with a `.new.png`
//! suffix so it can be inspected. Setting the environment variable in [`BLESS_ENV`] to `all`
//! (or to a comma-separated list of shot names) promotes captures to baselines instead of
//! failing, which is how a baseline set is first created.

use crate::error::ScreenshotError;
use crate::scenario::CaseTags;
use image::RgbImage;
use log::{debug, info};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Environment variable that promotes captures to baselines: `all`, or a comma-separated
/// list of shot names.
pub const BLESS_ENV: &str = "DIORAMA_BLESS";

/// Where the baseline for `(tags, name, revision)` lives under `dir`.
pub fn baseline_path(dir: &Path, tags: &CaseTags, name: &str, revision: u32) -> PathBuf {
    let mut path = dir.to_path_buf();
    for tag in tags.iter() {
        path.push(tag);
    }
    path.push(format!("{}.rev{}.png", name, revision));
    path
}

fn capture_path(baseline: &Path) -> PathBuf {
    baseline.with_extension("new.png")
}

fn blessed(name: &str) -> bool {
    match env::var(BLESS_ENV) {
        Ok(v) => v == "all" || v.split(',').any(|n| n == name),
        Err(_) => false,
    }
}

/// Compare a PNG capture against its baseline.
///
/// The capture passes if its mean absolute per-channel difference from the baseline, normalized
/// to `[0, 1]`, is within `threshold`. Anything else -- missing baseline, size mismatch, or a
/// difference beyond the threshold -- fails the comparison and leaves the capture on disk.
pub(crate) fn compare(
    baseline_dir: &Path,
    tags: &CaseTags,
    name: &str,
    revision: u32,
    capture_png: &[u8],
    threshold: f64,
) -> Result<(), ScreenshotError> {
    let baseline = baseline_path(baseline_dir, tags, name, revision);
    let capture = capture_path(&baseline);

    let captured =
        image::load_from_memory_with_format(capture_png, image::ImageFormat::Png)?.into_rgb8();

    let expected = match image::open(&baseline) {
        Ok(contents) => contents.into_rgb8(),
        Err(image::ImageError::IoError(e)) if e.kind() == ErrorKind::NotFound => {
            if blessed(name) {
                write_png(&baseline, capture_png)?;
                info!("{} {}: blessed new baseline at {}", tags, name, baseline.display());
                return Ok(());
            }
            write_png(&capture, capture_png)?;
            return Err(ScreenshotError::MissingBaseline { baseline, capture });
        }
        Err(e) => return Err(e.into()),
    };

    if expected.dimensions() != captured.dimensions() {
        write_png(&capture, capture_png)?;
        return Err(ScreenshotError::SizeMismatch {
            expected: expected.dimensions(),
            actual: captured.dimensions(),
        });
    }

    let mean = mean_difference(&expected, &captured);
    debug!("{} {} rev {}: mean difference {}", tags, name, revision, mean);

    if mean > threshold {
        if blessed(name) {
            write_png(&baseline, capture_png)?;
            info!("{} {}: updated baseline at {}", tags, name, baseline.display());
            return Ok(());
        }
        write_png(&capture, capture_png)?;
        return Err(ScreenshotError::Mismatch {
            mean,
            threshold,
            capture,
        });
    }

    // drop any stale capture left over from an earlier failing run
    match fs::remove_file(&capture) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Mean absolute per-channel difference between two same-sized images, normalized to `[0, 1]`.
fn mean_difference(a: &RgbImage, b: &RgbImage) -> f64 {
    if a.as_raw().is_empty() {
        return 0.0;
    }

    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();
    total as f64 / (a.as_raw().len() as f64 * 255.0)
}

fn write_png(path: &Path, bytes: &[u8]) -> Result<(), ScreenshotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;

    fn scratch_dir(test: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("diorama-shot-{}-{}", test, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn png_of(color: [u8; 3], width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn tags() -> CaseTags {
        CaseTags::new(["osmLayer", "firefox"])
    }

    #[test]
    fn baselines_are_keyed_by_tags_name_and_revision() {
        let path = baseline_path(Path::new("baselines"), &tags(), "osmPan", 6);
        assert_eq!(
            path,
            Path::new("baselines")
                .join("osmLayer")
                .join("firefox")
                .join("osmPan.rev6.png")
        );
    }

    #[test]
    fn missing_baseline_fails_and_writes_the_capture() {
        let dir = scratch_dir("missing");
        let r = compare(&dir, &tags(), "osmDraw", 6, &png_of([10, 20, 30], 4, 4), 0.002);

        match r {
            Err(ScreenshotError::MissingBaseline { baseline, capture }) => {
                assert!(!baseline.exists());
                assert!(capture.exists());
                assert!(capture.ends_with("osmLayer/firefox/osmDraw.rev6.new.png"));
            }
            r => panic!("unexpected result: {:?}", r),
        }
    }

    #[test]
    fn identical_capture_passes_and_clears_stale_captures() {
        let dir = scratch_dir("identical");
        let png = png_of([10, 20, 30], 4, 4);
        let baseline = baseline_path(&dir, &tags(), "osmDraw", 6);
        write_png(&baseline, &png).unwrap();

        // a leftover capture from an earlier failure should be cleaned up on success
        let stale = baseline.with_extension("new.png");
        write_png(&stale, &png).unwrap();

        compare(&dir, &tags(), "osmDraw", 6, &png, 0.0).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn capture_beyond_the_threshold_fails() {
        let dir = scratch_dir("mismatch");
        write_png(
            &baseline_path(&dir, &tags(), "osmPan", 6),
            &png_of([0, 0, 0], 4, 4),
        )
        .unwrap();

        let r = compare(&dir, &tags(), "osmPan", 6, &png_of([255, 255, 255], 4, 4), 0.002);
        match r {
            Err(ScreenshotError::Mismatch {
                mean,
                threshold,
                capture,
            }) => {
                assert!((mean - 1.0).abs() < 1e-9);
                assert_eq!(threshold, 0.002);
                assert!(capture.exists());
            }
            r => panic!("unexpected result: {:?}", r),
        }
    }

    #[test]
    fn small_differences_within_the_threshold_pass() {
        let dir = scratch_dir("within");
        write_png(
            &baseline_path(&dir, &tags(), "osmPan", 6),
            &png_of([100, 100, 100], 4, 4),
        )
        .unwrap();

        // one grey level apart on every channel: mean = 1/255 ~ 0.0039
        compare(&dir, &tags(), "osmPan", 6, &png_of([101, 101, 101], 4, 4), 0.004).unwrap();
    }

    #[test]
    fn size_mismatch_is_reported_as_such() {
        let dir = scratch_dir("size");
        write_png(
            &baseline_path(&dir, &tags(), "osmDraw", 6),
            &png_of([10, 20, 30], 4, 4),
        )
        .unwrap();

        let r = compare(&dir, &tags(), "osmDraw", 6, &png_of([10, 20, 30], 8, 4), 0.002);
        match r {
            Err(ScreenshotError::SizeMismatch { expected, actual }) => {
                assert_eq!(expected, (4, 4));
                assert_eq!(actual, (8, 4));
            }
            r => panic!("unexpected result: {:?}", r),
        }
    }
}
