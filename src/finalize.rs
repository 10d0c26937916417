// Finalization module
// Moves the files marked during the session to the desktop trash

use crate::app::MarkMatrix;
use crate::catalog::ImageSet;
use log::{debug, error, info};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error returned by a single trash operation
#[derive(Debug, Error)]
pub enum TrashError {
    #[error(transparent)]
    System(#[from] trash::Error),
    #[error("{0}")]
    Message(String),
}

/// Error returned when some marked files could not be trashed
#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("failed to trash {} of the marked files ({} moved to trash)", .failed.len(), .trashed.len())]
    Partial {
        trashed: Vec<PathBuf>,
        failed: Vec<(PathBuf, TrashError)>,
    },
}

/// Reversible delete primitive
pub trait Trasher {
    fn trash(&self, path: &Path) -> Result<(), TrashError>;
}

/// Moves files to the platform trash
pub struct SystemTrash;

impl Trasher for SystemTrash {
    fn trash(&self, path: &Path) -> Result<(), TrashError> {
        trash::delete(path)?;
        Ok(())
    }
}

/// Only reports what would be trashed
pub struct DryRun;

impl Trasher for DryRun {
    fn trash(&self, path: &Path) -> Result<(), TrashError> {
        info!("Would move to trash: {}", path.display());
        Ok(())
    }
}

/// Files sent to the trash by a successful finalization
#[derive(Debug, Default)]
pub struct Report {
    pub trashed: Vec<PathBuf>,
}

/// Send every marked (folder, index) file to the trash.
///
/// Runs once after the session ends. A failing file does not stop the others;
/// failures are collected into [`FinalizeError::Partial`]. A path reached
/// through more than one marked cell is only handed to `trasher` once.
pub fn delete_marked_images(
    images: &ImageSet,
    marks: &MarkMatrix,
    trasher: &impl Trasher,
) -> Result<Report, FinalizeError> {
    let mut trashed = Vec::new();
    let mut failed = Vec::new();
    let mut handled = BTreeSet::new();

    for (column, index) in marks.marked() {
        let Some(path) = images.path(column, index) else {
            continue;
        };
        if !handled.insert(path) {
            debug!("Already handled: {}", path.display());
            continue;
        }

        match trasher.trash(path) {
            Ok(()) => {
                info!("Moved to trash: {}", path.display());
                trashed.push(path.to_path_buf());
            }
            Err(e) => {
                error!("Failed to move {} to trash: {}", path.display(), e);
                failed.push((path.to_path_buf(), e));
            }
        }
    }

    if failed.is_empty() {
        Ok(Report { trashed })
    } else {
        Err(FinalizeError::Partial { trashed, failed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Mode, Session};
    use crate::catalog::scan;
    use crate::image_loader::{load_row, MARK_COLOR};
    use crate::render::framed_panels;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    /// Records every path it is asked to trash; fails on listed file names
    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<PathBuf>>,
        fail_on: Vec<&'static str>,
    }

    impl Trasher for Recorder {
        fn trash(&self, path: &Path) -> Result<(), TrashError> {
            self.seen.borrow_mut().push(path.to_path_buf());
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if self.fail_on.iter().any(|fail| *fail == name) {
                return Err(TrashError::Message(format!("permission denied: {name}")));
            }
            Ok(())
        }
    }

    fn png_folder(names: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in names {
            image::RgbaImage::from_pixel(40, 40, image::Rgba([255, 255, 255, 255]))
                .save(dir.path().join(name))
                .unwrap();
        }
        dir
    }

    #[test]
    fn nothing_marked_trashes_nothing() {
        let a = png_folder(&["img0.png"]);
        let set = scan(&[a.path().to_path_buf()], "png").unwrap();
        let recorder = Recorder::default();

        let report = delete_marked_images(&set, &MarkMatrix::new(1, 1), &recorder).unwrap();

        assert!(report.trashed.is_empty());
        assert!(recorder.seen.borrow().is_empty());
    }

    #[test]
    fn failures_do_not_stop_the_loop() {
        let a = png_folder(&["img0.png", "img1.png", "img2.png"]);
        let set = scan(&[a.path().to_path_buf()], "png").unwrap();
        let mut marks = MarkMatrix::new(1, 3);
        marks.toggle(0, 0);
        marks.toggle(0, 2);
        let recorder = Recorder {
            fail_on: vec!["img0.png"],
            ..Recorder::default()
        };

        let err = delete_marked_images(&set, &marks, &recorder).unwrap_err();

        assert_eq!(recorder.seen.borrow().len(), 2);
        let FinalizeError::Partial { trashed, failed } = &err;
        assert_eq!(trashed, &vec![a.path().join("img2.png")]);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, a.path().join("img0.png"));
        assert_eq!(err.to_string(), "failed to trash 1 of the marked files (1 moved to trash)");
    }

    #[test]
    fn dry_run_leaves_files_in_place() {
        let a = png_folder(&["img0.png"]);
        let set = scan(&[a.path().to_path_buf()], "png").unwrap();
        let mut marks = MarkMatrix::new(1, 1);
        marks.toggle(0, 0);

        let report = delete_marked_images(&set, &marks, &DryRun).unwrap();

        assert_eq!(report.trashed, vec![a.path().join("img0.png")]);
        assert!(a.path().join("img0.png").exists());
    }

    #[test]
    fn marking_session_trashes_exactly_the_marked_file() {
        let a = png_folder(&["img0.png", "img1.png"]);
        let b = png_folder(&["img0.png", "img1.png"]);
        let set = scan(&[a.path().to_path_buf(), b.path().to_path_buf()], "png").unwrap();
        let session = Session::new(set.len(), set.columns(), Mode::Mark);

        let session = session.dispatch("right").session;
        assert_eq!(session.index(), 1);

        let session = session.dispatch("2").session;
        let session = session.dispatch("left").session;
        assert_eq!(session.index(), 0);
        let row = framed_panels(&load_row(&set, session.index()), &session);
        assert!(row.iter().flatten().all(|img| img.pixel(0, 0) != Some(MARK_COLOR)));

        let session = session.dispatch("right").session;
        let row = framed_panels(&load_row(&set, session.index()), &session);
        assert_ne!(row[0].as_ref().and_then(|img| img.pixel(0, 0)), Some(MARK_COLOR));
        assert_eq!(row[1].as_ref().and_then(|img| img.pixel(0, 0)), Some(MARK_COLOR));

        let recorder = Recorder::default();
        let report = delete_marked_images(&set, session.marks(), &recorder).unwrap();

        assert_eq!(report.trashed, vec![b.path().join("img1.png")]);
        assert_eq!(*recorder.seen.borrow(), vec![b.path().join("img1.png")]);
        for path in [a.path().join("img0.png"), a.path().join("img1.png"), b.path().join("img0.png")] {
            assert!(fs::metadata(path).is_ok());
        }
    }

    #[test]
    fn same_file_in_two_columns_is_trashed_once() {
        let a = png_folder(&["img0.png", "img1.png"]);
        let set = scan(&[a.path().to_path_buf(), a.path().to_path_buf()], "png").unwrap();
        let mut marks = MarkMatrix::new(2, 2);
        marks.toggle(0, 0);
        marks.toggle(1, 0);

        let report = delete_marked_images(&set, &marks, &recorder_that_fails_on_repeat()).unwrap();

        assert_eq!(report.trashed, vec![a.path().join("img0.png")]);
    }

    /// Fails the second time it sees a path, like the trash does for a file
    /// that is already gone
    fn recorder_that_fails_on_repeat() -> impl Trasher {
        struct OnceOnly(RefCell<Vec<PathBuf>>);

        impl Trasher for OnceOnly {
            fn trash(&self, path: &Path) -> Result<(), TrashError> {
                let mut seen = self.0.borrow_mut();
                if seen.iter().any(|p| p == path) {
                    return Err(TrashError::Message(format!("{} not found", path.display())));
                }
                seen.push(path.to_path_buf());
                Ok(())
            }
        }

        OnceOnly(RefCell::new(Vec::new()))
    }

    #[test]
    fn system_trash_errors_keep_their_source() {
        let dir = TempDir::new().unwrap();
        // the parent folder does not exist, so nothing reaches the trash
        let missing = dir.path().join("gone").join("img0.png");

        let err = SystemTrash.trash(&missing).unwrap_err();

        assert!(matches!(err, TrashError::System(_)));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn recorder_message_is_displayed_verbatim() {
        let err = TrashError::Message("permission denied: img0.png".into());
        assert_eq!(err.to_string(), "permission denied: img0.png");
        assert!(std::error::Error::source(&err).is_none());
    }
}
