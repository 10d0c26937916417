// Folder catalog module
// Scans the compared folders into parallel, name-sorted image lists

use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors detected while building the image set
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to list folder {}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("folder {} contains no .{extension} images", .path.display())]
    Empty { path: PathBuf, extension: String },

    #[error("folders hold different numbers of images: {}", format_counts(.counts))]
    LengthMismatch { counts: Vec<(PathBuf, usize)> },
}

fn format_counts(counts: &[(PathBuf, usize)]) -> String {
    counts
        .iter()
        .map(|(path, count)| format!("{} ({count})", path.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parallel image lists, one per folder, all of the same non-zero length.
///
/// Index `i` in every list refers to the same logical image.
#[derive(Debug, Clone)]
pub struct ImageSet {
    folders: Vec<PathBuf>,
    lists: Vec<Vec<PathBuf>>,
}

impl ImageSet {
    /// Number of folders (display columns)
    pub fn columns(&self) -> usize {
        self.folders.len()
    }

    /// Number of images in each folder
    pub fn len(&self) -> usize {
        self.lists.first().map_or(0, Vec::len)
    }

    pub fn folders(&self) -> &[PathBuf] {
        &self.folders
    }

    /// Path of the image shown in `column` at `index`
    pub fn path(&self, column: usize, index: usize) -> Option<&Path> {
        self.lists
            .get(column)
            .and_then(|list| list.get(index))
            .map(PathBuf::as_path)
    }

    /// Paths of every column at `index`, in column order
    pub fn row(&self, index: usize) -> impl Iterator<Item = Option<&Path>> + '_ {
        (0..self.columns()).map(move |column| self.path(column, index))
    }
}

/// Scan every folder for files with the given extension and validate the result
pub fn scan(folders: &[PathBuf], extension: &str) -> Result<ImageSet, CatalogError> {
    let mut lists = Vec::with_capacity(folders.len());

    for folder in folders {
        let list = list_images(folder, extension)?;
        if list.is_empty() {
            return Err(CatalogError::Empty {
                path: folder.clone(),
                extension: extension.to_string(),
            });
        }
        info!("Found {} images in {}", list.len(), folder.display());
        lists.push(list);
    }

    let expected = lists.first().map_or(0, Vec::len);
    if lists.iter().any(|list| list.len() != expected) {
        let counts = folders
            .iter()
            .cloned()
            .zip(lists.iter().map(Vec::len))
            .collect();
        return Err(CatalogError::LengthMismatch { counts });
    }

    Ok(ImageSet {
        folders: folders.to_vec(),
        lists,
    })
}

/// List the matching files of one folder, sorted by file name
fn list_images(folder: &Path, extension: &str) -> Result<Vec<PathBuf>, CatalogError> {
    let read_dir_err = |source| CatalogError::ReadDir {
        path: folder.to_path_buf(),
        source,
    };

    let mut images = Vec::new();
    for entry in fs::read_dir(folder).map_err(read_dir_err)? {
        let entry = entry.map_err(read_dir_err)?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if has_extension(&path, extension) {
            images.push(path);
        } else {
            debug!("Skipping {}", path.display());
        }
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

/// Case-insensitive extension check
fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
