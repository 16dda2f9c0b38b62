use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use crate::plugin_system::error::{PluginSystemError, PluginSystemErrorSource};

/// Unpacks a packaged plugin into a destination directory.
pub trait PluginExtractor: Send + Sync + std::fmt::Debug {
    /// Extract `archive` below `dest_root` and return the plugin directory
    /// it produced. The registry passes a fresh staging directory as
    /// `dest_root` and discards it on failure.
    fn extract(&self, archive: &Path, dest_root: &Path) -> Result<PathBuf, PluginSystemError>;
}

/// Extractor for `.tar.gz` / `.tgz` archives holding exactly one top-level
/// directory. Entries escaping the destination are rejected; links are
/// skipped.
#[derive(Debug, Default, Clone)]
pub struct TarGzExtractor;

impl TarGzExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl PluginExtractor for TarGzExtractor {
    fn extract(&self, archive: &Path, dest_root: &Path) -> Result<PathBuf, PluginSystemError> {
        let io_failure = |message: &str, e: std::io::Error| PluginSystemError::InstallError {
            archive: archive.to_path_buf(),
            message: message.to_string(),
            source: Some(Box::new(PluginSystemErrorSource::Io(e))),
        };

        std::fs::create_dir_all(dest_root).map_err(|e| io_failure("cannot create plugins root", e))?;
        let file = File::open(archive).map_err(|e| io_failure("cannot open archive", e))?;
        let gz = flate2::read::GzDecoder::new(file);
        let mut tar = tar::Archive::new(gz);

        let mut top_level = BTreeSet::new();
        let entries = tar.entries().map_err(|e| io_failure("cannot read archive", e))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| io_failure("corrupt archive entry", e))?;
            let entry_path = entry
                .path()
                .map_err(|e| io_failure("invalid entry path", e))?
                .into_owned();
            let relative = sanitize(&entry_path).ok_or_else(|| {
                PluginSystemError::install(
                    archive,
                    format!("entry '{}' escapes the destination", entry_path.display()),
                )
            })?;
            let Some(Component::Normal(first)) = relative.components().next() else {
                continue;
            };

            let outpath = dest_root.join(&relative);
            match entry.header().entry_type() {
                tar::EntryType::Directory => {
                    std::fs::create_dir_all(&outpath).map_err(|e| io_failure("cannot create directory", e))?;
                }
                tar::EntryType::Regular | tar::EntryType::Continuous => {
                    // A bare file at the top level is not a plugin directory
                    if relative.components().count() == 1 {
                        return Err(PluginSystemError::install(
                            archive,
                            format!("top-level file '{}' is not a plugin directory", relative.display()),
                        ));
                    }
                    if let Some(parent) = outpath.parent() {
                        std::fs::create_dir_all(parent).map_err(|e| io_failure("cannot create directory", e))?;
                    }
                    let mut outfile = File::create(&outpath).map_err(|e| io_failure("cannot create file", e))?;
                    std::io::copy(&mut entry, &mut outfile).map_err(|e| io_failure("cannot write file", e))?;
                }
                tar::EntryType::Symlink | tar::EntryType::Link => {
                    log::warn!("Skipping link '{}' in plugin archive", entry_path.display());
                    continue;
                }
                _ => continue,
            }
            top_level.insert(first.to_os_string());
        }

        let mut top_level = top_level.into_iter();
        match (top_level.next(), top_level.next()) {
            (Some(dir), None) => Ok(dest_root.join(dir)),
            (None, _) => Err(PluginSystemError::install(archive, "archive contains no plugin directory")),
            (Some(_), Some(_)) => Err(PluginSystemError::install(
                archive,
                "archive contains more than one top-level directory",
            )),
        }
    }
}

/// Relative path with `.` removed, or `None` if it is absolute or climbs out
fn sanitize(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(clean)
}
