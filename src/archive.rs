//! Archive packaging for build output trees.
//!
//! Both formats yield the same layout when extracted: a single top-level
//! directory named after the source tree, holding its full recursive contents.
//! - `.tar.gz`: gzip-compressed tar, top-level entry = source dir name
//! - `.zip`: deflate zip, each file stored relative to the source's parent
//!
//! Encoding runs on tokio's blocking pool so several archives can be written
//! at once without stalling the coordinating runtime.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;
use crate::models::{ArchiveFormat, ArchiveReport};

/// Pack `source` into `target`, using the format implied by `target`'s suffix.
pub async fn compress_dir(source: &Path, target: &Path) -> Result<ArchiveReport, ArchiveError> {
    let format = ArchiveFormat::from_target(target)?;
    let source = source.to_path_buf();
    let target = target.to_path_buf();

    tokio::task::spawn_blocking(move || compress_dir_blocking(&source, &target, format))
        .await
        .map_err(|e| ArchiveError::Panicked(e.to_string()))?
}

/// Synchronous archive writer; removes the partial target on failure.
pub fn compress_dir_blocking(
    source: &Path,
    target: &Path,
    format: ArchiveFormat,
) -> Result<ArchiveReport, ArchiveError> {
    if !source.is_dir() {
        return Err(ArchiveError::SourceMissing(source.to_path_buf()));
    }
    let top_level = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ArchiveError::UnnamedSource(source.to_path_buf()))?;

    let files = collect_files(source).map_err(io_error(source))?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
    }

    log::debug!(
        "Packing {} ({} files) into {}",
        source.display(),
        files.len(),
        target.display()
    );

    let written = match format {
        ArchiveFormat::TarGz => write_tar_gz(source, &top_level, target),
        ArchiveFormat::Zip => write_zip(source, &top_level, &files, target),
    };

    if let Err(e) = written {
        let _ = fs::remove_file(target);
        return Err(e);
    }

    let bytes = fs::metadata(target).map_err(io_error(target))?.len();
    Ok(ArchiveReport {
        format,
        files: files.len(),
        bytes,
    })
}

fn write_tar_gz(source: &Path, top_level: &str, target: &Path) -> Result<(), ArchiveError> {
    let file = File::create(target).map_err(io_error(target))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    builder
        .append_dir_all(top_level, source)
        .map_err(io_error(source))?;

    // into_inner writes the tar trailer, finish the gzip footer
    let encoder = builder.into_inner().map_err(io_error(target))?;
    encoder.finish().map_err(io_error(target))?;
    Ok(())
}

fn write_zip(
    source: &Path,
    top_level: &str,
    files: &[PathBuf],
    target: &Path,
) -> Result<(), ArchiveError> {
    let file = File::create(target).map_err(io_error(target))?;
    let mut writer = ZipWriter::new(file);

    for relative in files {
        let path = source.join(relative);
        let metadata = fs::metadata(&path).map_err(io_error(&path))?;

        let mut options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(metadata.len() >= u32::MAX as u64);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            options = options.unix_permissions(metadata.permissions().mode());
        }

        writer.start_file(entry_name(top_level, relative), options)?;
        let mut input = File::open(&path).map_err(io_error(&path))?;
        io::copy(&mut input, &mut writer).map_err(io_error(&path))?;
    }

    writer.finish()?;
    Ok(())
}

/// Zip entry name: `<top_level>/<relative>` with `/` separators on every platform.
fn entry_name(top_level: &str, relative: &Path) -> String {
    std::iter::once(top_level.to_string())
        .chain(
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned()),
        )
        .collect::<Vec<_>>()
        .join("/")
}

/// Regular files under `root`, relative to it, sorted.
///
/// Symlinked directories are not descended into.
fn collect_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                walk(root, &path, out)?;
            } else if path.is_file() {
                if let Ok(relative) = path.strip_prefix(root) {
                    out.push(relative.to_path_buf());
                }
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    walk(root, root, &mut files)?;
    files.sort();
    Ok(files)
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError {
    let path = path.to_path_buf();
    move |source| ArchiveError::Io { path, source }
}
