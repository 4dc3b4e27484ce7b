use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

/// Materializes one compressed archive of a directory tree.
pub trait ArchiveProducer {
    /// Writes the archive to `destination` and returns its size in bytes.
    fn produce(&self, source_dir: &Path, destination: &Path) -> Result<u64, String>;
}

/// gzip-compressed tarball with entries rooted at `.`.
///
/// The directory holding `destination` is skipped when it lies inside
/// `source_dir`, so the archive never contains itself. Symlinks are stored as
/// links. Sockets cannot be represented in a tarball and are skipped with a
/// warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzArchiveProducer;

impl ArchiveProducer for TarGzArchiveProducer {
    fn produce(&self, source_dir: &Path, destination: &Path) -> Result<u64, String> {
        if !source_dir.is_dir() {
            return Err(format!(
                "workspace directory {} does not exist",
                source_dir.display()
            ));
        }

        let output_dir = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(output_dir).map_err(|error| {
            format!(
                "failed to create archive directory {}: {error}",
                output_dir.display()
            )
        })?;

        let root = fs::canonicalize(source_dir).map_err(|error| {
            format!("failed to resolve {}: {error}", source_dir.display())
        })?;
        let skip = fs::canonicalize(output_dir).map_err(|error| {
            format!("failed to resolve {}: {error}", output_dir.display())
        })?;

        write_archive(&root, &skip, destination).map_err(|error| {
            format!(
                "failed to write archive {}: {error}",
                destination.display()
            )
        })?;

        fs::metadata(destination)
            .map(|metadata| metadata.len())
            .map_err(|error| format!("failed to stat archive {}: {error}", destination.display()))
    }
}

fn write_archive(root: &Path, skip: &Path, destination: &Path) -> io::Result<()> {
    let file = File::create(destination)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);

    builder.append_dir(".", root)?;
    append_tree(&mut builder, root, root, skip)?;

    let file = builder.into_inner()?.finish()?;
    file.sync_all()
}

fn append_tree<W: io::Write>(
    builder: &mut tar::Builder<W>,
    root: &Path,
    current: &Path,
    skip: &Path,
) -> io::Result<()> {
    let mut entries = fs::read_dir(current)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        if path == skip {
            continue;
        }

        let name = archive_entry_name(root, &path);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            builder.append_dir(&name, &path)?;
            append_tree(builder, root, &path, skip)?;
        } else if file_type.is_file() || file_type.is_symlink() || is_special_file(&file_type) {
            builder.append_path_with_name(&path, &name)?;
        } else {
            tracing::warn!(
                component = "archive",
                event = "entry_skipped",
                path = %path.display(),
                reason = "unsupported file type",
            );
        }
    }

    Ok(())
}

/// FIFOs and device nodes, which tar stores as header-only entries.
#[cfg(unix)]
fn is_special_file(file_type: &fs::FileType) -> bool {
    use std::os::unix::fs::FileTypeExt;

    file_type.is_fifo() || file_type.is_char_device() || file_type.is_block_device()
}

#[cfg(not(unix))]
fn is_special_file(_file_type: &fs::FileType) -> bool {
    false
}

fn archive_entry_name(root: &Path, path: &Path) -> PathBuf {
    let relative = path.strip_prefix(root).unwrap_or(path);
    Path::new(".").join(relative)
}
