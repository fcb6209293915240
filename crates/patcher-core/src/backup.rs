use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive path for a backup of `folder` taken at `now`:
/// `<parent>/<name>_<YYYY-mm-ddTHH-MM>.zip`.
pub fn backup_path(folder: &Path, now: chrono::DateTime<chrono::Local>) -> Option<PathBuf> {
    let name = folder.file_name()?.to_string_lossy();
    let parent = folder.parent()?;
    Some(parent.join(format!("{}_{}.zip", name, now.format("%Y-%m-%dT%H-%M"))))
}

/// Most archives kept for one folder within the same minute.
const MAX_SAME_MINUTE: u32 = 100;

/// Zip `folder` next to itself before it gets patched.
///
/// An existing archive is never replaced; a taken name gets a `_1`, `_2`,
/// ... suffix. Returns `None` without touching anything if the folder does
/// not exist.
pub fn backup_folder(folder: &Path) -> anyhow::Result<Option<PathBuf>> {
    if !folder.is_dir() {
        tracing::info!(folder = %folder.display(), "Nothing to back up");
        return Ok(None);
    }

    let Some(base) = backup_path(folder, chrono::Local::now()) else {
        tracing::warn!(folder = %folder.display(), "No parent folder to place a backup in");
        return Ok(None);
    };

    let (file, archive_path) = create_archive_file(&base)?;
    write_archive(folder, file, &archive_path)
        .with_context(|| format!("Failed to create backup {}", archive_path.display()))?;

    tracing::info!(archive = %archive_path.display(), "Backup created");
    Ok(Some(archive_path))
}

/// Open the first free archive name, starting at `base`.
fn create_archive_file(base: &Path) -> anyhow::Result<(File, PathBuf)> {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    for n in 0..MAX_SAME_MINUTE {
        let candidate = if n == 0 {
            base.to_path_buf()
        } else {
            base.with_file_name(format!("{}_{}.zip", stem, n))
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((file, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create backup {}", candidate.display()));
            }
        }
    }
    anyhow::bail!(
        "Too many backups named like {} already exist",
        base.display()
    )
}

fn write_archive(folder: &Path, file: File, archive_path: &Path) -> anyhow::Result<()> {
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if path == archive_path {
            continue;
        }
        let Ok(rel) = path.strip_prefix(folder) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options)?;
            let mut reader = BufReader::new(File::open(path)?);
            std::io::copy(&mut reader, &mut zip)?;
        }
    }

    zip.finish()?.flush()?;
    Ok(())
}
