//! ZIP archive of the mirrored tree

use crate::mirror::SRC_DIR;
use crate::processing::PROCESSED_DIR;
use crate::MirrorError;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Name of the archive in the run directory
pub const ARCHIVE_FILE: &str = "site_archive.zip";

/// Packs `src/` and `processed/` of a run into `site_archive.zip`
///
/// Entry names are relative to the run directory and use `/` separators.
/// Missing source directories are skipped.
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the written archive
/// * `Err(MirrorError)` - The archive could not be written
pub fn create_archive(run_dir: &Path) -> Result<PathBuf, MirrorError> {
    let archive_path = run_dir.join(ARCHIVE_FILE);
    let file = File::create(&archive_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0usize;
    for dir in [SRC_DIR, PROCESSED_DIR] {
        let root = run_dir.join(dir);
        if !root.is_dir() {
            continue;
        }

        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = match entry.path().strip_prefix(run_dir) {
                Ok(relative) => relative,
                Err(_) => continue,
            };

            zip.start_file(archive_name(relative), options)?;
            let mut source = File::open(entry.path())?;
            io::copy(&mut source, &mut zip)?;
            files += 1;
        }
    }

    zip.finish()?;
    tracing::info!("Archived {} files into {:?}", files, archive_path);
    Ok(archive_path)
}

fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_archive_contains_src_and_processed() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path();
        std::fs::create_dir_all(run.join("src/example.com/css")).unwrap();
        std::fs::write(run.join("src/example.com/index.html"), "<html></html>").unwrap();
        std::fs::write(run.join("src/example.com/css/a.css"), "body{}").unwrap();
        std::fs::create_dir_all(run.join("processed/example.com/html")).unwrap();
        std::fs::write(
            run.join("processed/example.com/html/index.beautified.html"),
            "<html>\n</html>",
        )
        .unwrap();
        // Not part of the archive
        std::fs::write(run.join("sitemap.txt"), "https://example.com/\n").unwrap();

        let path = create_archive(run).unwrap();
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();

        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "processed/example.com/html/index.beautified.html",
                "src/example.com/css/a.css",
                "src/example.com/index.html",
            ]
        );

        let mut content = String::new();
        archive
            .by_name("src/example.com/css/a.css")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "body{}");
    }

    #[test]
    fn test_archive_without_processed_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.txt"), "a").unwrap();

        let path = create_archive(dir.path()).unwrap();
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
    }
}
