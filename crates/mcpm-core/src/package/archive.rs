//! Package archives (`.mcpz`): zip files with `mcp_package.json` at the root.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use zip::write::SimpleFileOptions;

use super::metadata::{METADATA_FILE_NAME, PackageMetadata};

/// File extension of package archives.
pub const ARCHIVE_EXTENSION: &str = "mcpz";

/// Directory names never packed into an archive.
const EXCLUDED_DIRS: &[&str] = &[".git", "__pycache__", ".venv", "venv"];

/// File names never packed into an archive.
const EXCLUDED_FILES: &[&str] = &[".DS_Store"];

/// File extensions never packed into an archive.
const EXCLUDED_EXTENSIONS: &[&str] = &["pyc", "zip", ARCHIVE_EXTENSION];

/// Extract the zip at `archive_path` into `dest`, creating `dest`.
///
/// Entries whose names would escape `dest` are skipped. Unix file modes
/// stored in the archive are applied where possible.
pub fn extract(archive_path: &Path, dest: &Path) -> anyhow::Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    extract_from_reader(file, dest)
}

fn extract_from_reader<R: Read + std::io::Seek>(reader: R, dest: &Path) -> anyhow::Result<()> {
    let mut archive =
        zip::ZipArchive::new(reader).context("Failed to read package archive as zip")?;

    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create extract directory: {}", dest.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry {}", i))?;

        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)
                .with_context(|| format!("Failed to create directory: {}", outpath.display()))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory: {}", parent.display())
            })?;
        }

        let mut buffer = Vec::new();
        entry
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read zip entry: {}", entry.name()))?;
        std::fs::write(&outpath, &buffer)
            .with_context(|| format!("Failed to write file: {}", outpath.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                // Permission errors are not fatal to extraction
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
            }
        }
    }

    Ok(())
}

/// Read `mcp_package.json` from an archive without extracting it.
///
/// Fails when the file is missing, is not valid JSON, or lacks a `name` or
/// `version`.
pub fn read_metadata(archive_path: &Path) -> anyhow::Result<PackageMetadata> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file).with_context(|| {
        format!("Failed to read archive as zip: {}", archive_path.display())
    })?;

    let mut entry = archive.by_name(METADATA_FILE_NAME).with_context(|| {
        format!(
            "Archive {} does not contain {}",
            archive_path.display(),
            METADATA_FILE_NAME
        )
    })?;
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .with_context(|| format!("Failed to read {} from archive", METADATA_FILE_NAME))?;

    let metadata = PackageMetadata::from_json(&content)?;
    let missing = metadata.missing_required_fields();
    if !missing.is_empty() {
        anyhow::bail!(
            "{} is missing required fields: {}",
            METADATA_FILE_NAME,
            missing.join(", ")
        );
    }
    Ok(metadata)
}

/// Summary of a created archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedArchive {
    pub path: PathBuf,
    pub file_count: usize,
}

/// Pack `source_dir` into a deflated zip at `output`.
///
/// Build artifacts, VCS data, virtualenvs and other archives are left out,
/// as is `output` itself when it lives inside `source_dir`.
pub fn create(source_dir: &Path, output: &Path) -> anyhow::Result<CreatedArchive> {
    if !source_dir.is_dir() {
        anyhow::bail!("Source directory does not exist: {}", source_dir.display());
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let mut files = Vec::new();
    collect_files(source_dir, source_dir, output, &mut files)?;
    files.sort();

    let out = File::create(output)
        .with_context(|| format!("Failed to create archive: {}", output.display()))?;
    let mut zip = zip::ZipWriter::new(out);
    let base_options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for relative in &files {
        let full = source_dir.join(relative);
        let name = archive_entry_name(relative);
        let options = file_options(base_options, &full);

        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {} to archive", name))?;
        let data = std::fs::read(&full)
            .with_context(|| format!("Failed to read file: {}", full.display()))?;
        zip.write_all(&data)
            .with_context(|| format!("Failed to write {} to archive", name))?;
        tracing::debug!(file = %name, "Added file to archive");
    }

    zip.finish()
        .with_context(|| format!("Failed to finish archive: {}", output.display()))?;

    tracing::info!(
        archive = %output.display(),
        files = files.len(),
        "Created package archive"
    );
    Ok(CreatedArchive {
        path: output.to_path_buf(),
        file_count: files.len(),
    })
}

fn collect_files(
    root: &Path,
    dir: &Path,
    output: &Path,
    files: &mut Vec<PathBuf>,
) -> anyhow::Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if file_type.is_dir() {
            if EXCLUDED_DIRS.contains(&name.as_ref()) {
                continue;
            }
            collect_files(root, &path, output, files)?;
        } else if file_type.is_file() {
            if is_excluded_file(&path, &name) || is_same_file(&path, output) {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }
    }
    Ok(())
}

fn is_excluded_file(path: &Path, name: &str) -> bool {
    if EXCLUDED_FILES.contains(&name) {
        return true;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXCLUDED_EXTENSIONS.contains(&ext))
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Zip entry names always use forward slashes.
fn archive_entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn file_options(base: SimpleFileOptions, path: &Path) -> SimpleFileOptions {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => base.unix_permissions(meta.permissions().mode()),
        Err(_) => base,
    }
}

#[cfg(not(unix))]
fn file_options(base: SimpleFileOptions, _path: &Path) -> SimpleFileOptions {
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_bytes(data: &[u8], dest: &Path) -> anyhow::Result<()> {
        extract_from_reader(std::io::Cursor::new(data), dest)
    }

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = SimpleFileOptions::default();
            for (name, content) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn extract_nested_files() {
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("out");
        let data = zip_with(&[
            ("mcp_package.json", r#"{"name":"calc","version":"1.0.0"}"#),
            ("src/server.py", "print('hi')"),
        ]);

        extract_bytes(&data, &dest).unwrap();

        assert!(dest.join("mcp_package.json").exists());
        assert_eq!(
            std::fs::read_to_string(dest.join("src/server.py")).unwrap(),
            "print('hi')"
        );
    }

    #[test]
    fn extract_skips_traversal_entries() {
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("out");
        let data = zip_with(&[("../escape.txt", "x"), ("ok.txt", "y")]);

        extract_bytes(&data, &dest).unwrap();

        assert!(!temp.path().join("escape.txt").exists());
        assert!(dest.join("ok.txt").exists());
    }

    #[test]
    fn extract_rejects_non_zip_without_creating_dest() {
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("out");

        assert!(extract_bytes(b"definitely not a zip", &dest).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn create_applies_exclusions() {
        let temp = tempfile::TempDir::new().unwrap();
        let src = temp.path().join("pkg");
        std::fs::create_dir_all(src.join(".git")).unwrap();
        std::fs::create_dir_all(src.join("__pycache__")).unwrap();
        std::fs::create_dir_all(src.join("lib")).unwrap();
        std::fs::write(src.join("mcp_package.json"), "{}").unwrap();
        std::fs::write(src.join("lib/tool.py"), "").unwrap();
        std::fs::write(src.join("lib/tool.pyc"), "").unwrap();
        std::fs::write(src.join(".git/HEAD"), "").unwrap();
        std::fs::write(src.join("__pycache__/x.pyc"), "").unwrap();
        std::fs::write(src.join(".DS_Store"), "").unwrap();
        std::fs::write(src.join("old.mcpz"), "").unwrap();

        let output = temp.path().join("pkg.mcpz");
        let created = create(&src, &output).unwrap();
        assert_eq!(created.file_count, 2);

        let archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["lib/tool.py", "mcp_package.json"]);
    }

    #[test]
    fn create_skips_output_inside_source() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("mcp_package.json"), "{}").unwrap();
        let output = temp.path().join("bundle.bin");
        std::fs::write(&output, "stale").unwrap();

        let created = create(temp.path(), &output).unwrap();
        assert_eq!(created.file_count, 1);
    }

    #[test]
    fn read_metadata_requires_name_and_version() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("pkg.mcpz");
        std::fs::write(&path, zip_with(&[("mcp_package.json", r#"{"name":"calc"}"#)])).unwrap();

        let err = read_metadata(&path).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn read_metadata_reports_missing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("pkg.mcpz");
        std::fs::write(&path, zip_with(&[("README.md", "hi")])).unwrap();

        assert!(read_metadata(&path).is_err());
    }
}
