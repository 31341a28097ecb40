use crate::release::bare_version;
use crate::task;
use crate::Compression;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;
use tar::Archive;
use xz2::read::XzDecoder;

/// Name prefix of every SDK release directory.
pub const SDK_DIR_PREFIX: &str = "zephyr-sdk-";

/// Adds the execute bits, keeping every other mode bit.
pub fn make_executable(path: &Path) -> Result<()> {
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

/// Runs a self-extracting installer. Flags before `--` are read by the
/// extractor, flags after it by the bundled setup script.
pub fn run_installer(installer: &Path, install_dir: &Path) -> Result<PathBuf> {
    let installer = dunce::canonicalize(installer)
        .with_context(|| format!("installer {} not found", installer.display()))?;
    make_executable(&installer)?;
    tracing::info!(
        "running {} into {}",
        installer.display(),
        install_dir.display()
    );
    task::run(
        Command::new(&installer)
            .arg("--quiet")
            .arg("--")
            .arg("-d")
            .arg(install_dir),
    )?;
    Ok(install_dir.to_path_buf())
}

pub fn unpack(archive: &Path, compression: Compression, dest: &Path) -> Result<()> {
    let file = BufReader::new(File::open(archive)?);
    let reader: Box<dyn Read> = match compression {
        Compression::Xz => Box::new(XzDecoder::new(file)),
        Compression::Zstd => Box::new(zstd::Decoder::new(file)?),
    };
    std::fs::create_dir_all(dest)?;
    tracing::info!("unpacking {} into {}", archive.display(), dest.display());
    Archive::new(reader)
        .unpack(dest)
        .with_context(|| format!("failed to unpack {}", archive.display()))?;
    Ok(())
}

/// Strips `ext` from the end of `name`, ignoring ascii case.
fn strip_extension<'a>(name: &'a str, ext: &str) -> &'a str {
    let split = name.len().saturating_sub(ext.len());
    match name.get(split..) {
        Some(tail) if tail.eq_ignore_ascii_case(ext) => &name[..split],
        _ => name,
    }
}

/// Directory names an archive may unpack to, most specific first.
pub fn candidates(archive_name: &str, compression: Compression, version: Option<&str>) -> Vec<String> {
    let mut names = Vec::with_capacity(3);
    if let Some(version) = version.map(bare_version).filter(|v| !v.is_empty()) {
        names.push(format!("{}{}", SDK_DIR_PREFIX, version));
    }
    let stem = strip_extension(archive_name, compression.extension());
    if let Some(idx) = stem.find("_linux") {
        names.push(stem[..idx].to_string());
    }
    names.push(stem.to_string());
    let mut seen = std::collections::HashSet::new();
    names.retain(|name| !name.is_empty() && seen.insert(name.clone()));
    names
}

/// The most recently modified `zephyr-sdk-*` directory in `root`.
pub fn newest_sdk_dir(root: &Path) -> Result<Option<PathBuf>> {
    let root = root
        .to_str()
        .with_context(|| format!("non utf-8 path {}", root.display()))?;
    let pattern = format!("{}/{}*", glob::Pattern::escape(root), SDK_DIR_PREFIX);
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for path in glob::glob(&pattern)? {
        let path = path?;
        if !path.is_dir() {
            continue;
        }
        let modified = std::fs::metadata(&path)?.modified()?;
        if newest.as_ref().map_or(true, |(time, _)| modified > *time) {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// Finds the directory an archive unpacked to inside `root`.
pub fn resolve_extracted_dir(
    root: &Path,
    archive_name: &str,
    compression: Compression,
    version: Option<&str>,
) -> Result<PathBuf> {
    let names = candidates(archive_name, compression, version);
    for name in &names {
        let dir = root.join(name);
        tracing::debug!("trying {}", dir.display());
        if dir.is_dir() {
            return Ok(dir);
        }
    }
    if let Some(dir) = newest_sdk_dir(root)? {
        tracing::info!("falling back to newest sdk directory {}", dir.display());
        return Ok(dir);
    }
    anyhow::bail!(
        "could not locate extracted SDK directory under {}; tried {} and {}*",
        root.display(),
        names.join(", "),
        SDK_DIR_PREFIX
    );
}

pub fn extract(
    archive: &Path,
    compression: Compression,
    root: &Path,
    version: Option<&str>,
) -> Result<PathBuf> {
    let name = archive
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("invalid archive name {}", archive.display()))?;
    unpack(archive, compression, root)?;
    resolve_extracted_dir(root, name, compression, version)
}
