use std::fs;
use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Path;

use crate::context::Context;
use crate::metadata::Metadata;
use crate::pattern::{compile_glob, has_meta, Pattern, SEPARATOR};
use crate::result::{Result, VfsError};
use crate::FileSystem;

/// [`FileSystem`] backed by the operating system.
///
/// Paths are handed to `std::fs` unchanged, so relative paths resolve
/// against the working directory of the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        LocalFileSystem
    }
}

fn map_io(path: &str, err: io::Error) -> VfsError {
    if err.kind() == io::ErrorKind::NotFound {
        VfsError::not_found(path)
    } else {
        VfsError::Io(err)
    }
}

fn base_name(path: &str) -> String {
    let trimmed = path.trim_end_matches(SEPARATOR);
    match trimmed.rsplit(SEPARATOR).next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => path.to_string(),
    }
}

impl FileSystem for LocalFileSystem {
    fn stat(&self, _ctx: &Context, path: &str) -> Result<Metadata> {
        let meta = fs::metadata(path).map_err(|e| map_io(path, e))?;
        Ok(Metadata::from_std(base_name(path), &meta))
    }

    fn open(&self, _ctx: &Context, path: &str) -> Result<Box<dyn Read + Send>> {
        let file = File::open(path).map_err(|e| map_io(path, e))?;
        Ok(Box::new(file))
    }

    fn glob(&self, _ctx: &Context, pattern: &str) -> Result<Vec<String>> {
        let _validated = compile_glob(pattern);
        Ok(expand(pattern))
    }
}

/// Expands `pattern` one directory level at a time.
fn expand(pattern: &str) -> Vec<String> {
    if !has_meta(pattern) {
        return match fs::symlink_metadata(pattern) {
            Ok(_) => vec![pattern.to_string()],
            Err(_) => Vec::new(),
        };
    }

    let (dir, file) = match pattern.rfind(SEPARATOR) {
        Some(0) => ("/", &pattern[1..]),
        Some(idx) => (&pattern[..idx], &pattern[idx + 1..]),
        None => ("", pattern),
    };
    // Validated by the caller as part of the whole pattern.
    let Ok(file_pattern) = Pattern::new(file) else {
        return Vec::new();
    };

    if !has_meta(dir) {
        return matches_in(dir, &file_pattern);
    }
    expand(dir)
        .iter()
        .flat_map(|parent| matches_in(parent, &file_pattern))
        .collect()
}

/// Sorted names in `dir` matching `pattern`, joined onto `dir`.
fn matches_in(dir: &str, pattern: &Pattern) -> Vec<String> {
    let listing = if dir.is_empty() { "." } else { dir };
    let entries = match fs::read_dir(listing) {
        Ok(entries) => entries,
        Err(err) => {
            if Path::new(listing).is_dir() {
                log::warn!("skipping unreadable directory {:?}: {}", listing, err);
            }
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| pattern.matches(name))
        .collect();
    names.sort();

    names
        .into_iter()
        .map(|name| match dir {
            "" => name,
            d if d.ends_with(SEPARATOR) => format!("{d}{name}"),
            d => format!("{d}{SEPARATOR}{name}"),
        })
        .collect()
}
