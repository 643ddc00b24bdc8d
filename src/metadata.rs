use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

/// What `stat` reports, independent of the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Final path component, without any trailing separator.
    pub name: String,
    pub file_type: FileType,
    /// Uncompressed size in bytes.
    pub len: u64,
    /// Permission bits (`0o7777` mask).
    pub permissions: u32,
    /// `None` when the backend recorded no usable timestamp.
    pub modified: Option<SystemTime>,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub(crate) fn from_std(name: String, meta: &std::fs::Metadata) -> Self {
        let file_type = if meta.is_dir() {
            FileType::Directory
        } else if meta.file_type().is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        };

        Metadata {
            name,
            file_type,
            len: meta.len(),
            permissions: permissions(meta),
            modified: meta.modified().ok(),
        }
    }
}

#[cfg(unix)]
fn permissions(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permissions(meta: &std::fs::Metadata) -> u32 {
    let write = if meta.permissions().readonly() { 0 } else { 0o222 };
    let exec = if meta.is_dir() { 0o111 } else { 0 };
    0o444 | write | exec
}
