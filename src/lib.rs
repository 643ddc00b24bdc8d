//! Read-only virtual file systems.
//!
//! Every backend implements [`FileSystem`]: `stat`, `open` and `glob` over
//! `/`-separated paths.
//!
//! - [`ZipFileSystem`] treats one zip archive as an isolated, immutable tree
//! - [`LocalFileSystem`] passes paths through to the operating system
//! - [`UnionFileSystem`] layers several backends, first match wins
//!
//! ```ignore
//! let fs = ZipFileSystem::open_path("bundle.zip")?;
//! let ctx = Context::background();
//! for name in fs.glob(&ctx, "docs/*.md")? {
//!     let text = fs.read(&ctx, &name)?;
//! }
//! ```

use std::io::Read;

pub mod context;
pub mod local;
pub mod metadata;
pub mod pattern;
pub mod result;
pub mod union;
pub mod zip;

pub use crate::context::Context;
pub use crate::local::LocalFileSystem;
pub use crate::metadata::{FileType, Metadata};
pub use crate::pattern::{Pattern, PatternError};
pub use crate::result::{Result, VfsError};
pub use crate::union::UnionFileSystem;
pub use crate::zip::ZipFileSystem;

/// Read capabilities shared by every backend.
///
/// Implementations are safe to call from several threads at once.
pub trait FileSystem: Send + Sync {
    /// Metadata for `path`, or [`VfsError::NotFound`].
    fn stat(&self, ctx: &Context, path: &str) -> Result<Metadata>;

    /// A fresh stream over the contents of `path`. The stream is independent
    /// of any other stream opened on the same file system.
    fn open(&self, ctx: &Context, path: &str) -> Result<Box<dyn Read + Send>>;

    /// All names matching `pattern` (see [`pattern`]).
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is malformed.
    fn glob(&self, ctx: &Context, pattern: &str) -> Result<Vec<String>>;

    /// Reads the whole of `path` into memory.
    fn read(&self, ctx: &Context, path: &str) -> Result<Vec<u8>> {
        let mut reader = self.open(ctx, path)?;
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents)?;
        Ok(contents)
    }
}
