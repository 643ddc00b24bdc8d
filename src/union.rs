use std::collections::HashSet;
use std::io::Read;

use crate::context::Context;
use crate::metadata::Metadata;
use crate::result::{Result, VfsError};
use crate::FileSystem;

/// Layers several file systems; earlier layers shadow later ones.
///
/// `stat` and `open` fall through a layer only when it reports
/// [`VfsError::NotFound`]; any other failure is returned as is.
#[derive(Default)]
pub struct UnionFileSystem {
    layers: Vec<Box<dyn FileSystem>>,
}

impl UnionFileSystem {
    pub fn new(layers: Vec<Box<dyn FileSystem>>) -> Self {
        Self { layers }
    }

    /// Adds a layer below the existing ones.
    pub fn push(&mut self, layer: impl FileSystem + 'static) {
        self.layers.push(Box::new(layer));
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn first<T>(&self, path: &str, op: impl Fn(&dyn FileSystem) -> Result<T>) -> Result<T> {
        for layer in &self.layers {
            match op(layer.as_ref()) {
                Err(err) if err.is_not_found() => continue,
                other => return other,
            }
        }
        Err(VfsError::not_found(path))
    }
}

impl FileSystem for UnionFileSystem {
    fn stat(&self, ctx: &Context, path: &str) -> Result<Metadata> {
        self.first(path, |layer| layer.stat(ctx, path))
    }

    fn open(&self, ctx: &Context, path: &str) -> Result<Box<dyn Read + Send>> {
        self.first(path, |layer| layer.open(ctx, path))
    }

    fn glob(&self, ctx: &Context, pattern: &str) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for layer in &self.layers {
            for name in layer.glob(ctx, pattern)? {
                if seen.insert(name.clone()) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::ZipFileSystem;
    use ::zip::write::SimpleFileOptions;
    use ::zip::ZipWriter;
    use std::io::{self, Cursor, Write};

    fn archive(entries: &[(&str, &str)]) -> ZipFileSystem {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        ZipFileSystem::new(Cursor::new(writer.finish().unwrap().into_inner())).unwrap()
    }

    struct Broken;

    impl FileSystem for Broken {
        fn stat(&self, _ctx: &Context, _path: &str) -> Result<Metadata> {
            Err(VfsError::Io(io::Error::new(io::ErrorKind::Other, "disk on fire")))
        }

        fn open(&self, _ctx: &Context, _path: &str) -> Result<Box<dyn Read + Send>> {
            Err(VfsError::Io(io::Error::new(io::ErrorKind::Other, "disk on fire")))
        }

        fn glob(&self, _ctx: &Context, _pattern: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn earlier_layers_shadow_later_ones() {
        let mut union = UnionFileSystem::default();
        union.push(archive(&[("shared.txt", "top"), ("top.txt", "t")]));
        union.push(archive(&[("shared.txt", "bottom"), ("bottom.txt", "b")]));
        let ctx = Context::background();

        assert_eq!(union.read(&ctx, "shared.txt").unwrap(), b"top");
        assert_eq!(union.read(&ctx, "bottom.txt").unwrap(), b"b");
        assert_eq!(union.stat(&ctx, "bottom.txt").unwrap().len, 1);
        assert!(union.stat(&ctx, "nowhere").unwrap_err().is_not_found());
    }

    #[test]
    fn glob_merges_without_duplicates() {
        let union = UnionFileSystem::new(vec![
            Box::new(archive(&[("b.txt", ""), ("a.txt", "")])) as Box<dyn FileSystem>,
            Box::new(archive(&[("a.txt", ""), ("c.txt", ""), ("d.md", "")])),
        ]);
        let found = union.glob(&Context::background(), "*.txt").unwrap();
        assert_eq!(found, ["b.txt", "a.txt", "c.txt"]);
    }

    #[test]
    fn other_errors_stop_the_search() {
        let mut union = UnionFileSystem::default();
        union.push(Broken);
        union.push(archive(&[("a.txt", "a")]));
        let err = union.stat(&Context::background(), "a.txt").unwrap_err();
        assert!(matches!(err, VfsError::Io(_)));
    }

    #[test]
    fn empty_union_finds_nothing() {
        let union = UnionFileSystem::default();
        assert!(union.is_empty());
        let ctx = Context::background();
        assert!(union.open(&ctx, "a").err().unwrap().is_not_found());
        assert!(union.glob(&ctx, "*").unwrap().is_empty());
    }
}
