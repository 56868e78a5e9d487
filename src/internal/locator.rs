use crate::error::{Error, Result};
use crate::internal::models::FixtureFile;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

pub const FIXTURE_EXTENSION: &str = "snap";

/// Lazily walk `root` and yield every `.snap` file beneath it.
///
/// The root itself is checked eagerly so an unreadable input directory fails
/// before any work starts. Errors hit deeper in the tree are yielded in-line.
pub fn discover(root: &Path) -> Result<impl Iterator<Item = Result<FixtureFile>>> {
    fs::read_dir(root).map_err(|e| Error::discovery(root, e))?;

    let root = root.to_path_buf();
    let walk = WalkDir::new(&root).follow_links(true).sort_by_file_name();

    Ok(walk.into_iter().filter_map(move |entry| {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => return Some(Err(Error::discovery(&root, e))),
        };
        if !entry.file_type().is_file() {
            return None;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(FIXTURE_EXTENSION) {
            return None;
        }
        let relative = path.strip_prefix(&root).unwrap_or(path);
        Some(Ok(FixtureFile {
            relative_path: to_slash(relative),
            full_path: path.to_path_buf(),
        }))
    }))
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_discover_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Button/snap.test.js.snap");
        touch(dir.path(), "Button/snap.test.js");
        touch(dir.path(), "Forms/Input/input.test.js.snap");
        touch(dir.path(), "README.md");

        let found: Vec<String> = discover(dir.path())
            .unwrap()
            .map(|f| f.unwrap().relative_path)
            .collect();

        assert_eq!(
            found,
            vec!["Button/snap.test.js.snap", "Forms/Input/input.test.js.snap"]
        );
    }

    #[test]
    fn test_discover_keeps_full_path_readable() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Card/card.test.js.snap");

        let file = discover(dir.path()).unwrap().next().unwrap().unwrap();
        assert!(file.full_path.exists());
        assert_eq!(file.full_path, dir.path().join("Card/card.test.js.snap"));
    }

    #[test]
    fn test_discover_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = discover(&missing).err().expect("missing root must fail");
        assert!(matches!(err, Error::Discovery { .. }));
    }

    #[test]
    fn test_discover_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(discover(dir.path()).unwrap().count(), 0);
    }
}
