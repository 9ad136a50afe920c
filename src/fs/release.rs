//! Versioned lookups for multi-release archives.
//!
//! A multi-release archive keeps alternative members under
//! `META-INF/versions/<n>/`. For a target version, each such member
//! shadows the member at its version-stripped path; the highest applicable
//! version wins.

use std::collections::HashMap;

use crate::config::ReleaseVersion;

use super::index::{Index, file_name};

pub(crate) const MANIFEST: &[u8] = b"/META-INF/MANIFEST.MF";
const VERSIONS_DIR: &[u8] = b"/META-INF/versions";

/// Map from a logical path to the versioned member that serves it.
#[derive(Debug, Default)]
pub(crate) struct ReleaseTable {
    aliases: HashMap<Vec<u8>, Vec<u8>>,
}

/// True if manifest content declares `Multi-Release: true`
pub(crate) fn is_multi_release(manifest: &[u8]) -> bool {
    String::from_utf8_lossy(manifest).lines().any(|line| {
        line.split_once(':').is_some_and(|(key, value)| {
            key.trim().eq_ignore_ascii_case("Multi-Release")
                && value.trim().eq_ignore_ascii_case("true")
        })
    })
}

impl ReleaseTable {
    /// Collect the aliases applicable to `target`.
    pub fn build(index: &Index, target: ReleaseVersion) -> Self {
        let mut table = ReleaseTable::default();
        let Some(versions) = index.get(VERSIONS_DIR) else {
            return table;
        };

        let mut applicable: Vec<(u32, usize)> = index
            .children(versions)
            .filter(|&id| index.node(id).is_dir)
            .filter_map(|id| {
                let n: u32 = std::str::from_utf8(file_name(&index.node(id).name))
                    .ok()?
                    .parse()
                    .ok()?;
                match target {
                    ReleaseVersion::Version(max) if n > max => None,
                    _ => Some((n, id)),
                }
            })
            .collect();
        applicable.sort_unstable();

        for (_, dir) in applicable {
            let prefix_len = index.node(dir).name.len();
            let mut work = vec![dir];
            while let Some(id) = work.pop() {
                for child in index.children(id) {
                    let node = index.node(child);
                    if node.is_dir {
                        work.push(child);
                    } else {
                        let logical = node.name[prefix_len..].to_vec();
                        table.aliases.insert(logical, node.name.clone());
                    }
                }
            }
        }
        table
    }

    /// The member that serves `path`, or `path` itself.
    pub fn resolve<'a>(&'a self, path: &'a [u8]) -> &'a [u8] {
        self.aliases.get(path).map_or(path, Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::parser::CenName;

    fn index(names: &[&str]) -> Index {
        Index::build(
            names
                .iter()
                .enumerate()
                .map(|(pos, n)| CenName {
                    name: n.as_bytes().to_vec(),
                    is_dir: false,
                    pos,
                })
                .collect(),
        )
    }

    #[test]
    fn test_manifest_attribute() {
        assert!(is_multi_release(b"Manifest-Version: 1.0\r\nMulti-Release: true\r\n"));
        assert!(is_multi_release(b"multi-release:TRUE\n"));
        assert!(!is_multi_release(b"Manifest-Version: 1.0\nMulti-Release: false\n"));
        assert!(!is_multi_release(b""));
    }

    #[test]
    fn test_highest_applicable_version_wins() {
        let idx = index(&[
            "/a/B.class",
            "/META-INF/versions/9/a/B.class",
            "/META-INF/versions/10/a/B.class",
            "/META-INF/versions/9/only9.txt",
            "/META-INF/versions/x/ignored",
        ]);

        let nine = ReleaseTable::build(&idx, ReleaseVersion::Version(9));
        assert_eq!(nine.resolve(b"/a/B.class"), b"/META-INF/versions/9/a/B.class");
        assert_eq!(nine.resolve(b"/only9.txt"), b"/META-INF/versions/9/only9.txt");
        assert_eq!(nine.len(), 2);

        let eight = ReleaseTable::build(&idx, ReleaseVersion::Version(8));
        assert_eq!(eight.resolve(b"/a/B.class"), b"/a/B.class");

        let runtime = ReleaseTable::build(&idx, ReleaseVersion::Runtime);
        assert_eq!(runtime.resolve(b"/a/B.class"), b"/META-INF/versions/10/a/B.class");
    }

    #[test]
    fn test_no_versions_directory() {
        let idx = index(&["/a"]);
        let table = ReleaseTable::build(&idx, ReleaseVersion::Runtime);
        assert_eq!(table.len(), 0);
        assert_eq!(table.resolve(b"/a"), b"/a");
    }
}
