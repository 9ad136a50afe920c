mod common;

use common::Scratch;
use zipfs::{Config, ReleaseVersion};

const MANIFEST: &[u8] = b"Manifest-Version: 1.0\r\nMulti-Release: true\r\n";

fn build(s: &Scratch, manifest: &[u8]) {
    let fs = s.create();
    for dir in [
        "/META-INF",
        "/META-INF/versions",
        "/META-INF/versions/9",
        "/META-INF/versions/9/a",
        "/META-INF/versions/11",
        "/META-INF/versions/11/a",
        "/a",
    ] {
        fs.create_directory(dir).unwrap();
    }
    fs.write("/META-INF/MANIFEST.MF", manifest).unwrap();
    fs.write("/a/B.txt", b"base").unwrap();
    fs.write("/a/C.txt", b"base C").unwrap();
    fs.write("/META-INF/versions/9/a/B.txt", b"nine").unwrap();
    fs.write("/META-INF/versions/11/a/B.txt", b"eleven").unwrap();
    fs.write("/META-INF/versions/11/a/C.txt", b"eleven C").unwrap();
    fs.close().unwrap();
}

fn read_at(s: &Scratch, version: Option<ReleaseVersion>, path: &str) -> Vec<u8> {
    let mut config = Config::new();
    if let Some(v) = version {
        config = config.release_version(v);
    }
    s.open_with(config).read(path).unwrap()
}

#[test]
fn test_versioned_lookup() {
    let s = Scratch::new();
    build(&s, MANIFEST);

    assert_eq!(read_at(&s, Some(ReleaseVersion::Version(9)), "/a/B.txt"), b"nine");
    assert_eq!(read_at(&s, Some(ReleaseVersion::Version(9)), "/a/C.txt"), b"base C");
    assert_eq!(read_at(&s, Some(ReleaseVersion::Version(8)), "/a/B.txt"), b"base");
    assert_eq!(read_at(&s, Some(ReleaseVersion::Version(10)), "/a/B.txt"), b"nine");
    assert_eq!(read_at(&s, Some(ReleaseVersion::Runtime), "/a/B.txt"), b"eleven");
    assert_eq!(read_at(&s, Some(ReleaseVersion::Runtime), "/a/C.txt"), b"eleven C");
    assert_eq!(read_at(&s, None, "/a/B.txt"), b"base");
}

#[test]
fn test_versioned_lookup_needs_manifest_attribute() {
    let s = Scratch::new();
    build(&s, b"Manifest-Version: 1.0\r\n");
    assert_eq!(read_at(&s, Some(ReleaseVersion::Version(9)), "/a/B.txt"), b"base");
}

#[test]
fn test_versioned_entries_still_addressable() {
    let s = Scratch::new();
    build(&s, MANIFEST);
    let fs = s.open_with(Config::new().release_version(ReleaseVersion::Version(9)));
    assert_eq!(fs.read("/META-INF/versions/11/a/B.txt").unwrap(), b"eleven");
    assert!(fs.is_directory("/META-INF/versions/9").unwrap());
}
