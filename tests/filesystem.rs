mod common;

use std::io::{Read, Seek, SeekFrom, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::{Scratch, raw_zip};
use zipfs::{
    ChannelOptions, CompressionMethod, Config, CopyOptions, ExtraTimeFormat, TimePolicy,
    WriteOptions, ZipFileSystem, ZipFsError,
};

fn sample_text() -> Vec<u8> {
    b"the quick brown fox jumps over the lazy dog\n".repeat(200)
}

#[test]
fn test_fresh_archive_round_trip() {
    let s = Scratch::new();
    let fs = s.create();
    fs.create_directory("/docs").unwrap();
    fs.write("/docs/readme.txt", b"hello").unwrap();
    fs.write("/big.txt", &sample_text()).unwrap();
    let before = fs.attributes("/big.txt").unwrap();
    fs.close().unwrap();

    let fs = s.open();
    assert!(fs.is_directory("/docs").unwrap());
    assert_eq!(fs.read("/docs/readme.txt").unwrap(), b"hello");
    assert_eq!(fs.read("/big.txt").unwrap(), sample_text());

    let after = fs.attributes("/big.txt").unwrap();
    assert_eq!(after.crc(), crc32fast::hash(&sample_text()));
    assert_eq!(after.crc(), before.crc());
    assert_eq!(after.size(), before.size());
    assert_eq!(after.compressed_size(), before.compressed_size());
    assert_eq!(after.method(), CompressionMethod::Deflate);
    assert_eq!(fs.display_name(&after), "/big.txt");

    let mut root = fs.read_dir("/").unwrap();
    root.sort();
    assert_eq!(root, vec!["/big.txt", "/docs"]);
    assert_eq!(fs.read_dir("docs").unwrap(), vec!["docs/readme.txt"]);
}

#[test]
fn test_missing_archive_without_create() {
    let s = Scratch::new();
    let err = ZipFileSystem::open(&s.path, Config::new()).err().unwrap();
    assert!(matches!(err, ZipFsError::NotFound(_)));
}

#[test]
fn test_pseudo_directories() {
    let s = Scratch::new();
    std::fs::write(&s.path, raw_zip(b"", &[("a/b/c.txt", b"deep"), ("top.txt", b"t")])).unwrap();

    let fs = s.open();
    assert!(fs.is_directory("/a").unwrap());
    assert!(fs.is_directory("/a/b").unwrap());
    assert_eq!(fs.read_dir("/a").unwrap(), vec!["/a/b"]);
    assert_eq!(fs.read_dir("/a/b").unwrap(), vec!["/a/b/c.txt"]);
    assert!(fs.attributes("/a").unwrap().is_directory());
    assert_eq!(fs.read("/a/b/c.txt").unwrap(), b"deep");

    // listing a file
    assert!(matches!(fs.read_dir("/top.txt"), Err(ZipFsError::NotADirectory(_))));
    assert!(matches!(fs.read("/a"), Err(ZipFsError::IsADirectory(_))));
}

#[test]
fn test_prefix_stub_archive() {
    let s = Scratch::new();
    let stub = b"#!/bin/sh\necho self-extracting\nexit 0\n";
    std::fs::write(&s.path, raw_zip(stub, &[("x.txt", b"payload"), ("d/", b"")])).unwrap();

    let fs = s.open();
    assert_eq!(fs.read("/x.txt").unwrap(), b"payload");
    assert!(fs.is_directory("/d").unwrap());

    fs.write("/y.txt", b"more").unwrap();
    fs.close().unwrap();

    let fs = s.open();
    assert_eq!(fs.read("/x.txt").unwrap(), b"payload");
    assert_eq!(fs.read("/y.txt").unwrap(), b"more");
}

#[test]
fn test_corrupt_central_directory_rejected() {
    let s = Scratch::new();
    let mut bytes = raw_zip(b"", &[("a.txt", b"a"), ("b.txt", b"b")]);
    let at = bytes.windows(4).position(|w| w == b"PK\x01\x02").unwrap();
    bytes[at + 3] = 0x03;
    std::fs::write(&s.path, bytes).unwrap();

    let err = ZipFileSystem::open(&s.path, Config::new()).err().unwrap();
    assert!(matches!(err, ZipFsError::Format(_)));

    std::fs::write(&s.path, b"definitely not a zip archive").unwrap();
    let err = ZipFileSystem::open(&s.path, Config::new()).err().unwrap();
    assert!(matches!(err, ZipFsError::Format(_)));
}

#[test]
fn test_delete_semantics() {
    let s = Scratch::new();
    let fs = s.create();
    fs.create_directory("/d").unwrap();
    fs.write("/d/f", b"x").unwrap();

    assert!(matches!(fs.delete("/"), Err(ZipFsError::InvalidPath(_))));
    assert!(matches!(fs.delete("/d"), Err(ZipFsError::DirectoryNotEmpty(_))));
    assert!(matches!(fs.delete("/nope"), Err(ZipFsError::NotFound(_))));
    assert!(!fs.delete_if_exists("/nope").unwrap());

    fs.delete("/d/f").unwrap();
    assert!(!fs.exists("/d/f").unwrap());
    assert!(fs.delete_if_exists("/d").unwrap());
    assert!(fs.read_dir("/").unwrap().is_empty());
    fs.close().unwrap();

    let fs = s.open();
    assert!(fs.read_dir("/").unwrap().is_empty());
}

#[test]
fn test_missing_or_file_parent() {
    let s = Scratch::new();
    let fs = s.create();
    assert!(matches!(fs.write("/no/such/file", b"x"), Err(ZipFsError::NotFound(_))));
    assert!(matches!(fs.create_directory("/no/such"), Err(ZipFsError::NotFound(_))));

    fs.write("/f", b"x").unwrap();
    assert!(matches!(fs.write("/f/g", b"y"), Err(ZipFsError::NotADirectory(_))));
    assert!(matches!(fs.create_directory("/f"), Err(ZipFsError::AlreadyExists(_))));
    assert!(matches!(fs.create_directory("/"), Err(ZipFsError::AlreadyExists(_))));
}

#[test]
fn test_write_options() {
    let s = Scratch::new();
    let fs = s.create();
    fs.write("/log", b"one\n").unwrap();

    let mut w = fs.new_output("/log", WriteOptions::append()).unwrap();
    w.write_all(b"two\n").unwrap();
    w.close().unwrap();
    assert_eq!(fs.read("/log").unwrap(), b"one\ntwo\n");

    assert!(matches!(
        fs.new_output("/log", WriteOptions::create_new()),
        Err(ZipFsError::AlreadyExists(_))
    ));
    let bad = WriteOptions {
        append: true,
        truncate: true,
        ..WriteOptions::default()
    };
    assert!(matches!(fs.new_output("/log", bad), Err(ZipFsError::InvalidOption { .. })));
    let no_create = WriteOptions {
        create: false,
        ..WriteOptions::default()
    };
    assert!(matches!(fs.new_output("/missing", no_create), Err(ZipFsError::NotFound(_))));
    fs.close().unwrap();

    // appending to a member read from the archive
    let fs = s.open();
    let mut w = fs.new_output("/log", WriteOptions::append()).unwrap();
    w.write_all(b"three\n").unwrap();
    drop(w);
    assert_eq!(fs.read("/log").unwrap(), b"one\ntwo\nthree\n");
    fs.close().unwrap();

    assert_eq!(s.open().read("/log").unwrap(), b"one\ntwo\nthree\n");
}

#[test]
fn test_entry_is_invisible_until_writer_closes() {
    let s = Scratch::new();
    let fs = s.create();
    let mut w = fs.new_output("/pending", WriteOptions::default()).unwrap();
    w.write_all(b"data").unwrap();
    assert!(!fs.exists("/pending").unwrap());
    w.close().unwrap();
    assert!(fs.exists("/pending").unwrap());
}

#[test]
fn test_writer_cannot_replace_populated_directory() {
    let s = Scratch::new();
    let fs = s.create();
    let mut w = fs.new_output("/x", WriteOptions::default()).unwrap();
    w.write_all(b"file").unwrap();
    fs.create_directory("/x").unwrap();
    fs.write("/x/y", b"child").unwrap();

    assert!(matches!(w.close(), Err(ZipFsError::AlreadyExists(_))));
    assert!(fs.is_directory("/x").unwrap());
    assert_eq!(fs.read("/x/y").unwrap(), b"child");
}

#[test]
fn test_rename_collision() {
    let s = Scratch::new();
    let fs = s.create();
    fs.write("/x", b"from x").unwrap();
    fs.write("/y", b"from y").unwrap();

    let err = fs.rename("/x", "/y", CopyOptions::default()).unwrap_err();
    assert!(matches!(err, ZipFsError::AlreadyExists(_)));
    assert_eq!(fs.read("/y").unwrap(), b"from y");

    let replace = CopyOptions {
        replace_existing: true,
        ..CopyOptions::default()
    };
    fs.rename("/x", "/y", replace).unwrap();
    assert!(!fs.exists("/x").unwrap());
    assert_eq!(fs.read("/y").unwrap(), b"from x");
    fs.close().unwrap();

    let fs = s.open();
    assert_eq!(fs.read_dir("/").unwrap(), vec!["/y"]);
    assert_eq!(fs.read("/y").unwrap(), b"from x");
}

#[test]
fn test_rename_populated_directory_refused() {
    let s = Scratch::new();
    let fs = s.create();
    fs.create_directory("/d").unwrap();
    fs.write("/d/f", b"x").unwrap();
    let err = fs.rename("/d", "/e", CopyOptions::default()).unwrap_err();
    assert!(matches!(err, ZipFsError::DirectoryNotEmpty(_)));

    fs.create_directory("/empty").unwrap();
    fs.rename("/empty", "/moved", CopyOptions::default()).unwrap();
    assert!(fs.is_directory("/moved").unwrap());
    assert!(!fs.exists("/empty").unwrap());
}

#[test]
fn test_copy_unmodified_entries() {
    let s = Scratch::new();
    {
        let fs = s.create();
        fs.write("/a", &sample_text()).unwrap();
        fs.close().unwrap();
    }

    let fs = s.open();
    let keep = CopyOptions {
        copy_attributes: true,
        ..CopyOptions::default()
    };
    fs.copy("/a", "/b", keep).unwrap();
    fs.copy("/a", "/c", CopyOptions::default()).unwrap();
    assert_eq!(fs.read("/b").unwrap(), sample_text());
    fs.close().unwrap();

    let fs = s.open();
    let a = fs.attributes("/a").unwrap();
    let b = fs.attributes("/b").unwrap();
    assert_eq!(fs.read("/b").unwrap(), sample_text());
    assert_eq!(fs.read("/c").unwrap(), sample_text());
    assert_eq!(a.crc(), b.crc());
    assert_eq!(a.compressed_size(), b.compressed_size());
    assert_eq!(a.last_modified_time(), b.last_modified_time());
}

#[test]
fn test_copy_staged_entry_is_independent() {
    let s = Scratch::new();
    let fs = s.create();
    fs.write("/a", b"first").unwrap();
    fs.copy("/a", "/b", CopyOptions::default()).unwrap();
    fs.write("/a", b"second").unwrap();
    assert_eq!(fs.read("/b").unwrap(), b"first");
    assert_eq!(fs.read("/a").unwrap(), b"second");
}

#[test]
fn test_channels() {
    let s = Scratch::new();
    let fs = s.create();

    let mut ch = fs.open_channel("/c", ChannelOptions::read_write()).unwrap();
    assert!(ch.is_writable());
    ch.write_all(b"hello").unwrap();
    ch.seek(SeekFrom::Start(0)).unwrap();
    ch.write_all(b"J").unwrap();
    assert_eq!(ch.size().unwrap(), 5);
    ch.close().unwrap();
    assert_eq!(fs.read("/c").unwrap(), b"Jello");

    let append = ChannelOptions {
        write: true,
        append: true,
        ..ChannelOptions::default()
    };
    let mut ch = fs.open_channel("/c", append).unwrap();
    ch.write_all(b" world").unwrap();
    drop(ch);
    assert_eq!(fs.read("/c").unwrap(), b"Jello world");
    fs.close().unwrap();

    let fs = s.open();
    assert_eq!(fs.read("/c").unwrap(), b"Jello world");
    let mut ch = fs.open_channel("/c", ChannelOptions::read()).unwrap();
    assert!(!ch.is_writable());
    ch.seek(SeekFrom::Start(6)).unwrap();
    let mut tail = String::new();
    ch.read_to_string(&mut tail).unwrap();
    assert_eq!(tail, "world");
    assert!(ch.write(b"x").is_err());
    ch.close().unwrap();

    assert!(matches!(
        fs.open_channel("/missing", ChannelOptions::read()),
        Err(ZipFsError::NotFound(_))
    ));
    fs.close().unwrap();
    assert!(s.strays().is_empty());
}

#[test]
fn test_set_times() {
    let s = Scratch::new();
    let fs = s.create();
    fs.write("/t", b"x").unwrap();
    let mtime = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    let atime = UNIX_EPOCH + Duration::from_secs(1_600_000_100);
    fs.set_times("/t", Some(mtime), Some(atime), None).unwrap();
    fs.close().unwrap();

    let fs = s.open();
    let e = fs.attributes("/t").unwrap();
    assert_eq!(e.last_modified_time(), mtime);
    assert_eq!(e.last_access_time(), atime);

    // a member read from the archive
    let later = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    fs.set_times("/t", Some(later), None, None).unwrap();
    fs.close().unwrap();

    let fs = s.open();
    assert_eq!(fs.attributes("/t").unwrap().last_modified_time(), later);
    assert_eq!(fs.read("/t").unwrap(), b"x");
}

#[test]
fn test_times_before_1970() {
    let s = Scratch::new();
    let fs = s.open_with(Config::new().create(true).extra_time_format(ExtraTimeFormat::Unix));
    fs.write("/old", b"x").unwrap();
    // 1960-01-03
    let mtime = UNIX_EPOCH - Duration::from_secs(315_360_000);
    fs.set_times("/old", Some(mtime), None, None).unwrap();
    fs.close().unwrap();

    let e = s.open().attributes("/old").unwrap();
    assert_eq!(e.last_modified_time(), mtime);
    let fs = s.open_with(Config::new().time_policy(TimePolicy::CentralOnly));
    assert_eq!(fs.attributes("/old").unwrap().last_modified_time(), mtime);
}

#[test]
fn test_far_future_times_are_clamped() {
    let far = UNIX_EPOCH + Duration::from_secs(300_000 * 365 * 86_400);
    // 2100-01-01
    let year_2100 = UNIX_EPOCH + Duration::from_secs(4_102_444_800);
    for format in [ExtraTimeFormat::Ntfs, ExtraTimeFormat::Unix] {
        let s = Scratch::new();
        let fs = s.open_with(Config::new().create(true).extra_time_format(format));
        fs.write("/f", b"far").unwrap();
        fs.set_times("/f", Some(far), Some(far), Some(far)).unwrap();
        fs.close().unwrap();

        let fs = s.open();
        assert_eq!(fs.read("/f").unwrap(), b"far");
        let mtime = fs.attributes("/f").unwrap().last_modified_time();
        assert!(mtime > year_2100, "{format:?}");
        assert!(mtime < far, "{format:?}");
    }
}

#[test]
fn test_stored_and_deflated() {
    let s = Scratch::new();
    let fs = s.open_with(Config::new().create(true).no_compression(true));
    fs.write("/stored", &sample_text()).unwrap();
    fs.close().unwrap();

    let fs = s.create();
    fs.write("/deflated", &sample_text()).unwrap();
    fs.close().unwrap();

    let fs = s.open();
    let stored = fs.attributes("/stored").unwrap();
    assert_eq!(stored.method(), CompressionMethod::Stored);
    assert_eq!(stored.compressed_size(), stored.size());

    let deflated = fs.attributes("/deflated").unwrap();
    assert_eq!(deflated.method(), CompressionMethod::Deflate);
    assert!(deflated.compressed_size() < deflated.size());

    assert_eq!(fs.read("/stored").unwrap(), fs.read("/deflated").unwrap());
}

#[test]
fn test_temp_file_staging() {
    let s = Scratch::new();
    let fs = s.open_with(Config::new().create(true).use_temp_file(true));
    fs.write("/a", &sample_text()).unwrap();
    assert!(s.strays().iter().any(|n| n.ends_with(".tmp")));
    assert_eq!(fs.read("/a").unwrap(), sample_text());
    fs.close().unwrap();

    assert!(s.strays().is_empty());
    assert_eq!(s.open().read("/a").unwrap(), sample_text());
}

#[test]
fn test_read_only() {
    let s = Scratch::new();
    s.create().write("/a", b"x").unwrap();

    let fs = s.open_with(Config::new().read_only(true));
    assert!(fs.is_read_only());
    assert_eq!(fs.read("/a").unwrap(), b"x");
    assert!(matches!(fs.write("/b", b"y"), Err(ZipFsError::ReadOnly)));
    assert!(matches!(fs.delete("/a"), Err(ZipFsError::ReadOnly)));
}

#[test]
fn test_operations_after_close() {
    let s = Scratch::new();
    let fs = s.create();
    fs.close().unwrap();
    assert!(!fs.is_open());
    assert!(matches!(fs.exists("/a"), Err(ZipFsError::Closed)));
    assert!(matches!(fs.write("/a", b"x"), Err(ZipFsError::Closed)));
    fs.close().unwrap();
}

#[test]
fn test_concurrent_readers() {
    let s = Scratch::new();
    let payloads: Vec<Vec<u8>> = (0..8u8)
        .map(|i| (0..20_000u32).map(|j| (j as u8).wrapping_mul(i + 1)).collect())
        .collect();
    {
        let fs = s.create();
        for (i, p) in payloads.iter().enumerate() {
            fs.write(&format!("/f{i}"), p).unwrap();
        }
        fs.close().unwrap();
    }

    let fs = s.open();
    std::thread::scope(|scope| {
        for (i, p) in payloads.iter().enumerate() {
            let fs = &fs;
            scope.spawn(move || {
                for _ in 0..10 {
                    assert_eq!(&fs.read(&format!("/f{i}")).unwrap(), p);
                }
            });
        }
    });
}

#[test]
fn test_times_are_recent_for_new_entries() {
    let s = Scratch::new();
    let fs = s.create();
    fs.write("/now", b"x").unwrap();
    let age = SystemTime::now()
        .duration_since(fs.attributes("/now").unwrap().last_modified_time())
        .unwrap_or_default();
    assert!(age < Duration::from_secs(60));
}
