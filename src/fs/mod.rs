//! A file system view over a ZIP archive.
//!
//! [`ZipFileSystem`] exposes the members of an archive as a directory tree
//! addressed by `/`-separated paths. Reads go straight to the archive;
//! every change is kept in memory (or in temporary files next to the
//! archive) and written out in one pass when the file system is closed.
//!
//! ## Locking
//!
//! The index and flags live behind one read-write lock. Lookups, listings
//! and opening streams share it; structural changes take it exclusively.
//! Streams do not hold it while reading or writing content.

mod commit;
mod flate;
mod index;
mod release;
mod stream;

pub use stream::{EntryChannel, EntryReader, EntryWriter};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::config::{Config, ReleaseVersion};
use crate::error::{Result, ZipFsError};
use crate::io::{LocalFile, ReadAt};
use crate::zip::entry::{Content, from_system_time};
use crate::zip::structures::{End, FLAG_USE_UTF8};
use crate::zip::time::now_millis;
use crate::zip::{CompressionMethod, Entry, EntryKind, ZipParser};

use flate::CodecPool;
use index::{Index, NodeId, file_name, parent_of};
use release::{MANIFEST, ReleaseTable, is_multi_release};
use stream::ArchiveChannel;

/// Options for [`ZipFileSystem::new_output`].
///
/// The default creates the entry if needed and truncates existing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub create: bool,
    pub create_new: bool,
    pub append: bool,
    pub truncate: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            create: true,
            create_new: false,
            append: false,
            truncate: true,
        }
    }
}

impl WriteOptions {
    /// Fail unless the entry is new
    pub fn create_new() -> Self {
        Self {
            create: false,
            create_new: true,
            append: false,
            truncate: false,
        }
    }

    /// Keep existing content and write after it
    pub fn append() -> Self {
        Self {
            create: true,
            create_new: false,
            append: true,
            truncate: false,
        }
    }
}

/// Options for [`ZipFileSystem::open_channel`].
///
/// The default opens an existing entry read-only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelOptions {
    pub write: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
    pub create_new: bool,
}

impl ChannelOptions {
    pub fn read() -> Self {
        Self::default()
    }

    /// Writable; creates the entry if missing and keeps existing content
    pub fn read_write() -> Self {
        Self {
            write: true,
            create: true,
            ..Self::default()
        }
    }
}

/// Options for [`ZipFileSystem::copy`] and [`ZipFileSystem::rename`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    pub replace_existing: bool,
    /// Keep the source timestamps instead of stamping the current time
    pub copy_attributes: bool,
}

pub(crate) struct State {
    open: bool,
    dirty: bool,
    channel: Arc<ArchiveChannel>,
    cen: Vec<u8>,
    end: End,
    locpos: u64,
    index: Index,
}

pub(crate) struct Inner {
    path: PathBuf,
    config: Config,
    read_only: bool,
    /// Timestamp reported for pseudo directories
    opened_at: i64,
    pool: Arc<CodecPool>,
    release: Option<ReleaseTable>,
    state: RwLock<State>,
    temp_files: Mutex<Vec<PathBuf>>,
}

/// Canonical absolute form of a `/`-separated path.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

impl Inner {
    fn resolve(&self, path: &str) -> Result<Vec<u8>> {
        let name = self.config.encoding.encode(&normalize(path))?;
        Ok(match &self.release {
            Some(table) => table.resolve(&name).to_vec(),
            None => name,
        })
    }

    fn display(&self, name: &[u8]) -> String {
        self.config.encoding.decode(name)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        let state = self.state.read();
        if !state.open {
            return Err(ZipFsError::Closed);
        }
        Ok(state)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        let state = self.state.write();
        if !state.open {
            return Err(ZipFsError::Closed);
        }
        Ok(state)
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(ZipFsError::ReadOnly);
        }
        Ok(())
    }

    fn default_method(&self) -> CompressionMethod {
        if self.config.no_compression {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflate
        }
    }

    /// A new member stamped now, with the name-encoding flag set
    fn new_entry(&self, name: Vec<u8>, is_dir: bool) -> Entry {
        let method = if is_dir {
            CompressionMethod::Stored
        } else {
            self.default_method()
        };
        let mut e = Entry::new(name, EntryKind::New, is_dir, method);
        e.flag = self.base_flag();
        e
    }

    fn base_flag(&self) -> u16 {
        if self.config.encoding.is_utf8() {
            FLAG_USE_UTF8
        } else {
            0
        }
    }

    fn entry_at(&self, state: &State, id: NodeId) -> Result<Entry> {
        let node = state.index.node(id);
        if let Some(e) = &node.entry {
            return Ok(e.clone());
        }
        match node.pos {
            Some(pos) => state.channel.parser.read_entry(
                &state.cen,
                pos,
                &node.name,
                node.is_dir,
                state.locpos,
                self.config.time_policy,
            ),
            None => {
                let mut e =
                    Entry::new(node.name.clone(), EntryKind::New, true, CompressionMethod::Stored);
                e.mtime = self.opened_at;
                e.atime = Some(self.opened_at);
                e.ctime = Some(self.opened_at);
                Ok(e)
            }
        }
    }

    fn get_entry(&self, state: &State, name: &[u8]) -> Result<Option<Entry>> {
        match state.index.get(name) {
            Some(id) => self.entry_at(state, id).map(Some),
            None => Ok(None),
        }
    }

    /// Every ancestor of `name` must exist and its parent be a directory.
    fn check_parents(&self, state: &State, name: &[u8]) -> Result<()> {
        let mut path = name;
        let mut first = true;
        while let Some(parent) = parent_of(path) {
            if parent == b"/" {
                break;
            }
            match state.index.get(parent) {
                None => return Err(ZipFsError::NotFound(self.display(parent))),
                Some(id) if first && !state.index.node(id).is_dir => {
                    return Err(ZipFsError::NotADirectory(self.display(parent)));
                }
                Some(_) => {}
            }
            first = false;
            path = parent;
        }
        Ok(())
    }

    /// Record a finished entry; used by writers and channels on close
    fn update(&self, entry: Entry) -> Result<()> {
        let mut state = self.write()?;
        state.index.update(entry)?;
        state.dirty = true;
        Ok(())
    }

    fn temp_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }

    /// Create a registered temporary file next to the archive.
    fn create_temp_file(&self) -> Result<(File, PathBuf)> {
        let tmp = tempfile::Builder::new()
            .prefix(".zipfs-")
            .suffix(".tmp")
            .tempfile_in(self.temp_dir())?;
        let (file, path) = tmp.keep().map_err(|e| e.error)?;
        self.temp_files.lock().push(path.clone());
        Ok((file, path))
    }

    fn remove_temp_file(&self, path: &Path) -> Result<()> {
        self.temp_files.lock().retain(|p| p != path);
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Delete every registered temporary file, reporting the ones that
    /// could not be deleted after trying them all.
    fn delete_temp_files(&self) -> Result<()> {
        let paths = std::mem::take(&mut *self.temp_files.lock());
        let mut failed = Vec::new();
        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to delete temporary file");
                    failed.push((path, e));
                }
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(ZipFsError::Cleanup(failed))
        }
    }
}

/// A hierarchical view of a ZIP archive.
///
/// ## Example
///
/// ```no_run
/// use zipfs::{Config, ZipFileSystem};
///
/// let fs = ZipFileSystem::open("app.zip", Config::new().create(true))?;
/// fs.create_directory("/docs")?;
/// fs.write("/docs/readme.txt", b"hello")?;
/// assert_eq!(fs.read("/docs/readme.txt")?, b"hello");
/// fs.close()?;
/// # Ok::<(), zipfs::ZipFsError>(())
/// ```
pub struct ZipFileSystem {
    inner: Arc<Inner>,
}

impl ZipFileSystem {
    /// Open the archive at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the archive on the local file system
    /// * `config` - Open options; see [`Config`]
    ///
    /// # Errors
    ///
    /// * [`ZipFsError::NotFound`] if the archive is missing and `create` is off
    /// * [`ZipFsError::Format`] if the archive is malformed or uses an
    ///   unsupported feature
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            if !config.create {
                return Err(ZipFsError::NotFound(path.display().to_string()));
            }
            let mut buf = Vec::new();
            End::default().write(&mut buf, 0, config.force_zip64_end)?;
            std::fs::write(&path, buf)?;
            info!(path = %path.display(), "created empty archive");
        }
        let read_only = config.read_only || std::fs::metadata(&path)?.permissions().readonly();

        let source: Arc<dyn ReadAt> = Arc::new(LocalFile::open(&path)?);
        let parser = ZipParser::new(source);
        let end = parser.find_end()?;
        let (cen, locpos) = parser.read_central_directory(&end)?;
        let names = ZipParser::scan_central_directory(&cen)?;
        let index = Index::build(names);
        let channel = ArchiveChannel::new(parser);
        let pool = Arc::new(CodecPool::new());

        let state = State {
            open: true,
            dirty: false,
            channel,
            cen,
            end,
            locpos,
            index,
        };
        let release = match config.release_version {
            Some(target) => Self::release_table(&state, &config, &pool, target)?,
            None => None,
        };

        info!(
            path = %path.display(),
            entries = state.index.len() - 1,
            locpos,
            read_only,
            multi_release = release.is_some(),
            "opened archive"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                config,
                read_only,
                opened_at: now_millis(),
                pool,
                release,
                state: RwLock::new(state),
                temp_files: Mutex::new(Vec::new()),
            }),
        })
    }

    fn release_table(
        state: &State,
        config: &Config,
        pool: &Arc<CodecPool>,
        target: ReleaseVersion,
    ) -> Result<Option<ReleaseTable>> {
        let Some(id) = state.index.get(MANIFEST) else {
            return Ok(None);
        };
        let node = state.index.node(id);
        let Some(pos) = node.pos else {
            return Ok(None);
        };
        let entry = state.channel.parser.read_entry(
            &state.cen,
            pos,
            &node.name,
            node.is_dir,
            state.locpos,
            config.time_policy,
        )?;
        let mut manifest = Vec::new();
        EntryReader::open(pool, &state.channel, state.locpos, &entry)?.read_to_end(&mut manifest)?;
        if !is_multi_release(&manifest) {
            return Ok(None);
        }
        let table = ReleaseTable::build(&state.index, target);
        debug!(aliases = table.len(), ?target, "multi-release archive");
        Ok(Some(table))
    }

    /// Location of the archive on disk
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn is_open(&self) -> bool {
        self.inner.state.read().open
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.read_only
    }

    /// Decoded name of an entry
    pub fn display_name(&self, entry: &Entry) -> String {
        self.inner.display(entry.name_bytes())
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        let name = self.inner.resolve(path)?;
        Ok(self.inner.read()?.index.contains(&name))
    }

    pub fn is_directory(&self, path: &str) -> Result<bool> {
        let name = self.inner.resolve(path)?;
        let state = self.inner.read()?;
        Ok(state
            .index
            .get(&name)
            .is_some_and(|id| state.index.node(id).is_dir))
    }

    /// Metadata of the entry at `path`.
    pub fn attributes(&self, path: &str) -> Result<Entry> {
        let name = self.inner.resolve(path)?;
        let state = self.inner.read()?;
        self.inner
            .get_entry(&state, &name)?
            .ok_or_else(|| ZipFsError::NotFound(path.to_string()))
    }

    /// List a directory.
    ///
    /// Each child is returned as `path` joined with the child's name, so
    /// relative input yields relative output.
    pub fn read_dir(&self, path: &str) -> Result<Vec<String>> {
        let name = self.inner.resolve(path)?;
        let state = self.inner.read()?;
        let id = state
            .index
            .get(&name)
            .ok_or_else(|| ZipFsError::NotFound(path.to_string()))?;
        if !state.index.node(id).is_dir {
            return Err(ZipFsError::NotADirectory(path.to_string()));
        }
        let base = path.trim_end_matches('/');
        Ok(state
            .index
            .children(id)
            .map(|child| {
                let child = file_name(&state.index.node(child).name);
                format!("{base}/{}", self.inner.display(child))
            })
            .collect())
    }

    pub fn create_directory(&self, path: &str) -> Result<()> {
        self.inner.check_writable()?;
        let name = self.inner.resolve(path)?;
        let mut state = self.inner.write()?;
        if name == b"/" || state.index.contains(&name) {
            return Err(ZipFsError::AlreadyExists(path.to_string()));
        }
        self.inner.check_parents(&state, &name)?;
        let entry = self.inner.new_entry(name, true);
        state.index.update(entry)?;
        state.dirty = true;
        debug!(path, "created directory");
        Ok(())
    }

    /// Open an entry for writing.
    ///
    /// The entry only becomes visible once the writer is closed.
    ///
    /// # Errors
    ///
    /// * [`ZipFsError::InvalidOption`] for `append` together with `truncate`
    /// * [`ZipFsError::AlreadyExists`] for a directory, or an existing entry
    ///   with `create_new`
    /// * [`ZipFsError::NotFound`] for a missing entry without `create`, or a
    ///   missing parent
    pub fn new_output(&self, path: &str, options: WriteOptions) -> Result<EntryWriter> {
        self.inner.check_writable()?;
        if options.append && options.truncate {
            return Err(ZipFsError::InvalidOption {
                key: "append".to_string(),
                value: "truncate".to_string(),
            });
        }
        let name = self.inner.resolve(path)?;
        let (entry, append) = {
            let state = self.inner.read()?;
            match self.inner.get_entry(&state, &name)? {
                Some(old) => {
                    if old.is_dir || options.create_new {
                        return Err(ZipFsError::AlreadyExists(path.to_string()));
                    }
                    let mut e = old.derive(EntryKind::New);
                    e.flag = self.inner.base_flag();
                    e.mtime = now_millis();
                    (e, options.append)
                }
                None => {
                    if !options.create && !options.create_new {
                        return Err(ZipFsError::NotFound(path.to_string()));
                    }
                    self.inner.check_parents(&state, &name)?;
                    (self.inner.new_entry(name, false), false)
                }
            }
        };

        let mut writer = EntryWriter::new(self.inner.clone(), entry)?;
        if append {
            let mut old = self.new_input(path)?;
            io::copy(&mut old, &mut writer)?;
        }
        Ok(writer)
    }

    /// Create or replace the entry at `path` with `data`.
    pub fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut w = self.new_output(path, WriteOptions::default())?;
        w.write_all(data)?;
        w.close()
    }

    /// Open an entry's decoded content for reading.
    pub fn new_input(&self, path: &str) -> Result<EntryReader> {
        let name = self.inner.resolve(path)?;
        let state = self.inner.read()?;
        let entry = self
            .inner
            .get_entry(&state, &name)?
            .ok_or_else(|| ZipFsError::NotFound(path.to_string()))?;
        if entry.is_dir {
            return Err(ZipFsError::IsADirectory(path.to_string()));
        }
        EntryReader::open(&self.inner.pool, &state.channel, state.locpos, &entry)
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let mut r = self.new_input(path)?;
        let mut out = Vec::new();
        r.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Open a seekable channel on an entry.
    ///
    /// The decoded content is staged in a temporary file. Closing a
    /// writable channel records that file as the entry's content.
    pub fn open_channel(&self, path: &str, options: ChannelOptions) -> Result<EntryChannel> {
        if options.write {
            self.inner.check_writable()?;
            if options.append && options.truncate {
                return Err(ZipFsError::InvalidOption {
                    key: "append".to_string(),
                    value: "truncate".to_string(),
                });
            }
        }
        let name = self.inner.resolve(path)?;
        let existing = {
            let state = self.inner.read()?;
            let existing = self.inner.get_entry(&state, &name)?;
            match &existing {
                Some(e) if e.is_dir => return Err(ZipFsError::IsADirectory(path.to_string())),
                Some(_) if options.write && options.create_new => {
                    return Err(ZipFsError::AlreadyExists(path.to_string()));
                }
                Some(_) => {}
                None if options.write && (options.create || options.create_new) => {
                    self.inner.check_parents(&state, &name)?;
                }
                None => return Err(ZipFsError::NotFound(path.to_string())),
            }
            existing
        };

        let (mut file, tmp) = self.inner.create_temp_file()?;
        if existing.is_some() && !(options.write && options.truncate) {
            let mut r = self.new_input(path)?;
            io::copy(&mut r, &mut file)?;
        }
        if options.append {
            file.seek(SeekFrom::End(0))?;
        } else {
            file.seek(SeekFrom::Start(0))?;
        }

        let target = options.write.then(|| match existing {
            Some(old) => {
                let mut e = old.derive(EntryKind::FileChannel);
                e.flag = self.inner.base_flag();
                e
            }
            None => self.inner.new_entry(name, false),
        });
        Ok(EntryChannel::new(self.inner.clone(), file, tmp, target))
    }

    /// Delete an entry.
    ///
    /// # Errors
    ///
    /// * [`ZipFsError::InvalidPath`] for the root
    /// * [`ZipFsError::DirectoryNotEmpty`] for a populated directory
    /// * [`ZipFsError::NotFound`] if nothing exists at `path`
    pub fn delete(&self, path: &str) -> Result<()> {
        self.delete_node(path, true).map(|_| ())
    }

    /// Like [`delete`](Self::delete), but a missing entry returns `false`.
    pub fn delete_if_exists(&self, path: &str) -> Result<bool> {
        self.delete_node(path, false)
    }

    fn delete_node(&self, path: &str, must_exist: bool) -> Result<bool> {
        self.inner.check_writable()?;
        let name = self.inner.resolve(path)?;
        if name == b"/" {
            return Err(ZipFsError::InvalidPath("/".to_string()));
        }
        let mut state = self.inner.write()?;
        let Some(id) = state.index.get(&name) else {
            return if must_exist {
                Err(ZipFsError::NotFound(path.to_string()))
            } else {
                Ok(false)
            };
        };
        if state.index.has_children(id) {
            return Err(ZipFsError::DirectoryNotEmpty(path.to_string()));
        }
        state.index.remove(id);
        state.dirty = true;
        debug!(path, "deleted");
        Ok(true)
    }

    pub fn copy(&self, src: &str, dst: &str, options: CopyOptions) -> Result<()> {
        self.copy_entry(src, dst, options, false)
    }

    pub fn rename(&self, src: &str, dst: &str, options: CopyOptions) -> Result<()> {
        self.copy_entry(src, dst, options, true)
    }

    fn copy_entry(&self, src: &str, dst: &str, options: CopyOptions, move_src: bool) -> Result<()> {
        self.inner.check_writable()?;
        let sname = self.inner.resolve(src)?;
        let dname = self.inner.resolve(dst)?;
        if sname == dname {
            return Ok(());
        }
        let mut state = self.inner.write()?;
        let source = self
            .inner
            .get_entry(&state, &sname)?
            .ok_or_else(|| ZipFsError::NotFound(src.to_string()))?;

        match state.index.get(&dname) {
            Some(id) => {
                if !options.replace_existing {
                    return Err(ZipFsError::AlreadyExists(dst.to_string()));
                }
                if state.index.has_children(id) {
                    return Err(ZipFsError::DirectoryNotEmpty(dst.to_string()));
                }
            }
            None => self.inner.check_parents(&state, &dname)?,
        }

        let mut target = if source.is_dir {
            if move_src && state.index.get(&sname).is_some_and(|id| state.index.has_children(id)) {
                return Err(ZipFsError::DirectoryNotEmpty(src.to_string()));
            }
            let mut e = self.inner.new_entry(dname, true);
            if options.copy_attributes {
                e.mtime = source.mtime;
                e.atime = source.atime;
                e.ctime = source.ctime;
            }
            e
        } else {
            let mut e = source.derive(EntryKind::Copy);
            e.name = dname;
            if matches!(source.kind, EntryKind::New | EntryKind::FileChannel) {
                e.kind = source.kind;
                e.encoded = source.encoded;
                e.content = match &source.content {
                    Content::File(path) if !move_src => {
                        let (_, copy) = self.inner.create_temp_file()?;
                        std::fs::copy(path, &copy)?;
                        Content::File(copy)
                    }
                    other => other.clone(),
                };
            }
            e
        };
        if !options.copy_attributes {
            let now = now_millis();
            target.mtime = now;
            target.atime = Some(now);
            target.ctime = Some(now);
        }

        state.index.update(target)?;
        if move_src && let Some(id) = state.index.get(&sname) {
            state.index.remove(id);
        }
        state.dirty = true;
        debug!(src, dst, moved = move_src, "copied entry");
        Ok(())
    }

    /// Update the timestamps of an entry; `None` leaves a time unchanged.
    pub fn set_times(
        &self,
        path: &str,
        mtime: Option<SystemTime>,
        atime: Option<SystemTime>,
        ctime: Option<SystemTime>,
    ) -> Result<()> {
        self.inner.check_writable()?;
        let name = self.inner.resolve(path)?;
        let mut state = self.inner.write()?;
        let mut e = self
            .inner
            .get_entry(&state, &name)?
            .ok_or_else(|| ZipFsError::NotFound(path.to_string()))?;
        if e.kind == EntryKind::Cen {
            e.kind = EntryKind::Copy;
        }
        if let Some(t) = mtime {
            e.mtime = from_system_time(t);
        }
        if let Some(t) = atime {
            e.atime = Some(from_system_time(t));
        }
        if let Some(t) = ctime {
            e.ctime = Some(from_system_time(t));
        }
        state.index.update(e)?;
        state.dirty = true;
        Ok(())
    }

    /// Write all changes back to the archive and release resources.
    ///
    /// Closing an already closed file system does nothing. Temporary files
    /// are removed even if writing the archive fails; a write failure is
    /// reported in preference to a cleanup failure.
    pub fn close(&self) -> Result<()> {
        let result = {
            let mut state = self.inner.state.write();
            if !state.open {
                return Ok(());
            }
            state.open = false;
            if state.dirty {
                commit::sync(&self.inner, &state)
            } else {
                Ok(())
            }
        };
        self.inner.pool.clear();
        let cleanup = self.inner.delete_temp_files();
        result.and(cleanup)
    }
}

impl Drop for ZipFileSystem {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.inner.path.display(), error = %e, "failed to close zip file system");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("a/b/"), "/a/b");
        assert_eq!(normalize("//a/./b//c"), "/a/b/c");
        assert_eq!(normalize("/a/../b"), "/b");
        assert_eq!(normalize("/../../x"), "/x");
    }

    #[test]
    fn test_handles_cross_threads() {
        fn shared<T: Send + Sync>() {}
        fn owned<T: Send>() {}
        shared::<ZipFileSystem>();
        owned::<EntryReader>();
        owned::<EntryWriter>();
    }
}
