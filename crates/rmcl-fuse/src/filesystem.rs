use std::ffi::OsStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration as StdDuration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use fuser::{
    FileAttr, FileType as FuseFileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use rmcl_core::domain::{Mode, MODE_FILE_NAME, MODE_ID, ROOT_ID};
use rmcl_graph::{GraphError, Item, ItemGraph};
use tokio::runtime::Handle;

use crate::error::FuseError;
use crate::inode::{InodeTable, ROOT_INODE};

const TTL: StdDuration = StdDuration::from_secs(1);
const NAME_MAX: usize = 255;

/// FUSE's `open` reply flag telling the kernel not to trust declared sizes
/// and issue direct reads instead of relying on page-cache coherency.
const FOPEN_DIRECT_IO: u32 = 1 << 0;

/// The `fuser::Filesystem` adapter: a thin, synchronous shell around
/// [`ItemGraph`], bridged to async via `tokio::runtime::Handle::block_on`
/// by running the async work to completion on the current task.
pub struct RmclFs {
    rt_handle: Handle,
    graph: Arc<ItemGraph>,
    inodes: Arc<InodeTable>,
    mode: StdMutex<Mode>,
    started_at: DateTime<Utc>,
    next_fh: AtomicU64,
}

impl RmclFs {
    pub fn new(graph: Arc<ItemGraph>, rt_handle: Handle, initial_mode: Mode) -> Self {
        let inodes = Arc::new(InodeTable::new(ROOT_ID, MODE_ID));
        RmclFs {
            rt_handle,
            graph,
            inodes,
            mode: StdMutex::new(initial_mode),
            started_at: rmcl_core::time::now(),
            next_fh: AtomicU64::new(ROOT_INODE + 1),
        }
    }

    fn current_mode(&self) -> Mode {
        *self.mode.lock().expect("mode mutex poisoned")
    }

    fn alloc_fh(&self) -> u64 {
        self.next_fh.fetch_add(1, Ordering::SeqCst)
    }
}

/// The bytes `.mode` reports when read: the command name followed by a
/// newline, matching the write-then-read round trip in S1.
fn mode_contents(mode: Mode) -> Vec<u8> {
    format!("{}\n", mode.as_str()).into_bytes()
}

fn system_time_from(dt: DateTime<Utc>) -> SystemTime {
    let secs = dt.timestamp().max(0) as u64;
    let nanos = dt.timestamp_subsec_nanos();
    UNIX_EPOCH + StdDuration::new(secs, nanos)
}

fn file_attr(ino: u64, size: u64, kind: FuseFileType, perm: u16, mtime: DateTime<Utc>) -> FileAttr {
    let time = system_time_from(mtime);
    FileAttr {
        ino,
        size,
        blocks: size.div_ceil(512),
        atime: time,
        mtime: time,
        ctime: time,
        crtime: time,
        kind,
        perm,
        nlink: 1,
        uid: unsafe { libc::getuid() },
        gid: unsafe { libc::getgid() },
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

/// The filename synthesis rule for readdir/lookup: folders and the
/// mode file use their raw name; documents append a suffix that depends on
/// the active display mode.
async fn synthesize_name(item: &Item, mode: Mode, graph: &ItemGraph) -> Result<String, GraphError> {
    match item {
        Item::Document(doc) => match mode {
            Mode::Raw => Ok(format!("{}.zip", doc.name)),
            Mode::Meta => Ok(doc.name.clone()),
            Mode::Orig => {
                let file_type = doc.file_type(graph.api(), graph.data_cache()).await?;
                Ok(format!("{}.{}", doc.name, file_type))
            }
        },
        Item::Folder(_) | Item::VirtualFolder(_) | Item::ModeFile(_) => {
            Ok(item.name().to_string())
        }
    }
}

async fn build_attr(
    ino: u64,
    item: &Item,
    mode: Mode,
    graph: &ItemGraph,
    started_at: DateTime<Utc>,
) -> Result<FileAttr, GraphError> {
    match item {
        Item::Document(doc) => {
            let size = match mode {
                Mode::Raw => doc.raw_size(graph.api(), graph.data_cache()).await?,
                Mode::Orig => doc.size(graph.api(), graph.data_cache()).await?,
                Mode::Meta => 0,
            };
            Ok(file_attr(ino, size, FuseFileType::RegularFile, 0o444, doc.mtime))
        }
        Item::Folder(f) => Ok(file_attr(ino, 0, FuseFileType::Directory, 0o555, f.mtime)),
        Item::VirtualFolder(_) => Ok(file_attr(
            ino,
            0,
            FuseFileType::Directory,
            0o555,
            started_at,
        )),
        Item::ModeFile(_) => {
            let size = mode_contents(mode).len() as u64;
            Ok(file_attr(ino, size, FuseFileType::RegularFile, 0o644, started_at))
        }
    }
}

/// Resolves a `lookup` call: matches `name` against `.`, `..`, the mode
/// file, or a child whose synthesized name matches exactly.
async fn resolve_lookup(
    graph: &ItemGraph,
    inodes: &InodeTable,
    mode: Mode,
    parent_ino: u64,
    parent_id: &str,
    name: &str,
) -> Result<(u64, Arc<Item>), FuseError> {
    if name == "." {
        let item = graph.get_by_id(parent_id).await?;
        return Ok((parent_ino, item));
    }
    if name == ".." {
        let parent_item = graph.get_by_id(parent_id).await?;
        let grandparent_id = parent_item.parent().unwrap_or(ROOT_ID);
        let ino = inodes.inode_for(grandparent_id);
        let item = graph.get_by_id(grandparent_id).await?;
        return Ok((ino, item));
    }
    if parent_id == ROOT_ID && name == MODE_FILE_NAME {
        let item = graph.get_by_id(MODE_ID).await?;
        return Ok((inodes.inode_for(MODE_ID), item));
    }

    let parent_item = graph.get_by_id(parent_id).await?;
    for child_id in parent_item.children() {
        let Ok(child) = graph.get_by_id(&child_id).await else {
            continue;
        };
        let synthesized = synthesize_name(&child, mode, graph).await?;
        if synthesized == name {
            return Ok((inodes.inode_for(&child_id), child));
        }
    }
    Err(FuseError::NotFound)
}

async fn list_children(
    graph: &ItemGraph,
    inodes: &InodeTable,
    mode: Mode,
    ino: u64,
    id: &str,
) -> Result<Vec<(u64, FuseFileType, String)>, FuseError> {
    let item = graph.get_by_id(id).await?;
    let mut entries = Vec::new();

    entries.push((ino, FuseFileType::Directory, ".".to_string()));

    let parent_ino = match item.parent() {
        Some(parent_id) => inodes.inode_for(parent_id),
        None => ino,
    };
    entries.push((parent_ino, FuseFileType::Directory, "..".to_string()));

    if id == ROOT_ID {
        entries.push((
            inodes.inode_for(MODE_ID),
            FuseFileType::RegularFile,
            MODE_FILE_NAME.to_string(),
        ));
    }

    for child_id in item.children() {
        let Ok(child) = graph.get_by_id(&child_id).await else {
            continue;
        };
        let kind = if child.is_folder() {
            FuseFileType::Directory
        } else {
            FuseFileType::RegularFile
        };
        let name = synthesize_name(&child, mode, graph).await?;
        entries.push((inodes.inode_for(&child_id), kind, name));
    }

    Ok(entries)
}

async fn contents_for(item: &Item, mode: Mode, graph: &ItemGraph) -> Result<Vec<u8>, FuseError> {
    match item {
        Item::Document(doc) => match mode {
            Mode::Meta => {
                let mut text = serde_json::to_string_pretty(&doc.metadata)
                    .map_err(|_| FuseError::InvalidArgument)?;
                text.push('\n');
                Ok(text.into_bytes())
            }
            Mode::Raw => Ok(doc.raw(graph.api(), graph.document_cache()).await?),
            Mode::Orig => Ok(doc
                .contents(graph.api(), graph.data_cache(), graph.document_cache())
                .await?),
        },
        Item::ModeFile(_) => Ok(mode_contents(mode)),
        Item::Folder(_) | Item::VirtualFolder(_) => Err(FuseError::PermissionDenied),
    }
}

fn name_str(name: &OsStr) -> Result<&str, libc::c_int> {
    match name.to_str() {
        Some(s) if s.len() <= NAME_MAX => Ok(s),
        Some(_) => Err(libc::ENAMETOOLONG),
        None => Err(libc::ENOENT),
    }
}

impl Filesystem for RmclFs {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name_str = match name_str(name) {
            Ok(s) => s,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        let Some(parent_id) = self.inodes.id_for(parent) else {
            reply.error(libc::ENOENT);
            return;
        };

        let graph = Arc::clone(&self.graph);
        let inodes = Arc::clone(&self.inodes);
        let mode = self.current_mode();
        let result = self.rt_handle.block_on(async move {
            resolve_lookup(&graph, &inodes, mode, parent, &parent_id, name_str).await
        });

        match result {
            Ok((ino, item)) => {
                let mode = self.current_mode();
                let attr_result = self.rt_handle.block_on(async {
                    build_attr(ino, &item, mode, &self.graph, self.started_at).await
                });
                match attr_result {
                    Ok(attr) => reply.entry(&TTL, &attr, 0),
                    Err(e) => reply.error(FuseError::from(e).into()),
                }
            }
            Err(e) => reply.error(e.into()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(id) = self.inodes.id_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        let mode = self.current_mode();
        let result = self.rt_handle.block_on(async {
            let item = self.graph.get_by_id(&id).await?;
            build_attr(ino, &item, mode, &self.graph, self.started_at).await
        });

        match result {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(FuseError::from(e).into()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        self.getattr(_req, ino, _fh, reply);
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(id) = self.inodes.id_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        let graph = Arc::clone(&self.graph);
        let inodes = Arc::clone(&self.inodes);
        let mode = self.current_mode();
        let result = self
            .rt_handle
            .block_on(async move { list_children(&graph, &inodes, mode, ino, &id).await });

        let entries = match result {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(e.into());
                return;
            }
        };

        for (i, (child_ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(child_ino, (i + 1) as i64, kind, OsStr::new(&name)) {
                break;
            }
        }
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        if self.inodes.id_for(ino).is_none() {
            reply.error(libc::ENOENT);
            return;
        }
        reply.opened(self.alloc_fh(), 0);
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let Some(id) = self.inodes.id_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        let write_requested = flags & (libc::O_WRONLY | libc::O_RDWR) != 0;
        if write_requested && id != MODE_ID {
            reply.error(libc::EPERM);
            return;
        }

        reply.opened(ino, FOPEN_DIRECT_IO);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(id) = self.inodes.id_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        let mode = self.current_mode();
        let result = self.rt_handle.block_on(async {
            let item = self.graph.get_by_id(&id).await.map_err(FuseError::from)?;
            contents_for(&item, mode, &self.graph).await
        });

        match result {
            Ok(bytes) => {
                let start = (offset as usize).min(bytes.len());
                let end = start.saturating_add(size as usize).min(bytes.len());
                reply.data(&bytes[start..end]);
            }
            Err(e) => {
                tracing::warn!(ino, error = %e, "read failed");
                reply.error(e.into());
            }
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(id) = self.inodes.id_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if id != MODE_ID {
            reply.error(libc::EPERM);
            return;
        }

        let command = String::from_utf8_lossy(data).trim().to_lowercase();
        if command == "refresh" {
            tracing::info!("mode file: forcing a refresh on next read");
            let graph = Arc::clone(&self.graph);
            self.rt_handle
                .block_on(async move { graph.invalidate_deadline().await });
            reply.written(data.len() as u32);
            return;
        }

        match Mode::parse(&command) {
            Some(new_mode) => {
                tracing::info!(mode = %new_mode, "mode file: switched display mode");
                *self.mode.lock().expect("mode mutex poisoned") = new_mode;
                reply.written(data.len() as u32);
            }
            None => {
                tracing::debug!(command, "mode file: rejected unknown command");
                reply.error(libc::EINVAL);
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_contents_is_command_name_plus_newline() {
        assert_eq!(mode_contents(Mode::Raw), b"raw\n");
        assert_eq!(mode_contents(Mode::Orig), b"orig\n");
        assert_eq!(mode_contents(Mode::Meta), b"meta\n");
    }

    #[test]
    fn unknown_mode_command_is_rejected_by_parse() {
        assert_eq!(Mode::parse("refresh"), None);
        assert_eq!(Mode::parse("bogus"), None);
    }

    #[test]
    fn name_str_rejects_overlong_names() {
        let long_name: String = "a".repeat(NAME_MAX + 1);
        let os_name = OsStr::new(&long_name);
        assert_eq!(name_str(os_name), Err(libc::ENAMETOOLONG));
    }

    #[test]
    fn name_str_accepts_names_at_the_limit() {
        let name: String = "a".repeat(NAME_MAX);
        let os_name = OsStr::new(&name);
        assert_eq!(name_str(os_name), Ok(name.as_str()));
    }

    #[test]
    fn file_attr_reports_requested_size_and_permissions() {
        let mtime = rmcl_core::time::now();
        let attr = file_attr(42, 1234, FuseFileType::RegularFile, 0o444, mtime);
        assert_eq!(attr.ino, 42);
        assert_eq!(attr.size, 1234);
        assert_eq!(attr.perm, 0o444);
        assert_eq!(attr.kind, FuseFileType::RegularFile);
    }
}
