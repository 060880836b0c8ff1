//! Filesystem operations over a key-value store.
//!
//! Every operation translates a path into the fixed key layout described
//! in [`crate::keys`] and commits its mutations through a single atomic
//! [`Batch`](crate::store::Batch). Reads tolerate missing keys, so a
//! concurrent writer can at worst make an operation observe an empty
//! value, never a torn one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::glob;
use crate::keys::KeySpace;
use crate::meta::{EntryKind, Metadata, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
use crate::observer::FileObserver;
use crate::path;
use crate::store::{Batch, KvStore};

/// Hop limit when chasing symlink chains, mirroring the Linux ELOOP bound.
pub const MAX_SYMLINK_DEPTH: usize = 40;

/// A directory entry paired with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub meta: Metadata,
}

/// A match produced by [`Engine::find`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindEntry {
    pub path: String,
    pub meta: Metadata,
}

/// One node of a [`TreeListing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub children: Vec<TreeNode>,
}

/// A recursive directory listing with entry counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeListing {
    pub root: TreeNode,
    /// Directories listed below the root.
    pub dirs: usize,
    /// Files and symlinks listed below the root.
    pub files: usize,
}

/// Path-level filesystem operations for one volume.
///
/// `Engine` is cheap to clone and safe to share across tasks. All methods
/// take `&self`; there is no client-side locking, so two racing writers
/// follow last-batch-wins semantics at the store.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    observer: Option<Arc<dyn FileObserver>>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(store: Arc<dyn KvStore>, volume: &str) -> Self {
        Self {
            store,
            keys: KeySpace::new(volume),
            observer: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an observer that is notified after file mutations commit.
    pub fn with_observer(mut self, observer: Arc<dyn FileObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Attach a token that aborts long recursive walks when cancelled.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn volume(&self) -> &str {
        self.keys.volume()
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        Arc::clone(&self.store)
    }

    /// Create the volume's root directory if it does not exist yet.
    ///
    /// Safe to call on every startup: a concurrent or earlier `init` wins
    /// the creation race and the loser leaves the existing root untouched.
    pub async fn init(&self) -> Result<()> {
        let meta_key = self.keys.root_meta();
        let created = self
            .store
            .hash_set_nx(&meta_key, "type", EntryKind::Dir.as_str())
            .await
            .map_err(|e| Error::store("init", "/", e))?;
        if created {
            let meta = Metadata::new_dir(DEFAULT_DIR_MODE, unix_now());
            let mut batch = Batch::new();
            batch.put_hash(&meta_key, meta.to_fields());
            self.store
                .apply(batch)
                .await
                .map_err(|e| Error::store("init", "/", e))?;
            debug!("created root for volume {}", self.keys.volume());
        }
        Ok(())
    }

    /// Metadata for `path`, or `None` when no entry exists.
    pub async fn stat(&self, path: &str) -> Result<Option<Metadata>> {
        let path = path::normalize(path);
        let fields = self
            .store
            .hash_get_all(&self.keys.meta(&path))
            .await
            .map_err(|e| Error::store("stat", &path, e))?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(Metadata::from_fields(&fields)))
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        let path = path::normalize(path);
        self.store
            .exists(&self.keys.meta(&path))
            .await
            .map_err(|e| Error::store("exists", &path, e))
    }

    pub async fn is_dir(&self, path: &str) -> Result<bool> {
        Ok(matches!(
            self.stat(path).await?,
            Some(meta) if meta.kind == EntryKind::Dir
        ))
    }

    /// Child base names of a directory, sorted.
    pub async fn read_dir(&self, path: &str) -> Result<Vec<String>> {
        let path = path::normalize(path);
        match self.stat(&path).await? {
            None => return Err(Error::not_found(&path)),
            Some(meta) if meta.kind != EntryKind::Dir => {
                return Err(Error::not_a_directory(&path));
            }
            Some(_) => {}
        }
        self.child_names(&path).await
    }

    // Raw membership read; an absent set reads as empty. Callers have
    // already established that `path` is a directory.
    async fn child_names(&self, path: &str) -> Result<Vec<String>> {
        let mut names = self
            .store
            .set_members(&self.keys.dir(path))
            .await
            .map_err(|e| Error::store("readdir", path, e))?;
        names.sort();
        Ok(names)
    }

    /// Children of a directory with their metadata, sorted by name.
    ///
    /// A child whose metadata record has vanished mid-listing shows up
    /// with zeroed metadata rather than failing the listing.
    pub async fn read_dir_with_meta(&self, path: &str) -> Result<Vec<DirEntry>> {
        let path = path::normalize(path);
        let names = self.read_dir(&path).await?;
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let meta_keys: Vec<String> = names
            .iter()
            .map(|name| self.keys.meta(&path::join(&path, name)))
            .collect();
        let maps = self
            .store
            .hash_get_all_multi(&meta_keys)
            .await
            .map_err(|e| Error::store("readdir", &path, e))?;
        Ok(names
            .into_iter()
            .zip(maps)
            .map(|(name, fields)| DirEntry {
                name,
                meta: Metadata::from_fields(&fields),
            })
            .collect())
    }

    /// Create a directory. With `parents` set, missing ancestors are
    /// created as well and an existing directory is not an error.
    pub async fn mkdir(&self, path: &str, parents: bool) -> Result<()> {
        self.check_cancelled()?;
        let path = path::normalize(path);
        if path::is_root(&path) {
            return Ok(());
        }
        if parents {
            return self.mkdir_parents(&path).await;
        }
        self.ensure_parent_dir(&path).await?;
        if self.exists(&path).await? {
            return Err(Error::already_exists(&path));
        }
        self.create_dir(&path).await
    }

    async fn mkdir_parents(&self, path: &str) -> Result<()> {
        let mut current = String::new();
        for component in path::components(path) {
            current.push('/');
            current.push_str(&component);
            match self.stat(&current).await? {
                None => self.create_dir(&current).await?,
                Some(meta) if meta.kind == EntryKind::Dir => {}
                Some(_) => return Err(Error::not_a_directory(&current)),
            }
        }
        Ok(())
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        let meta = Metadata::new_dir(DEFAULT_DIR_MODE, unix_now());
        let mut batch = Batch::new();
        batch
            .put_hash(self.keys.meta(path), meta.to_fields())
            .add_member(self.keys.dir(&path::parent(path)), path::base_name(path));
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("mkdir", path, e))
    }

    /// Remove an empty directory.
    pub async fn rmdir(&self, path: &str) -> Result<()> {
        self.check_cancelled()?;
        let path = path::normalize(path);
        if path::is_root(&path) {
            return Err(Error::invalid_argument("cannot remove root directory"));
        }
        match self.stat(&path).await? {
            None => return Err(Error::not_found(&path)),
            Some(meta) if meta.kind != EntryKind::Dir => {
                return Err(Error::not_a_directory(&path));
            }
            Some(_) => {}
        }
        let children = self
            .store
            .set_len(&self.keys.dir(&path))
            .await
            .map_err(|e| Error::store("rmdir", &path, e))?;
        if children > 0 {
            return Err(Error::not_empty(&path));
        }
        let mut batch = Batch::new();
        batch
            .delete_keys([
                self.keys.meta(&path),
                self.keys.dir(&path),
                self.keys.xattr(&path),
            ])
            .remove_member(self.keys.dir(&path::parent(&path)), path::base_name(&path));
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("rmdir", &path, e))
    }

    /// Create an empty file, or refresh the timestamps of an existing
    /// entry. Observers are not notified.
    pub async fn touch(&self, path: &str) -> Result<()> {
        self.check_cancelled()?;
        let path = path::normalize(path);
        let now = unix_now();
        if self.exists(&path).await? {
            let mut batch = Batch::new();
            batch.put_hash(
                self.keys.meta(&path),
                vec![
                    ("mtime".to_string(), now.to_string()),
                    ("atime".to_string(), now.to_string()),
                ],
            );
            return self
                .store
                .apply(batch)
                .await
                .map_err(|e| Error::store("touch", &path, e));
        }
        self.ensure_parent_dir(&path).await?;
        let meta = Metadata::new_file(DEFAULT_FILE_MODE, 0, now);
        let mut batch = Batch::new();
        batch
            .put_string(self.keys.data(&path), Vec::new())
            .put_hash(self.keys.meta(&path), meta.to_fields())
            .add_member(self.keys.dir(&path::parent(&path)), path::base_name(&path));
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("touch", &path, e))
    }

    /// Read a file's content, following symlinks.
    ///
    /// A file whose content key is missing reads as empty, as does a
    /// symlink chain that ends at a nonexistent path.
    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = path::normalize(path);
        let target = match self.stat(&path).await? {
            None => return Err(Error::not_found(&path)),
            Some(meta) if meta.kind == EntryKind::Dir => {
                return Err(Error::is_a_directory(&path));
            }
            Some(meta) if meta.kind == EntryKind::Symlink => self.resolve_symlink(&path).await?,
            Some(_) => path.clone(),
        };
        let content = self
            .store
            .get_string(&self.keys.data(&target))
            .await
            .map_err(|e| Error::store("read", &target, e))?
            .unwrap_or_default();
        self.touch_atime(&target).await;
        Ok(content)
    }

    // Best-effort atime refresh after a read. Skipped when the entry's
    // metadata is gone so a read can never mint a record for a path that
    // no directory references.
    async fn touch_atime(&self, path: &str) {
        let meta_key = self.keys.meta(path);
        match self.store.exists(&meta_key).await {
            Ok(true) => {
                let mut batch = Batch::new();
                batch.put_hash(
                    meta_key,
                    vec![("atime".to_string(), unix_now().to_string())],
                );
                if let Err(e) = self.store.apply(batch).await {
                    debug!("atime update failed for {path}: {e}");
                }
            }
            Ok(false) => {}
            Err(e) => debug!("atime update skipped for {path}: {e}"),
        }
    }

    /// Write `content` to a file, replacing any previous content.
    ///
    /// Writes resolve the named path literally rather than following a
    /// symlink at it.
    pub async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        self.check_cancelled()?;
        let path = path::normalize(path);
        let now = unix_now();
        match self.stat(&path).await? {
            Some(meta) if meta.kind == EntryKind::Dir => {
                return Err(Error::is_a_directory(&path));
            }
            Some(_) => {
                let mut batch = Batch::new();
                batch
                    .put_string(self.keys.data(&path), content.to_vec())
                    .put_hash(
                        self.keys.meta(&path),
                        vec![
                            ("size".to_string(), (content.len() as i64).to_string()),
                            ("mtime".to_string(), now.to_string()),
                        ],
                    );
                self.store
                    .apply(batch)
                    .await
                    .map_err(|e| Error::store("write", &path, e))?;
            }
            None => {
                self.ensure_parent_dir(&path).await?;
                let meta = Metadata::new_file(DEFAULT_FILE_MODE, content.len() as i64, now);
                let mut batch = Batch::new();
                batch
                    .put_string(self.keys.data(&path), content.to_vec())
                    .put_hash(self.keys.meta(&path), meta.to_fields())
                    .add_member(self.keys.dir(&path::parent(&path)), path::base_name(&path));
                self.store
                    .apply(batch)
                    .await
                    .map_err(|e| Error::store("write", &path, e))?;
            }
        }
        self.notify_write(&path, content).await;
        Ok(())
    }

    /// Append `content` to a file, creating it if necessary.
    ///
    /// The append itself is a single atomic batch; the size and mtime
    /// refresh rides in a second batch, so a reader between the two can
    /// see a size briefly behind the content.
    pub async fn append_file(&self, path: &str, content: &[u8]) -> Result<()> {
        self.check_cancelled()?;
        let path = path::normalize(path);
        match self.stat(&path).await? {
            None => return self.write_file(&path, content).await,
            Some(meta) if meta.kind == EntryKind::Dir => {
                return Err(Error::is_a_directory(&path));
            }
            Some(_) => {}
        }
        let mut batch = Batch::new();
        batch.append_string(self.keys.data(&path), content.to_vec());
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("append", &path, e))?;
        let size = self
            .store
            .string_len(&self.keys.data(&path))
            .await
            .map_err(|e| Error::store("append", &path, e))?;
        let mut batch = Batch::new();
        batch.put_hash(
            self.keys.meta(&path),
            vec![
                ("size".to_string(), size.to_string()),
                ("mtime".to_string(), unix_now().to_string()),
            ],
        );
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("append", &path, e))?;
        if self.observer.is_some() {
            match self.store.get_string(&self.keys.data(&path)).await {
                Ok(Some(full)) => self.notify_write(&path, &full).await,
                Ok(None) => {}
                Err(e) => debug!("skipping write notification for {path}: {e}"),
            }
        }
        Ok(())
    }

    /// Remove a file or symlink.
    pub async fn remove(&self, path: &str) -> Result<()> {
        self.check_cancelled()?;
        let path = path::normalize(path);
        if path::is_root(&path) {
            return Err(Error::invalid_argument("cannot remove root directory"));
        }
        match self.stat(&path).await? {
            None => return Err(Error::not_found(&path)),
            Some(meta) if meta.kind == EntryKind::Dir => {
                return Err(Error::is_a_directory(&path));
            }
            Some(_) => {}
        }
        self.remove_entry(&path).await?;
        self.notify_remove(&path).await;
        Ok(())
    }

    async fn remove_entry(&self, path: &str) -> Result<()> {
        let mut batch = Batch::new();
        batch
            .delete_keys([
                self.keys.meta(path),
                self.keys.data(path),
                self.keys.xattr(path),
            ])
            .remove_member(self.keys.dir(&path::parent(path)), path::base_name(path));
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("remove", path, e))
    }

    /// Remove an entry, descending into directories.
    ///
    /// Children are deleted before their parent, each in its own batch,
    /// so an interrupted removal leaves a smaller but consistent tree.
    pub async fn remove_recursive(&self, path: &str) -> Result<()> {
        self.check_cancelled()?;
        let path = path::normalize(path);
        if path::is_root(&path) {
            return Err(Error::invalid_argument("cannot remove root directory"));
        }
        match self.stat(&path).await? {
            None => return Err(Error::not_found(&path)),
            Some(meta) if meta.kind != EntryKind::Dir => return self.remove(&path).await,
            Some(_) => {}
        }
        let entries = self.walk_entries(&path).await?;
        for (entry, kind) in entries.into_iter().rev() {
            self.check_cancelled()?;
            if kind == EntryKind::Dir {
                let mut batch = Batch::new();
                batch
                    .delete_keys([
                        self.keys.meta(&entry),
                        self.keys.dir(&entry),
                        self.keys.xattr(&entry),
                    ])
                    .remove_member(
                        self.keys.dir(&path::parent(&entry)),
                        path::base_name(&entry),
                    );
                self.store
                    .apply(batch)
                    .await
                    .map_err(|e| Error::store("remove", &entry, e))?;
            } else {
                self.remove_entry(&entry).await?;
                self.notify_remove(&entry).await;
            }
        }
        Ok(())
    }

    // Preorder walk of the subtree rooted at `root`, which must be a
    // directory. Children whose metadata has vanished are skipped.
    async fn walk_entries(&self, root: &str) -> Result<Vec<(String, EntryKind)>> {
        let mut out = Vec::new();
        let mut stack = vec![(root.to_string(), EntryKind::Dir)];
        while let Some((current, kind)) = stack.pop() {
            self.check_cancelled()?;
            if kind == EntryKind::Dir {
                let names = self.child_names(&current).await?;
                for name in names.into_iter().rev() {
                    let child = path::join(&current, &name);
                    if let Some(meta) = self.stat(&child).await? {
                        stack.push((child, meta.kind));
                    }
                }
            }
            out.push((current, kind));
        }
        Ok(out)
    }

    /// Copy a single file or symlink. Copying onto a directory places the
    /// copy inside it under the source's base name.
    ///
    /// The copy keeps the source's mode, ownership and size but gets
    /// fresh timestamps.
    pub async fn copy_file(&self, src: &str, dst: &str) -> Result<()> {
        self.check_cancelled()?;
        let src = path::normalize(src);
        let mut dst = path::normalize(dst);
        if let Some(meta) = self.stat(&dst).await? {
            if meta.kind == EntryKind::Dir {
                dst = path::join(&dst, &path::base_name(&src));
            }
        }
        let mut meta = match self.stat(&src).await? {
            None => return Err(Error::not_found(&src)),
            Some(meta) if meta.kind == EntryKind::Dir => {
                return Err(Error::is_a_directory(&src));
            }
            Some(meta) => meta,
        };
        let content = self
            .store
            .get_string(&self.keys.data(&src))
            .await
            .map_err(|e| Error::store("copy", &src, e))?
            .unwrap_or_default();
        self.ensure_parent_dir(&dst).await?;
        let now = unix_now();
        meta.ctime = now;
        meta.mtime = now;
        meta.atime = now;
        let mut batch = Batch::new();
        batch
            .delete_keys([self.keys.meta(&dst)])
            .put_string(self.keys.data(&dst), content.clone())
            .put_hash(self.keys.meta(&dst), meta.to_fields())
            .add_member(self.keys.dir(&path::parent(&dst)), path::base_name(&dst))
            .put_hash(
                self.keys.meta(&src),
                vec![("atime".to_string(), now.to_string())],
            );
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("copy", &dst, e))?;
        self.notify_write(&dst, &content).await;
        Ok(())
    }

    /// Copy an entry, descending into directories.
    ///
    /// Copied directories are created fresh with default permissions;
    /// copied files keep their attributes like [`Engine::copy_file`].
    pub async fn copy_recursive(&self, src: &str, dst: &str) -> Result<()> {
        self.check_cancelled()?;
        let src = path::normalize(src);
        let mut dst = path::normalize(dst);
        let src_meta = match self.stat(&src).await? {
            None => return Err(Error::not_found(&src)),
            Some(meta) => meta,
        };
        if let Some(meta) = self.stat(&dst).await? {
            if meta.kind == EntryKind::Dir {
                dst = path::join(&dst, &path::base_name(&src));
            }
        }
        if src_meta.kind != EntryKind::Dir {
            return self.copy_file(&src, &dst).await;
        }
        if dst == src || dst.starts_with(&format!("{src}/")) {
            return Err(Error::invalid_argument(format!(
                "cannot copy directory {src} into itself"
            )));
        }
        let mut stack = vec![(src, dst)];
        while let Some((from, to)) = stack.pop() {
            self.check_cancelled()?;
            self.mkdir(&to, true).await?;
            for name in self.child_names(&from).await?.into_iter().rev() {
                let child_src = path::join(&from, &name);
                let child_dst = path::join(&to, &name);
                match self.stat(&child_src).await? {
                    None => return Err(Error::not_found(&child_src)),
                    Some(meta) if meta.kind == EntryKind::Dir => {
                        stack.push((child_src, child_dst));
                    }
                    Some(_) => self.copy_file(&child_src, &child_dst).await?,
                }
            }
        }
        Ok(())
    }

    /// Move an entry to a new path. Moving onto a directory places the
    /// entry inside it under the source's base name.
    ///
    /// A file or symlink moves in one atomic batch. A directory moves as
    /// copy-then-delete, so a failure mid-move can leave both trees.
    pub async fn rename(&self, src: &str, dst: &str) -> Result<()> {
        self.check_cancelled()?;
        let src = path::normalize(src);
        if path::is_root(&src) {
            return Err(Error::invalid_argument("cannot move root directory"));
        }
        let mut dst = path::normalize(dst);
        let src_meta = match self.stat(&src).await? {
            None => return Err(Error::not_found(&src)),
            Some(meta) => meta,
        };
        if let Some(meta) = self.stat(&dst).await? {
            if meta.kind == EntryKind::Dir {
                dst = path::join(&dst, &path::base_name(&src));
            }
        }
        if dst == src {
            return Ok(());
        }
        self.ensure_parent_dir(&dst).await?;
        if src_meta.kind == EntryKind::Dir {
            if dst.starts_with(&format!("{src}/")) {
                return Err(Error::invalid_argument(format!(
                    "cannot move directory {src} into itself"
                )));
            }
            self.copy_recursive(&src, &dst).await?;
            return self.remove_recursive(&src).await;
        }
        self.move_file(&src, &dst).await
    }

    async fn move_file(&self, src: &str, dst: &str) -> Result<()> {
        let mut batch = Batch::new();
        batch.rename_key(self.keys.meta(src), self.keys.meta(dst));
        let data_src = self.keys.data(src);
        if self
            .store
            .exists(&data_src)
            .await
            .map_err(|e| Error::store("move", src, e))?
        {
            batch.rename_key(data_src, self.keys.data(dst));
        } else {
            batch.delete_keys([self.keys.data(dst)]);
        }
        let xattr_src = self.keys.xattr(src);
        if self
            .store
            .exists(&xattr_src)
            .await
            .map_err(|e| Error::store("move", src, e))?
        {
            batch.rename_key(xattr_src, self.keys.xattr(dst));
        } else {
            batch.delete_keys([self.keys.xattr(dst)]);
        }
        batch
            .remove_member(self.keys.dir(&path::parent(src)), path::base_name(src))
            .add_member(self.keys.dir(&path::parent(dst)), path::base_name(dst));
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("move", src, e))?;
        self.notify_move(src, dst).await;
        Ok(())
    }

    /// Create a symlink at `link_path` pointing at `target`.
    ///
    /// The target string is stored as given, absolute or relative, and is
    /// not required to exist.
    pub async fn symlink(&self, target: &str, link_path: &str) -> Result<()> {
        self.check_cancelled()?;
        let link_path = path::normalize(link_path);
        if self.exists(&link_path).await? {
            return Err(Error::already_exists(&link_path));
        }
        self.ensure_parent_dir(&link_path).await?;
        let meta = Metadata::new_symlink(target, unix_now());
        let mut batch = Batch::new();
        batch
            .put_hash(self.keys.meta(&link_path), meta.to_fields())
            .add_member(
                self.keys.dir(&path::parent(&link_path)),
                path::base_name(&link_path),
            );
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("symlink", &link_path, e))
    }

    /// Follow symlinks starting at `path` until a non-symlink entry or a
    /// missing path is reached. Relative targets resolve against the
    /// link's parent directory. Chains longer than [`MAX_SYMLINK_DEPTH`]
    /// links fail rather than loop.
    pub async fn resolve_symlink(&self, path: &str) -> Result<String> {
        let mut current = path::normalize(path);
        let mut hops = 0;
        loop {
            match self.stat(&current).await? {
                Some(meta) if meta.kind == EntryKind::Symlink => {
                    hops += 1;
                    if hops > MAX_SYMLINK_DEPTH {
                        return Err(Error::too_many_links(&current));
                    }
                    let target = meta.link_target.unwrap_or_default();
                    current = if target.starts_with('/') {
                        path::normalize(&target)
                    } else {
                        path::join(&path::parent(&current), &target)
                    };
                }
                _ => return Ok(current),
            }
        }
    }

    /// Set an entry's permission mode. `mode` must be octal, e.g. "0755".
    pub async fn chmod(&self, path: &str, mode: &str) -> Result<()> {
        self.check_cancelled()?;
        let path = path::normalize(path);
        if crate::meta::parse_octal_mode(mode).is_none() {
            return Err(Error::invalid_argument(format!("invalid mode: {mode}")));
        }
        if !self.exists(&path).await? {
            return Err(Error::not_found(&path));
        }
        let mut batch = Batch::new();
        batch.put_hash(
            self.keys.meta(&path),
            vec![("mode".to_string(), mode.to_string())],
        );
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("chmod", &path, e))
    }

    /// Set an entry's owner. `owner` is `uid`, `uid:gid` or `:gid`; an
    /// omitted half is left unchanged.
    pub async fn chown(&self, path: &str, owner: &str) -> Result<()> {
        self.check_cancelled()?;
        let path = path::normalize(path);
        if !self.exists(&path).await? {
            return Err(Error::not_found(&path));
        }
        let (uid, gid) = match owner.split_once(':') {
            Some((uid, gid)) => (uid, gid),
            None => (owner, ""),
        };
        let mut fields = Vec::new();
        if !uid.is_empty() {
            fields.push(("uid".to_string(), uid.to_string()));
        }
        if !gid.is_empty() {
            fields.push(("gid".to_string(), gid.to_string()));
        }
        if fields.is_empty() {
            return Err(Error::invalid_argument(format!("invalid owner: {owner}")));
        }
        let mut batch = Batch::new();
        batch.put_hash(self.keys.meta(&path), fields);
        self.store
            .apply(batch)
            .await
            .map_err(|e| Error::store("chown", &path, e))
    }

    /// Walk the subtree under `root` and return entries matching the
    /// filters, in preorder. The base name is matched against
    /// `name_pattern` with `*` and `?` wildcards. A missing root yields
    /// no matches rather than an error.
    pub async fn find(
        &self,
        root: &str,
        name_pattern: Option<&str>,
        kind: Option<EntryKind>,
    ) -> Result<Vec<FindEntry>> {
        let root = path::normalize(root);
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            self.check_cancelled()?;
            let Some(meta) = self.stat(&current).await? else {
                continue;
            };
            let mut matches = true;
            if let Some(want) = kind {
                matches = meta.kind == want;
            }
            if matches {
                if let Some(pattern) = name_pattern {
                    if !pattern.is_empty() && !glob::glob_match(pattern, &path::base_name(&current))
                    {
                        matches = false;
                    }
                }
            }
            let is_dir = meta.kind == EntryKind::Dir;
            if matches {
                out.push(FindEntry {
                    path: current.clone(),
                    meta,
                });
            }
            if is_dir {
                for name in self.child_names(&current).await?.into_iter().rev() {
                    stack.push(path::join(&current, &name));
                }
            }
        }
        Ok(out)
    }

    /// Build a recursive listing of the subtree under `root`.
    ///
    /// `max_depth` of zero means unlimited; otherwise children are listed
    /// only down to that many levels below the root. The counts cover
    /// listed entries, so a depth cutoff also caps them.
    pub async fn tree(&self, root: &str, max_depth: usize) -> Result<TreeListing> {
        let root = path::normalize(root);
        let root_meta = match self.stat(&root).await? {
            None => return Err(Error::not_found(&root)),
            Some(meta) => meta,
        };
        let root_name = if path::is_root(&root) {
            "/".to_string()
        } else {
            path::base_name(&root)
        };
        if root_meta.kind != EntryKind::Dir {
            return Ok(TreeListing {
                root: TreeNode {
                    name: root_name,
                    path: root,
                    kind: root_meta.kind,
                    children: Vec::new(),
                },
                dirs: 0,
                files: 1,
            });
        }
        let mut children_of: HashMap<String, Vec<(String, String, EntryKind)>> = HashMap::new();
        let mut dirs = 0;
        let mut files = 0;
        let mut stack: Vec<(String, usize)> = vec![(root.clone(), 0)];
        while let Some((dir_path, depth)) = stack.pop() {
            self.check_cancelled()?;
            if max_depth > 0 && depth >= max_depth {
                continue;
            }
            let mut listed = Vec::new();
            for name in self.child_names(&dir_path).await? {
                let child = path::join(&dir_path, &name);
                let Some(meta) = self.stat(&child).await? else {
                    continue;
                };
                if meta.kind == EntryKind::Dir {
                    dirs += 1;
                    stack.push((child.clone(), depth + 1));
                } else {
                    files += 1;
                }
                listed.push((name, child, meta.kind));
            }
            children_of.insert(dir_path, listed);
        }
        let root_node = assemble_tree(&root, root_name, EntryKind::Dir, &mut children_of);
        Ok(TreeListing {
            root: root_node,
            dirs,
            files,
        })
    }

    /// Volumes present in the store, discovered by their root metadata
    /// records. Sorted, never duplicated.
    pub async fn list_volumes(&self) -> Result<Vec<String>> {
        let keys = self
            .store
            .scan_keys(crate::keys::volume_scan_pattern())
            .await
            .map_err(|e| Error::store("volumes", "/", e))?;
        let mut volumes: Vec<String> = keys
            .iter()
            .filter_map(|key| crate::keys::volume_from_root_meta_key(key))
            .map(str::to_string)
            .collect();
        volumes.sort();
        volumes.dedup();
        Ok(volumes)
    }

    // Fails with NotFound when the parent of `path` is missing and
    // NotADirectory when it exists as something else.
    async fn ensure_parent_dir(&self, path: &str) -> Result<()> {
        let parent = path::parent(path);
        match self.stat(&parent).await? {
            None => Err(Error::not_found(path)),
            Some(meta) if meta.kind != EntryKind::Dir => Err(Error::not_a_directory(&parent)),
            Some(_) => Ok(()),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    async fn notify_write(&self, path: &str, content: &[u8]) {
        if let Some(observer) = &self.observer {
            if let Err(e) = observer.on_write(path, content).await {
                warn!("write notification failed for {path}: {e}");
            }
        }
    }

    async fn notify_remove(&self, path: &str) {
        if let Some(observer) = &self.observer {
            if let Err(e) = observer.on_remove(path).await {
                warn!("remove notification failed for {path}: {e}");
            }
        }
    }

    async fn notify_move(&self, old_path: &str, new_path: &str) {
        if let Some(observer) = &self.observer {
            if let Err(e) = observer.on_move(old_path, new_path).await {
                warn!("move notification failed for {old_path}: {e}");
            }
        }
    }
}

fn assemble_tree(
    path: &str,
    name: String,
    kind: EntryKind,
    children_of: &mut HashMap<String, Vec<(String, String, EntryKind)>>,
) -> TreeNode {
    let mut node = TreeNode {
        name,
        path: path.to_string(),
        kind,
        children: Vec::new(),
    };
    if let Some(listed) = children_of.remove(path) {
        node.children = listed
            .into_iter()
            .map(|(child_name, child_path, child_kind)| {
                assemble_tree(&child_path, child_name, child_kind, children_of)
            })
            .collect();
    }
    node
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
