//! In-process cluster namespace.
//!
//! [`MemoryFs`] keeps files and directories in an ordered map and follows the
//! cluster's semantics closely enough to stand in for it in tests: files need
//! an existing parent, writes are visible to readers as soon as they are
//! accepted and `remove` deletes whole subtrees. An optional space quota makes
//! writes fail part way, the way a full cluster does, and a flush switch makes
//! every flush fail after the bytes were accepted.

use std::{
    collections::BTreeMap,
    io,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    task::{Context, Poll},
    time::SystemTime,
};

use futures_io::AsyncWrite;
use futures_util::io::Cursor;

use super::{path, ClientFactory, FsClient, FsMetadata};

#[derive(Debug, Clone)]
enum Node {
    Dir { modified: SystemTime },
    File { data: Vec<u8>, modified: SystemTime },
}

impl Node {
    fn dir() -> Self {
        Node::Dir {
            modified: SystemTime::now(),
        }
    }

    fn file() -> Self {
        Node::File {
            data: Vec::new(),
            modified: SystemTime::now(),
        }
    }

    fn metadata(&self) -> FsMetadata {
        match self {
            Node::Dir { modified } => FsMetadata {
                size: 0,
                is_dir: true,
                modified: *modified,
            },
            Node::File { data, modified } => FsMetadata {
                size: data.len() as u64,
                is_dir: false,
                modified: *modified,
            },
        }
    }
}

#[derive(Debug)]
struct Namespace {
    nodes: BTreeMap<String, Node>,
    quota: Option<u64>,
    fail_flush: bool,
}

impl Namespace {
    fn used(&self) -> u64 {
        self.nodes
            .values()
            .map(|node| match node {
                Node::File { data, .. } => data.len() as u64,
                Node::Dir { .. } => 0,
            })
            .sum()
    }

    fn require_dir(&self, path: &str) -> io::Result<()> {
        match self.nodes.get(path) {
            Some(Node::Dir { .. }) => Ok(()),
            Some(Node::File { .. }) => Err(not_a_directory(path)),
            None => Err(not_found(path)),
        }
    }

    /// Keys of `path` and everything below it.
    fn subtree(&self, path: &str) -> Vec<String> {
        let prefix = child_prefix(path);
        let mut keys = vec![path.to_string()];
        keys.extend(
            self.nodes
                .range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&prefix))
                .map(|(key, _)| key.clone()),
        );
        keys
    }
}

#[derive(Debug)]
struct Shared {
    namespace: Mutex<Namespace>,
    connections: AtomicUsize,
}

/// A shared in-memory namespace. Clones refer to the same namespace, and the
/// value doubles as its own [`ClientFactory`].
#[derive(Debug, Clone)]
pub struct MemoryFs {
    shared: Arc<Shared>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::dir());
        MemoryFs {
            shared: Arc::new(Shared {
                namespace: Mutex::new(Namespace {
                    nodes,
                    quota: None,
                    fail_flush: false,
                }),
                connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Limits the total number of file bytes the namespace accepts. `None`
    /// lifts the limit.
    pub fn set_space_quota(&self, quota: Option<u64>) {
        self.namespace().quota = quota;
    }

    /// While set, flushing any open write handle fails.
    pub fn set_flush_failure(&self, fail: bool) {
        self.namespace().fail_flush = fail;
    }

    /// Number of clients handed out through [`ClientFactory::connect`].
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::Relaxed)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.namespace().nodes.contains_key(&normalize(path))
    }

    fn namespace(&self) -> MutexGuard<'_, Namespace> {
        self.shared
            .namespace
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn writer(&self, path: String) -> MemoryFileWriter {
        MemoryFileWriter {
            fs: self.clone(),
            path,
            closed: false,
        }
    }
}

impl FsClient for MemoryFs {
    type Reader = Cursor<Vec<u8>>;

    type Writer = MemoryFileWriter;

    async fn open_read(&self, path: &str) -> io::Result<Self::Reader> {
        let path = normalize(path);
        match self.namespace().nodes.get(&path) {
            Some(Node::File { data, .. }) => Ok(Cursor::new(data.clone())),
            Some(Node::Dir { .. }) => Err(is_a_directory(&path)),
            None => Err(not_found(&path)),
        }
    }

    async fn create(&self, path: &str) -> io::Result<Self::Writer> {
        let path = normalize(path);
        {
            let mut namespace = self.namespace();
            if namespace.nodes.contains_key(&path) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{path} already exists"),
                ));
            }
            namespace.require_dir(&path::parent(&path))?;
            namespace.nodes.insert(path.clone(), Node::file());
        }
        Ok(self.writer(path))
    }

    async fn append(&self, path: &str) -> io::Result<Self::Writer> {
        let path = normalize(path);
        match self.namespace().nodes.get(&path) {
            Some(Node::File { .. }) => {}
            Some(Node::Dir { .. }) => return Err(is_a_directory(&path)),
            None => return Err(not_found(&path)),
        }
        Ok(self.writer(path))
    }

    async fn stat(&self, path: &str) -> io::Result<FsMetadata> {
        let path = normalize(path);
        self.namespace()
            .nodes
            .get(&path)
            .map(Node::metadata)
            .ok_or_else(|| not_found(&path))
    }

    async fn remove(&self, path: &str) -> io::Result<()> {
        let path = normalize(path);
        let mut namespace = self.namespace();
        if !namespace.nodes.contains_key(&path) {
            return Err(not_found(&path));
        }
        for key in namespace.subtree(&path) {
            if key != "/" {
                namespace.nodes.remove(&key);
            }
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let (from, to) = (normalize(from), normalize(to));
        let mut namespace = self.namespace();

        let source_is_dir = match namespace.nodes.get(&from) {
            Some(node) => node.metadata().is_dir,
            None => return Err(not_found(&from)),
        };
        if from == to {
            return Ok(());
        }
        if from == "/" || to.starts_with(&child_prefix(&from)) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot move {from} below itself"),
            ));
        }
        namespace.require_dir(&path::parent(&to))?;
        match namespace.nodes.get(&to) {
            Some(Node::File { .. }) if !source_is_dir => {}
            Some(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{to} already exists"),
                ))
            }
            None => {}
        }

        for key in namespace.subtree(&from) {
            if let Some(node) = namespace.nodes.remove(&key) {
                let moved = format!("{to}{}", &key[from.len()..]);
                namespace.nodes.insert(moved, node);
            }
        }
        Ok(())
    }

    async fn mkdir_all(&self, path: &str) -> io::Result<()> {
        let path = normalize(path);
        let mut namespace = self.namespace();
        let mut current = String::new();
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            current.push('/');
            current.push_str(segment);
            match namespace.nodes.get(&current) {
                Some(Node::Dir { .. }) => {}
                Some(Node::File { .. }) => return Err(not_a_directory(&current)),
                None => {
                    namespace.nodes.insert(current.clone(), Node::dir());
                }
            }
        }
        Ok(())
    }

    async fn read_dir(&self, path: &str) -> io::Result<Vec<String>> {
        let path = normalize(path);
        let namespace = self.namespace();
        namespace.require_dir(&path)?;

        let prefix = child_prefix(&path);
        Ok(namespace
            .nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| {
                let name = &key[prefix.len()..];
                (!name.is_empty() && !name.contains('/')).then(|| name.to_string())
            })
            .collect())
    }
}

impl ClientFactory for MemoryFs {
    type Client = MemoryFs;

    async fn connect(&self, _namenode: &str) -> io::Result<Self::Client> {
        self.shared.connections.fetch_add(1, Ordering::Relaxed);
        Ok(self.clone())
    }
}

/// Write handle into a [`MemoryFs`] file. Accepted bytes are visible to new
/// readers immediately.
#[derive(Debug)]
pub struct MemoryFileWriter {
    fs: MemoryFs,
    path: String,
    closed: bool,
}

impl AsyncWrite for MemoryFileWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.closed {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("{} is closed", this.path),
            )));
        }

        let mut namespace = this.fs.namespace();
        let accepted = match namespace.quota {
            Some(quota) => {
                let remaining = quota.saturating_sub(namespace.used());
                buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX))
            }
            None => buf.len(),
        };
        if accepted == 0 && !buf.is_empty() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::Other,
                "space quota exceeded",
            )));
        }

        match namespace.nodes.get_mut(&this.path) {
            Some(Node::File { data, modified }) => {
                data.extend_from_slice(&buf[..accepted]);
                *modified = SystemTime::now();
                Poll::Ready(Ok(accepted))
            }
            Some(Node::Dir { .. }) => Poll::Ready(Err(is_a_directory(&this.path))),
            None => Poll::Ready(Err(not_found(&this.path))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.fs.namespace().fail_flush {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::Other,
                format!("failed to flush {}", self.path),
            )));
        }
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().closed = true;
        Poll::Ready(Ok(()))
    }
}

fn normalize(path: &str) -> String {
    path::clean(&format!("/{path}"))
}

fn child_prefix(path: &str) -> String {
    if path == "/" {
        "/".to_string()
    } else {
        format!("{path}/")
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{path} does not exist"))
}

fn not_a_directory(path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("{path} is not a directory"),
    )
}

fn is_a_directory(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("{path} is a directory"))
}
