//! FileSystem Actor
//!
//! Watches the workspace directory and feeds changed source files into the
//! engine as edits, so the directory on disk is one more editing surface.
//!
//! Architecture:
//! ```text
//! Watcher → Debouncer (settle, dedup) → existence check → EngineMsg::{Edit, Remove}
//! ```
//!
//! The settle window only collapses the bursts an editor produces for one
//! save; the engine's refresh scheduler does the real debouncing.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use super::messages::EngineMsg;
use crate::source::scan::{modified_millis, source_name_for};

const SETTLE_MS: u64 = 50;

/// FileSystem Actor - watches the workspace for source changes
pub struct FsActor {
    root: PathBuf,
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    _watcher: RecommendedWatcher,
    engine_tx: mpsc::Sender<EngineMsg>,
}

impl FsActor {
    /// Start watching `root` immediately; events buffer until [`run`](Self::run).
    pub fn new(root: PathBuf, engine_tx: mpsc::Sender<EngineMsg>) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        crate::debug!("watch"; "{}", root.display());

        Ok(Self {
            root,
            notify_rx,
            _watcher: watcher,
            engine_tx,
        })
    }

    /// Run the actor event loop
    pub async fn run(self) {
        let Self {
            root,
            notify_rx,
            _watcher,
            engine_tx,
        } = self;
        let mut debouncer = Debouncer::new();

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        // Bridge the std channel notify writes to into tokio.
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                event = async_rx.recv() => {
                    let Some(event) = event else { break };
                    debouncer.add_event(&event, Instant::now());
                }
                _ = tokio::time::sleep(debouncer.sleep_duration(Instant::now())) => {
                    let Some(changes) = debouncer.take_if_ready(Instant::now()) else {
                        continue;
                    };
                    for msg in changes_to_messages(&root, changes) {
                        if engine_tx.send(msg).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Turn settled changes into engine messages, reading current file content.
fn changes_to_messages(root: &Path, changes: FxHashMap<PathBuf, ChangeKind>) -> Vec<EngineMsg> {
    let mut changes: Vec<_> = changes.into_iter().collect();
    changes.sort();

    let mut messages = Vec::new();
    for (path, kind) in changes {
        let Some(name) = source_name_for(root, &path) else {
            continue;
        };

        // The watcher can report stale kinds (atomic saves); trust the disk.
        if path.is_file() {
            crate::debug!("watch"; "{}: {}", kind.label(), name);
            match fs::read_to_string(&path) {
                Ok(content) => messages.push(EngineMsg::Edit {
                    name,
                    content,
                    at: modified_millis(&path),
                    reply: None,
                }),
                Err(e) => crate::log!("watch"; "cannot read {}: {}", name, e),
            }
        } else {
            crate::debug!("watch"; "{} (gone): {}", kind.label(), name);
            messages.push(EngineMsg::Remove { name, reply: None });
        }
    }
    messages
}

// =============================================================================
// Debouncer - Pure timing and event deduplication
// =============================================================================

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

struct Debouncer {
    changes: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            changes: FxHashMap::default(),
            last_event: None,
        }
    }

    /// Record a notify event.
    ///
    /// - Created + Removed within the window: discarded
    /// - Removed + Created/Modified: restored, keeps the new kind
    /// - Modified + Removed: removed
    /// - otherwise the first kind wins
    fn add_event(&mut self, event: &notify::Event, now: Instant) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => return,
            EventKind::Modify(_) => ChangeKind::Modified,
            _ => return,
        };

        for path in &event.paths {
            match self.changes.get(path).copied() {
                None => {
                    self.changes.insert(path.clone(), kind);
                }
                Some(ChangeKind::Created) if kind == ChangeKind::Removed => {
                    self.changes.remove(path);
                }
                Some(ChangeKind::Removed) if kind != ChangeKind::Removed => {
                    self.changes.insert(path.clone(), kind);
                }
                Some(ChangeKind::Modified) if kind == ChangeKind::Removed => {
                    self.changes.insert(path.clone(), kind);
                }
                Some(_) => {}
            }
            self.last_event = Some(now);
        }
    }

    fn take_if_ready(&mut self, now: Instant) -> Option<FxHashMap<PathBuf, ChangeKind>> {
        let last_event = self.last_event?;
        if now.duration_since(last_event) < Duration::from_millis(SETTLE_MS) {
            return None;
        }
        self.last_event = None;
        let changes = std::mem::take(&mut self.changes);
        (!changes.is_empty()).then_some(changes)
    }

    fn sleep_duration(&self, now: Instant) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };
        Duration::from_millis(SETTLE_MS)
            .saturating_sub(now.duration_since(last_event))
            .max(Duration::from_millis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, EventKind, MetadataKind, ModifyKind, RemoveKind};
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &Path) -> notify::Event {
        notify::Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn test_created_then_removed_is_discarded() {
        let now = Instant::now();
        let path = Path::new("/w/a.js");
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&event(EventKind::Create(CreateKind::File), path), now);
        debouncer.add_event(&event(EventKind::Remove(RemoveKind::File), path), now);

        assert!(debouncer.take_if_ready(now + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_metadata_changes_ignored() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new();
        debouncer.add_event(
            &event(
                EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)),
                Path::new("/w/a.js"),
            ),
            now,
        );
        assert!(debouncer.last_event.is_none());
    }

    #[test]
    fn test_settle_window() {
        let now = Instant::now();
        let path = Path::new("/w/a.js");
        let mut debouncer = Debouncer::new();
        debouncer.add_event(
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), path),
            now,
        );
        debouncer.add_event(&event(EventKind::Remove(RemoveKind::File), path), now);

        assert!(debouncer.take_if_ready(now).is_none());
        let changes = debouncer
            .take_if_ready(now + Duration::from_millis(SETTLE_MS))
            .unwrap();
        assert_eq!(changes.get(path), Some(&ChangeKind::Removed));
    }

    #[test]
    fn test_changes_to_messages_reads_disk_state() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("app.js"), "run()").unwrap();

        let mut changes = FxHashMap::default();
        // Reported removed, but exists again (atomic save).
        changes.insert(root.join("app.js"), ChangeKind::Removed);
        changes.insert(root.join("gone.css"), ChangeKind::Modified);
        changes.insert(root.join("notes.txt"), ChangeKind::Modified);

        let messages = changes_to_messages(root, changes);
        assert_eq!(messages.len(), 2);
        assert!(matches!(
            &messages[0],
            EngineMsg::Edit { name, content, .. } if name == "app.js" && content == "run()"
        ));
        assert!(matches!(&messages[1], EngineMsg::Remove { name, .. } if name == "gone.css"));
    }

    #[test]
    fn test_created_file_is_sent_as_edit() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("new.css"), "p{}").unwrap();

        let mut changes = FxHashMap::default();
        changes.insert(root.join("new.css"), ChangeKind::Created);
        // Created and deleted again before the changes settled.
        changes.insert(root.join("tmp.js"), ChangeKind::Created);

        let messages = changes_to_messages(root, changes);
        assert_eq!(messages.len(), 2);
        assert!(matches!(
            &messages[0],
            EngineMsg::Edit { name, content, .. } if name == "new.css" && content == "p{}"
        ));
        assert!(matches!(&messages[1], EngineMsg::Remove { name, .. } if name == "tmp.js"));
    }
}
