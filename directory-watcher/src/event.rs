//! Filesystem events as seen by the watch loop.

use std::fmt;
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// A single change notification for one entry of the watched directory.
///
/// Names are relative to the watched directory. `Overflow` has no name: it
/// only says that some notifications were lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// A file appeared (created, or moved in).
    Created(PathBuf),

    /// A file's contents or metadata changed.
    Modified(PathBuf),

    /// A file disappeared (deleted, or moved out).
    Deleted(PathBuf),

    /// The OS dropped notifications.
    Overflow,
}

impl RawEvent {
    /// The kind of event.
    pub fn kind(&self) -> RawEventKind {
        match self {
            Self::Created(_) => RawEventKind::Create,
            Self::Modified(_) => RawEventKind::Modify,
            Self::Deleted(_) => RawEventKind::Delete,
            Self::Overflow => RawEventKind::Overflow,
        }
    }

    /// Relative name of the affected entry, if the event has one.
    pub fn name(&self) -> Option<&Path> {
        match self {
            Self::Created(name) | Self::Modified(name) | Self::Deleted(name) => Some(name),
            Self::Overflow => None,
        }
    }

    /// Translate a notify event for the directory `root`.
    ///
    /// One notify event may name several paths and yields one raw event per
    /// path. Access events and events on `root` itself yield nothing.
    pub fn from_notify(event: &Event, root: &Path) -> Vec<RawEvent> {
        if event.need_rescan() || matches!(event.kind, EventKind::Other) {
            return vec![RawEvent::Overflow];
        }

        let make: fn(PathBuf) -> RawEvent = match event.kind {
            EventKind::Create(_) => RawEvent::Created,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => RawEvent::Created,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => RawEvent::Deleted,
            EventKind::Modify(_) => RawEvent::Modified,
            EventKind::Remove(_) => RawEvent::Deleted,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
        };

        event
            .paths
            .iter()
            .filter_map(|path| relative_name(path, root))
            .map(make)
            .collect()
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} {}", self.kind(), name.display()),
            None => write!(f, "{}", self.kind()),
        }
    }
}

/// Kind of raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawEventKind {
    /// Entry created.
    Create,

    /// Entry modified.
    Modify,

    /// Entry deleted.
    Delete,

    /// Notifications were lost.
    Overflow,
}

impl fmt::Display for RawEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
            Self::Overflow => "overflow",
        };
        f.write_str(label)
    }
}

/// Name of `path` relative to the watched directory `root`.
fn relative_name(path: &Path, root: &Path) -> Option<PathBuf> {
    let name = match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => PathBuf::from(path.file_name()?),
    };

    if name.as_os_str().is_empty() {
        None
    } else {
        Some(name)
    }
}

/// The events delivered by one wake-up of the watch loop, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    /// Events in this batch.
    pub events: Vec<RawEvent>,
}

impl EventBatch {
    /// Create a new empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the raw events of one notify event for `root`.
    pub fn push_notify(&mut self, event: &Event, root: &Path) {
        self.events.extend(RawEvent::from_notify(event, root));
    }

    /// Add an event to the batch.
    pub fn push(&mut self, event: RawEvent) {
        self.events.push(event);
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl IntoIterator for EventBatch {
    type Item = RawEvent;
    type IntoIter = std::vec::IntoIter<RawEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// Source and destination for one conversion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    /// File in the input directory.
    pub source: PathBuf,

    /// Output path before the unique suffix is added.
    pub dest: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, Flag, RemoveKind};
    use pretty_assertions::assert_eq;

    fn root() -> PathBuf {
        PathBuf::from("/watch/in")
    }

    fn event(kind: EventKind, names: &[&str]) -> Event {
        names
            .iter()
            .fold(Event::new(kind), |e, name| e.add_path(root().join(name)))
    }

    #[test]
    fn test_create_maps_to_created() {
        let e = event(EventKind::Create(CreateKind::File), &["report.pdf"]);
        assert_eq!(
            RawEvent::from_notify(&e, &root()),
            vec![RawEvent::Created(PathBuf::from("report.pdf"))]
        );
    }

    #[test]
    fn test_renames_map_to_create_and_delete() {
        let moved_in = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["a.pdf"],
        );
        let moved_out = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["b.pdf"],
        );
        let both = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["b.pdf", "a.pdf"],
        );

        assert_eq!(
            RawEvent::from_notify(&moved_in, &root()),
            vec![RawEvent::Created(PathBuf::from("a.pdf"))]
        );
        assert_eq!(
            RawEvent::from_notify(&moved_out, &root()),
            vec![RawEvent::Deleted(PathBuf::from("b.pdf"))]
        );
        assert_eq!(
            RawEvent::from_notify(&both, &root())
                .iter()
                .map(RawEvent::kind)
                .collect::<Vec<_>>(),
            vec![RawEventKind::Modify, RawEventKind::Modify]
        );
    }

    #[test]
    fn test_modify_and_remove() {
        let modified = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["a.pdf"],
        );
        let removed = event(EventKind::Remove(RemoveKind::File), &["a.pdf"]);

        assert_eq!(
            RawEvent::from_notify(&modified, &root())[0].kind(),
            RawEventKind::Modify
        );
        assert_eq!(
            RawEvent::from_notify(&removed, &root())[0].kind(),
            RawEventKind::Delete
        );
    }

    #[test]
    fn test_rescan_flag_is_overflow_without_name() {
        let e = Event::new(EventKind::Any).set_flag(Flag::Rescan);
        let events = RawEvent::from_notify(&e, &root());

        assert_eq!(events, vec![RawEvent::Overflow]);
        assert_eq!(events[0].name(), None);
        assert_eq!(events[0].to_string(), "overflow");
    }

    #[test]
    fn test_other_kind_is_overflow() {
        let e = Event::new(EventKind::Other);
        assert_eq!(RawEvent::from_notify(&e, &root()), vec![RawEvent::Overflow]);
    }

    #[test]
    fn test_access_and_root_events_are_dropped() {
        let access = event(
            EventKind::Access(notify::event::AccessKind::Any),
            &["a.pdf"],
        );
        let on_root = Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(root());

        assert!(RawEvent::from_notify(&access, &root()).is_empty());
        assert!(RawEvent::from_notify(&on_root, &root()).is_empty());
    }

    #[test]
    fn test_foreign_prefix_falls_back_to_file_name() {
        let e = Event::new(EventKind::Create(CreateKind::Any))
            .add_path(PathBuf::from("/private/watch/in/x.docx"));

        assert_eq!(
            RawEvent::from_notify(&e, &root()),
            vec![RawEvent::Created(PathBuf::from("x.docx"))]
        );
    }

    #[test]
    fn test_event_batch_keeps_arrival_order() {
        let mut batch = EventBatch::new();
        batch.push(RawEvent::Created(PathBuf::from("b.pdf")));
        batch.push(RawEvent::Deleted(PathBuf::from("a.pdf")));
        batch.push(RawEvent::Created(PathBuf::from("a.pdf")));

        assert_eq!(batch.len(), 3);
        let names: Vec<String> = batch.into_iter().map(|e| format!("{e}")).collect();
        assert_eq!(names, vec!["create b.pdf", "delete a.pdf", "create a.pdf"]);
    }
}
