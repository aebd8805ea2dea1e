use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use chrono::{DateTime, Utc};

use crate::catalog::Catalog;
use crate::cli::{ProgressAliasArgs, ProgressCommand};
use crate::formats::{ProgressState, UserData};
use crate::navigation;

/// The closed set of mutations a reader can make to their progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    MarkRead(String),
    SetUser(Option<UserData>),
    SetSkippedAuth(bool),
    SetSelectedTrack(String),
    SetInitialLoadTimestamp(DateTime<Utc>),
}

impl ProgressState {
    /// Returns a new state with `update` applied; `self` is left untouched.
    pub fn apply(&self, update: &ProgressUpdate) -> ProgressState {
        let mut next = self.clone();
        match update {
            ProgressUpdate::MarkRead(alias) => {
                next.has_read.insert(alias.clone(), true);
            }
            ProgressUpdate::SetUser(user) => next.user = user.clone(),
            ProgressUpdate::SetSkippedAuth(skipped) => next.skipped_auth = *skipped,
            ProgressUpdate::SetSelectedTrack(alias) => {
                next.selected_track_alias = Some(alias.clone());
            }
            ProgressUpdate::SetInitialLoadTimestamp(ts) => {
                next.initial_load_timestamp = Some(*ts);
            }
        }
        next
    }
}

/// Durable storage for the serialized state: one named slot, read once and
/// overwritten wholesale.
pub trait StateSlot: Send + Sync {
    fn read(&self) -> anyhow::Result<Option<String>>;
    fn write(&self, contents: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateSlot for FileSlot {
    fn read(&self) -> anyhow::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("read state: {}", self.path.display()))
            }
        }
    }

    fn write(&self, contents: &str) -> anyhow::Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create state dir: {}", parent.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("create temp state in {}", parent.display()))?;
        tmp.write_all(contents.as_bytes())
            .context("write temp state")?;
        tmp.flush().context("flush temp state")?;
        tmp.persist(&self.path)
            .map_err(|err| anyhow::anyhow!("persist state {}: {}", self.path.display(), err.error))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySlot {
    contents: Mutex<Option<String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl StateSlot for MemorySlot {
    fn read(&self) -> anyhow::Result<Option<String>> {
        Ok(self.contents())
    }

    fn write(&self, contents: &str) -> anyhow::Result<()> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| anyhow::anyhow!("memory slot lock poisoned"))?;
        *guard = Some(contents.to_owned());
        Ok(())
    }
}

/// The single owner of reader progress.
///
/// `update` persists the new snapshot before publishing it, so a failed
/// write leaves the current snapshot in place. Snapshots handed out by
/// `get` are immutable; callers re-read after their own updates.
pub struct ProgressStore {
    slot: Box<dyn StateSlot>,
    current: Arc<ProgressState>,
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl ProgressStore {
    /// Reads the slot. An absent slot yields the default state; an
    /// unparsable one is an error.
    pub fn open(slot: impl StateSlot + 'static) -> anyhow::Result<Self> {
        let current = match slot.read().context("read progress slot")? {
            Some(contents) => {
                serde_json::from_str(&contents).context("parse persisted progress state")?
            }
            None => {
                tracing::debug!("no persisted progress; starting from defaults");
                ProgressState::default()
            }
        };
        Ok(Self {
            slot: Box::new(slot),
            current: Arc::new(current),
        })
    }

    pub fn open_file(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let slot = FileSlot::new(path);
        let display = slot.path().display().to_string();
        Self::open(slot).with_context(|| format!("open progress state: {display}"))
    }

    pub fn get(&self) -> Arc<ProgressState> {
        Arc::clone(&self.current)
    }

    pub fn update(&mut self, update: ProgressUpdate) -> anyhow::Result<Arc<ProgressState>> {
        let next = self.current.apply(&update);
        let json = serde_json::to_string(&next).context("serialize progress state")?;
        self.slot.write(&json).context("persist progress state")?;
        tracing::debug!(?update, "progress updated");
        self.current = Arc::new(next);
        Ok(self.get())
    }

    pub fn mark_read(&mut self, alias: &str) -> anyhow::Result<Arc<ProgressState>> {
        if self.current.has_read(alias) {
            return Ok(self.get());
        }
        self.update(ProgressUpdate::MarkRead(alias.to_owned()))
    }

    pub fn set_user(&mut self, user: Option<UserData>) -> anyhow::Result<Arc<ProgressState>> {
        self.update(ProgressUpdate::SetUser(user))
    }

    pub fn set_skipped_auth(&mut self, skipped: bool) -> anyhow::Result<Arc<ProgressState>> {
        self.update(ProgressUpdate::SetSkippedAuth(skipped))
    }

    pub fn set_selected_track(&mut self, alias: &str) -> anyhow::Result<Arc<ProgressState>> {
        self.update(ProgressUpdate::SetSelectedTrack(alias.to_owned()))
    }

    /// Stamps the first load; later calls keep the original stamp.
    pub fn ensure_initial_load_timestamp(
        &mut self,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Arc<ProgressState>> {
        if self.current.initial_load_timestamp.is_some() {
            return Ok(self.get());
        }
        self.update(ProgressUpdate::SetInitialLoadTimestamp(now))
    }

    /// Records a freshly claimed endpoint: the user first, then the skip flag
    /// is cleared.
    pub fn claim_endpoint(&mut self, user: UserData) -> anyhow::Result<Arc<ProgressState>> {
        self.set_user(Some(user))?;
        self.set_skipped_auth(false)
    }
}

/// Entry point for `learnsite progress ...`.
pub fn run(command: ProgressCommand) -> anyhow::Result<()> {
    match command {
        ProgressCommand::Show(args) => {
            let store = ProgressStore::open_file(&args.state)?;
            let json = serde_json::to_string_pretty(store.get().as_ref())
                .context("serialize progress state")?;
            println!("{json}");
        }
        ProgressCommand::MarkRead(args) => {
            let catalog = catalog_for(&args)?;
            if catalog.subchapter(&args.alias).is_none() {
                anyhow::bail!("unknown subchapter alias: {}", args.alias);
            }
            ProgressStore::open_file(&args.state)?.mark_read(&args.alias)?;
            tracing::info!(alias = %args.alias, "marked as read");
        }
        ProgressCommand::SelectTrack(args) => {
            let catalog = catalog_for(&args)?;
            let Some(track) = navigation::validate_track(&catalog, &args.alias) else {
                anyhow::bail!("not a track chapter: {}", args.alias);
            };
            ProgressStore::open_file(&args.state)?.set_selected_track(&track.alias)?;
            tracing::info!(track = %track.alias, "track selected");
        }
        ProgressCommand::SkipAuth(args) => {
            ProgressStore::open_file(&args.state)?.set_skipped_auth(true)?;
        }
        ProgressCommand::ResetUser(args) => {
            ProgressStore::open_file(&args.state)?.set_user(None)?;
        }
    }
    Ok(())
}

fn catalog_for(args: &ProgressAliasArgs) -> anyhow::Result<Catalog> {
    match &args.content {
        Some(dir) => Catalog::load(Path::new(dir)),
        None => Ok(Catalog::builtin().clone()),
    }
}
