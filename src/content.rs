use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use pulldown_cmark::{Event, Options, Parser};

use crate::catalog::Subchapter;

pub const IMAGES_DIR_NAME: &str = "images";

/// Markdown parsed into an owned event stream, kept together with its
/// source. Transformations produce new documents; a parsed document is never
/// edited in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    source: Arc<str>,
    events: Vec<Event<'static>>,
}

impl ParsedDocument {
    pub fn parse(markdown: &str) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);

        let events = Parser::new_ext(markdown, options)
            .map(Event::into_static)
            .collect();
        Self {
            source: Arc::from(markdown),
            events,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn events(&self) -> &[Event<'static>] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event<'static>> {
        self.events
    }

    /// Same source, events rewritten one by one.
    pub(crate) fn map_events(self, f: impl FnMut(Event<'static>) -> Event<'static>) -> Self {
        Self {
            source: self.source,
            events: self.events.into_iter().map(f).collect(),
        }
    }
}

/// Markdown sources laid out as `<dir>/<chapter>/<subchapter>.md`.
#[derive(Debug, Clone)]
pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn images_dir(&self) -> PathBuf {
        self.dir.join(IMAGES_DIR_NAME)
    }

    fn path_for(&self, name: &str) -> anyhow::Result<PathBuf> {
        let mut path = self.dir.clone();
        for segment in name.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                anyhow::bail!("invalid content name: {name}");
            }
            path.push(segment);
        }
        path.set_extension("md");
        Ok(path)
    }

    /// Reads the raw markdown for `chapter/subchapter`.
    pub fn read(&self, name: &str) -> anyhow::Result<String> {
        let path = self.path_for(name)?;
        std::fs::read_to_string(&path).with_context(|| format!("read content: {}", path.display()))
    }

    pub fn read_optional(&self, name: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(name)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("read content: {}", path.display()))
            }
        }
    }

    pub fn load(&self, subchapter: &Subchapter) -> anyhow::Result<ParsedDocument> {
        let name = subchapter.content_name();
        let markdown = self.read(&name)?;
        tracing::debug!(content = %name, bytes = markdown.len(), "loaded content");
        Ok(ParsedDocument::parse(&markdown))
    }

    pub fn load_optional(&self, name: &str) -> anyhow::Result<Option<ParsedDocument>> {
        Ok(self
            .read_optional(name)?
            .map(|markdown| ParsedDocument::parse(&markdown)))
    }

    pub fn image_assets(&self) -> anyhow::Result<ImageAssets> {
        ImageAssets::scan(&self.images_dir())
    }
}

/// Bundled `.png` images, keyed by file stem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageAssets {
    stems: BTreeSet<String>,
}

impl ImageAssets {
    pub fn scan(dir: &Path) -> anyhow::Result<Self> {
        let mut stems = BTreeSet::new();
        if !dir.exists() {
            return Ok(Self { stems });
        }

        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("read images dir: {}", dir.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.insert(stem.to_owned());
            }
        }

        Ok(Self { stems })
    }

    pub fn from_stems<I, S>(stems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stems: stems.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, stem: &str) -> bool {
        self.stems.contains(stem)
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }
}
