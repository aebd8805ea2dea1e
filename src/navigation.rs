use pulldown_cmark::{Event, Tag, TagEnd};

use crate::catalog::{Catalog, Chapter, Subchapter};
use crate::content::ParsedDocument;
use crate::formats::ProgressState;

/// Reading order across the whole catalog, built once and never mutated.
#[derive(Debug, Clone)]
pub struct FlattenedIndex {
    entries: Vec<Subchapter>,
    last_in_chapter: Vec<bool>,
}

impl FlattenedIndex {
    pub fn new(catalog: &Catalog) -> Self {
        let mut entries = Vec::new();
        let mut last_in_chapter = Vec::new();
        for chapter in catalog.chapters() {
            let count = chapter.subchapters.len();
            for (idx, sub) in chapter.subchapters.iter().enumerate() {
                entries.push(sub.clone());
                last_in_chapter.push(idx + 1 == count);
            }
        }
        Self {
            entries,
            last_in_chapter,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Subchapter] {
        &self.entries
    }

    pub fn is_last_in_chapter(&self, position: usize) -> bool {
        self.last_in_chapter.get(position).copied().unwrap_or(false)
    }

    pub fn position(&self, alias: &str) -> Option<usize> {
        self.entries.iter().position(|s| s.alias == alias)
    }

    pub fn first(&self) -> Option<&Subchapter> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&Subchapter> {
        self.entries.last()
    }

    /// Forward/backward neighbor of `current_alias`.
    ///
    /// Unknown aliases are treated as position 0. Moving forward from the last
    /// subchapter of a chapter that is neither the first nor the last entry
    /// jumps straight to the final subchapter of the catalog, so a reader who
    /// finishes one track lands on the wrap-up instead of the next track.
    /// Moving forward from the final subchapter yields `None`.
    pub fn neighbor(&self, current_alias: &str, forward: bool) -> Option<&Subchapter> {
        if self.entries.is_empty() {
            return None;
        }

        let position = self.position(current_alias).unwrap_or_else(|| {
            tracing::debug!(alias = %current_alias, "alias not in reading order; using first entry");
            0
        });

        if !forward {
            return position.checked_sub(1).map(|p| &self.entries[p]);
        }

        let last = self.entries.len() - 1;
        if self.last_in_chapter[position] && position != 0 && position != last {
            return self.entries.last();
        }
        self.entries.get(position + 1)
    }

    /// The catalog-last alias among `read_aliases`. Falls back to the first
    /// input element when nothing matches, and to `None` for an empty input.
    pub fn last_visited_alias<'a, S: AsRef<str>>(&'a self, read_aliases: &'a [S]) -> Option<&'a str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| read_aliases.iter().any(|read| read.as_ref() == entry.alias))
            .map(|entry| entry.alias.as_str())
            .or_else(|| read_aliases.first().map(AsRef::as_ref))
    }
}

pub fn should_display_subchapters(chapter: &Chapter, selected_track_alias: Option<&str>) -> bool {
    !chapter.is_track || selected_track_alias == Some(chapter.alias.as_str())
}

/// Track to select after the reader lands in `current_chapter_alias`.
///
/// Visiting a track selects it. Anywhere else, the first track of the
/// catalog is selected when nothing has been chosen yet.
pub fn track_selection_for(
    catalog: &Catalog,
    current_chapter_alias: Option<&str>,
    state: &ProgressState,
) -> Option<String> {
    if let Some(chapter) = current_chapter_alias.and_then(|alias| catalog.chapter(alias))
        && chapter.is_track
    {
        if state.selected_track_alias.as_deref() == Some(chapter.alias.as_str()) {
            return None;
        }
        return Some(chapter.alias.clone());
    }

    if state.selected_track_alias.is_none() {
        return catalog.tracks().next().map(|c| c.alias.clone());
    }
    None
}

/// Accepts a requested track only if it names a track chapter.
pub fn validate_track<'a>(catalog: &'a Catalog, alias: &str) -> Option<&'a Chapter> {
    catalog.tracks().find(|c| c.alias == alias)
}

/// The forward link from the introduction stays hidden until the reader has
/// claimed an endpoint or chosen to read on without one.
pub fn next_link_visible(index: &FlattenedIndex, current_alias: &str, state: &ProgressState) -> bool {
    let is_intro = index.first().is_some_and(|first| first.alias == current_alias);
    !is_intro || state.user.is_some() || state.skipped_auth
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadingNode {
    pub title: Option<String>,
    pub children: Vec<HeadingNode>,
}

pub fn collect_headings(document: &ParsedDocument) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut current: Option<Heading> = None;

    for event in document.events() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some(Heading {
                    level: *level as u8,
                    title: String::new(),
                });
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(heading) = current.take() {
                    headings.push(heading);
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(heading) = current.as_mut() {
                    heading.title.push_str(text);
                }
            }
            _ => {}
        }
    }

    headings
}

/// Nests headings for the sidebar outline: level 1 titles the root, level 2
/// opens a new child and deeper levels descend into the latest child.
pub fn build_headings_tree(headings: &[Heading]) -> Vec<HeadingNode> {
    let mut root = HeadingNode::default();
    for heading in headings {
        inject(&mut root, &heading.title, heading.level);
    }
    root.children
}

fn inject(node: &mut HeadingNode, title: &str, level: u8) {
    if level <= 1 {
        node.title = Some(title.to_owned());
        return;
    }
    if level == 2 || node.children.is_empty() {
        node.children.push(HeadingNode::default());
    }
    if let Some(last) = node.children.last_mut() {
        inject(last, title, level - 1);
    }
}
