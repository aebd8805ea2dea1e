use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context as _;

use crate::formats::{CatalogSpec, ChapterSpec, SubchapterSpec};

pub const CATALOG_FILE_NAME: &str = "catalog.yaml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub alias: String,
    pub is_track: bool,
    pub description: String,
    pub subchapters: Vec<Subchapter>,
}

impl Chapter {
    pub fn first_subchapter(&self) -> &Subchapter {
        // Catalog validation rejects empty chapters.
        &self.subchapters[0]
    }

    pub fn route(&self) -> String {
        self.first_subchapter().route()
    }
}

/// A single content page. `chapter_alias` points back at the owning chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subchapter {
    pub title: String,
    pub alias: String,
    pub chapter_alias: String,
}

impl Subchapter {
    pub fn route(&self) -> String {
        format!("/{}/{}", self.chapter_alias, self.alias)
    }

    /// Content-store name, `chapter/subchapter`.
    pub fn content_name(&self) -> String {
        format!("{}/{}", self.chapter_alias, self.alias)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    chapters: Vec<Chapter>,
}

static DEFAULT_CATALOG: LazyLock<Catalog> = LazyLock::new(|| {
    Catalog::from_spec(default_spec()).expect("built-in catalog must be valid")
});

impl Catalog {
    pub fn builtin() -> &'static Catalog {
        &DEFAULT_CATALOG
    }

    pub fn from_spec(spec: CatalogSpec) -> anyhow::Result<Self> {
        if spec.chapters.is_empty() {
            anyhow::bail!("catalog must contain at least one chapter");
        }

        let mut chapter_aliases = HashSet::new();
        let mut subchapter_aliases = HashSet::new();
        let mut chapters = Vec::with_capacity(spec.chapters.len());

        for chapter in spec.chapters {
            if chapter.alias.trim().is_empty() {
                anyhow::bail!("chapter alias must not be empty: {:?}", chapter.title);
            }
            if !chapter_aliases.insert(chapter.alias.clone()) {
                anyhow::bail!("duplicate chapter alias: {}", chapter.alias);
            }
            if chapter.subchapters.is_empty() {
                anyhow::bail!("chapter has no subchapters: {}", chapter.alias);
            }

            let mut subchapters = Vec::with_capacity(chapter.subchapters.len());
            for sub in chapter.subchapters {
                if sub.alias.trim().is_empty() {
                    anyhow::bail!("subchapter alias must not be empty in {}", chapter.alias);
                }
                if !subchapter_aliases.insert(sub.alias.clone()) {
                    anyhow::bail!("duplicate subchapter alias: {}", sub.alias);
                }
                subchapters.push(Subchapter {
                    title: sub.title,
                    alias: sub.alias,
                    chapter_alias: chapter.alias.clone(),
                });
            }

            chapters.push(Chapter {
                title: chapter.title,
                alias: chapter.alias,
                is_track: chapter.is_track,
                description: chapter.description,
                subchapters,
            });
        }

        Ok(Self { chapters })
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let spec: CatalogSpec = serde_yaml::from_str(yaml).context("parse catalog yaml")?;
        Self::from_spec(spec)
    }

    /// Loads `catalog.yaml` from the content directory, or the built-in
    /// catalog when the file does not exist.
    pub fn load(content_dir: &Path) -> anyhow::Result<Self> {
        let path = content_dir.join(CATALOG_FILE_NAME);
        if !path.exists() {
            tracing::debug!(dir = %content_dir.display(), "using built-in catalog");
            return Ok(Self::builtin().clone());
        }
        let yaml = std::fs::read_to_string(&path)
            .with_context(|| format!("read catalog: {}", path.display()))?;
        Self::from_yaml(&yaml).with_context(|| format!("load catalog: {}", path.display()))
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter(&self, alias: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.alias == alias)
    }

    pub fn subchapter(&self, alias: &str) -> Option<&Subchapter> {
        self.chapters
            .iter()
            .flat_map(|c| c.subchapters.iter())
            .find(|s| s.alias == alias)
    }

    /// Resolves a `/:chapter/:subchapter` route. Both segments must match.
    pub fn locate(&self, chapter_alias: &str, subchapter_alias: &str) -> Option<&Subchapter> {
        self.chapter(chapter_alias)?
            .subchapters
            .iter()
            .find(|s| s.alias == subchapter_alias)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Chapter> {
        self.chapters.iter().filter(|c| c.is_track)
    }

    pub fn chapter_title(&self, alias: &str) -> Option<&str> {
        self.chapter(alias).map(|c| c.title.as_str())
    }

    pub fn subchapter_title(&self, alias: &str) -> Option<&str> {
        self.subchapter(alias).map(|s| s.title.as_str())
    }

    pub fn first_chapter(&self) -> &Chapter {
        &self.chapters[0]
    }

    pub fn last_chapter(&self) -> &Chapter {
        &self.chapters[self.chapters.len() - 1]
    }

    /// Every content route followed by the landing route.
    pub fn routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self
            .chapters
            .iter()
            .flat_map(|c| c.subchapters.iter().map(Subchapter::route))
            .collect();
        routes.push("/".to_owned());
        routes
    }
}

fn default_spec() -> CatalogSpec {
    fn subs(entries: &[(&str, &str)]) -> Vec<SubchapterSpec> {
        entries
            .iter()
            .map(|(title, alias)| SubchapterSpec {
                title: (*title).to_owned(),
                alias: (*alias).to_owned(),
            })
            .collect()
    }

    fn chapter(
        title: &str,
        alias: &str,
        is_track: bool,
        description: &str,
        subchapters: Vec<SubchapterSpec>,
    ) -> ChapterSpec {
        ChapterSpec {
            title: title.to_owned(),
            alias: alias.to_owned(),
            is_track,
            description: description.to_owned(),
            subchapters,
        }
    }

    CatalogSpec {
        chapters: vec![
            chapter(
                "Overview",
                "introduction",
                false,
                "What you will build and how to get your own GraphQL endpoint.",
                subs(&[("Introduction", "get-started")]),
            ),
            chapter(
                "React Track",
                "tutorial-react",
                true,
                "Build a Pokedex web app with React and Apollo Client.",
                subs(&[
                    ("01 - Getting Started", "react-01"),
                    ("02 - Basic Queries", "react-02"),
                    ("03 - Advanced Queries", "react-03"),
                    ("04 - Fragments", "react-04"),
                    ("05 - Basic Mutations", "react-05"),
                    ("06 - Multiple Mutations", "react-06"),
                    ("07 - Pagination", "react-07"),
                ]),
            ),
            chapter(
                "React Native Vanilla Track",
                "tutorial-react-native-vanilla",
                true,
                "Build the Pokedex as a plain React Native app.",
                subs(&[
                    ("01 - Getting Started", "rnv-01"),
                    ("02 - Basic Queries", "rnv-02"),
                    ("03 - Advanced Queries", "rnv-03"),
                    ("04 - Fragments", "rnv-04"),
                    ("05 - Basic Mutations", "rnv-05"),
                    ("06 - Multiple Mutations", "rnv-06"),
                ]),
            ),
            chapter(
                "React Native Exponent Track",
                "tutorial-react-native-exponent",
                true,
                "Build the Pokedex with React Native and Exponent.",
                subs(&[
                    ("01 - Getting Started", "rn-01"),
                    ("02 - Basic Queries", "rn-02"),
                    ("03 - Advanced Queries", "rn-03"),
                    ("04 - Fragments", "rn-04"),
                ]),
            ),
            chapter(
                "Angular 2 Track",
                "tutorial-angular",
                true,
                "Explore Apollo Angular in a ready-made playground.",
                subs(&[("Playground", "angular-playground")]),
            ),
            chapter(
                "Vue.js Track",
                "tutorial-vue",
                true,
                "Explore Vue Apollo in a ready-made playground.",
                subs(&[("Playground", "vue-playground")]),
            ),
            chapter(
                "Excursions",
                "excursions",
                false,
                "Side trips into tooling and the Apollo store.",
                subs(&[
                    ("01 - Using the DevTools", "excursion-01"),
                    ("02 - Mutation Results", "excursion-02"),
                ]),
            ),
            chapter(
                "Go Further",
                "go-further",
                false,
                "Where to go from here.",
                subs(&[("Wrap Up", "wrap-up")]),
            ),
        ],
    }
}
