use std::path::Path;

use anyhow::Context as _;
use chrono::{DateTime, TimeDelta, Utc};

use crate::catalog::{Catalog, Chapter, Subchapter};
use crate::config::SiteConfig;
use crate::content::{ContentStore, ImageAssets, ParsedDocument};
use crate::formats::ProgressState;
use crate::markdown::{self, RenderContext};
use crate::navigation::{self, FlattenedIndex, HeadingNode};
use crate::text::{escape_html, slug};
use crate::widgets;

/// Rendered beneath the endpoint widget once the reader is connected.
pub const ENDPOINT_FOOTER_NAME: &str = "introduction/get-started-bottom";
pub const SITE_TITLE: &str = "Learn Apollo";
pub const SHARE_PANEL_DELAY_MINUTES: i64 = 3;

/// Everything needed to render pages, built once at start-up.
#[derive(Debug)]
pub struct Site {
    config: SiteConfig,
    catalog: Catalog,
    index: FlattenedIndex,
    content: ContentStore,
    images: ImageAssets,
    endpoint_footer: Option<ParsedDocument>,
}

impl Site {
    pub fn open(content_dir: &Path, config: SiteConfig) -> anyhow::Result<Self> {
        let catalog = Catalog::load(content_dir)?;
        let content = ContentStore::new(content_dir);
        let images = content.image_assets().context("scan bundled images")?;
        let endpoint_footer = content
            .load_optional(ENDPOINT_FOOTER_NAME)
            .context("load endpoint footer")?;
        let index = FlattenedIndex::new(&catalog);

        tracing::info!(
            content_dir = %content_dir.display(),
            chapters = catalog.chapters().len(),
            subchapters = index.len(),
            images = images.len(),
            "site loaded"
        );

        Ok(Self {
            config,
            catalog,
            index,
            content,
            images,
            endpoint_footer,
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn index(&self) -> &FlattenedIndex {
        &self.index
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn images_dir(&self) -> std::path::PathBuf {
        self.content.images_dir()
    }

    /// Resolves `/:chapter/:subchapter`.
    pub fn locate(&self, chapter_alias: &str, subchapter_alias: &str) -> Option<&Subchapter> {
        self.catalog.locate(chapter_alias, subchapter_alias)
    }

    fn context<'a>(&'a self, state: &'a ProgressState, path: &'a str) -> RenderContext<'a> {
        RenderContext {
            config: &self.config,
            catalog: &self.catalog,
            state,
            path,
            images: &self.images,
            endpoint_footer: self.endpoint_footer.as_ref(),
        }
    }

    pub fn render_subchapter(
        &self,
        subchapter: &Subchapter,
        state: &ProgressState,
        now: DateTime<Utc>,
    ) -> anyhow::Result<String> {
        let document = markdown::personalize(&self.content.load(subchapter)?, state);
        let path = subchapter.route();
        let ctx = self.context(state, &path);

        let body = markdown::render(&document, ctx)
            .with_context(|| format!("render {}", subchapter.content_name()))?;
        let outline = navigation::build_headings_tree(&navigation::collect_headings(&document));

        let chapter_title = self
            .catalog
            .chapter_title(&subchapter.chapter_alias)
            .unwrap_or_default();
        let title = format!("{} - {chapter_title} + Apollo Tutorial", subchapter.title);

        let mut main = String::new();
        main.push_str("<article class=\"markdown\">\n");
        main.push_str(&body);
        main.push_str("</article>\n");

        let edit_url = self
            .config
            .source_base_url
            .join(&format!("{}.md", subchapter.content_name()))
            .context("build edit url")?;
        main.push_str(&format!(
            "<a class=\"edit-page\" href=\"{}\" target=\"_blank\">Edit this page</a>\n",
            escape_html(edit_url.as_str())
        ));

        if share_panel_visible(&self.catalog, &subchapter.chapter_alias, state, now) {
            main.push_str(&widgets::share_panel(ctx)?);
        }
        main.push_str(&self.jump_links(subchapter, state));

        let sidebar = self.sidebar(state, Some(subchapter), &outline)?;
        Ok(self.document(&title, &sidebar, &main))
    }

    pub fn render_landing(&self, state: &ProgressState) -> anyhow::Result<String> {
        let ctx = self.context(state, "/");

        let mut main = String::new();
        main.push_str(&format!(
            "<header class=\"landing\"><h1 class=\"accent\">{SITE_TITLE}</h1>\
<p>A hands-on tutorial for building apps with Apollo and GraphQL.</p>"
        ));
        let read = state.read_aliases();
        match self
            .index
            .last_visited_alias(&read)
            .and_then(|alias| self.catalog.subchapter(alias))
        {
            Some(sub) => main.push_str(&format!(
                "<a class=\"resume\" href=\"{}\">Continue: {}</a>",
                escape_html(&sub.route()),
                escape_html(&sub.title)
            )),
            None => {
                if let Some(first) = self.index.first() {
                    main.push_str(&format!(
                        "<a class=\"resume\" href=\"{}\">Get started</a>",
                        escape_html(&first.route())
                    ));
                }
            }
        }
        main.push_str("</header>\n");

        main.push_str("<section class=\"overview\">\n");
        for (number, chapter) in self.catalog.chapters().iter().enumerate() {
            main.push_str(&format!(
                "<div class=\"overview-chapter\"><h2><span class=\"chapter-number\">{}</span> \
<a href=\"{}\">{}</a></h2><p>{}</p></div>\n",
                number + 1,
                escape_html(&chapter.route()),
                escape_html(&chapter.title),
                escape_html(&chapter.description),
            ));
        }
        main.push_str("</section>\n");
        main.push_str(&widgets::track_picker(ctx));

        let sidebar = self.sidebar(state, None, &[])?;
        Ok(self.document(SITE_TITLE, &sidebar, &main))
    }

    fn sidebar(
        &self,
        state: &ProgressState,
        current: Option<&Subchapter>,
        outline: &[HeadingNode],
    ) -> anyhow::Result<String> {
        let read = state.read_aliases();
        let last_visited = self.index.last_visited_alias(&read);
        let selected_track = state.selected_track_alias.as_deref();

        let mut out = String::new();
        out.push_str("<nav class=\"sidebar\">\n");
        out.push_str(&format!(
            "<a class=\"logo\" href=\"/\"><h2>{SITE_TITLE}</h2></a>\n"
        ));
        for (number, chapter) in self.catalog.chapters().iter().enumerate() {
            out.push_str("<div class=\"chapter\">");
            out.push_str(&format!(
                "<a class=\"chapter-link\" href=\"{}\"><span class=\"chapter-number\">{}</span> {}</a>",
                escape_html(&chapter.route()),
                number + 1,
                escape_html(&chapter.title)
            ));
            if navigation::should_display_subchapters(chapter, selected_track) {
                for sub in &chapter.subchapters {
                    out.push_str(&sidebar_entry(
                        sub,
                        state.has_read(&sub.alias),
                        current.is_some_and(|c| c.alias == sub.alias),
                        last_visited == Some(sub.alias.as_str()),
                        outline,
                    ));
                }
            }
            out.push_str("</div>\n");
        }

        if let Some(project_id) = state.project_id() {
            let endpoint = self.config.project_endpoint(project_id)?;
            out.push_str(&format!(
                "<div class=\"server-badge\"><a href=\"{}\" target=\"_blank\">GraphQL Server</a>\
<span>Hosted by Graphcool</span></div>\n",
                escape_html(endpoint.as_str())
            ));
        }
        out.push_str("</nav>\n");
        Ok(out)
    }

    fn jump_links(&self, current: &Subchapter, state: &ProgressState) -> String {
        let mut out = String::new();
        if let Some(previous) = self.index.neighbor(&current.alias, false) {
            out.push_str(&format!(
                "<a class=\"jump jump-left\" href=\"{}\"><span>Previous:</span> {}</a>\n",
                escape_html(&previous.route()),
                escape_html(&previous.title)
            ));
        }
        if let Some(next) = self.index.neighbor(&current.alias, true)
            && navigation::next_link_visible(&self.index, &current.alias, state)
        {
            out.push_str(&format!(
                "<a class=\"jump jump-right\" href=\"{}\"><span>Next:</span> {}</a>\n",
                escape_html(&next.route()),
                escape_html(&next.title)
            ));
        }
        out
    }

    fn document(&self, title: &str, sidebar: &str, main: &str) -> String {
        let title = escape_html(title);
        let mut out = String::new();
        out.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n");
        out.push_str("<meta charset=\"utf-8\">\n");
        out.push_str(&format!("<title>{title}</title>\n"));
        out.push_str(&format!("<meta property=\"og:title\" content=\"{title}\">\n"));
        out.push_str(&format!("<meta name=\"twitter:title\" content=\"{title}\">\n"));
        out.push_str("</head>\n<body>\n<div class=\"layout\">\n");
        out.push_str(sidebar);
        out.push_str(&format!(
            "<div class=\"last-updated\">Last updated<br>{}</div>\n",
            escape_html(&self.config.last_updated)
        ));
        out.push_str("<main class=\"content\">\n");
        out.push_str(main);
        out.push_str("</main>\n</div>\n</body>\n</html>\n");
        out
    }
}

fn sidebar_entry(
    sub: &Subchapter,
    read: bool,
    current: bool,
    last_visited: bool,
    outline: &[HeadingNode],
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "<div class=\"subchapter{}{}\">",
        if current { " current" } else { "" },
        if read { " read" } else { "" }
    ));
    if last_visited {
        out.push_str("<div class=\"progress-bar\"></div>");
    }
    if read {
        out.push_str("<span class=\"check\">&#10003;</span>");
    } else {
        out.push_str("<span class=\"check-placeholder\"></span>");
    }
    out.push_str(&format!(
        "<a href=\"{}\">{}</a></div>",
        escape_html(&sub.route()),
        escape_html(&sub.title)
    ));

    if current {
        for node in outline {
            let Some(title) = node.title.as_deref() else {
                continue;
            };
            out.push_str(&format!(
                "<a class=\"outline\" href=\"#{}\"><span class=\"indent\">&#172;</span> {}</a>",
                escape_html(&slug(title)),
                escape_html(title)
            ));
        }
    }
    out
}

/// The share panel appears on track and excursion pages once the reader has
/// spent a few minutes on the site.
pub fn share_panel_visible(
    catalog: &Catalog,
    chapter_alias: &str,
    state: &ProgressState,
    now: DateTime<Utc>,
) -> bool {
    let is_edge = |chapter: &Chapter| chapter.alias == chapter_alias;
    if is_edge(catalog.first_chapter()) || is_edge(catalog.last_chapter()) {
        return false;
    }
    state
        .initial_load_timestamp
        .is_some_and(|first_load| now - first_load >= TimeDelta::minutes(SHARE_PANEL_DELAY_MINUTES))
}
