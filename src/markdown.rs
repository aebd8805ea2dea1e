use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Tag, TagEnd};

use crate::catalog::Catalog;
use crate::config::SiteConfig;
use crate::content::{ImageAssets, ParsedDocument};
use crate::formats::ProgressState;
use crate::text::{encode_component, escape_html, slug};
use crate::widgets;

pub const NAME_PLACEHOLDER: &str = "__NAME__";
pub const IMAGE_ROUTE_PREFIX: &str = "/images/";

/// Everything a render pass may consult. Borrowed for a single render.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub config: &'a SiteConfig,
    pub catalog: &'a Catalog,
    pub state: &'a ProgressState,
    /// Path of the page being rendered, e.g. `/introduction/get-started`.
    pub path: &'a str,
    pub images: &'a ImageAssets,
    /// Rendered beneath the endpoint widget once the reader is past the
    /// claim step.
    pub endpoint_footer: Option<&'a ParsedDocument>,
}

impl<'a> RenderContext<'a> {
    fn without_footer(self) -> Self {
        Self {
            endpoint_footer: None,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    GraphqlEndpoint,
    Download { repository: &'static str },
    Sharing,
    TrackSelector,
}

const SENTINELS: &[(&str, Sentinel)] = &[
    ("__INJECT_GRAPHQL_ENDPOINT__", Sentinel::GraphqlEndpoint),
    (
        "__DOWNLOAD_REACT__",
        Sentinel::Download {
            repository: "pokedex-react",
        },
    ),
    (
        "__DOWNLOAD_RNVANILLA__",
        Sentinel::Download {
            repository: "pokedex-react-native-vanilla",
        },
    ),
    (
        "__DOWNLOAD_ANGULAR__",
        Sentinel::Download {
            repository: "pokedex-angular",
        },
    ),
    ("__INJECT_SHARING__", Sentinel::Sharing),
    ("__INJECT_TRACK_SELECTOR__", Sentinel::TrackSelector),
];

impl Sentinel {
    /// First sentinel token contained in a raw HTML block, in table order.
    pub fn detect(html: &str) -> Option<Sentinel> {
        SENTINELS
            .iter()
            .find(|(token, _)| html.contains(token))
            .map(|(_, sentinel)| *sentinel)
    }
}

/// Fenced-code info string split into language and optional target file,
/// e.g. `js@src/index.js`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeInfo {
    pub language: Option<String>,
    pub target_path: Option<String>,
}

impl CodeInfo {
    pub fn parse(info: &str) -> Self {
        let info = info.split_whitespace().next().unwrap_or("");
        let (language, target_path) = match info.split_once('@') {
            Some((language, path)) => (language, Some(path)),
            None => (info, None),
        };
        Self {
            language: Some(language.to_owned()).filter(|l| !l.is_empty()),
            target_path: target_path
                .map(str::to_owned)
                .filter(|p| !p.is_empty()),
        }
    }
}

/// Vertical spacing (rem) of a heading tier.
pub fn heading_padding(level: HeadingLevel) -> anyhow::Result<f32> {
    match level {
        HeadingLevel::H1 => Ok(2.3),
        HeadingLevel::H2 => Ok(1.5),
        HeadingLevel::H3 => Ok(1.3),
        HeadingLevel::H4 => Ok(1.2),
        HeadingLevel::H5 => Ok(1.0),
        other => anyhow::bail!("unsupported heading level: {other:?}"),
    }
}

/// Maps an image reference to a servable URL. Remote URLs pass through;
/// anything else must name a bundled `.png` by file stem.
pub fn resolve_image(uri: &str, images: &ImageAssets) -> anyhow::Result<String> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return Ok(uri.to_owned());
    }

    let file_name = uri.rsplit('/').next().unwrap_or(uri);
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    };
    if stem.is_empty() || !images.contains(stem) {
        anyhow::bail!("missing image asset: {stem}.png (referenced as {uri})");
    }
    Ok(format!("{IMAGE_ROUTE_PREFIX}{stem}.png"))
}

/// Private-use character standing in for the placeholder while parsing.
const NAME_MARKER: &str = "\u{E000}";

/// Returns a copy of the document with the name placeholder replaced.
///
/// The placeholder is itself emphasis syntax, so the source is re-parsed with
/// an inert marker in its place. The name then goes into text and code events
/// as-is and into raw HTML escaped; it is never parsed as markdown or HTML.
pub fn substitute_name(document: &ParsedDocument, name: &str) -> ParsedDocument {
    if !document.source().contains(NAME_PLACEHOLDER) {
        return document.clone();
    }
    let marked = ParsedDocument::parse(&document.source().replace(NAME_PLACEHOLDER, NAME_MARKER));
    let escaped = escape_html(name);
    let fill = |s: CowStr<'static>, with: &str| -> CowStr<'static> {
        if s.contains(NAME_MARKER) {
            CowStr::from(s.replace(NAME_MARKER, with))
        } else {
            s
        }
    };

    marked.map_events(|event| match event {
        Event::Text(s) => Event::Text(fill(s, name)),
        Event::Code(s) => Event::Code(fill(s, name)),
        Event::Html(s) => Event::Html(fill(s, &escaped)),
        Event::InlineHtml(s) => Event::InlineHtml(fill(s, &escaped)),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: fill(dest_url, &encode_component(name)),
            title: fill(title, name),
            id,
        }),
        other => other,
    })
}

/// The document as the reader sees it: named when someone is signed in.
pub fn personalize(document: &ParsedDocument, state: &ProgressState) -> ParsedDocument {
    match state.display_name() {
        Some(name) => substitute_name(document, name),
        None => document.clone(),
    }
}

/// Renders a subchapter body with headings anchored, code annotated,
/// sentinel blocks swapped for widgets and images resolved.
pub fn render(document: &ParsedDocument, ctx: RenderContext<'_>) -> anyhow::Result<String> {
    let document = personalize(document, ctx.state);

    let events = inject(document.into_events(), ctx)?;
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, events.into_iter());
    Ok(html)
}

fn inject(events: Vec<Event<'static>>, ctx: RenderContext<'_>) -> anyhow::Result<Vec<Event<'static>>> {
    let mut out = Vec::with_capacity(events.len());
    let mut iter = events.into_iter();

    while let Some(event) = iter.next() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                let inner = take_until(&mut iter, |e| matches!(e, Event::End(TagEnd::Heading(_))));
                let padding = heading_padding(level)?;
                let id = slug(&plain_text(&inner));
                let n = level as u8;
                out.push(Event::Html(CowStr::from(format!(
                    "<h{n} id=\"{id}\" class=\"accent heading-tier-{n}\" style=\"padding-bottom: {pb:.2}rem; margin-top: calc({padding}rem - 30px)\">",
                    id = escape_html(&id),
                    pb = padding * 0.4,
                ))));
                out.extend(inner);
                out.push(Event::Html(CowStr::from(format!("</h{n}>\n"))));
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let inner = take_until(&mut iter, |e| matches!(e, Event::End(TagEnd::CodeBlock)));
                let info = match &kind {
                    CodeBlockKind::Fenced(info) => CodeInfo::parse(info),
                    CodeBlockKind::Indented => CodeInfo::parse(""),
                };
                out.push(Event::Html(CowStr::from(render_code_block(
                    &info,
                    &plain_text(&inner),
                ))));
            }
            Event::Start(Tag::HtmlBlock) => {
                let inner = take_until(&mut iter, |e| matches!(e, Event::End(TagEnd::HtmlBlock)));
                let literal = plain_text(&inner);
                match Sentinel::detect(&literal) {
                    Some(sentinel) => {
                        tracing::debug!(?sentinel, path = %ctx.path, "injecting widget");
                        out.push(Event::Html(CowStr::from(render_widget(sentinel, ctx)?)));
                    }
                    None => {
                        out.push(Event::Start(Tag::HtmlBlock));
                        out.extend(inner);
                        out.push(Event::End(TagEnd::HtmlBlock));
                    }
                }
            }
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                let resolved = resolve_image(&dest_url, ctx.images)?;
                out.push(Event::Start(Tag::Image {
                    link_type,
                    dest_url: CowStr::from(resolved),
                    title,
                    id,
                }));
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

fn render_widget(sentinel: Sentinel, ctx: RenderContext<'_>) -> anyhow::Result<String> {
    match sentinel {
        Sentinel::GraphqlEndpoint => widgets::endpoint_claim(ctx),
        Sentinel::Download { repository } => widgets::download(ctx, repository),
        Sentinel::Sharing => Ok(widgets::sharing(ctx)),
        Sentinel::TrackSelector => Ok(widgets::track_picker(ctx)),
    }
}

/// Renders the footer document shown under the endpoint widget. Sentinels
/// inside the footer do not get a footer of their own.
pub(crate) fn render_footer(ctx: RenderContext<'_>) -> anyhow::Result<String> {
    match ctx.endpoint_footer {
        Some(footer) => render(footer, ctx.without_footer()),
        None => Ok(String::new()),
    }
}

fn render_code_block(info: &CodeInfo, code: &str) -> String {
    let mut html = String::new();
    if let Some(path) = &info.target_path {
        html.push_str("<div class=\"copy-to-file\">");
        html.push_str(&format!(
            "<span class=\"copy-to-file-path\">{}</span>",
            escape_html(path)
        ));
        html.push_str(&format!(
            "<button type=\"button\" class=\"copy-to-file-button\" data-clipboard-text=\"{}\">Copy to {}</button>",
            escape_html(code),
            escape_html(path)
        ));
        html.push_str("</div>\n");
    }
    match &info.language {
        Some(language) => html.push_str(&format!(
            "<pre><code class=\"language-{}\">",
            escape_html(language)
        )),
        None => html.push_str("<pre><code>"),
    }
    html.push_str(&escape_html(code));
    html.push_str("</code></pre>\n");
    html
}

fn take_until(
    iter: &mut impl Iterator<Item = Event<'static>>,
    is_end: impl Fn(&Event<'static>) -> bool,
) -> Vec<Event<'static>> {
    let mut inner = Vec::new();
    for event in iter.by_ref() {
        if is_end(&event) {
            break;
        }
        inner.push(event);
    }
    inner
}

fn plain_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) | Event::Html(t) | Event::InlineHtml(t) => {
                text.push_str(t)
            }
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::UserData;

    struct Fixture {
        config: SiteConfig,
        state: ProgressState,
        images: ImageAssets,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                config: SiteConfig {
                    github_oauth_client_id: "client-123".to_owned(),
                    ..SiteConfig::default()
                },
                state: ProgressState::default(),
                images: ImageAssets::from_stems(["pokedex"]),
            }
        }

        fn ctx(&self) -> RenderContext<'_> {
            RenderContext {
                config: &self.config,
                catalog: Catalog::builtin(),
                state: &self.state,
                path: "/introduction/get-started",
                images: &self.images,
                endpoint_footer: None,
            }
        }
    }

    fn render_md(fixture: &Fixture, md: &str) -> anyhow::Result<String> {
        render(&ParsedDocument::parse(md), fixture.ctx())
    }

    #[test]
    fn headings_get_slug_ids_and_tier_spacing() -> anyhow::Result<()> {
        let html = render_md(&Fixture::new(), "## Basic *Queries*\n")?;
        assert!(html.contains("<h2 id=\"basic-queries\" class=\"accent heading-tier-2\""));
        assert!(html.contains("margin-top: calc(1.5rem - 30px)"));
        assert!(html.contains("<em>Queries</em></h2>"));
        Ok(())
    }

    #[test]
    fn level_six_heading_is_a_content_error() {
        let err = render_md(&Fixture::new(), "###### Too deep\n").unwrap_err();
        assert!(format!("{err:#}").contains("unsupported heading level"));
    }

    #[test]
    fn code_info_splits_language_and_target() {
        assert_eq!(
            CodeInfo::parse("js@src/index.js"),
            CodeInfo {
                language: Some("js".to_owned()),
                target_path: Some("src/index.js".to_owned()),
            }
        );
        assert_eq!(
            CodeInfo::parse("js"),
            CodeInfo {
                language: Some("js".to_owned()),
                target_path: None,
            }
        );
        assert_eq!(
            CodeInfo::parse(""),
            CodeInfo {
                language: None,
                target_path: None,
            }
        );
    }

    #[test]
    fn code_block_with_target_shows_copy_affordance() -> anyhow::Result<()> {
        let fixture = Fixture::new();
        let html = render_md(&fixture, "```js@src/index.js\nconst a = 1 < 2\n```\n")?;
        assert!(html.contains("<span class=\"copy-to-file-path\">src/index.js</span>"));
        assert!(html.contains("data-clipboard-text=\"const a = 1 &lt; 2\n\""));
        assert!(html.contains("<pre><code class=\"language-js\">const a = 1 &lt; 2\n</code></pre>"));

        let plain = render_md(&fixture, "```js\nconst a = 1\n```\n")?;
        assert!(plain.contains("<pre><code class=\"language-js\">"));
        assert!(!plain.contains("copy-to-file"));
        Ok(())
    }

    #[test]
    fn endpoint_sentinel_replaces_only_its_block() -> anyhow::Result<()> {
        let md = "Before.\n\n<div>__INJECT_GRAPHQL_ENDPOINT__</div>\n\nAfter.\n\n<div class=\"note\">kept</div>\n";
        let html = render_md(&Fixture::new(), md)?;
        assert!(html.contains("<p>Before.</p>"));
        assert!(html.contains("<p>After.</p>"));
        assert!(html.contains("id=\"graphql-endpoint\""));
        assert!(!html.contains("__INJECT_GRAPHQL_ENDPOINT__"));
        assert!(html.contains("<div class=\"note\">kept</div>"));
        Ok(())
    }

    #[test]
    fn sentinel_detection_maps_download_repositories() {
        assert_eq!(
            Sentinel::detect("<!-- __DOWNLOAD_RNVANILLA__ -->"),
            Some(Sentinel::Download {
                repository: "pokedex-react-native-vanilla"
            })
        );
        assert_eq!(Sentinel::detect("<div>__INJECT_SHARING__</div>"), Some(Sentinel::Sharing));
        assert_eq!(Sentinel::detect("<div>nothing</div>"), None);
    }

    #[test]
    fn images_resolve_to_bundled_assets() -> anyhow::Result<()> {
        let images = ImageAssets::from_stems(["pokedex"]);
        assert_eq!(resolve_image("../images/pokedex.png", &images)?, "/images/pokedex.png");
        assert_eq!(resolve_image("pokedex", &images)?, "/images/pokedex.png");
        assert_eq!(
            resolve_image("https://cdn.example.com/a.gif", &images)?,
            "https://cdn.example.com/a.gif"
        );
        assert!(resolve_image("./missing.png", &images).is_err());
        Ok(())
    }

    #[test]
    fn rendered_images_point_at_image_route() -> anyhow::Result<()> {
        let html = render_md(&Fixture::new(), "![Pokedex](./images/pokedex.png)\n")?;
        assert!(html.contains("src=\"/images/pokedex.png\""));
        Ok(())
    }

    #[test]
    fn name_placeholder_is_replaced_for_signed_in_users() -> anyhow::Result<()> {
        let mut fixture = Fixture::new();
        let md = "Hi __NAME__, run `echo __NAME__`.\n";
        assert!(!render_md(&fixture, md)?.contains("Ada"));

        fixture.state.user = Some(UserData {
            project_id: None,
            email: "ada@example.com".to_owned(),
            name: "Ada".to_owned(),
        });
        let html = render_md(&fixture, md)?;
        assert!(html.contains("Hi Ada, run <code>echo Ada</code>."));
        Ok(())
    }

    #[test]
    fn substitution_does_not_touch_the_source_document() {
        let doc = ParsedDocument::parse("Hello __NAME__\n");
        let named = substitute_name(&doc, "Ada");
        assert_ne!(doc, named);
        assert!(doc.source().contains(NAME_PLACEHOLDER));
        assert_eq!(substitute_name(&named, "Grace"), named);
    }

    fn named(fixture: &mut Fixture, name: &str) {
        fixture.state.user = Some(UserData {
            project_id: None,
            email: "someone@example.com".to_owned(),
            name: name.to_owned(),
        });
    }

    #[test]
    fn html_in_a_name_is_rendered_as_text() -> anyhow::Result<()> {
        let mut fixture = Fixture::new();
        named(&mut fixture, "<img src=x onerror=alert(1)>");

        let html = render_md(&fixture, "Hi __NAME__.\n\n<p title=\"__NAME__\">raw</p>\n")?;
        assert!(html.contains("<p>Hi &lt;img src=x onerror=alert(1)&gt;.</p>"));
        assert!(html.contains("<p title=\"&lt;img src=x onerror=alert(1)&gt;\">raw</p>"));
        assert!(!html.contains("<img"));
        Ok(())
    }

    #[test]
    fn markdown_in_a_name_is_not_interpreted() -> anyhow::Result<()> {
        let mut fixture = Fixture::new();
        named(&mut fixture, "*Ada*");

        let html = render_md(&fixture, "Hi __NAME__.\n\n## About __NAME__\n")?;
        assert!(html.contains("<p>Hi *Ada*.</p>"));
        assert!(!html.contains("<em>"));
        assert!(html.contains("<h2 id=\"about-*ada*\""));
        assert!(!html.contains('\u{E000}'));
        Ok(())
    }
}
