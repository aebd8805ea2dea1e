use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;

use crate::catalog::Catalog;
use crate::cli::{PrerenderArgs, RenderArgs, RoutesArgs};
use crate::config::SiteConfig;
use crate::content::IMAGES_DIR_NAME;
use crate::formats::ProgressState;
use crate::page::Site;
use crate::progress::ProgressStore;

pub fn routes(args: RoutesArgs) -> anyhow::Result<()> {
    let catalog = match &args.content {
        Some(dir) => Catalog::load(Path::new(dir))?,
        None => Catalog::builtin().clone(),
    };
    let mut out = String::new();
    for route in catalog.routes() {
        out.push_str(&route);
        out.push('\n');
    }
    print!("{out}");
    Ok(())
}

pub fn render(args: RenderArgs) -> anyhow::Result<()> {
    let site = Site::open(Path::new(&args.content), SiteConfig::from_env()?)?;
    let Some(sub) = site.locate(&args.chapter, &args.subchapter) else {
        anyhow::bail!(
            "unknown route: /{}/{}",
            args.chapter,
            args.subchapter
        );
    };
    let state = load_state(args.state.as_deref())?;
    let html = site.render_subchapter(sub, &state, Utc::now())?;
    print!("{html}");
    Ok(())
}

/// Renders every route to `<out>/<chapter>/<subchapter>/index.html` plus the
/// landing page, and copies the bundled images next to them.
pub fn run(args: PrerenderArgs) -> anyhow::Result<()> {
    let out = PathBuf::from(&args.out);
    prepare_out_dir(&out, args.force)?;

    let site = Site::open(Path::new(&args.content), SiteConfig::from_env()?)?;
    let state = load_state(args.state.as_deref())?;
    let now = Utc::now();

    let mut pages = 0usize;
    for sub in site.index().entries() {
        let html = site
            .render_subchapter(sub, &state, now)
            .with_context(|| format!("prerender {}", sub.route()))?;
        write_page(&out, &sub.route(), &html)?;
        pages += 1;
    }
    write_page(&out, "/", &site.render_landing(&state)?)?;
    pages += 1;

    let images = copy_images(&site.images_dir(), &out.join(IMAGES_DIR_NAME))?;
    tracing::info!(out = %out.display(), pages, images, "prerender finished");
    Ok(())
}

fn prepare_out_dir(out: &Path, force: bool) -> anyhow::Result<()> {
    if out.exists() {
        let is_empty = out.is_dir()
            && fs::read_dir(out)
                .with_context(|| format!("read output dir: {}", out.display()))?
                .next()
                .is_none();
        if !is_empty {
            if !force {
                anyhow::bail!(
                    "output already exists: {} (pass --force to replace it)",
                    out.display()
                );
            }
            fs::remove_dir_all(out)
                .with_context(|| format!("remove output dir: {}", out.display()))?;
        }
    }
    fs::create_dir_all(out).with_context(|| format!("create output dir: {}", out.display()))
}

fn write_page(out: &Path, route: &str, html: &str) -> anyhow::Result<()> {
    let mut dir = out.to_path_buf();
    for segment in route.split('/').filter(|s| !s.is_empty()) {
        dir.push(segment);
    }
    fs::create_dir_all(&dir).with_context(|| format!("create dir: {}", dir.display()))?;
    let path = dir.join("index.html");
    fs::write(&path, html).with_context(|| format!("write page: {}", path.display()))
}

fn copy_images(from: &Path, to: &Path) -> anyhow::Result<usize> {
    if !from.is_dir() {
        return Ok(0);
    }
    fs::create_dir_all(to).with_context(|| format!("create dir: {}", to.display()))?;
    let mut copied = 0usize;
    for entry in fs::read_dir(from).with_context(|| format!("read dir: {}", from.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let target = to.join(entry.file_name());
        fs::copy(entry.path(), &target)
            .with_context(|| format!("copy image: {}", target.display()))?;
        copied += 1;
    }
    Ok(copied)
}

fn load_state(path: Option<&str>) -> anyhow::Result<ProgressState> {
    match path {
        Some(path) => Ok(ProgressStore::open_file(path)?.get().as_ref().clone()),
        None => Ok(ProgressState::default()),
    }
}
