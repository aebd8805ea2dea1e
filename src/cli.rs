use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Routes(RoutesArgs),
    Render(RenderArgs),
    Prerender(PrerenderArgs),
    Progress {
        #[command(subcommand)]
        command: ProgressCommand,
    },
}

#[derive(Debug, Args)]
pub struct RoutesArgs {
    /// Content directory (uses its `catalog.yaml` when present).
    #[arg(long)]
    pub content: Option<String>,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Content directory with `<chapter>/<subchapter>.md` files.
    #[arg(long)]
    pub content: String,

    #[arg(long)]
    pub chapter: String,

    #[arg(long)]
    pub subchapter: String,

    /// Progress state file to render against.
    #[arg(long)]
    pub state: Option<String>,
}

#[derive(Debug, Args)]
pub struct PrerenderArgs {
    /// Content directory with `<chapter>/<subchapter>.md` files.
    #[arg(long)]
    pub content: String,

    /// Output directory for static HTML.
    #[arg(long)]
    pub out: String,

    /// Progress state file to render against.
    #[arg(long)]
    pub state: Option<String>,

    /// Replace an existing output directory.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Subcommand)]
pub enum ProgressCommand {
    /// Print the stored progress state as JSON.
    Show(ProgressArgs),
    MarkRead(ProgressAliasArgs),
    SelectTrack(ProgressAliasArgs),
    /// Continue without a GraphQL endpoint.
    SkipAuth(ProgressArgs),
    /// Forget the signed-in user.
    ResetUser(ProgressArgs),
}

#[derive(Debug, Args)]
pub struct ProgressArgs {
    /// Progress state file (created on first write).
    #[arg(long)]
    pub state: String,
}

#[derive(Debug, Args)]
pub struct ProgressAliasArgs {
    /// Progress state file (created on first write).
    #[arg(long)]
    pub state: String,

    /// Subchapter alias for `mark-read`, track chapter alias for `select-track`.
    #[arg(long)]
    pub alias: String,

    /// Content directory whose `catalog.yaml` validates the alias.
    #[arg(long)]
    pub content: Option<String>,
}
