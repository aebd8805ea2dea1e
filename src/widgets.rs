use anyhow::Context as _;
use url::Url;

use crate::config::SiteConfig;
use crate::formats::UserData;
use crate::markdown::{RenderContext, render_footer};
use crate::text::{encode_component, escape_html};

pub const ENDPOINT_ANCHOR: &str = "graphql-endpoint";
pub const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const DOWNLOAD_USER: &str = "learnsite";

const SCOPE_WITH_STAR: &str = "user:email,public_repo";
const SCOPE_WITHOUT_STAR: &str = "user:email";

/// GitHub OAuth authorization URL. GitHub sends the reader back to
/// `redirect_uri` with a one-time `code`.
pub fn oauth_authorize_url(config: &SiteConfig, redirect_uri: &Url, allow_star: bool) -> Url {
    let scope = if allow_star {
        SCOPE_WITH_STAR
    } else {
        SCOPE_WITHOUT_STAR
    };
    let mut url = Url::parse(GITHUB_AUTHORIZE_URL).expect("authorize url constant must parse");
    url.query_pairs_mut()
        .append_pair("client_id", &config.github_oauth_client_id)
        .append_pair("scope", scope)
        .append_pair("redirect_uri", redirect_uri.as_str());
    url
}

/// Where the reader returns after authorizing: the page they started on,
/// scrolled to the endpoint widget.
pub fn oauth_redirect_uri(config: &SiteConfig, return_to: &str) -> anyhow::Result<Url> {
    let mut url = config.site_url(return_to)?;
    url.set_query(None);
    url.set_fragment(Some(ENDPOINT_ANCHOR));
    Ok(url)
}

/// Download link for a packaged example project preconfigured with the
/// reader's endpoint.
pub fn download_url(config: &SiteConfig, repository: &str, user: &UserData) -> anyhow::Result<Url> {
    match &config.download_endpoint {
        Some(endpoint) => {
            let mut url = endpoint.clone();
            url.query_pairs_mut()
                .append_pair("repository", repository)
                .append_pair("project_id", user.project_id.as_deref().unwrap_or(""))
                .append_pair("user", DOWNLOAD_USER)
                .append_pair("name", &user.name);
            Ok(url)
        }
        None => config
            .repository_base_url
            .join(repository)
            .with_context(|| format!("build repository url for {repository}")),
    }
}

fn event_attr(ctx: RenderContext<'_>, category: &str, action: &str) -> String {
    if !ctx.config.enable_analytics {
        return String::new();
    }
    format!(
        " data-event-category=\"{}\" data-event-action=\"{}\"",
        escape_html(category),
        escape_html(action)
    )
}

fn claim_form(ctx: RenderContext<'_>) -> String {
    let mut html = String::new();
    html.push_str("<form class=\"claim-endpoint\" method=\"get\" action=\"/auth/github\">");
    html.push_str(&format!(
        "<input type=\"hidden\" name=\"return_to\" value=\"{}\">",
        escape_html(ctx.path)
    ));
    html.push_str(&format!(
        "<button type=\"submit\" class=\"get-endpoint\"{}>Get GraphQL Endpoint</button>",
        event_attr(ctx, "user", "open-github")
    ));
    html.push_str("<label class=\"star-repo\"><input type=\"checkbox\" name=\"star\" value=\"1\" checked> Star Learn Apollo on GitHub</label>");
    html.push_str("</form>");
    html
}

fn skip_form(ctx: RenderContext<'_>) -> String {
    format!(
        "<form class=\"skip-endpoint\" method=\"post\" action=\"/api/progress/skip-auth\">\
<input type=\"hidden\" name=\"return_to\" value=\"{}\">\
<button type=\"submit\"{}>Read on without GraphQL endpoint (non-interactive)</button>\
</form>",
        escape_html(ctx.path),
        event_attr(ctx, "user", "skipped-endpoint")
    )
}

/// The endpoint-claim panel, in one of three states: claimed, skipped, or
/// not yet connected.
pub fn endpoint_claim(ctx: RenderContext<'_>) -> anyhow::Result<String> {
    if ctx.state.skipped_auth {
        return Ok(format!(
            "<div class=\"endpoint endpoint-skipped\" id=\"{ENDPOINT_ANCHOR}\"><div class=\"tc\">{}</div>{}</div>\n",
            claim_form(ctx),
            render_footer(ctx)?
        ));
    }

    if let Some(project_id) = ctx.state.project_id() {
        let endpoint = ctx.config.project_endpoint(project_id)?;
        let endpoint = escape_html(endpoint.as_str());
        return Ok(format!(
            "<div class=\"endpoint endpoint-claimed\" id=\"{ENDPOINT_ANCHOR}\">Congrats, this is your endpoint:\
<div class=\"show-endpoint\"><span class=\"endpoint-url\">{endpoint}</span>\
<button type=\"button\" class=\"copy-endpoint\" data-clipboard-text=\"{endpoint}\"{}>Copy</button></div>{}</div>\n",
            event_attr(ctx, "ui", "copied-endpoint/from-content"),
            render_footer(ctx)?
        ));
    }

    Ok(format!(
        "<div class=\"endpoint endpoint-unclaimed\" id=\"{ENDPOINT_ANCHOR}\">{}{}</div>\n",
        claim_form(ctx),
        skip_form(ctx)
    ))
}

/// Download link for an example project; readers without an account get the
/// claim panel instead.
pub fn download(ctx: RenderContext<'_>, repository: &str) -> anyhow::Result<String> {
    let Some(user) = ctx.state.user.as_ref() else {
        return endpoint_claim(ctx);
    };
    let url = download_url(ctx.config, repository, user)?;
    Ok(format!(
        "<div class=\"download\" id=\"{ENDPOINT_ANCHOR}\">\
<a class=\"get-endpoint\" href=\"{}\" target=\"_blank\" download=\"{}\"{}>Download Example</a>\
<div class=\"download-hint\" hidden>Magic in progress. Download starts in a few seconds...</div></div>\n",
        escape_html(url.as_str()),
        escape_html(repository),
        event_attr(ctx, "user", "download-example")
    ))
}

fn share_links(ctx: RenderContext<'_>, title: &str, source: &str) -> String {
    let url = encode_component(ctx.config.site_origin.as_str());
    let text = encode_component(title);
    let twitter = format!("http://www.twitter.com/share?url={url}&text={text}");
    let facebook = format!("https://www.facebook.com/sharer/sharer.php?u={url}&t={text}");
    format!(
        "<div class=\"share-links\">\
<a class=\"share-twitter\" href=\"{}\" target=\"_blank\"{}>Share on Twitter</a>\
<a class=\"share-facebook\" href=\"{}\" target=\"_blank\"{}>Share on Facebook</a></div>",
        escape_html(&twitter),
        event_attr(ctx, "user", &format!("share/twitter/{source}")),
        escape_html(&facebook),
        event_attr(ctx, "user", &format!("share/facebook/{source}")),
    )
}

/// Closing panel: congratulations, share links and the community invite.
pub fn sharing(ctx: RenderContext<'_>) -> String {
    let email = ctx
        .state
        .user
        .as_ref()
        .map(|user| user.email.as_str())
        .unwrap_or("");

    let mut html = String::new();
    html.push_str("<div class=\"sharing\">");
    html.push_str("<h1 class=\"accent\">You did it! Well done!</h1>");
    html.push_str("<p>We hope you enjoyed learning Apollo and you are ready to use it in one of your next projects.</p>");
    html.push_str("<p>You can help us by sharing it:</p>");
    html.push_str(&share_links(
        ctx,
        "I just learned how to develop apps with Apollo and GraphQL",
        "wrapup",
    ));
    html.push_str("<p>If you need further help or have any other questions, come and join our Slack:</p>");
    html.push_str(&format!(
        "<form class=\"invite\" method=\"post\" action=\"/api/invite\">\
<input type=\"hidden\" name=\"return_to\" value=\"{}\">\
<input type=\"email\" name=\"email\" value=\"{}\" placeholder=\"you@gmail.com\">\
<button type=\"submit\"{}>Join Slack</button></form>",
        escape_html(ctx.path),
        escape_html(email),
        event_attr(ctx, "user", "joined-slack"),
    ));
    html.push_str("</div>\n");
    html
}

/// One panel per track chapter, each selecting that track.
pub fn track_picker(ctx: RenderContext<'_>) -> String {
    let mut html = String::new();
    html.push_str("<div class=\"track-picker\">");
    for track in ctx.catalog.tracks() {
        let selected = ctx.state.selected_track_alias.as_deref() == Some(track.alias.as_str());
        html.push_str(&format!(
            "<div class=\"track-panel{}\"><h2 class=\"accent\">{}</h2><p>{}</p>\
<form method=\"post\" action=\"/api/track\"><input type=\"hidden\" name=\"alias\" value=\"{}\">\
<button type=\"submit\" class=\"track-button\">Get started with {} track</button></form></div>",
            if selected { " selected" } else { "" },
            escape_html(&track.title),
            escape_html(&track.description),
            escape_html(&track.alias),
            escape_html(&track.title),
        ));
    }
    html.push_str("</div>\n");
    html
}

/// Side panel asking readers to share the tutorial.
pub fn share_panel(ctx: RenderContext<'_>) -> anyhow::Result<String> {
    let star_url = ctx
        .config
        .repository_base_url
        .join("learnapollo")
        .context("build star url")?;
    Ok(format!(
        "<aside class=\"share-panel\"><h3 class=\"accent\">Liked Learn Apollo so far?</h3>\
<p>Please consider sharing it so that other people can enjoy it too.</p>\
<a class=\"github-button\" href=\"{}\">Star</a>{}</aside>\n",
        escape_html(star_url.as_str()),
        share_links(
            ctx,
            "Learning how to develop apps with Apollo and GraphQL using Learn Apollo!",
            "share-panel",
        ),
    ))
}
