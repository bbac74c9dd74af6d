// ariadne-cli: terminal client for the paper backend
// Build with: cargo build --features cli --bin ariadne-cli

use std::path::PathBuf;
use std::sync::Arc;

use ariadne::api::auth::{StaticToken, token_source_from_settings};
use ariadne::api::{PaperApiClient, TokenSource};
use ariadne::graph_utils::graph::{EdgeKind, NodeRole, build_graph_model};
use ariadne::persistence::settings::AppSettings;
use ariadne::upload::{SUCCESS_TEXT, SelectedFile, submit_upload};
use clap::{Arg, ArgMatches, Command};

fn cli() -> Command {
    Command::new("ariadne-cli")
        .about("Query the paper backend: feed, paper details, t-SNE map and uploads")
        .arg(Arg::new("base_url").long("base-url").value_name("URL").global(true).help("Backend base URL (overrides settings and ARIADNE_API_URL)"))
        .arg(Arg::new("token").long("token").value_name("TOKEN").global(true).help("Bearer token to send"))
        .subcommand_required(true)
        .subcommand(
            Command::new("feed")
                .about("List For You papers")
                .arg(Arg::new("count").short('n').long("count").value_parser(clap::value_parser!(usize)).help("Page size")),
        )
        .subcommand(Command::new("paper").about("Show one paper").arg(Arg::new("id").required(true)))
        .subcommand(Command::new("layout").about("Fetch the t-SNE map and summarise the graph built from it"))
        .subcommand(Command::new("upload").about("Upload a PDF").arg(Arg::new("path").required(true).value_parser(clap::value_parser!(PathBuf))))
        .subcommand(Command::new("click").about("Record a paper visit").arg(Arg::new("mag_id").required(true)))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let matches = cli().get_matches();

    let mut settings = AppSettings::load_stored();
    settings.apply_env();
    if let Some(url) = matches.get_one::<String>("base_url") {
        settings.api_base_url = url.clone();
    }
    let tokens: Arc<dyn TokenSource> = match matches.get_one::<String>("token") {
        Some(t) => Arc::new(StaticToken(t.clone())),
        None => token_source_from_settings(&settings),
    };
    let api = PaperApiClient::new(&settings.api_base_url, settings.request_timeout())?;

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    rt.block_on(run(&matches, &settings, &api, tokens.as_ref()))
}

async fn run(matches: &ArgMatches, settings: &AppSettings, api: &PaperApiClient, tokens: &dyn TokenSource) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("feed", sub)) => {
            let count = sub.get_one::<usize>("count").copied().unwrap_or(settings.feed_count);
            let page = api.fetch_feed(count).await?;
            for p in &page.papers {
                println!("{}\t{}", p.id, p.title);
            }
            eprintln!("{} papers", page.count);
        }
        Some(("paper", sub)) => {
            let id = sub.get_one::<String>("id").unwrap();
            match api.fetch_paper_detail(id).await {
                Ok(d) => {
                    println!("{}", d.title.as_deref().unwrap_or("—"));
                    if let Some(link) = &d.external_link_url {
                        println!("{}", link);
                    }
                    println!();
                    println!("{}", d.abstract_text.as_deref().unwrap_or("—"));
                }
                Err(e) if e.is_not_found() => anyhow::bail!("Paper not found: {}", id),
                Err(e) => return Err(e.into()),
            }
        }
        Some(("layout", _)) => {
            let token = tokens.try_get_token().await;
            let layout = api.fetch_tsne_coordinates(token.as_deref()).await?;
            let model = build_graph_model(&layout.history, &layout.recommendations);
            println!(
                "{} nodes ({} history, {} recommendations), {} path edges, {} recommendation edges",
                model.node_count(),
                model.nodes_with_role(NodeRole::History).count() + model.nodes_with_role(NodeRole::Current).count(),
                model.nodes_with_role(NodeRole::Recommendation).count(),
                model.edges_of_kind(EdgeKind::Path).count(),
                model.edges_of_kind(EdgeKind::Recommendation).count(),
            );
            if let Some(current) = model.current() {
                println!("current: {} {}", current.id, current.hover_title().unwrap_or(""));
            }
        }
        Some(("upload", sub)) => {
            let path = sub.get_one::<PathBuf>("path").unwrap();
            let file = SelectedFile::from_path(path)?;
            submit_upload(api, tokens, file).await?;
            println!("{}", SUCCESS_TEXT);
        }
        Some(("click", sub)) => {
            let mag_id = sub.get_one::<String>("mag_id").unwrap();
            let token = tokens.try_get_token().await;
            if token.is_none() {
                anyhow::bail!("recording a visit needs a bearer token (--token or ARIADNE_API_TOKEN)");
            }
            let outcome = api.register_click(mag_id, token.as_deref()).await?;
            if outcome.ok {
                println!("history: {}", outcome.history.join(", "));
            } else {
                println!("not recorded: {}", outcome.error.unwrap_or_default());
            }
        }
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}
