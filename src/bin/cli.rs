use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use searchbox::models::Pager;
use searchbox::proxy::MemoryStateSink;
use searchbox::{Channel, Config, NodeBackend, Query, SearchProxy};

#[derive(Parser)]
#[command(name = "searchbox-cli")]
#[command(about = "Drive the search backend from the terminal", long_about = None)]
#[command(after_help = "Configuration is read from config/default.toml, the file named by \
SEARCHBOX_CONFIG and SEARCHBOX_-prefixed environment variables, in that order.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search
    Search {
        /// Free-text query
        #[arg(short, long)]
        text: Option<String>,

        /// Taxonomy selection as field:term; repeatable
        #[arg(short = 'f', long = "filter")]
        filters: Vec<String>,

        /// Boolean facet to enable; repeatable
        #[arg(short = 'b', long = "flag")]
        flags: Vec<String>,

        #[arg(short, long, default_value = "0")]
        page: u32,

        #[arg(short = 's', long, default_value = "20")]
        size: u32,

        /// Print the published state fragment alongside the results
        #[arg(long)]
        show_state: bool,
    },

    /// Fetch facet counts for the whole corpus
    Filters,

    /// Complete a text prefix
    Autocomplete {
        #[arg(value_name = "PREFIX")]
        prefix: String,
    },

    /// Decode a state fragment without touching the backend
    Decode {
        #[arg(value_name = "FRAGMENT")]
        fragment: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "searchbox=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Search {
            text,
            filters,
            flags,
            page,
            size,
            show_state,
        } => {
            let mut query = Query {
                text,
                ..Query::default()
            };
            for selection in &filters {
                let Some((field, term)) = selection.split_once(':') else {
                    anyhow::bail!("--filter expects field:term, got '{selection}'");
                };
                query.filters.select_term(field, term);
            }
            for field in flags {
                query.filters.set_boolean(field, true);
            }
            query.pager = Some(Pager::new(page, size));

            let sink = Arc::new(MemoryStateSink::new());
            let proxy = build_proxy(&config, Arc::clone(&sink))?;
            let results = proxy.search(&query).await?;

            if show_state {
                if let Some(fragment) = sink.last() {
                    eprintln!("state: {fragment}");
                }
            }
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        Commands::Filters => {
            let proxy = build_proxy(&config, Arc::new(MemoryStateSink::new()))?;
            let filters = proxy.get_filters().await?;
            println!("{}", serde_json::to_string_pretty(&filters)?);
        }

        Commands::Autocomplete { prefix } => {
            let proxy = build_proxy(&config, Arc::new(MemoryStateSink::new()))?;
            let suggestions = proxy.autocomplete(&prefix).await?;
            println!("{}", serde_json::to_string_pretty(&suggestions)?);
        }

        Commands::Decode { fragment } => {
            let (query, warnings) = searchbox::codec::decode(&fragment);
            let state = searchbox::proxy::SearchState {
                query,
                filters: searchbox::aggregations::raw_filters(&config.provider.filters),
                warnings,
            };
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }

    Ok(())
}

fn build_proxy(config: &Config, sink: Arc<MemoryStateSink>) -> anyhow::Result<SearchProxy> {
    let channel = Channel::new(config.channel.clone())?;
    let backend = Arc::new(NodeBackend::new(Arc::new(channel)));
    Ok(SearchProxy::new(
        Arc::new(config.provider.clone()),
        backend,
        sink,
    ))
}
