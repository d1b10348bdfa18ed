use clap::{Parser, Subcommand};
use please::Result;
use please::commands::{index, list, search, show_status};
use please::config::{Config, run_interactive_config, show_config};
use please::matching::Strategy;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "please")]
#[command(about = "Find the command docs relevant to a natural-language request")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure retrieval and embedding providers
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load command docs and build the embeddings cache
    Index {
        /// Re-embed everything even if the cache is valid
        #[arg(long)]
        force: bool,
    },
    /// List all loadable command docs
    List,
    /// Show the command docs relevant to a request
    Search {
        /// Natural-language request
        query: String,
        /// Maximum number of docs to return
        #[arg(long)]
        max: Option<usize>,
        /// Override the configured retrieval strategy
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,
    },
    /// Show retrieval configuration and cache health
    Status,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("please=debug")
    } else {
        EnvFilter::from_default_env()
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&Config::load_default()?)?;
            } else {
                run_interactive_config(&Config::default_base_dir()?)?;
            }
        }
        Commands::Index { force } => {
            index(&Config::load_default()?, force).await?;
        }
        Commands::List => {
            list(&Config::load_default()?)?;
        }
        Commands::Search {
            query,
            max,
            strategy,
        } => {
            search(&Config::load_default()?, &query, max, strategy).await?;
        }
        Commands::Status => {
            show_status(&Config::load_default()?).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["please", "list"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::List));
            assert!(!parsed.debug);
        }
    }

    #[test]
    fn index_force_flag() {
        let cli = Cli::try_parse_from(["please", "index", "--force"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Index { force: true }));
        }
    }

    #[test]
    fn search_with_options() {
        let cli = Cli::try_parse_from([
            "please",
            "search",
            "show me all pods",
            "--max",
            "5",
            "--strategy",
            "semantic",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search {
                query,
                max,
                strategy,
            } = parsed.command
            {
                assert_eq!(query, "show me all pods");
                assert_eq!(max, Some(5));
                assert_eq!(strategy, Some(Strategy::Semantic));
            }
        }
    }

    #[test]
    fn search_defaults() {
        let cli = Cli::try_parse_from(["please", "search", "free disk space"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search { max, strategy, .. } = parsed.command {
                assert_eq!(max, None);
                assert_eq!(strategy, None);
            }
        }
    }

    #[test]
    fn invalid_strategy() {
        let cli = Cli::try_parse_from(["please", "search", "pods", "--strategy", "fuzzy"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidValue);
        }
    }

    #[test]
    fn debug_flag_is_global() {
        let cli = Cli::try_parse_from(["please", "status", "--debug"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(parsed.debug);
            assert!(matches!(parsed.command, Commands::Status));
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["please", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["please", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["please", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
