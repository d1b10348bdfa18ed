
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};
use std::path::Path;

use super::settings::{MAX_DOCS_LIMIT, OPENAI_KEY_ENV_VAR};
use super::{Config, ConfigError, EmbeddingProvider, OllamaConfig, OpenAiConfig};
use crate::embeddings::ollama::OllamaEmbedder;
use crate::matching::Strategy;

const PROVIDERS: [EmbeddingProvider; 3] = [
    EmbeddingProvider::None,
    EmbeddingProvider::Ollama,
    EmbeddingProvider::OpenAi,
];

const STRATEGIES: [Strategy; 3] = [Strategy::Keyword, Strategy::Semantic, Strategy::Hybrid];

#[inline]
pub fn run_interactive_config(base_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 please Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(base_dir)?;

    eprintln!("{}", style("Retrieval").bold().yellow());
    eprintln!("Choose how relevant command docs are found for a request.");
    eprintln!();

    configure_retrieval(&mut config)?;

    match config.retrieval.provider {
        EmbeddingProvider::None => {}
        EmbeddingProvider::Ollama => {
            eprintln!();
            eprintln!("{}", style("Ollama Configuration").bold().yellow());
            configure_ollama(&mut config.ollama)?;

            eprintln!();
            eprintln!("{}", style("Testing configuration...").yellow());
            if test_ollama_connection(&config.ollama) {
                eprintln!("{}", style("✓ Ollama connection successful!").green());
            } else {
                eprintln!(
                    "{}",
                    style("⚠ Warning: Could not connect to Ollama").yellow()
                );
                eprintln!("You can continue, but make sure Ollama is running before indexing.");
            }
        }
        EmbeddingProvider::OpenAi => {
            eprintln!();
            eprintln!("{}", style("OpenAI Configuration").bold().yellow());
            configure_openai(&mut config.openai)?;
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
        if config.embeddings_enabled() {
            eprintln!("Run `please index` to build the semantic index.");
        }
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Enabled: {}", style(config.retrieval.enabled).cyan());
    eprintln!("  Provider: {}", style(config.retrieval.provider).cyan());
    eprintln!("  Strategy: {}", style(config.retrieval.strategy).cyan());
    eprintln!("  Max Docs: {}", style(config.retrieval.max_docs).cyan());

    eprintln!();
    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama.ollama_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!(
        "  Embedding Dimension: {}",
        style(config.ollama.embedding_dimension).cyan()
    );

    eprintln!();
    eprintln!("{}", style("OpenAI Settings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.openai.base_url).cyan());
    eprintln!("  Model: {}", style(&config.openai.model).cyan());
    eprintln!("  API Key: {}", style(api_key_status(&config.openai)).cyan());

    eprintln!();
    eprintln!(
        "Commands directory: {}",
        style(config.commands_dir().display()).dim()
    );
    eprintln!(
        "Embeddings cache: {}",
        style(config.embeddings_db_path().display()).dim()
    );
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn api_key_status(openai: &OpenAiConfig) -> String {
    let from_env = std::env::var(OPENAI_KEY_ENV_VAR).is_ok_and(|k| !k.trim().is_empty());
    match (from_env, openai.masked_api_key()) {
        (true, _) => format!("from {}", OPENAI_KEY_ENV_VAR),
        (false, Some(masked)) => masked,
        (false, None) => "not set".to_string(),
    }
}

fn load_existing_config(base_dir: &Path) -> Result<Config> {
    if !base_dir.join(super::settings::CONFIG_FILE_NAME).exists() {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        return Ok(Config::with_base_dir(base_dir));
    }

    Config::load(base_dir).map_or_else(
        |e| {
            eprintln!(
                "{}",
                style(format!("Existing configuration is invalid ({e:#}). Using defaults."))
                    .yellow()
            );
            Ok(Config::with_base_dir(base_dir))
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    config.retrieval.enabled = Confirm::new()
        .with_prompt("Enable documentation retrieval?")
        .default(config.retrieval.enabled)
        .interact()?;

    let provider_index = Select::new()
        .with_prompt("Embedding provider (none = keyword matching only)")
        .default(
            PROVIDERS
                .iter()
                .position(|&p| p == config.retrieval.provider)
                .unwrap_or(0),
        )
        .items(&PROVIDERS)
        .interact()?;
    config.retrieval.provider = PROVIDERS[provider_index];

    let strategy_index = Select::new()
        .with_prompt("Matching strategy")
        .default(
            STRATEGIES
                .iter()
                .position(|&s| s == config.retrieval.strategy)
                .unwrap_or(2),
        )
        .items(&STRATEGIES)
        .interact()?;
    config.retrieval.strategy = STRATEGIES[strategy_index];

    let max_docs: usize = Input::new()
        .with_prompt("Maximum docs per request")
        .default(config.retrieval.max_docs)
        .validate_with(|input: &usize| -> Result<(), String> {
            if (1..=MAX_DOCS_LIMIT).contains(input) {
                Ok(())
            } else {
                Err(format!("Must be between 1 and {}", MAX_DOCS_LIMIT))
            }
        })
        .interact_text()?;
    config.retrieval.set_max_docs(max_docs)?;

    Ok(())
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.ollama_url()?;
            Ok(())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(ollama.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_embedding_dimension(embedding_dimension)?;

    Ok(())
}

fn configure_openai(openai: &mut OpenAiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(openai.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OpenAiConfig {
                base_url: input.clone(),
                ..OpenAiConfig::default()
            };
            temp_config.api_url()?;
            Ok(())
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(openai.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    openai.set_base_url(base_url)?;
    openai.set_model(model)?;

    let store_key = Confirm::new()
        .with_prompt(format!(
            "Store an API key in the config file? (otherwise {} is used)",
            OPENAI_KEY_ENV_VAR
        ))
        .default(openai.api_key.is_some())
        .interact()?;

    if store_key {
        let api_key = Password::new()
            .with_prompt("OpenAI API key")
            .validate_with(|input: &String| -> Result<(), &str> {
                if input.trim().is_empty() {
                    Err("API key cannot be empty")
                } else {
                    Ok(())
                }
            })
            .interact()?;
        openai.set_api_key(Some(api_key))?;
    } else {
        openai.set_api_key(None)?;
    }

    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    OllamaEmbedder::new(ollama)
        .map(|client| client.with_retry_attempts(1))
        .and_then(|client| client.ping())
        .unwrap_or(false)
}
