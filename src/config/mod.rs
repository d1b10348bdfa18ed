// Configuration management module
// TOML settings under the application directory plus the interactive wizard

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbeddingProvider, OllamaConfig, OpenAiConfig, RetrievalConfig,
};

