use super::*;
use crate::matching::Strategy;
use std::fs;
use tempfile::TempDir;

mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");

        let original_config = Config {
            retrieval: RetrievalConfig {
                enabled: true,
                provider: EmbeddingProvider::Ollama,
                strategy: Strategy::Keyword,
                max_docs: 7,
            },
            ollama: OllamaConfig {
                protocol: "https".to_string(),
                host: "test-host".to_string(),
                port: 8080,
                model: "test-model".to_string(),
                embedding_dimension: 1024,
            },
            openai: OpenAiConfig::default(),
            base_dir: temp_dir.path().to_path_buf(),
        };

        original_config.save().expect("should save config");

        let content = fs::read_to_string(temp_dir.path().join("config.toml"))
            .expect("should read from config_path successfully");
        let mut loaded_config: Config =
            toml::from_str(&content).expect("should parse toml correctly");
        loaded_config.base_dir = temp_dir.path().to_path_buf();

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [ollama
            host = "localhost"
            port = "invalid_port"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn empty_host_is_invalid() {
        let config = Config {
            ollama: OllamaConfig {
                host: String::new(),
                port: 80,
                ..OllamaConfig::default()
            },
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn port_boundary_validation() {
        let mut config = OllamaConfig::default();

        assert!(config.set_port(1).is_ok());
        assert!(config.set_port(65535).is_ok());
        assert!(config.set_port(0).is_err());
    }

    #[test]
    fn ollama_url_generation_with_different_hosts() {
        let configs = vec![
            ("http", "localhost", 11434, "http://localhost:11434/"),
            ("http", "127.0.0.1", 8080, "http://127.0.0.1:8080/"),
            ("http", "example.com", 3000, "http://example.com:3000/"),
            (
                "https",
                "secure.example.com",
                443,
                "https://secure.example.com/",
            ),
        ];

        for (protocol, host, port, expected_url) in configs {
            let config = OllamaConfig {
                protocol: protocol.to_string(),
                host: host.to_string(),
                port,
                ..OllamaConfig::default()
            };

            let url = config.ollama_url().expect("ollama_url is ok");
            assert_eq!(url.as_str(), expected_url);
        }
    }

    #[test]
    fn model_name_validation() {
        let mut config = OllamaConfig::default();

        assert!(config.set_model("valid-model".to_string()).is_ok());
        assert!(config.set_model("another_model".to_string()).is_ok());
        assert!(config.set_model(String::new()).is_err());
        assert!(config.set_model("   ".to_string()).is_err());
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidProtocol("ftp".to_string()),
            ConfigError::InvalidPort(0),
            ConfigError::InvalidMaxDocs(0),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::InvalidApiKey,
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(message.len() > 10);
        }
    }

    #[test]
    fn config_error_converts_to_crate_error() {
        let error: crate::PleaseError = ConfigError::InvalidMaxDocs(99).into();
        assert!(matches!(error, crate::PleaseError::Config(_)));
        assert!(error.to_string().contains("99"));
    }
}
