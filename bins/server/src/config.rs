use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "commitlog-server", about = "In-memory append-only commit log")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить сервер
    Serve(ServeArgs),
    /// Добавить одно значение, напечатать позицию
    Produce(ProduceArgs),
    /// Прочитать запись по позиции
    Consume(ConsumeArgs),
    /// Добавить несколько значений одним стримом
    ProduceStream(ProduceStreamArgs),
    /// Читать лог с позиции и ждать новые записи (Ctrl+C для выхода)
    ConsumeStream(ConsumeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, env = "CONFIG_PATH")]
    pub config: Option<String>,
    /// Хост для клиентских соединений (перекрывает конфиг)
    #[arg(long, env = "RPC_HOST")]
    pub host: Option<String>,
    /// Порт для клиентских соединений (перекрывает конфиг)
    #[arg(long, env = "RPC_PORT")]
    pub port: Option<u16>,
}

#[derive(Args, Clone, Debug)]
pub struct ClientArgs {
    /// Адрес сервиса
    #[arg(long, default_value = "127.0.0.1:8400", env = "LOG_ADDR")]
    pub addr: String,
}

#[derive(Args, Clone, Debug)]
pub struct ProduceArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    #[arg(long)]
    pub value: String,
}

#[derive(Args, Clone, Debug)]
pub struct ConsumeArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    #[arg(long, default_value_t = 0)]
    pub position: u64,
}

#[derive(Args, Clone, Debug)]
pub struct ProduceStreamArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    /// Можно указать несколько раз
    #[arg(long = "value", required = true)]
    pub values: Vec<String>,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Сколько ждать завершения открытых запросов при shutdown.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8400
}
fn default_drain_timeout_secs() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| ServerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Конфиг из файла (если указан), флаги CLI поверх.
    pub fn resolve(args: &ServeArgs) -> Result<Self, ServerError> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(host) = &args.host {
            config.host = host.clone();
        }
        if let Some(port) = args.port {
            config.port = port;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ServeArgs {
        ServeArgs {
            config: None,
            host: None,
            port: None,
        }
    }

    #[test]
    fn empty_toml_uses_defaults() {
        assert_eq!(ServerConfig::parse("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = ServerConfig::parse("host = \"0.0.0.0\"\nport = 9000\n").unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.drain_timeout_secs, 5);
    }

    #[test]
    fn flags_override_config() {
        let config = ServerConfig::resolve(&ServeArgs {
            port: Some(1234),
            ..args()
        })
        .unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 1234);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = ServerConfig::resolve(&ServeArgs {
            config: Some("/nonexistent/commitlog.toml".into()),
            ..args()
        })
        .unwrap_err();
        assert!(matches!(err, ServerError::Config { context: "read", .. }));
    }

    #[test]
    fn cli_parses_repeated_values() {
        let cli = Cli::try_parse_from([
            "commitlog-server",
            "produce-stream",
            "--value",
            "a",
            "--value",
            "b",
        ])
        .unwrap();
        match cli.command {
            Commands::ProduceStream(args) => {
                assert_eq!(args.values, vec!["a", "b"]);
                assert_eq!(args.client.addr, "127.0.0.1:8400");
            }
            _ => panic!("expected produce-stream"),
        }
    }
}
