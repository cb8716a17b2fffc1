#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Api(#[from] log_api_server::ApiServerError),

    #[error("{0}")]
    Client(#[from] log_client::ClientError),

    #[error("api task: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
