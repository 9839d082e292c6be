use crate::Result;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use typed_builder::TypedBuilder;

const POSTGRES_PORT: u16 = 5432;
const READY_MESSAGE: &str = "database system is ready to accept connections";

/// Credentials and database name the container is initialised with.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PostgresConfig {
    #[builder(default = "16-alpine".to_string())]
    tag: String,
    #[builder(default = "cloak".to_string())]
    database: String,
    #[builder(default = "cloak".to_string())]
    username: String,
    #[builder(default = "cloak".to_string())]
    password: String,
}

/// Disposable PostgreSQL server, removed when dropped.
pub struct PostgresServer {
    _container: ContainerAsync<GenericImage>,
    database_url: String,
}

impl PostgresServer {
    /// Starts the container and resolves its mapped connection URL.
    ///
    /// The image restarts once after running its init scripts, so callers
    /// should still retry their first connection.
    pub async fn start(config: PostgresConfig) -> Result<Self> {
        let container = GenericImage::new("postgres", config.tag.as_str())
            .with_exposed_port(POSTGRES_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr(READY_MESSAGE))
            .with_env_var("POSTGRES_DB", config.database.as_str())
            .with_env_var("POSTGRES_USER", config.username.as_str())
            .with_env_var("POSTGRES_PASSWORD", config.password.as_str())
            .start()
            .await?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(POSTGRES_PORT).await?;
        let database_url = format!(
            "postgres://{}:{}@{host}:{port}/{}",
            config.username, config.password, config.database
        );

        Ok(Self {
            _container: container,
            database_url,
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}
