use crate::error::CliError;
use connectors::sql::postgres::utils::{connect_client, parse_config, ping};
use tracing::{error, info};

/// Checks a Postgres server is reachable with the given URL.
pub struct PostgresConnectionPinger<'a> {
    pub conn_str: &'a str,
}

impl PostgresConnectionPinger<'_> {
    pub async fn ping(&self) -> Result<(), CliError> {
        let config = parse_config(self.conn_str)?;
        let target = describe(&config);
        info!("Pinging Postgres at {target}");

        let client = connect_client(&config).await.map_err(|e| {
            error!("Postgres connection to {target} failed: {e}");
            e
        })?;
        ping(&client).await.map_err(|e| {
            error!("Postgres ping query on {target} failed: {e}");
            e
        })?;

        info!("Postgres ping to {target} succeeded");
        Ok(())
    }
}

/// Host and database of a connection, without credentials.
fn describe(config: &tokio_postgres::Config) -> String {
    let host = match config.get_hosts().first() {
        Some(tokio_postgres::config::Host::Tcp(host)) => host.clone(),
        #[cfg(unix)]
        Some(tokio_postgres::config::Host::Unix(path)) => path.display().to_string(),
        None => "localhost".to_string(),
    };
    format!("'{}/{}'", host, config.get_dbname().unwrap_or_default())
}
