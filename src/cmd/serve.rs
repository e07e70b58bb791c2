//! Hub server command: `podspace serve`.

use anyhow::Result;
use std::path::PathBuf;

use podspace::config::HubConfig;
use podspace::hub::server::{ServerConfig, start_server};

pub async fn cmd_serve(
    config: HubConfig,
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
    open: bool,
) -> Result<()> {
    let mut server = ServerConfig::from(config);
    if let Some(port) = port {
        server.port = port;
    }
    if let Some(db_path) = db_path {
        server.db_path = db_path;
    }
    server.dev_mode |= dev;

    if open {
        let url = format!("http://localhost:{}/health", server.port);
        tokio::spawn(async move {
            // Small delay to let the server start binding
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
            if let Err(e) = open::that(&url) {
                eprintln!("Failed to open browser: {}", e);
            }
        });
    }

    start_server(server).await
}
