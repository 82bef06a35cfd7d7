//! actions-workflow-lsp: LSP server for GitHub Actions workflow files

use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

use actions_workflow_lsp::Backend;

#[tokio::main]
async fn main() {
    // Initialize logging; stdout carries the LSP transport
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting actions-workflow-lsp server");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
