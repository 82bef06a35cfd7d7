//! LSP Backend implementation

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::config::Config;
use crate::document::Document;
use crate::parser::complete::{complete, CompletionKind};
use crate::parser::hover::hover;
use crate::parser::{parse, WorkflowDocument};
use crate::position::LineIndex;
use crate::schema::{workflow_schema, EditContextProviderFactory, NodeDesc};

/// The LSP backend that handles all language server requests
pub struct Backend {
    /// The LSP client for sending notifications
    client: Client,
    /// Map of document URIs to their state
    documents: Arc<RwLock<HashMap<Url, Document>>>,
    /// Workflow schema, shared by every document
    schema: Arc<NodeDesc>,
    /// Replaced once the client's configuration is known
    factory: RwLock<Arc<EditContextProviderFactory>>,
}

impl Backend {
    /// Create a new backend instance
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(RwLock::new(HashMap::new())),
            schema: Arc::new(workflow_schema()),
            factory: RwLock::new(Arc::new(EditContextProviderFactory::default())),
        }
    }

    /// Analyze a document, store it and publish its diagnostics
    async fn validate_document(&self, uri: Url, text: String, version: i32) {
        let parsed = self.analyze(uri.as_str(), &text).await;
        let line_index = LineIndex::new(&text);
        let diagnostics = parsed
            .diagnostics
            .iter()
            .map(|diagnostic| diagnostic.to_lsp(&line_index))
            .collect();

        {
            let mut docs = self.documents.write().await;
            docs.insert(uri.clone(), Document::new(text, version, parsed));
        }

        self.client
            .publish_diagnostics(uri, diagnostics, Some(version))
            .await;
    }

    async fn analyze(&self, filename: &str, text: &str) -> WorkflowDocument {
        let factory = Arc::clone(&*self.factory.read().await);
        parse(filename, text, &self.schema, &*factory).await
    }
}

fn completion_item_kind(kind: CompletionKind) -> CompletionItemKind {
    match kind {
        CompletionKind::Key => CompletionItemKind::PROPERTY,
        CompletionKind::Value => CompletionItemKind::ENUM_MEMBER,
        CompletionKind::Context => CompletionItemKind::MODULE,
        CompletionKind::Function => CompletionItemKind::FUNCTION,
        CompletionKind::Property => CompletionItemKind::FIELD,
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let config = Config::from_options(params.initialization_options);
        tracing::debug!("Configuration: {:?}", config);
        *self.factory.write().await = Arc::new(EditContextProviderFactory::new(config.context()));

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![".".to_string(), " ".to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "actions-workflow-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("Server initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("Server shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document opened: {}", uri);

        self.validate_document(uri, params.text_document.text, params.text_document.version)
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // Get the full text from the changes (we use FULL sync)
        if let Some(change) = params.content_changes.into_iter().next() {
            tracing::debug!("Document changed: {}", uri);
            self.validate_document(uri, change.text, version).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        tracing::debug!("Document saved: {}", params.text_document.uri);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document closed: {}", uri);

        // Remove document from our state
        {
            let mut docs = self.documents.write().await;
            docs.remove(&uri);
        }

        // Clear diagnostics for this document
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params;
        let docs = self.documents.read().await;
        let Some(doc) = docs.get(&position.text_document.uri) else {
            return Ok(None);
        };

        let offset = doc.line_index.offset(position.position);
        let text = hover(&doc.parsed, offset).await;
        Ok(text.map(|value| Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value,
            }),
            range: None,
        }))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position = params.text_document_position;
        let factory = Arc::clone(&*self.factory.read().await);
        let docs = self.documents.read().await;
        let Some(doc) = docs.get(&position.text_document.uri) else {
            return Ok(None);
        };

        let offset = doc.line_index.offset(position.position);
        let items: Vec<CompletionItem> = complete(&doc.parsed, offset, &*factory)
            .await
            .into_iter()
            .map(|completion| CompletionItem {
                label: completion.label,
                kind: Some(completion_item_kind(completion.kind)),
                detail: completion.description,
                ..Default::default()
            })
            .collect();

        tracing::debug!("{} completion items at offset {}", items.len(), offset);
        Ok(Some(CompletionResponse::Array(items)))
    }
}
