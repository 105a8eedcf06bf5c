//! Interactive chat with a document-grounded assistant.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a backend on localhost:8000, keeping sessions in ~/.ragchat
//! ragchat-chat
//!
//! # Another backend, authenticated, with sessions kept by the backend
//! ragchat-chat --api-url https://rag.example.com --token "$TOKEN" --store remote
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `warn`).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ragchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, StoreKind, StreamPrinter,
    help_text, parse_command,
};
use ragchat::render::{document_summary, session_summary};
use ragchat::{
    ChatClient, ChatTransport, Conversation, CreateSessionRequest, Credential, DocumentRef,
    LocalSessionStore, RemoteSessionStore, SendOutcome, SessionContext, SessionReconciler,
    SessionStore,
};

/// Everything the REPL needs besides the conversation itself.
struct App {
    config: ChatConfig,
    client: ChatClient,
    credential: Option<Credential>,
    reconciler: Arc<SessionReconciler>,
    renderer: PlainTextRenderer,
}

impl App {
    /// Mint a session id, asking the backend for one when it owns history.
    async fn new_session_id(&self, document: Option<&DocumentRef>) -> ragchat::Result<String> {
        match self.config.store {
            StoreKind::Local => Ok(match document {
                Some(document) => self.reconciler.start_with_document(document.clone()),
                None => ragchat::utils::generate_id(),
            }),
            StoreKind::Remote => {
                let request = match document {
                    Some(document) => CreateSessionRequest::for_document(document),
                    None => CreateSessionRequest::default(),
                };
                let created = self
                    .client
                    .create_session(&request, self.credential.as_ref())
                    .await?;
                if let Some(document) = document {
                    self.reconciler.contexts().insert(
                        created.session_id.clone(),
                        SessionContext::for_document(document.clone()),
                    );
                }
                Ok(created.session_id)
            }
        }
    }

    fn show(&mut self, conversation: &Conversation) {
        self.renderer.print_title(conversation.title());
        for turn in conversation.turns() {
            let line = format!("{}: {}", turn.role, turn.content);
            self.renderer.print_info(&line);
        }
    }

    fn show_details(&mut self, conversation: &Conversation) {
        let session = conversation.session();
        let mut lines = vec![
            format!("Session: {}", session.id),
            format!("Title: {}", conversation.title()),
            format!("Origin: {}", conversation.origin()),
            format!("Turns: {}", session.turns.len()),
        ];
        if let Some(document) = &session.document {
            lines.push(format!("Document: {} ({})", document.name, document.id));
        }
        for line in lines {
            self.renderer.print_info(&line);
        }
    }

    async fn handle(&mut self, command: ChatCommand, conversation: &mut Conversation) -> bool {
        match command {
            ChatCommand::Quit => return false,
            ChatCommand::Help => self.renderer.print_help(help_text()),
            ChatCommand::New => match self.new_session_id(None).await {
                Ok(id) => self.switch(conversation, Some(&id)).await,
                Err(err) => self.renderer.print_error(&format!("Could not start a session: {err}")),
            },
            ChatCommand::History => match self.reconciler.history().await {
                Ok(sessions) if sessions.is_empty() => self.renderer.print_info("No saved sessions."),
                Ok(sessions) => {
                    let current = conversation.session().id.clone();
                    for session in sessions {
                        let marker = if session.id == current { "*" } else { " " };
                        let line = format!("{marker} {}", session_summary(&session));
                        self.renderer.print_info(&line);
                    }
                }
                Err(err) => self.renderer.print_error(&format!("Could not list sessions: {err}")),
            },
            ChatCommand::Open(id) => self.switch(conversation, Some(&id)).await,
            ChatCommand::Delete(id) => match self.reconciler.delete(&id).await {
                Ok(()) => {
                    self.renderer.print_info(&format!("Deleted {id}."));
                    if conversation.session().id == id {
                        self.switch(conversation, None).await;
                    }
                }
                Err(err) => self.renderer.print_error(&format!("Could not delete {id}: {err}")),
            },
            ChatCommand::ClearHistory => match self.reconciler.clear_history().await {
                Ok(()) => {
                    self.renderer.print_info("History cleared.");
                    self.switch(conversation, None).await;
                }
                Err(err) => self.renderer.print_error(&format!("Could not clear history: {err}")),
            },
            ChatCommand::Documents => {
                match self.client.documents(self.credential.as_ref()).await {
                    Ok(documents) if documents.is_empty() => {
                        self.renderer.print_info("No documents have been uploaded.")
                    }
                    Ok(documents) => {
                        for document in documents {
                            self.renderer.print_info(&document_summary(&document));
                        }
                    }
                    Err(err) => self
                        .renderer
                        .print_error(&format!("Could not list documents: {err}")),
                }
            }
            ChatCommand::Document(name) => {
                let document = match self.client.document(&name, self.credential.as_ref()).await {
                    Ok(document) => document.to_ref(),
                    Err(err) => {
                        self.renderer.print_error(&format!("Unknown document {name}: {err}"));
                        return true;
                    }
                };
                match self.new_session_id(Some(&document)).await {
                    Ok(id) => self.switch(conversation, Some(&id)).await,
                    Err(err) => self
                        .renderer
                        .print_error(&format!("Could not start a session: {err}")),
                }
            }
            ChatCommand::Session => self.show_details(conversation),
            ChatCommand::Invalid(message) => self.renderer.print_error(&message),
        }
        true
    }

    async fn switch(&mut self, conversation: &mut Conversation, session_id: Option<&str>) {
        match conversation.switch_to(session_id).await {
            Ok(()) => self.show(conversation),
            Err(err) => self.renderer.print_error(&err.to_string()),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Main entry point for the ragchat-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("ragchat-chat [OPTIONS]");
    init_tracing();
    let config = ChatConfig::from_args(args)?;

    let credential = config.credential();
    let client = ChatClient::with_options(&config.api_url, Some(config.timeout))?;
    let store: Arc<dyn SessionStore> = match config.store {
        StoreKind::Local => Arc::new(LocalSessionStore::open(&config.data_dir).await?),
        StoreKind::Remote => Arc::new(RemoteSessionStore::new(
            client.clone(),
            credential.clone(),
        )),
    };
    let reconciler = Arc::new(SessionReconciler::new(store));
    let transport: Arc<dyn ChatTransport> = Arc::new(client.clone());
    let mut app = App {
        renderer: PlainTextRenderer::with_color(config.use_color),
        config,
        client,
        credential,
        reconciler: reconciler.clone(),
    };

    let latest = match reconciler.latest().await {
        Ok(latest) => latest,
        Err(err) => {
            app.renderer
                .print_error(&format!("Could not load history: {err}"));
            None
        }
    };
    let mut conversation = Conversation::open(
        transport,
        reconciler,
        latest.as_deref(),
        app.config.conversation_options(),
    )
    .await;

    let mut rl = DefaultEditor::new()?;

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("ragchat ({})", app.config.api_url);
    println!("Type /help for commands, /quit to exit\n");
    app.show(&conversation);

    loop {
        interrupted.store(false, Ordering::Relaxed);

        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(command) = parse_command(line) {
                    if !app.handle(command, &mut conversation).await {
                        println!("Goodbye!");
                        break;
                    }
                    continue;
                }

                println!("Assistant:");
                let credential = app.credential.clone();
                let mut printer = StreamPrinter::new(&mut app.renderer);
                let result = conversation
                    .send(line, credential.as_ref(), &mut printer, &interrupted)
                    .await;
                match result {
                    Ok(SendOutcome::Abandoned) => app.renderer.print_interrupted(),
                    Ok(SendOutcome::Answered(_)) | Ok(SendOutcome::Rejected) => {}
                    // Already shown through the printer.
                    Err(_) => {}
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                app.renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}
