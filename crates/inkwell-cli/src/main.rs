//! `inkwell`: command-line client for the Inkwell API.
//!
//! # Usage
//!
//! ```
//! inkwell --url http://localhost:8080 --email ada@example.com --password secret docs list
//! inkwell --config ~/.config/inkwell/config.toml chat <document-id> "tighten the intro"
//! ```

mod client;
mod session;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use inkwell_api::chat::ChatRequest;
use inkwell_core::document::Document;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "inkwell", about = "Command-line client for the Inkwell document workspace")]
struct Args {
  /// Path to a TOML config file (url, email, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the Inkwell server (default: http://localhost:8080).
  #[arg(long, env = "INKWELL_URL")]
  url: Option<String>,

  /// Account email.
  #[arg(long, env = "INKWELL_EMAIL")]
  email: Option<String>,

  /// Account password (plaintext).
  #[arg(long, env = "INKWELL_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create an account with the configured email and password.
  Register {
    #[arg(long)]
    name: String,
  },
  /// Show the signed-in user.
  Whoami,
  #[command(subcommand)]
  Docs(DocsCommand),
  #[command(subcommand)]
  Knowledge(KnowledgeCommand),
  #[command(subcommand)]
  Messages(MessagesCommand),
  /// Ask the assistant about a document.
  Chat {
    document: Uuid,
    #[arg(required = true, num_args = 1..)]
    message:  Vec<String>,
  },
  /// Show, or with TEXT replace, the instructions applied to every document.
  Instructions { text: Option<String> },
  /// Show the subscription state of the account.
  Status,
  /// Attach a subscription bought with this email to the account.
  Link,
  /// Wait for a completed checkout to activate the subscription.
  WaitCheckout {
    #[arg(long, default_value_t = session::CONFIRMATION_BUDGET.as_secs())]
    budget_secs: u64,
    #[arg(long, default_value_t = session::POLL_EVERY.as_secs())]
    poll_secs:   u64,
  },
}

#[derive(Subcommand, Debug)]
enum DocsCommand {
  List,
  New { title: Option<String> },
  Show { id: Uuid },
  Rm { id: Uuid },
  /// Change a document's title, body, or per-document instructions.
  Edit {
    id:           Uuid,
    #[arg(long)]
    title:        Option<String>,
    /// Replace the body with the contents of this file.
    #[arg(long, value_name = "FILE")]
    content_file: Option<PathBuf>,
    #[arg(long)]
    instructions: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
enum KnowledgeCommand {
  List { document: Uuid },
  Add {
    document: Uuid,
    title:    String,
    /// Read the snippet from this file instead of the argument.
    #[arg(long, value_name = "FILE", conflicts_with = "content")]
    file:     Option<PathBuf>,
    content:  Option<String>,
  },
  /// Change a snippet's title or text.
  Edit {
    id:    Uuid,
    #[arg(long)]
    title: Option<String>,
    /// Replace the snippet with the contents of this file.
    #[arg(long, value_name = "FILE")]
    file:  Option<PathBuf>,
  },
  Rm { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum MessagesCommand {
  List { document: Uuid },
  Clear { document: Uuid },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  email:    String,
  #[serde(default)]
  password: String,
}

/// Flag (or env) value if given, else a non-empty file value.
fn pick(flag: Option<String>, file: &str) -> Option<String> {
  flag.or_else(|| (!file.is_empty()).then(|| file.to_owned()))
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: pick(args.url, &file_cfg.url).unwrap_or_else(|| "http://localhost:8080".to_string()),
    email:    pick(args.email, &file_cfg.email).unwrap_or_default(),
    password: pick(args.password, &file_cfg.password).unwrap_or_default(),
  };

  let client = ApiClient::new(api_config.clone())?;
  run(&client, &api_config, args.command).await
}

async fn run(client: &ApiClient, config: &ApiConfig, command: Command) -> Result<()> {
  match command {
    Command::Register { name } => {
      if config.email.is_empty() || config.password.is_empty() {
        bail!("register needs --email and --password");
      }
      let user = client.register(&name, &config.email, &config.password).await?;
      println!("registered {} <{}> ({})", user.name, user.email, user.user_id);
    }
    Command::Whoami => match client.me().await? {
      Some(user) => println!("{} <{}> ({})", user.name, user.email, user.user_id),
      None => println!("not signed in"),
    },
    Command::Docs(cmd) => docs(client, cmd).await?,
    Command::Knowledge(cmd) => knowledge(client, cmd).await?,
    Command::Messages(cmd) => messages(client, cmd).await?,
    Command::Chat { document, message } => {
      let doc = require_document(client, document).await?;
      let request = ChatRequest {
        user_message:     message.join(" "),
        document_content: doc.content,
      };
      println!("{}", client.chat(document, &request).await?);
    }
    Command::Instructions { text: Some(text) } => {
      client.set_instructions(&text).await?;
      println!("instructions updated");
    }
    Command::Instructions { text: None } => {
      let current = client.settings().await?.and_then(|s| s.ai_system_instructions);
      println!("{}", current.as_deref().unwrap_or("(none)"));
    }
    Command::Status => {
      let state = session::resolve(client).await?;
      println!("session: {state}");
      if let Some(view) = client.subscription_status().await? {
        println!("subscription: {}", view.status);
        if let Some(end) = view.current_period_end {
          println!("current period ends: {}", end.format("%Y-%m-%d"));
        }
        if view.needs_linking {
          println!("found by email but not linked; run `inkwell link`");
        }
      }
    }
    Command::Link => {
      let outcome = client.link_subscription().await?;
      println!("{} ({})", if outcome.linked { "linked" } else { "not linked" }, outcome.reason);
    }
    Command::WaitCheckout { budget_secs, poll_secs } => {
      println!("verifying subscription...");
      let state = session::await_confirmation(
        client.clone(),
        Duration::from_secs(budget_secs),
        Duration::from_secs(poll_secs.max(1)),
      )
      .await?;
      match state {
        session::SessionState::Active => println!("subscription active"),
        session::SessionState::Unauthenticated => {
          bail!("credentials for {} were not accepted", client.email())
        }
        other => println!("not confirmed yet ({other}); check `inkwell status` later"),
      }
    }
  }
  Ok(())
}

// ─── Subcommand groups ────────────────────────────────────────────────────────

async fn require_document(client: &ApiClient, id: Uuid) -> Result<Document> {
  client
    .get_document(id)
    .await?
    .with_context(|| format!("document {id} not found"))
}

async fn docs(client: &ApiClient, cmd: DocsCommand) -> Result<()> {
  match cmd {
    DocsCommand::List => {
      for doc in client.list_documents().await? {
        println!(
          "{}  {}  {}",
          doc.document_id,
          doc.updated_at.format("%Y-%m-%d %H:%M"),
          doc.title
        );
      }
    }
    DocsCommand::New { title } => {
      let doc = client.create_document(title.as_deref()).await?;
      println!("{}  {}", doc.document_id, doc.title);
    }
    DocsCommand::Show { id } => {
      let doc = require_document(client, id).await?;
      println!("# {}", doc.title);
      if let Some(instructions) = &doc.ai_system_instructions {
        println!("instructions: {instructions}");
      }
      println!();
      println!("{}", doc.content);
    }
    DocsCommand::Rm { id } => {
      let removed = client.delete_document(id).await?;
      println!(
        "deleted {id} ({} knowledge items, {} messages)",
        removed.knowledge_removed, removed.messages_removed
      );
    }
    DocsCommand::Edit { id, title, content_file, instructions } => {
      let mut patch = Map::new();
      if let Some(title) = title {
        patch.insert("title".into(), Value::String(title));
      }
      if let Some(path) = content_file {
        let content = std::fs::read_to_string(&path)
          .with_context(|| format!("reading {}", path.display()))?;
        patch.insert("content".into(), Value::String(content));
      }
      if let Some(instructions) = instructions {
        patch.insert("ai_system_instructions".into(), Value::String(instructions));
      }
      if patch.is_empty() {
        bail!("nothing to change; pass --title, --content-file or --instructions");
      }
      let doc = client.update_document(id, &Value::Object(patch)).await?;
      println!("updated {}  {}", doc.document_id, doc.title);
    }
  }
  Ok(())
}

async fn knowledge(client: &ApiClient, cmd: KnowledgeCommand) -> Result<()> {
  match cmd {
    KnowledgeCommand::List { document } => {
      for item in client.list_knowledge(document).await? {
        println!("{}  {}", item.knowledge_id, item.title);
      }
    }
    KnowledgeCommand::Add { document, title, file, content } => {
      let content = match (file, content) {
        (Some(path), _) => std::fs::read_to_string(&path)
          .with_context(|| format!("reading {}", path.display()))?,
        (None, Some(content)) => content,
        (None, None) => bail!("pass the snippet text or --file"),
      };
      let item = client.add_knowledge(document, &title, &content).await?;
      println!("{}  {}", item.knowledge_id, item.title);
    }
    KnowledgeCommand::Edit { id, title, file } => {
      let mut patch = Map::new();
      if let Some(title) = title {
        patch.insert("title".into(), Value::String(title));
      }
      if let Some(path) = file {
        let content = std::fs::read_to_string(&path)
          .with_context(|| format!("reading {}", path.display()))?;
        patch.insert("content".into(), Value::String(content));
      }
      if patch.is_empty() {
        bail!("nothing to change; pass --title or --file");
      }
      let item = client.update_knowledge(id, &Value::Object(patch)).await?;
      println!("updated {}  {}", item.knowledge_id, item.title);
    }
    KnowledgeCommand::Rm { id } => {
      client.delete_knowledge(id).await?;
      println!("deleted {id}");
    }
  }
  Ok(())
}

async fn messages(client: &ApiClient, cmd: MessagesCommand) -> Result<()> {
  match cmd {
    MessagesCommand::List { document } => {
      for message in client.list_messages(document).await? {
        println!("[{}] {}", message.role, message.content);
      }
    }
    MessagesCommand::Clear { document } => {
      let removed = client.clear_messages(document).await?;
      println!("removed {removed} messages");
    }
  }
  Ok(())
}
