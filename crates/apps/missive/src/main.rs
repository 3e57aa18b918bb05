//! Missive - command-line Gmail client
//!
//! Signs in once, then lists, reads and replies to conversations. Output is
//! JSON on stdout; logs go to stderr.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use log::{error, warn};
use mail::credential::CredentialStore;
use mail::{
    Category, FileCredentialStore, GmailAuth, GmailCredentials, MailConfig, MailService,
    MessageId, OutboundMessageRequest, ThreadId, UserId,
};

#[derive(Parser)]
#[command(name = "missive")]
#[command(about = "Gmail conversations from the terminal", long_about = None)]
struct Cli {
    /// Account to act as (the address used at sign-in)
    #[arg(long, short, global = true, env = "MISSIVE_USER")]
    user: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in through the browser and store the credential
    Login,

    /// List conversation summaries in a category
    List {
        /// unread-primary, non-primary-unread, primary, promotions, updates, sent, drafts, all
        #[arg(long, short, default_value = "unread-primary")]
        category: String,

        #[arg(long, short = 'n', default_value_t = 20)]
        max: usize,
    },

    /// Show one conversation with decoded bodies
    Show { thread_id: String },

    /// Send a new message, or a reply with --reply-to
    Send {
        /// Recipient; defaults to the original sender when replying
        #[arg(long, default_value = "")]
        to: String,

        #[arg(long)]
        subject: Option<String>,

        /// HTML body
        #[arg(long)]
        body: String,

        /// Gmail message ID to reply to
        #[arg(long, requires = "thread")]
        reply_to: Option<String>,

        /// Conversation to file the message under
        #[arg(long)]
        thread: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    let user = cli
        .user
        .map(UserId::new)
        .ok_or_else(|| anyhow!("No account given; pass --user or set MISSIVE_USER"))?;

    let app = GmailCredentials::load().map_err(|e| {
        if let Some(path) = GmailCredentials::default_credentials_path() {
            warn!(
                "Place Google OAuth credentials at {} or set GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
                path.display()
            );
        }
        e
    })?;
    let mail_config = MailConfig::load()?;
    let store = Arc::new(FileCredentialStore::open_default()?);

    match cli.cmd {
        Command::Login => {
            let credential = GmailAuth::new(app, &mail_config).authorize(user)?;
            store.save(&credential)?;
            println!(
                "Signed in as {}; credential saved under {}",
                credential.user_id,
                store.dir().display()
            );
            Ok(())
        }

        Command::List { category, max } => {
            let service = MailService::gmail(app, store.clone(), &mail_config)?;
            let credential = load_credential(store.as_ref(), &user)?;
            let batch = service.list_summaries(&credential, max, Category::parse(&category))?;

            for failure in &batch.failures {
                warn!("Skipped {}: {}", failure.thread_id, failure.error);
            }
            println!("{}", serde_json::to_string_pretty(&batch.summaries)?);
            Ok(())
        }

        Command::Show { thread_id } => {
            let service = MailService::gmail(app, store.clone(), &mail_config)?;
            let credential = load_credential(store.as_ref(), &user)?;
            let detail = service.get_detail(&credential, &ThreadId::new(thread_id))?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
            Ok(())
        }

        Command::Send {
            to,
            subject,
            body,
            reply_to,
            thread,
        } => {
            let service = MailService::gmail(app, store.clone(), &mail_config)?;
            let credential = load_credential(store.as_ref(), &user)?;
            let request = OutboundMessageRequest {
                to,
                subject,
                body,
                conversation_id: thread.map(ThreadId::new),
                in_reply_to_id: reply_to.map(MessageId::new),
                references_id: None,
            };
            let sent = service.send(&credential, &request)?;
            println!("{}", serde_json::to_string_pretty(&sent)?);
            Ok(())
        }
    }
}

fn load_credential(store: &dyn CredentialStore, user: &UserId) -> Result<mail::Credential> {
    store
        .load(user)?
        .with_context(|| format!("No credential for {}; run `missive login` first", user))
}
