//! Sasayaki command-line client.
//!
//! A thin shell over [`ssyk_core::Core`]: every subcommand loads the
//! identity and store from `~/.sasayaki`, dials the configured hub, and
//! performs one orchestrator operation.

mod config;
mod keyfile;
mod paths;

use clap::{Parser, Subcommand};
use ssyk_core::{Core, Event};
use ssyk_relay::TcpRelay;
use ssyk_store::SqliteStore;

use config::Config;

/// Sasayaki -- asynchronous, end-to-end encrypted messaging.
#[derive(Parser)]
#[command(name = "ssyk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new identity key-pair, encrypted under a passphrase.
    Init,

    /// Show our own address, to hand out to contacts.
    Whoami,

    /// Begin a handshake with a new contact.
    AddContact {
        /// The peer's 64-character hex address.
        address: String,
        /// A local name for this contact.
        #[arg(short, long, default_value = "")]
        name: String,
    },

    /// List known contacts and their handshake status.
    Contacts,

    /// Accept a pending contact request.
    AcceptContact {
        /// The peer's 64-character hex address.
        address: String,
    },

    /// Remove a contact and all of its conversations.
    RemoveContact {
        /// The peer's 64-character hex address.
        address: String,
    },

    /// Send a message, starting a new conversation if `--conversation` is omitted.
    Send {
        /// The peer's 64-character hex address.
        address: String,
        /// Message text.
        message: String,
        /// An existing conversation id (32-character hex) to send within.
        #[arg(short, long)]
        conversation: Option<String>,
    },

    /// Poll the hub once and print whatever event results.
    Poll,

    /// Poll the hub in a loop until interrupted.
    Listen,
}

fn prompt_passphrase(prompt: &str, confirm: bool) -> anyhow::Result<String> {
    let passphrase = rpassword::prompt_password(prompt)?;
    if passphrase.len() < 8 {
        anyhow::bail!("passphrase must be at least 8 characters");
    }
    if confirm {
        let confirmation = rpassword::prompt_password("Confirm passphrase: ")?;
        if passphrase != confirmation {
            anyhow::bail!("passphrases do not match");
        }
    }
    Ok(passphrase)
}

fn open_core(config: &Config) -> anyhow::Result<Core<SqliteStore, TcpRelay>> {
    let identity_path = paths::identity_path()?;
    if !identity_path.exists() {
        anyhow::bail!("no identity found; run `ssyk init` first");
    }
    let passphrase = prompt_passphrase("Identity passphrase: ", false)?;
    let identity = keyfile::load(&identity_path, &passphrase)?;

    let store = SqliteStore::open(paths::store_path()?)?;
    let hub_address = config
        .hub_address
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid hub_address {:?}: {e}", config.hub_address))?;
    let relay = TcpRelay::new(hub_address)?;

    Ok(Core::new(identity, store, relay))
}

fn print_event(event: &Event) {
    match event {
        Event::NoPendingEnvelope => println!("(nothing pending)"),
        Event::ContactRequestArrived { peer_address } => {
            println!("contact request from {peer_address}; run `accept-contact {peer_address}`")
        }
        Event::ContactEstablished { peer_address } => {
            println!("handshake with {peer_address} complete")
        }
        Event::Stalled { peer_address } => {
            println!("deferred envelope from {peer_address}, handshake still in progress")
        }
        Event::NewConversation {
            convo_id,
            peer_address,
            title,
        } => println!("new conversation {convo_id} with {peer_address}: {title:?}"),
        Event::NewMessage {
            convo_id,
            peer_address,
            content,
        } => println!(
            "[{convo_id}] {peer_address}: {}",
            String::from_utf8_lossy(content)
        ),
        Event::ConversationBroken {
            convo_id,
            peer_address,
        } => println!("conversation {convo_id} with {peer_address} is now broken"),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    if matches!(cli.command, Commands::Init) {
        paths::ensure_layout()?;
        let identity_path = paths::identity_path()?;
        let passphrase = prompt_passphrase("New identity passphrase: ", true)?;
        let identity = keyfile::generate_and_save(&identity_path, &passphrase)?;
        SqliteStore::open(paths::store_path()?)?;
        println!("identity created: {}", identity.address());
        return Ok(());
    }

    paths::ensure_layout()?;
    let config_path = paths::config_path()?;
    let config = Config::load_or_default(&config_path)?;
    config.save(&config_path)?;

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Whoami => {
            let passphrase = prompt_passphrase("Identity passphrase: ", false)?;
            let identity = keyfile::load(&paths::identity_path()?, &passphrase)?;
            println!("{}", identity.address());
        }
        Commands::AddContact { address, name } => {
            let core = open_core(&config)?;
            core.add_contact(&address, &name)?;
            println!("contact request sent to {address}");
        }
        Commands::Contacts => {
            let store_path = paths::store_path()?;
            let mut store = SqliteStore::open(store_path)?;
            for contact in ssyk_core::Store::list_contacts(&mut store)? {
                println!(
                    "{} {:>18} {:?}",
                    contact.address, contact.name, contact.status
                );
            }
        }
        Commands::AcceptContact { address } => {
            let core = open_core(&config)?;
            core.accept_contact(&address)?;
            println!("accepted contact {address}");
        }
        Commands::RemoveContact { address } => {
            let core = open_core(&config)?;
            core.delete_contact(&address)?;
            println!("removed contact {address}");
        }
        Commands::Send {
            address,
            message,
            conversation,
        } => {
            let core = open_core(&config)?;
            let convo_id = match conversation {
                Some(hex) => Some(ssyk_crypto::ConversationId::from_hex(&hex)?),
                None => None,
            };
            let convo_id = core.send_message(convo_id, &address, message.as_bytes())?;
            println!("sent in conversation {convo_id}");
        }
        Commands::Poll => {
            let core = open_core(&config)?;
            let event = core.receive_next_envelope()?;
            print_event(&event);
        }
        Commands::Listen => {
            let core = open_core(&config)?;
            println!("listening, press Ctrl-C to stop");
            loop {
                match core.receive_next_envelope()? {
                    Event::NoPendingEnvelope => {
                        std::thread::sleep(std::time::Duration::from_secs(1));
                    }
                    event => print_event(&event),
                }
            }
        }
    }

    Ok(())
}

