use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use gemini_chat::client::api::{ApiClient, ClientError};
use gemini_chat::client::session::ClientSession;
use gemini_chat::models::api::{AuthResponse, LoginRequest, RegisterRequest};

#[derive(Debug, Parser)]
#[command(name = "chat")]
#[command(about = "Command-line client for the Gemini chat service")]
struct Args {
    /// Server base URL
    #[arg(long, env = "CHAT_SERVER_URL", default_value = "http://127.0.0.1:5000")]
    server: String,

    /// Session file (defaults to <config dir>/gemini-chat/session.json)
    #[arg(long, env = "CHAT_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Password (falls back to CHAT_PASSWORD)
        #[arg(long, env = "CHAT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in with e-mail and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CHAT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in with a Google ID token
    Google { id_token: String },
    /// Forget the stored token
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List chat sessions
    Sessions,
    /// Print the messages of a session
    History { session_id: Uuid },
    /// Create an empty session and make it active
    New { title: Option<String> },
    /// Rename a session
    Rename { session_id: Uuid, title: String },
    /// Delete a session
    Delete { session_id: Uuid },
    /// Send one message
    Send {
        message: String,
        /// Session to continue (defaults to the active one)
        #[arg(long, conflicts_with = "new")]
        session: Option<Uuid>,
        /// Start a new session
        #[arg(long)]
        new: bool,
    },
    /// Interactive chat; `/new` starts a new session, `/quit` exits
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let path = match args.session_file.clone() {
        Some(path) => path,
        None => ClientSession::default_path().context("No config directory available")?,
    };
    let mut session = ClientSession::load(&path)
        .with_context(|| format!("Failed to read session file {}", path.display()))?;
    let client = ApiClient::new(&args.server).with_token(session.token().map(str::to_string));

    run(args.command, &client, &mut session).await
}

async fn run(command: Command, client: &ApiClient, session: &mut ClientSession) -> Result<()> {
    match command {
        Command::Register {
            name,
            email,
            password,
        } => {
            let response = client
                .register(&RegisterRequest {
                    name,
                    email,
                    password,
                })
                .await?;
            store_sign_in(session, response)?;
        }
        Command::Login { email, password } => {
            let response = client.login(&LoginRequest { email, password }).await?;
            store_sign_in(session, response)?;
        }
        Command::Google { id_token } => {
            let response = client.google_login(&id_token).await?;
            store_sign_in(session, response)?;
        }
        Command::Logout => {
            session.clear()?;
            println!("Signed out");
        }
        Command::Whoami => {
            require_sign_in(session)?;
            match client.validate().await {
                Ok(AuthResponse {
                    user: Some(user), ..
                }) => println!("{} <{}>", user.name, user.email),
                Ok(_) => println!("Signed in"),
                Err(e) if e.status() == Some(reqwest::StatusCode::UNAUTHORIZED) => {
                    session.clear()?;
                    bail!("Session expired, please sign in again");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Sessions => {
            require_sign_in(session)?;
            let sessions = client.list_sessions().await?;
            if sessions.is_empty() {
                println!("No chat sessions yet");
            }
            let active = session.active_session_id();
            for s in sessions {
                let marker = if Some(s.id) == active { "*" } else { " " };
                println!(
                    "{} {}  {}  ({} messages, updated {})",
                    marker,
                    s.id,
                    s.title,
                    s.message_count,
                    s.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::History { session_id } => {
            require_sign_in(session)?;
            for m in client.messages(session_id).await? {
                println!("[{}] {}: {}", m.created_at.format("%H:%M"), m.role, m.content);
            }
        }
        Command::New { title } => {
            require_sign_in(session)?;
            let created = client.create_session(title).await?;
            session.set_active_session(Some(created.id));
            session.save()?;
            println!("Created session {} ({})", created.id, created.title);
        }
        Command::Rename { session_id, title } => {
            require_sign_in(session)?;
            client.rename_session(session_id, &title).await?;
            println!("Renamed");
        }
        Command::Delete { session_id } => {
            require_sign_in(session)?;
            client.delete_session(session_id).await?;
            if session.active_session_id() == Some(session_id) {
                session.set_active_session(None);
                session.save()?;
            }
            println!("Deleted");
        }
        Command::Send {
            message,
            session: target,
            new,
        } => {
            require_sign_in(session)?;
            let target = if new {
                None
            } else {
                target.or(session.active_session_id())
            };
            let outcome = send(client, session, &message, target).await;
            session.save()?;
            println!("{}", outcome?);
        }
        Command::Repl => {
            require_sign_in(session)?;
            repl(client, session).await?;
        }
    }
    Ok(())
}

fn require_sign_in(session: &ClientSession) -> Result<()> {
    if !session.is_authenticated() {
        bail!("Not signed in. Run `chat login` or `chat register` first");
    }
    Ok(())
}

fn store_sign_in(session: &mut ClientSession, response: AuthResponse) -> Result<()> {
    let (Some(token), Some(user)) = (response.token, response.user) else {
        bail!("Server response carried no token");
    };
    println!("Signed in as {} <{}>", user.name, user.email);
    session.sign_in(token, user);
    session.save()?;
    Ok(())
}

/// Sends one message and records the session the server used, also when the
/// reply failed.
async fn send(
    client: &ApiClient,
    session: &mut ClientSession,
    message: &str,
    target: Option<Uuid>,
) -> Result<String> {
    match client.chat(message, target).await {
        Ok(reply) => {
            if reply.session_id.is_some() {
                session.set_active_session(reply.session_id);
            }
            Ok(reply.response.unwrap_or_default())
        }
        Err(ClientError::Server {
            session_id: Some(id),
            message,
            ..
        }) => {
            session.set_active_session(Some(id));
            bail!(message)
        }
        Err(e) => Err(e.into()),
    }
}

async fn repl(client: &ApiClient, session: &mut ClientSession) -> Result<()> {
    println!("Type a message, /new for a new session, /quit to exit");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" => break,
            "/new" => {
                session.set_active_session(None);
                session.save()?;
                println!("Started a new session");
            }
            message => {
                let target = session.active_session_id();
                match send(client, session, message, target).await {
                    Ok(reply) => println!("{}\n", reply),
                    Err(e) => eprintln!("Error: {}\n", e),
                }
                session.save()?;
            }
        }
    }
    Ok(())
}
