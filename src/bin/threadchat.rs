use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use threadchat::api::ProxyClient;
use threadchat::config::Config;
use threadchat::server::start_server;
use threadchat::state::{ChatSession, Role, RunOutcome, SessionOptions};
use threadchat::tools::ToolRegistry;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "threadchat")]
#[command(version)]
#[command(about = "Chat proxy for hosted assistant threads")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the HTTP proxy (default)
    Serve {
        /// Address to bind, overrides THREADCHAT_HOST
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overrides THREADCHAT_PORT
        #[arg(long)]
        port: Option<u16>,
        /// Relay run events instead of polling for the final reply
        #[arg(long)]
        stream: bool,
    },
    /// Chats with a running proxy from the terminal, one message per line
    Chat {
        /// Base URL of the proxy
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
        /// Wait for whole replies instead of streaming them
        #[arg(long)]
        poll: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load()?;

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
        stream: false,
    }) {
        Commands::Serve { host, port, stream } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            config.stream_responses |= stream;
            config.validate()?;
            start_server(config).await?;
        }
        Commands::Chat { server, poll } => run_chat(&config, server, poll).await?,
    }

    Ok(())
}

async fn run_chat(config: &Config, server: String, poll: bool) -> Result<()> {
    let backend = Arc::new(ProxyClient::new(server));
    let mut session = ChatSession::new(
        backend,
        ToolRegistry::new(),
        SessionOptions::from_config(config),
    );
    let mut printed = 0;
    print_new_messages(&session, &mut printed);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let outcome = if poll {
            session.send_message_polled(&line).await
        } else {
            session.send_message(&line).await
        };
        print_new_messages(&session, &mut printed);
        if let RunOutcome::Failed(failure) = outcome {
            eprintln!("error: {failure}");
        }
    }

    Ok(())
}

fn print_new_messages(session: &ChatSession, printed: &mut usize) {
    for message in &session.transcript().messages()[*printed..] {
        match message.role {
            Role::User => {}
            Role::Assistant => println!("{}", message.text),
            Role::Code => println!("```\n{}\n```", message.text),
        }
    }
    *printed = session.transcript().len();
}
