//! Banco CLI - banking core over JSON requests
//!
//! Usage:
//! ```bash
//! banco init
//! banco bootstrap-user --full-name "Ana Torres" --identification 1001 \
//!     --email ana@banco.co --phone 3001112233 --address "Calle 1 # 2-3" \
//!     --role teller-employee --password secret1
//! banco call '{"caller":1,"method":"accounts.open","params":{"owner_id":"1001","account_type":"savings"}}'
//! banco serve < requests.jsonl
//! banco sweep
//! ```

use anyhow::{Context, Result};
use banco_business::{UserRegistration, UserService};
use banco_core::{Actor, UserRole};
use banco_persistence::{StoreConfig, DEFAULT_DATABASE_URL};
use banco_rpc::{context, Dispatcher, RpcRequest};
use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

/// Banco - role-based banking core
#[derive(Parser)]
#[command(name = "banco")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database URL
    #[arg(long, env = "BANCO_DATABASE_URL", default_value = DEFAULT_DATABASE_URL, global = true)]
    pub database: String,

    /// Maximum pool connections
    #[arg(long, default_value_t = 1, global = true)]
    pub max_connections: u32,

    /// Row lock wait limit (ms)
    #[arg(long, default_value_t = 5000, global = true)]
    pub lock_timeout_ms: u64,

    /// Connection acquire wait limit (ms)
    #[arg(long, default_value_t = 5000, global = true)]
    pub acquire_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database schema
    Init,

    /// Serve JSON-lines requests on stdin, one response per line on stdout
    Serve,

    /// Run a single JSON request
    Call {
        /// Request object, e.g. '{"method":"accounts.list"}'
        request: String,
    },

    /// Expire held transfers past their approval window
    Sweep,

    /// Register a user without a caller (first staff member)
    BootstrapUser {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        identification: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        address: String,
        #[arg(long, short)]
        role: RoleArg,
        #[arg(long)]
        password: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RoleArg {
    ClientPerson,
    ClientCompany,
    TellerEmployee,
    CommercialEmployee,
    CompanyEmployee,
    CompanySupervisor,
    InternalAnalyst,
}

impl RoleArg {
    pub fn to_core_role(&self) -> UserRole {
        match self {
            RoleArg::ClientPerson => UserRole::ClientPerson,
            RoleArg::ClientCompany => UserRole::ClientCompany,
            RoleArg::TellerEmployee => UserRole::TellerEmployee,
            RoleArg::CommercialEmployee => UserRole::CommercialEmployee,
            RoleArg::CompanyEmployee => UserRole::CompanyEmployee,
            RoleArg::CompanySupervisor => UserRole::CompanySupervisor,
            RoleArg::InternalAnalyst => UserRole::InternalAnalyst,
        }
    }
}

impl Cli {
    fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.database)
            .with_max_connections(self.max_connections)
            .with_lock_timeout(Duration::from_millis(self.lock_timeout_ms))
            .with_acquire_timeout(Duration::from_millis(self.acquire_timeout_ms))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries responses
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Ensure data directory exists
    context::ensure_parent_dir(&cli.database).context("Failed to create database directory")?;

    let config = cli.store_config();
    let (store, ctx) = context::open(&config)
        .await
        .with_context(|| format!("Failed to open database {}", cli.database))?;

    match cli.command {
        Commands::Init => {
            println!("✅ Database initialized at {}", cli.database);
        }

        Commands::Serve => {
            let dispatcher = Dispatcher::new(ctx);
            serve(&dispatcher).await?;
        }

        Commands::Call { request } => {
            let dispatcher = Dispatcher::new(ctx);
            let response = dispatcher.handle_line(&request).await;
            println!("{}", serde_json::to_string(&response)?);
        }

        Commands::Sweep => {
            let dispatcher = Dispatcher::new(ctx);
            let response = dispatcher
                .handle(RpcRequest::new("transfers.sweep_expired", serde_json::Value::Null))
                .await;
            println!("{}", serde_json::to_string(&response)?);
        }

        Commands::BootstrapUser {
            full_name,
            identification,
            email,
            phone,
            address,
            role,
            password,
        } => {
            let registration = UserRegistration {
                full_name,
                identification,
                email,
                phone,
                birth_date: None,
                address,
                role: role.to_core_role(),
                password,
                company_id: None,
            };
            let user = UserService::new(&ctx)
                .register(Actor::System, registration)
                .await
                .context("Failed to register user")?;
            println!("{}", serde_json::to_string(&user)?);
        }
    }

    store.close().await;
    Ok(())
}

/// JSON-lines loop: one request per line until EOF
async fn serve(dispatcher: &Dispatcher) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    info!("Serving requests on stdin");

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let response = dispatcher.handle_line(trimmed).await;
        let mut raw = serde_json::to_string(&response)?;
        raw.push('\n');
        stdout.write_all(raw.as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("Input closed, shutting down");
    Ok(())
}
