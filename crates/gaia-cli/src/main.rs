//! The `gaia` binary.
//!
//! `init` and `start` act locally on the data directory; every other
//! command drives the admin RPC surface over mTLS with the operator
//! certificate. Exit codes: 0 on success, 1 on startup or command failure,
//! 2 on a fatal runtime error after a successful start.

mod admin;
mod import;

use std::io::IsTerminal;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use clap::Subcommand;
use gaia_core::GaiaError;
use gaia_daemon::Daemon;
use gaia_daemon::DaemonConfig;
use gaia_pki::CertificateAuthority;

use crate::admin::AdminChannel;
use crate::import::read_import_file;

#[derive(Parser)]
#[command(name = "gaia", version, about = "Self-hosted secrets-management daemon")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the listener address.
    #[arg(long, global = true)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the encrypted database and the PKI material.
    Init {
        /// Master passphrase. Prompted for when omitted.
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Run the daemon in the foreground.
    Start,
    /// Ask the running daemon to shut down gracefully.
    Stop,
    /// Show the daemon's lifecycle status.
    Status,
    /// Load the master key into the running daemon.
    Unlock {
        /// Master passphrase. Prompted for when omitted.
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Wipe the master key from the daemon's memory.
    Lock,
    /// Manage registered clients.
    #[command(subcommand)]
    Clients(ClientsCommand),
    /// Manage secrets as an operator.
    #[command(subcommand)]
    Secrets(SecretsCommand),
    /// Bulk-import secrets from a JSON file.
    Import {
        /// JSON array of `{client, namespace, id, value}` objects.
        file: PathBuf,
        /// Replace colliding secrets instead of failing the batch.
        #[arg(long)]
        overwrite: bool,
    },
    /// Issue certificates from the on-disk CA without the daemon.
    #[command(subcommand)]
    Certs(CertsCommand),
}

#[derive(Subcommand)]
enum ClientsCommand {
    /// Register a client and print its certificate material.
    Register {
        name: String,
        /// Write `<name>.crt` / `<name>.key` here instead of printing.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// List registered clients.
    List,
    /// Revoke a client and delete all of its secrets.
    Revoke { name: String },
}

#[derive(Subcommand)]
enum SecretsCommand {
    /// Add or overwrite a secret.
    Add {
        client: String,
        namespace: String,
        id: String,
        value: String,
    },
    /// Delete a secret.
    Delete {
        client: String,
        namespace: String,
        id: String,
    },
    /// List every secret under a client.
    List { client: String },
    /// List the namespaces under a client.
    Namespaces { client: String },
}

#[derive(Subcommand)]
enum CertsCommand {
    /// Issue a server certificate signed by the on-disk CA.
    Server {
        /// DNS name for the leaf; defaults to the configured server name.
        name: Option<String>,
    },
    /// Issue a client certificate signed by the on-disk CA.
    Client { name: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("gaia: {err:#}");
            return ExitCode::from(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("gaia: failed to start runtime: {err}");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(dispatch(cli.command, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("gaia: {err:#}");
            let fatal_runtime = err
                .downcast_ref::<GaiaError>()
                .is_some_and(|e| matches!(e, GaiaError::Runtime { .. }));
            ExitCode::from(if fatal_runtime { 2 } else { 1 })
        }
    }
}

fn load_config(cli: &Cli) -> Result<DaemonConfig> {
    let mut config = DaemonConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(listen) = &cli.listen {
        config.listen_addr = listen.clone();
    }
    Ok(config)
}

async fn dispatch(command: Commands, config: DaemonConfig) -> Result<()> {
    match command {
        Commands::Init { passphrase } => cmd_init(config, passphrase).await,
        Commands::Start => cmd_start(config).await,
        Commands::Stop => {
            let mut channel = AdminChannel::connect(&config).await?;
            channel.stop().await?;
            println!("stop requested");
            Ok(())
        }
        Commands::Status => cmd_status(config).await,
        Commands::Unlock { passphrase } => {
            let passphrase = passphrase_or_prompt(passphrase, "Enter master passphrase: ")?;
            let mut channel = AdminChannel::connect(&config).await?;
            channel.unlock(&passphrase).await?;
            println!("daemon unlocked");
            Ok(())
        }
        Commands::Lock => {
            let mut channel = AdminChannel::connect(&config).await?;
            channel.lock().await?;
            println!("daemon locked");
            Ok(())
        }
        Commands::Clients(command) => cmd_clients(command, config).await,
        Commands::Secrets(command) => cmd_secrets(command, config).await,
        Commands::Import { file, overwrite } => {
            let items = read_import_file(&file)?;
            let total = items.len();
            let mut channel = AdminChannel::connect(&config).await?;
            let imported = channel.import_secrets(items, overwrite).await?;
            println!("imported {imported} of {total} secrets");
            Ok(())
        }
        Commands::Certs(command) => cmd_certs(command, config),
    }
}

async fn cmd_init(config: DaemonConfig, passphrase: Option<String>) -> Result<()> {
    gaia_daemon::logging::init_tool_logging();

    let passphrase = passphrase_or_prompt(passphrase, "Enter master passphrase: ")?;
    let daemon = Daemon::new(config);
    daemon.initialize(&passphrase).await?;
    daemon.provision_pki()?;

    println!("Gaia initialized.");
    println!("  database:  {}", daemon.config().db_path().display());
    println!("  certs:     {}", daemon.config().certs_dir().display());
    println!("Start the daemon with 'gaia start', then unlock it with 'gaia unlock'.");
    Ok(())
}

async fn cmd_start(config: DaemonConfig) -> Result<()> {
    let _guard = gaia_daemon::logging::init_daemon_logging(&config.audit_log_path())?;

    let daemon = Daemon::new(config);
    eprintln!("Starting Gaia daemon in the foreground; stop it with 'gaia stop'.");

    let handle = daemon.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    daemon.run().await?;
    Ok(())
}

async fn cmd_status(config: DaemonConfig) -> Result<()> {
    // An unreachable daemon reports as stopped, matching what an operator
    // needs to know rather than failing the command.
    let status = match AdminChannel::connect(&config).await {
        Ok(mut channel) => channel.status().await?,
        Err(_) => "stopped".to_string(),
    };
    println!("gaia daemon status: {status}");
    Ok(())
}

async fn cmd_clients(command: ClientsCommand, config: DaemonConfig) -> Result<()> {
    let mut channel = AdminChannel::connect(&config).await?;
    match command {
        ClientsCommand::Register { name, out_dir } => {
            let (certificate, private_key) = channel.register_client(&name).await?;
            match out_dir {
                Some(dir) => {
                    std::fs::create_dir_all(&dir)?;
                    std::fs::write(dir.join(format!("{name}.crt")), &certificate)?;
                    std::fs::write(dir.join(format!("{name}.key")), &private_key)?;
                    println!("registered '{name}'; certificate written to {}", dir.display());
                }
                None => {
                    println!("registered '{name}'");
                    println!("{certificate}");
                    println!("{private_key}");
                }
            }
        }
        ClientsCommand::List => {
            for (name, created_at) in channel.list_clients().await? {
                println!("{name}\t{created_at}");
            }
        }
        ClientsCommand::Revoke { name } => {
            channel.revoke_client(&name).await?;
            println!("revoked '{name}' and deleted its secrets");
        }
    }
    Ok(())
}

async fn cmd_secrets(command: SecretsCommand, config: DaemonConfig) -> Result<()> {
    let mut channel = AdminChannel::connect(&config).await?;
    match command {
        SecretsCommand::Add {
            client,
            namespace,
            id,
            value,
        } => {
            channel.add_secret(&client, &namespace, &id, &value).await?;
            println!("added {client}/{namespace}/{id}");
        }
        SecretsCommand::Delete { client, namespace, id } => {
            channel.delete_secret(&client, &namespace, &id).await?;
            println!("deleted {client}/{namespace}/{id}");
        }
        SecretsCommand::List { client } => {
            for (namespace, entries) in channel.list_secrets(&client).await? {
                for (id, value) in entries {
                    println!("{namespace}/{id}\t{value}");
                }
            }
        }
        SecretsCommand::Namespaces { client } => {
            for namespace in channel.list_namespaces(&client).await? {
                println!("{namespace}");
            }
        }
    }
    Ok(())
}

fn cmd_certs(command: CertsCommand, config: DaemonConfig) -> Result<()> {
    gaia_daemon::logging::init_tool_logging();

    let certs_dir = config.certs_dir();
    let ca = gaia_pki::load_ca(&certs_dir).context("no CA on disk; run 'gaia init' first")?;
    issue_cert(command, &config, &ca, &certs_dir)
}

fn issue_cert(
    command: CertsCommand,
    config: &DaemonConfig,
    ca: &CertificateAuthority,
    certs_dir: &std::path::Path,
) -> Result<()> {
    match command {
        CertsCommand::Server { name } => {
            let name = name.unwrap_or_else(|| config.server_name.clone());
            let pair = ca.issue_server(&name)?;
            gaia_pki::write_server_pair(certs_dir, &pair)?;
            println!("issued server certificate for '{name}'");
        }
        CertsCommand::Client { name } => {
            let pair = ca.issue_client(&name)?;
            gaia_pki::write_client_pair(certs_dir, &name, &pair)?;
            println!("issued client certificate for '{name}'");
        }
    }
    Ok(())
}

/// Use the flag value or prompt on the terminal.
fn passphrase_or_prompt(provided: Option<String>, prompt: &str) -> Result<String> {
    if let Some(passphrase) = provided {
        return Ok(passphrase);
    }
    if !std::io::stdin().is_terminal() {
        // Non-interactive callers read one line from stdin.
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        let passphrase = line.trim_end_matches(['\r', '\n']).to_string();
        if passphrase.is_empty() {
            bail!("no passphrase provided");
        }
        return Ok(passphrase);
    }

    eprint!("{prompt}");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let passphrase = line.trim_end_matches(['\r', '\n']).to_string();
    if passphrase.is_empty() {
        bail!("no passphrase provided");
    }
    Ok(passphrase)
}
