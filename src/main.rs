use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use adsecrets::client::DirectoryClient;
use adsecrets::error::ConfigError;
use adsecrets::config::Ldap;
use adsecrets::{Configuration, Error, RequestContext, Result, Rotator, SecretsClient, telemetry};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the YAML configuration.
    #[arg(long, short, default_value = "config.yaml")]
    config: PathBuf,
    /// Give up after this many seconds, rollbacks included.
    #[arg(long, short)]
    timeout: Option<u64>,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Rotate the bind identity password and print the new `ldap` section.
    RotateRoot,
    /// Rotate a service account password and print it.
    Rotate { account: String },
    /// Clear the ACCOUNTDISABLE flag.
    Enable { account: String },
    /// Set the ACCOUNTDISABLE flag.
    Disable { account: String },
    /// Print when the account password was last set.
    LastSet { account: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::setup_logging();
    telemetry::describe_metrics();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Configuration::default().path(args.config).read()?;
    let ldap = config.ldap()?;

    let ctx = match args.timeout {
        Some(secs) => RequestContext::with_timeout(Duration::from_secs(secs)),
        None => RequestContext::new(),
    };

    // Ctrl-C ends the request, which also stops a running rollback.
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let client = Arc::new(SecretsClient::new());
    let rotator = Rotator::new(client.clone(), config.rotation.clone());

    match args.cmd {
        Commands::RotateRoot => match rotator.rotate_root_credentials(&ctx, ldap).await {
            Ok(rotated) => print_ldap(&rotated)?,
            Err(Error::RollbackAbandoned {
                reason,
                unconfirmed,
            }) => {
                // The directory may now only accept this password.
                print_ldap(&unconfirmed)?;
                return Err(Error::RollbackAbandoned {
                    reason,
                    unconfirmed,
                });
            },
            Err(err) => return Err(err),
        },
        Commands::Rotate { account } => {
            let password = rotator
                .rotate_account_password(&ctx, ldap, &account)
                .await?;
            println!("{password}");
        },
        Commands::Enable { account } => client.enable_account(ldap, &account).await?,
        Commands::Disable { account } => client.disable_account(ldap, &account).await?,
        Commands::LastSet { account } => {
            match client.password_last_set(ldap, &account).await? {
                Some(time) => println!("{}", time.to_rfc3339()),
                None => println!("never"),
            }
        },
    }

    Ok(())
}

/// Print an `ldap` section, new bind password included, as YAML.
fn print_ldap(ldap: &Ldap) -> Result<()> {
    let yaml = serde_yaml::to_string(ldap).map_err(ConfigError::from)?;
    println!("{yaml}");
    Ok(())
}
