//! Reissue CLI - replay a master log into a fresh store

use anyhow::{Context, Result};
use clap::Parser;
use reissue_cli::config::{self, Config};
use reissue_cli::console;
use reissue_cli::controller::{Controller, ControllerOptions};
use reissue_importer::{FeedbackPipe, ImporterProcess};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Reissue - replay a master log through an importer, remapping legacy
/// identifiers to the identifiers the target store issues
#[derive(Parser)]
#[command(name = "reissue")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config name under the configs directory, or a path to a TOML file
    config: Option<String>,

    /// Directory holding _global.toml and the named configs
    #[arg(long, default_value = "configs")]
    configs_dir: PathBuf,

    /// Skip the refresh step even if the config enables it
    #[arg(long)]
    no_refresh: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref(), &cli.configs_dir)?;

    let password = match &config.password {
        Some(password) => password.clone(),
        None => rpassword::prompt_password("Password: ").context("failed to read password")?,
    };

    let command = config.importer_command(&password);

    let pipe = FeedbackPipe::create()?;
    println!("FIFO: {}", pipe.path().display());

    reset_store_home(&config)?;

    println!(
        "Importing...\n{}",
        command.masked_line(&format!("import '{}'", pipe.path().display()))
    );

    let mut importer = ImporterProcess::spawn(command.clone(), &pipe)?;

    let log = File::open(&config.master_log).with_context(|| {
        format!(
            "could not open the master log at {}",
            config.master_log.display()
        )
    })?;

    console::fineprint("Opening feedback fifo for READ...");
    importer.connect_feedback(&pipe)?;
    console::fineprint("Successfully opened feedback fifo for READ.");

    let mut controller = Controller::new(ControllerOptions {
        old_secret: config.old_secret.clone(),
        incoming_links: config.incoming_links.clone(),
        mapping_exclude: config.mapping_exclude.clone(),
        id_offsetting: config.id_offsetting,
        id_map_file: config.id_map_file.clone(),
        ..Default::default()
    });

    let result = controller.run(BufReader::new(log), &mut importer);

    // The refresh step runs regardless of how the replay went, unless
    // explicitly disabled.
    if config.refresh && !cli.no_refresh {
        refresh(&command)?;
    }

    result
}

/// The importer expects to create the store from scratch: clear out any
/// previous contents of the store home.
fn reset_store_home(config: &Config) -> Result<()> {
    match std::fs::remove_dir_all(&config.db_home) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| {
                format!("failed to clear store home {}", config.db_home.display())
            });
        }
    }
    std::fs::create_dir_all(&config.db_home)
        .with_context(|| format!("failed to create store home {}", config.db_home.display()))
}

fn refresh(command: &reissue_importer::ImporterCommand) -> Result<()> {
    println!("Refreshing...\n{}", command.masked_line("refresh"));

    let status = Command::new("sh")
        .arg("-c")
        .arg(command.shell_line("refresh"))
        .stdin(Stdio::null())
        .status()
        .context("failed to run the refresh step")?;

    if !status.success() {
        console::error("refresh step reported failure");
    }

    Ok(())
}
