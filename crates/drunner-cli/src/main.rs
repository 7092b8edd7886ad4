mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::EXIT_FAILURE;
use drunner_core::{Context, Settings};
use drunner_runtime::{CliArchiver, DockerCli};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "drunner",
    version,
    about = "Manage containerised services: install, back up, restore, remove"
)]
struct Cli {
    /// Root directory for drunner state (services, host volumes, temp).
    #[arg(long, default_value = "~/.drunner")]
    root: String,

    /// Directory for per-service launch scripts (defaults to <root>/bin).
    #[arg(long)]
    bin_dir: Option<PathBuf>,

    /// Host IP recorded in service variables for in-container scripts.
    #[arg(long, default_value = "127.0.0.1")]
    host_ip: String,

    /// Image used for root helper containers and the archive pipeline.
    #[arg(long, default_value = drunner_core::settings::DEFAULT_SUPPORT_IMAGE)]
    support_image: String,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install a service from a container image.
    Install {
        /// Name for the new service.
        name: String,
        /// Image to install from (e.g. drunner/minecraft).
        image: String,
    },
    /// Re-pull the image and rebuild a service, preserving its data.
    Update {
        /// Installed service name.
        name: String,
    },
    /// Remove a service but keep its docker volumes.
    Uninstall {
        /// Installed service name.
        name: String,
    },
    /// Destroy a service and all of its data, including docker volumes.
    Obliterate {
        /// Service name (need not be fully installed).
        name: String,
    },
    /// Repair a broken service by reinstalling it; data is preserved.
    Recover {
        /// Service name.
        name: String,
        /// Image to reinstall from (defaults to the recorded one).
        image: Option<String>,
    },
    /// Back up a service into a single encrypted archive.
    Backup {
        /// Installed service name.
        name: String,
        /// Destination file; must not already exist.
        dest: PathBuf,
    },
    /// Restore a service from a backup archive.
    Restore {
        /// Name for the restored service; must not be installed.
        name: String,
        /// Backup archive produced by `drunner backup`.
        backup_file: PathBuf,
    },
    /// Forward a command to a service's servicerunner script.
    Servicecmd {
        /// Installed service name.
        name: String,
        /// Command and arguments for the script.
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// List installed services.
    List,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("DRUNNER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    // Completions need no settings and must not touch the filesystem.
    if let Commands::Completions { shell } = &cli.command {
        return match commands::completions::run::<Cli>(*shell) {
            Ok(code) => ExitCode::from(code),
            Err(_) => ExitCode::from(EXIT_FAILURE),
        };
    }

    let mut settings = Settings::new(expand_tilde(&cli.root))
        .with_host_ip(cli.host_ip.clone())
        .with_support_image(cli.support_image.clone());
    if let Some(bin_dir) = &cli.bin_dir {
        settings = settings.with_bin_dir(bin_dir.clone());
    }
    if let Err(e) = settings.initialize() {
        eprintln!("error: cannot initialize {}: {e}", settings.root().display());
        return ExitCode::from(EXIT_FAILURE);
    }

    let support_image = settings.support_image().to_owned();
    let ctx = Context::new(
        settings,
        Box::new(DockerCli::new()),
        Box::new(CliArchiver::new(support_image)),
    );

    let result = match cli.command {
        Commands::Install { name, image } => commands::install::run(&ctx, &name, &image),
        Commands::Update { name } => commands::update::run(&ctx, &name),
        Commands::Uninstall { name } => commands::uninstall::run(&ctx, &name),
        Commands::Obliterate { name } => commands::obliterate::run(&ctx, &name),
        Commands::Recover { name, image } => {
            commands::recover::run(&ctx, &name, image.as_deref())
        }
        Commands::Backup { name, dest } => commands::backup::run(&ctx, &name, &dest),
        Commands::Restore { name, backup_file } => {
            commands::restore::run(&ctx, &name, &backup_file)
        }
        Commands::Servicecmd { name, args } => commands::servicecmd::run(&ctx, &name, &args),
        Commands::List => commands::list::run(&ctx),
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
