mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::create::CreateArgs;
use commands::EXIT_FAILURE;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use vzprov_core::{install_signal_handler, Engine};
use vzprov_schema::{Ctid, NetifChange, Settings, Verb};

#[derive(Debug, Parser)]
#[command(
    name = "vzprov",
    version,
    about = "Provision and configure OpenVZ containers through vzctl"
)]
struct Cli {
    /// Settings file (default: $VZPROV_CONFIG, then /etc/vzprov/vzprov.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

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
    #[command(flatten)]
    Container(ContainerCommand),
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

/// Commands that work on containers and need the settings file.
#[derive(Debug, Subcommand)]
enum ContainerCommand {
    /// Create a container, filling unset parameters from the default table.
    Create(CreateArgs),
    /// Start a container.
    Start { ctid: Ctid },
    /// Stop a container.
    Stop { ctid: Ctid },
    /// Restart a container.
    Restart { ctid: Ctid },
    /// Destroy a container and its private area.
    Destroy {
        ctid: Ctid,
        /// Do not ask for confirmation.
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
    /// Mount a container's private area.
    Mount { ctid: Ctid },
    /// Unmount a container's private area.
    #[command(alias = "umount")]
    Unmount { ctid: Ctid },
    /// Show a container's status.
    Status { ctid: Ctid },
    /// Change container parameters, persisted with --save (flags after --).
    Set {
        ctid: Ctid,
        /// vzctl set flags, e.g. `-- --cpus 2 --ram 1G`.
        #[arg(required = true, last = true)]
        args: Vec<String>,
    },
    /// Run a command inside a container through its shell.
    Exec {
        ctid: Ctid,
        /// Command line to run (after --).
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },
    /// Like exec, but return the command's own exit status.
    Exec2 {
        ctid: Ctid,
        /// Command line to run (after --).
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },
    /// Merge an interface change into a container's NETIF configuration.
    Netif {
        ctid: Ctid,
        /// Change such as `ifname=eth0,bridge=vmbr0`; ifname defaults from settings.
        change: NetifChange,
    },
    /// List all container IDs known to the backend.
    List,
    /// Run a JSON named-parameter invocation and print a JSON result.
    Invoke {
        /// Parameters file, or `-` for stdin.
        #[arg(long = "args", value_name = "FILE")]
        args: PathBuf,
    },
    /// Check backend tools, settings and privileges.
    Doctor,
}

impl ContainerCommand {
    /// Commands that run backend tools and therefore need them installed.
    fn needs_backend(&self) -> bool {
        !matches!(self, ContainerCommand::Netif { .. } | ContainerCommand::Doctor)
    }
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
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("VZPROV_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let result = match cli.command {
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
        Commands::Container(command) => load_settings(cli.config.as_deref())
            .and_then(|settings| dispatch(command, settings, cli.json)),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn load_settings(explicit: Option<&Path>) -> Result<Settings, String> {
    Settings::load_default(explicit).map_err(|e| format!("settings error: {e}"))
}

fn dispatch(command: ContainerCommand, settings: Settings, json: bool) -> Result<u8, String> {
    if command.needs_backend() && std::env::var("VZPROV_SKIP_PREREQS").as_deref() != Ok("1") {
        let missing = vzprov_runtime::check_backend_prereqs(&settings.backend);
        if !missing.is_empty() {
            return Err(vzprov_runtime::format_missing(&missing));
        }
    }

    let engine = Engine::with_system(settings);
    let simple = |verb, ctid| commands::verb::run(&engine, verb, ctid, None, json);
    match command {
        ContainerCommand::Create(args) => commands::create::run(&engine, args, json),
        ContainerCommand::Start { ctid } => simple(Verb::Start, ctid),
        ContainerCommand::Stop { ctid } => simple(Verb::Stop, ctid),
        ContainerCommand::Restart { ctid } => simple(Verb::Restart, ctid),
        ContainerCommand::Destroy { ctid, yes } => {
            commands::destroy::run(&engine, ctid, yes, json)
        }
        ContainerCommand::Mount { ctid } => simple(Verb::Mount, ctid),
        ContainerCommand::Unmount { ctid } => simple(Verb::Unmount, ctid),
        ContainerCommand::Status { ctid } => simple(Verb::Status, ctid),
        ContainerCommand::Set { ctid, args } => {
            let text = commands::verb::join_args(&args);
            commands::verb::run(&engine, Verb::Set, ctid, text.as_deref(), json)
        }
        ContainerCommand::Exec { ctid, command } => {
            let text = commands::verb::join_command(&command);
            commands::verb::run(&engine, Verb::Exec, ctid, text.as_deref(), json)
        }
        ContainerCommand::Exec2 { ctid, command } => {
            let text = commands::verb::join_command(&command);
            commands::verb::run(&engine, Verb::Exec2, ctid, text.as_deref(), json)
        }
        ContainerCommand::Netif { ctid, change } => {
            commands::netif::run(&engine, ctid, change, json)
        }
        ContainerCommand::List => commands::list::run(&engine, json),
        ContainerCommand::Invoke { args } => commands::invoke::run(&engine, &args),
        ContainerCommand::Doctor => commands::doctor::run(&engine, json),
    }
}
