mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_MANIFEST_ERROR};
use mirrorcheck_manifest::ManifestEncoding;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "mirrorcheck",
    version,
    about = "Verify that cloud and ancor hosts serve the same synchronized content"
)]
struct Cli {
    /// Path to the JSON configuration file (default depends on the subcommand).
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

    /// Never send result mail, even when the config enables it.
    #[arg(long, default_value_t = false, global = true)]
    no_email: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll every configured web service endpoint on the cloud host.
    Endpoints {
        /// Cloud host address.
        cloud_ip: String,
        /// Ancor host address.
        ancor_ip: String,
    },
    /// Compare folder checksum manifests between the ancor and cloud hosts.
    Checksums {
        /// Cloud host address.
        cloud_ip: String,
        /// Ancor host address.
        ancor_ip: String,
    },
    /// Poll endpoints, then compare checksums.
    Run {
        /// Cloud host address.
        cloud_ip: String,
        /// Ancor host address.
        ancor_ip: String,
    },
    /// Run the response-contract cases against the cloud web service.
    Suite {
        /// TOML case files, run in the given order.
        #[arg(long, required = true, num_args = 1..)]
        cases: Vec<PathBuf>,
        /// Use the reference manifests already in the download directory.
        #[arg(long, default_value_t = false)]
        skip_download: bool,
    },
    /// Compare two local manifest files.
    Diff {
        /// Left (ancor) manifest.
        left: PathBuf,
        /// Right (cloud) manifest.
        right: PathBuf,
        /// Encoding of the left file: lines, double_pipe or auto.
        #[arg(long, default_value = "auto")]
        left_encoding: ManifestEncoding,
        /// Encoding of the right file: lines, double_pipe or auto.
        #[arg(long, default_value = "auto")]
        right_encoding: ManifestEncoding,
    },
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
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MIRRORCHECK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let opts = commands::RunOptions {
        config: cli.config,
        json: cli.json,
        send_email: !cli.no_email,
    };

    let result = match cli.command {
        Commands::Endpoints { cloud_ip, ancor_ip } => {
            commands::endpoints::run(&opts, &cloud_ip, &ancor_ip)
        }
        Commands::Checksums { cloud_ip, ancor_ip } => {
            commands::checksums::run(&opts, &cloud_ip, &ancor_ip)
        }
        Commands::Run { cloud_ip, ancor_ip } => commands::run::run(&opts, &cloud_ip, &ancor_ip),
        Commands::Suite {
            cases,
            skip_download,
        } => commands::suite::run(&opts, &cases, skip_download),
        Commands::Diff {
            left,
            right,
            left_encoding,
            right_encoding,
        } => commands::diff::run(&left, &right, left_encoding, right_encoding, opts.json),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("failed to read config")
                || msg.starts_with("failed to parse config")
                || msg.starts_with("invalid config")
                || msg.starts_with("failed to read case file")
                || msg.starts_with("failed to parse case file")
            {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("failed to read manifest")
                || msg.starts_with("malformed manifest line")
            {
                EXIT_MANIFEST_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
