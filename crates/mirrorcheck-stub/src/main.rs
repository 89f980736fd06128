use clap::Parser;
use mirrorcheck_stub::StubState;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "mirrorcheck-stub",
    version,
    about = "Canned-response stand-in for the sync web service"
)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8321)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// TOML file with `[[routes]]` entries.
    #[arg(long)]
    routes: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let state = StubState::new();
    if let Some(path) = &cli.routes {
        match mirrorcheck_stub::load_routes(path) {
            Ok(routes) => {
                for (route, response) in routes {
                    info!("route {route} -> {}", response.status);
                    state.route(&route, response);
                }
            }
            Err(e) => {
                error!("{}: {e}", path.display());
                return ExitCode::from(2);
            }
        }
    }

    let addr = format!("{}:{}", cli.bind, cli.port);
    info!("starting mirrorcheck-stub on {addr}");
    if let Err(e) = mirrorcheck_stub::run_server(&state, &addr) {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
