use anyhow::Result;
use clap::{Parser, Subcommand};
use zsdk::{InstallArgs, SdkEnv};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};
    tracing_log::LogTracer::init().ok();
    let env = std::env::var("ZSDK_LOG").unwrap_or_else(|_| "error".into());
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_span_events(FmtSpan::ACTIVE | FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::new(env))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    log_panics::init();
    let args = Args::parse();
    args.command.run()
}

#[derive(Subcommand)]
enum Commands {
    /// Download and install the sdk, then record its path in the CI env file
    Install {
        #[clap(flatten)]
        args: InstallArgs,
    },
    /// Show which release asset would be installed
    Show {
        #[clap(flatten)]
        args: InstallArgs,
    },
}

impl Commands {
    pub fn run(self) -> Result<()> {
        match self {
            Self::Install { args } => {
                let env = SdkEnv::new(args)?;
                zsdk::install(&env)?;
            }
            Self::Show { args } => {
                let env = SdkEnv::new(args)?;
                zsdk::show(&env)?;
            }
        }
        Ok(())
    }
}
