use clap::Parser;

pub mod cli;
pub mod commands;
pub mod error;
pub mod projection;
pub mod session;
pub mod steps;
pub mod tree;
pub mod util;

pub use error::{BuilderError, Result};
pub use session::BuilderSession;

pub fn run() {
    let cli = cli::Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(cli::execute(cli)) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
