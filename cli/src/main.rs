#[cfg(feature = "jemalloc")]
use jemallocator::Jemalloc;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod cli_interface;
mod commands;
mod console;

use std::process::ExitCode;

use clap::Parser;
use mysql_batch::setup_logger;

use crate::{cli_interface::CLI, commands::run::handle_run_command};

// One session, one thread: pages and batches are awaited strictly in order.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = CLI::parse();
    setup_logger(cli.log_level);

    handle_run_command(&cli).await.into()
}
