use clap::Parser;
use redgreen::cli::{self, Cli};
use redgreen::logging;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    logging::init(args.verbose);
    let code = cli::run(args).await;
    std::process::exit(code.as_i32());
}
