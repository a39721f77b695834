mod args;
mod smartvote;

use clap::Parser;
use log::debug;

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() {
    let args = args::Args::parse();
    init_logging(args.verbose);
    debug!("args: {:?}", args);

    if let Err(e) = smartvote::run(&args) {
        eprintln!("An error occured: {}", e);
        let mut source = std::error::Error::source(&*e);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}
