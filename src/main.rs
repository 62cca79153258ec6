use clap::Parser;

use collage::cli;
use collage::logger;

fn main() {
    // Session log (overwrites previous session log)
    logger::init();

    let args = cli::CliArgs::parse();
    if args.verbose
        && let Some(path) = logger::log_path()
    {
        println!("log: {}", path.display());
    }
    let code = cli::run(args);
    std::process::exit(if code == std::process::ExitCode::SUCCESS { 0 } else { 1 });
}
