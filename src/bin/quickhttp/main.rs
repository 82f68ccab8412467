mod args;
mod error;
mod serve;

use clap::Parser;
use proc_exit::prelude::*;

/// Serve a directory over HTTP until it goes idle
///
/// Finds an open port unless one is given, and shuts the server down once no request has
/// arrived for `--time`.
#[derive(Debug, Parser)]
#[command(name = "quickhttp", version)]
struct Cli {
    #[command(flatten)]
    serve: serve::ServeArgs,

    #[command(flatten)]
    color: colorchoice_clap::Color,

    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,
}

fn main() {
    human_panic::setup_panic!();
    let result = run();
    proc_exit::exit(result);
}

fn run() -> proc_exit::ExitResult {
    let cli = Cli::parse();

    cli.color.write_global();
    let colored_stderr =
        anstream::AutoStream::choice(&std::io::stderr()) != anstream::ColorChoice::Never;
    args::init_logging(cli.verbose.log_level(), colored_stderr);

    cli.serve
        .run()
        .map_err(|err| format!("{err:#}"))
        .with_code(proc_exit::Code::FAILURE)?;

    Ok(())
}

#[test]
fn verify_app() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
