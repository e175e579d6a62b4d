use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "fanficdl=debug"
    } else if quiet {
        "fanficdl=error"
    } else {
        "fanficdl=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = fanficdl::cli::Args::parse();
    init_logging(args.verbose, args.quiet);
    if let Err(e) = fanficdl::cli::run(&args) {
        eprintln!("{}", e);
        if args.verbose {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
