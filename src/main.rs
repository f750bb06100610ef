// src/main.rs

use cmdpipe::{cli, logging, run};

// Concurrent steps build their own tokio runtime.
fn main() {
    if let Err(err) = run_main() {
        eprintln!("cmdpipe error: {err:?}");
        std::process::exit(1);
    }
}

fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args)
}
