use anyhow::Result;
use geofill_core::{DocumentError, GeofillConfig, GeofillEngine, RunReport};

mod cli;

fn main() -> Result<()> {
    let args = cli::parse_args();

    // Initialize logger with appropriate level based on verbose flag
    if std::env::var("RUST_LOG").is_err() {
        if args.verbose {
            std::env::set_var("RUST_LOG", "debug");
        } else {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    if args.dry_run {
        log::info!("Running in DRY-RUN mode - no requests will be sent and nothing will be written");
    }

    let config = GeofillConfig {
        language: args.language.clone(),
        ..GeofillConfig::default()
    };
    let engine = GeofillEngine::new(config)?;

    match engine.run(&args.file, args.dry_run) {
        Ok(RunReport::Updated(summary)) | Ok(RunReport::Unchanged(summary)) => {
            if summary.errors > 0 {
                log::warn!(
                    "{} places could not be geocoded because of errors; they are marked and will not be retried",
                    summary.errors
                );
            }
            log::info!("Processing complete!");
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e @ DocumentError::Write { .. }) => {
            eprintln!("\nError: {}", e);
            eprintln!("The geocoding results of this run were not saved.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
