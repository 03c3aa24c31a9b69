use clap::Parser;
use geofill_core::DEFAULT_DATA_FILE;
use std::path::PathBuf;

/// Fill in coordinates and countries for the places in a travel data file
#[derive(Parser, Debug)]
#[command(name = "geofill")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Geocodes places via OpenStreetMap Nominatim and writes the results back", long_about = None)]
pub struct Args {
    /// JSON file with a "locations" list; updated in place
    #[arg(value_name = "FILE", default_value = DEFAULT_DATA_FILE)]
    pub file: PathBuf,

    /// List the places that would be geocoded without contacting the service
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Language for returned addresses and country names
    #[arg(long = "language", default_value = "en")]
    pub language: String,
}

/// Parses command-line arguments
pub fn parse_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["geofill"]);
        assert_eq!(args.file, PathBuf::from("travel_data.json"));
        assert_eq!(args.language, "en");
        assert!(!args.dry_run);
        assert!(!args.verbose);
    }

    #[test]
    fn test_flags() {
        let args = Args::parse_from(["geofill", "-n", "-v", "--language", "de", "trips/2024.json"]);
        assert_eq!(args.file, PathBuf::from("trips/2024.json"));
        assert_eq!(args.language, "de");
        assert!(args.dry_run);
        assert!(args.verbose);
    }
}
