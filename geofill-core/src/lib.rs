use anyhow::Result;
use std::path::Path;
use std::time::Duration;

// Internal modules (private)
mod document;
mod geocoding;
mod progress;
mod rate_limiter;
mod resolver;
mod selector;

// Re-export public types
pub use document::{Country, Document, DocumentError, Location, ERROR_SENTINEL, NOT_FOUND_SENTINEL};
pub use geocoding::{GeoMatch, Geocoder, LookupError, NominatimGeocoder};
pub use progress::{ProgressCallback, ProgressReporter};
pub use rate_limiter::RateLimiter;
pub use resolver::{country_from_address, Outcome, Resolver, RunSummary};
pub use selector::select;

/// Default data file, read and overwritten in place
pub const DEFAULT_DATA_FILE: &str = "travel_data.json";

/// Configuration options for a geocoding run
#[derive(Debug, Clone)]
pub struct GeofillConfig {
    /// Language requested for addresses (and so for country names)
    pub language: String,
    /// Minimum time between two requests to the geocoding service
    pub min_delay: Duration,
    /// Pause before retrying a failed request
    pub error_wait: Duration,
    /// Retries per place after the first attempt
    pub max_retries: u32,
    /// HTTP request timeout
    pub timeout: Duration,
    /// Nominatim base URL
    pub endpoint: String,
    /// User-Agent sent to Nominatim, which requires an identifying one
    pub user_agent: String,
}

impl Default for GeofillConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            min_delay: Duration::from_secs(1), // Nominatim usage policy: 1 request per second
            error_wait: Duration::from_secs(5),
            max_retries: 2,
            timeout: Duration::from_secs(10),
            endpoint: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: format!("geofill/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    /// The document has no locations; nothing was written
    EmptyInput,
    /// Every location already has coordinates and a country; nothing was written
    NothingToDo,
    /// Dry run: the place names that would be geocoded, in order
    DryRun { pending: Vec<Option<String>> },
    /// Lookups ran but no record changed, so the file was left alone
    Unchanged(RunSummary),
    /// Records were updated and the document was written back
    Updated(RunSummary),
}

/// Main engine: load, select, resolve, save
pub struct GeofillEngine {
    config: GeofillConfig,
    geocoder: Box<dyn Geocoder>,
    progress: ProgressReporter,
}

impl GeofillEngine {
    /// Create an engine that geocodes through Nominatim
    pub fn new(config: GeofillConfig) -> Result<Self> {
        let geocoder = NominatimGeocoder::new(&config.endpoint, &config.user_agent, config.timeout)?;
        Ok(Self::with_geocoder(config, Box::new(geocoder)))
    }

    /// Create an engine with a custom geocoding backend
    pub fn with_geocoder(config: GeofillConfig, geocoder: Box<dyn Geocoder>) -> Self {
        Self {
            config,
            geocoder,
            progress: ProgressReporter::new(None),
        }
    }

    /// Send status lines to `callback` instead of stdout
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = ProgressReporter::new(Some(callback));
        self
    }

    /// Fill in missing coordinates and countries in the document at `path`.
    ///
    /// The file is only written when at least one record changed. Load and
    /// write failures are returned; per-record lookup failures are recorded
    /// in the document and never abort the run.
    pub fn run(&self, path: &Path, dry_run: bool) -> Result<RunReport, DocumentError> {
        self.progress
            .report(&format!("Reading data from {}...", path.display()));
        let mut document = Document::load(path)?;

        if document.locations.is_empty() {
            self.progress.report("No locations found in the JSON file.");
            return Ok(RunReport::EmptyInput);
        }

        let selected = select(&document.locations);
        if selected.is_empty() {
            self.progress.report(
                "All locations already have full coordinate and country data. Nothing to do.",
            );
            return Ok(RunReport::NothingToDo);
        }

        self.progress.report(&format!(
            "Found {} of {} locations that need geocoding.",
            selected.len(),
            document.locations.len()
        ));

        if dry_run {
            let pending: Vec<Option<String>> = selected
                .iter()
                .map(|&i| document.locations[i].place().map(str::to_string))
                .collect();
            for (i, place) in pending.iter().enumerate() {
                let label = place.as_deref().unwrap_or("<no place name>");
                self.progress
                    .report(&format!("[DRY RUN] ({}/{}) {}", i + 1, pending.len(), label));
            }
            return Ok(RunReport::DryRun { pending });
        }

        let limiter = RateLimiter::new(
            self.config.min_delay,
            self.config.error_wait,
            self.config.max_retries,
        );
        let mut resolver = Resolver::new(self.geocoder.as_ref(), limiter, &self.config.language);
        let summary = resolver.resolve_all(&mut document.locations, &selected, &self.progress);

        log::info!(
            "Resolved {}, partial {}, not found {}, errors {}, skipped {}",
            summary.resolved,
            summary.partial,
            summary.not_found,
            summary.errors,
            summary.skipped
        );

        if summary.updated() == 0 {
            self.progress.report(&format!(
                "\nNo locations were updated; {} left untouched.",
                path.display()
            ));
            return Ok(RunReport::Unchanged(summary));
        }

        document.save(path)?;
        self.progress
            .report(&format!("\nSuccessfully updated {}!", path.display()));

        Ok(RunReport::Updated(summary))
    }
}
