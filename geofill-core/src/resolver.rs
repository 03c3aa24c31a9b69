use crate::document::{Country, Location};
use crate::geocoding::Geocoder;
use crate::progress::ProgressReporter;
use crate::rate_limiter::RateLimiter;

/// What happened to one selected record
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Coordinates found. `country` is None when the address had no usable last part.
    Resolved {
        lat: f64,
        lon: f64,
        country: Option<String>,
    },
    /// The service had no match
    NotFound,
    /// Every attempt failed; holds the last error message
    Error(String),
    /// The record has no place name
    Skipped,
}

impl Outcome {
    /// Write this outcome into the record. Skipped leaves it untouched.
    pub fn apply(&self, location: &mut Location) {
        match self {
            Outcome::Resolved { lat, lon, country } => {
                location.set_coordinates(*lat, *lon);
                location.set_country(match country {
                    Some(name) => Country::Name(name.clone()),
                    None => Country::Unparsed,
                });
            }
            Outcome::NotFound => location.set_country(Country::NotFound),
            Outcome::Error(_) => location.set_country(Country::LookupError),
            Outcome::Skipped => {}
        }
    }
}

/// Per-outcome counts for one resolution pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub resolved: usize,
    /// Coordinates found but no country could be read from the address
    pub partial: usize,
    pub not_found: usize,
    pub errors: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Resolved { country: Some(_), .. } => self.resolved += 1,
            Outcome::Resolved { country: None, .. } => self.partial += 1,
            Outcome::NotFound => self.not_found += 1,
            Outcome::Error(_) => self.errors += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }

    /// Number of records whose fields were written
    pub fn updated(&self) -> usize {
        self.resolved + self.partial + self.not_found + self.errors
    }
}

/// Country is the last comma-separated part of the address
pub fn country_from_address(address: &str) -> Option<String> {
    address
        .rsplit(',')
        .next()
        .map(str::trim)
        .filter(|country| !country.is_empty())
        .map(str::to_string)
}

/// Looks up selected records one at a time through a shared rate limiter
pub struct Resolver<'a> {
    geocoder: &'a dyn Geocoder,
    limiter: RateLimiter,
    language: String,
}

impl<'a> Resolver<'a> {
    pub fn new(geocoder: &'a dyn Geocoder, limiter: RateLimiter, language: &str) -> Self {
        Self {
            geocoder,
            limiter,
            language: language.to_string(),
        }
    }

    /// Resolve a single place name
    pub fn resolve(&mut self, place: &str) -> Outcome {
        let geocoder = self.geocoder;
        let language = self.language.as_str();

        match self.limiter.call(|| geocoder.geocode(place, language)) {
            Ok(Some(geo)) => Outcome::Resolved {
                lat: geo.latitude,
                lon: geo.longitude,
                country: country_from_address(&geo.address),
            },
            Ok(None) => Outcome::NotFound,
            Err(e) => Outcome::Error(e.to_string()),
        }
    }

    /// Resolve the records at `selected` in order, updating them in place.
    /// Indices past the end of `locations` are ignored.
    pub fn resolve_all(
        &mut self,
        locations: &mut [Location],
        selected: &[usize],
        progress: &ProgressReporter,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let total = selected.len();
        let len = locations.len();

        for (i, &index) in selected.iter().enumerate() {
            let location = match locations.get_mut(index) {
                Some(location) => location,
                None => {
                    log::warn!("Ignoring selected index {} past {} locations", index, len);
                    continue;
                }
            };
            let position = format!("({}/{})", i + 1, total);

            let place = match location.place() {
                Some(place) => place.to_string(),
                None => {
                    progress.report(&format!(
                        "{} Skipping a location because it has no 'place' name.",
                        position
                    ));
                    summary.record(&Outcome::Skipped);
                    continue;
                }
            };

            progress.report(&format!("{} Geocoding '{}'...", position, place));
            let outcome = self.resolve(&place);
            progress.report(&describe(&outcome, &place));

            if let Outcome::Error(e) = &outcome {
                log::warn!("Geocoding '{}' failed: {}", place, e);
            }

            outcome.apply(location);
            summary.record(&outcome);
        }

        summary
    }
}

fn describe(outcome: &Outcome, place: &str) -> String {
    match outcome {
        Outcome::Resolved {
            lat,
            lon,
            country: Some(country),
        } => format!("  -> Success: ({:.4}, {:.4}) - Country: {}", lat, lon, country),
        Outcome::Resolved { lat, lon, country: None } => format!(
            "  -> Success: ({:.4}, {:.4}), but could not parse a country from the address",
            lat, lon
        ),
        Outcome::NotFound => format!(
            "  -> Failed: Could not find coordinates for '{}'. Marked as failed.",
            place
        ),
        Outcome::Error(e) => format!(
            "  -> Error: geocoding '{}' raised an error: {}. Marked as error.",
            place, e
        ),
        Outcome::Skipped => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoding::{GeoMatch, LookupError};
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::time::Duration;

    /// Answers from a fixed table; records every query it sees
    struct TableGeocoder {
        calls: RefCell<Vec<String>>,
    }

    impl Geocoder for TableGeocoder {
        fn geocode(&self, query: &str, language: &str) -> Result<Option<GeoMatch>, LookupError> {
            assert_eq!(language, "en");
            self.calls.borrow_mut().push(query.to_string());
            match query {
                "Paris" => Ok(Some(GeoMatch {
                    latitude: 48.8566,
                    longitude: 2.3522,
                    address: "Paris, Île-de-France, France".to_string(),
                })),
                "Null Island" => Ok(Some(GeoMatch {
                    latitude: 0.0,
                    longitude: 0.0,
                    address: String::new(),
                })),
                "Timbuktu" => Err(LookupError::Transient("timed out".to_string())),
                _ => Ok(None),
            }
        }
    }

    fn resolver(geocoder: &TableGeocoder) -> Resolver<'_> {
        Resolver::new(geocoder, RateLimiter::new(Duration::ZERO, Duration::ZERO, 2), "en")
    }

    fn location(value: Value) -> Location {
        match value {
            Value::Object(fields) => Location::new(fields),
            _ => panic!("test location must be an object"),
        }
    }

    #[test]
    fn test_country_from_address() {
        assert_eq!(
            country_from_address("Paris, Île-de-France, France"),
            Some("France".to_string())
        );
        assert_eq!(country_from_address("Antarctica"), Some("Antarctica".to_string()));
        assert_eq!(country_from_address("Somewhere,  "), None);
        assert_eq!(country_from_address(""), None);
    }

    #[test]
    fn test_resolve_outcomes() {
        let geocoder = TableGeocoder {
            calls: RefCell::new(Vec::new()),
        };
        let mut resolver = resolver(&geocoder);

        assert_eq!(
            resolver.resolve("Paris"),
            Outcome::Resolved {
                lat: 48.8566,
                lon: 2.3522,
                country: Some("France".to_string())
            }
        );
        assert_eq!(resolver.resolve("Zzzxxnotaplace"), Outcome::NotFound);
        assert_eq!(
            resolver.resolve("Null Island"),
            Outcome::Resolved {
                lat: 0.0,
                lon: 0.0,
                country: None
            }
        );
        assert!(matches!(resolver.resolve("Timbuktu"), Outcome::Error(_)));
    }

    #[test]
    fn test_error_exhausts_retry_budget() {
        let geocoder = TableGeocoder {
            calls: RefCell::new(Vec::new()),
        };
        resolver(&geocoder).resolve("Timbuktu");
        assert_eq!(geocoder.calls.borrow().len(), 3);
    }

    #[test]
    fn test_resolve_all_updates_selected_records_only() {
        let geocoder = TableGeocoder {
            calls: RefCell::new(Vec::new()),
        };
        let mut locations = vec![
            location(json!({"place": "Paris"})),
            location(json!({"place": "Berlin", "lat": 52.5, "lon": 13.4, "country": "Germany"})),
            location(json!({"note": "no place"})),
            location(json!({"place": "Zzzxxnotaplace"})),
            location(json!({"place": "Timbuktu"})),
            location(json!({"place": "Null Island"})),
        ];
        let untouched = locations[1].clone();

        let summary =
            resolver(&geocoder).resolve_all(&mut locations, &[0, 2, 3, 4, 5], &ProgressReporter::silent());

        assert_eq!(
            summary,
            RunSummary {
                resolved: 1,
                partial: 1,
                not_found: 1,
                errors: 1,
                skipped: 1,
            }
        );
        assert_eq!(summary.updated(), 4);

        assert_eq!(locations[0].country(), Some(Country::Name("France".to_string())));
        assert_eq!(locations[0].lat(), Some(48.8566));
        assert_eq!(locations[1], untouched);
        assert_eq!(locations[2], location(json!({"note": "no place"})));
        assert_eq!(locations[3].country(), Some(Country::NotFound));
        assert_eq!(locations[3].lat(), None);
        assert_eq!(locations[4].country(), Some(Country::LookupError));
        assert_eq!(locations[4].lon(), None);
        assert_eq!(locations[5].country(), Some(Country::Unparsed));
        assert_eq!(locations[5].lat(), Some(0.0));

        assert_eq!(
            *geocoder.calls.borrow(),
            ["Paris", "Zzzxxnotaplace", "Timbuktu", "Timbuktu", "Timbuktu", "Null Island"]
        );
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let geocoder = TableGeocoder {
            calls: RefCell::new(Vec::new()),
        };
        let mut locations = vec![location(json!({"place": "Paris"}))];

        let summary = resolver(&geocoder).resolve_all(&mut locations, &[3, 0], &ProgressReporter::silent());

        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.updated(), 1);
        assert_eq!(*geocoder.calls.borrow(), ["Paris"]);
    }

    #[test]
    fn test_one_limiter_spaces_the_whole_pass() {
        let geocoder = TableGeocoder {
            calls: RefCell::new(Vec::new()),
        };
        let limiter = RateLimiter::new(Duration::from_millis(30), Duration::ZERO, 2);
        let mut resolver = Resolver::new(&geocoder, limiter, "en");
        let mut locations = vec![
            location(json!({"place": "Paris"})),
            location(json!({"place": "Zzzxxnotaplace"})),
            location(json!({"place": "Null Island"})),
        ];

        let start = std::time::Instant::now();
        resolver.resolve_all(&mut locations, &[0, 1, 2], &ProgressReporter::silent());

        // First lookup is immediate, the other two each wait for the limiter
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert_eq!(geocoder.calls.borrow().len(), 3);
    }

    #[test]
    fn test_progress_lines_in_order() {
        let geocoder = TableGeocoder {
            calls: RefCell::new(Vec::new()),
        };
        let lines = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = lines.clone();
        let progress = ProgressReporter::new(Some(Box::new(move |msg: &str| {
            sink.lock().unwrap().push(msg.to_string());
        })));

        let mut locations = vec![location(json!({})), location(json!({"place": "Paris"}))];
        resolver(&geocoder).resolve_all(&mut locations, &[0, 1], &progress);

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("(1/2) Skipping"));
        assert_eq!(lines[1], "(2/2) Geocoding 'Paris'...");
        assert_eq!(lines[2], "  -> Success: (48.8566, 2.3522) - Country: France");
    }
}
