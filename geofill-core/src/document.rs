use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stored in `country` when the provider had no match for the place
pub const NOT_FOUND_SENTINEL: &str = "Geocoding Failed";
/// Stored in `country` when every lookup attempt raised an error
pub const ERROR_SENTINEL: &str = "Geocoding Error";

const LOCATIONS_KEY: &str = "locations";

/// Errors raised while reading or writing the travel data file
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{} does not exist", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("{} is not a valid locations document: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("failed to serialize {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Country value of a location, with the failure markers decoded
#[derive(Debug, Clone, PartialEq)]
pub enum Country {
    /// A country name taken from the geocoded address
    Name(String),
    /// The provider returned no match
    NotFound,
    /// The lookup raised an error on every attempt
    LookupError,
    /// Coordinates were found but the address had no usable country part
    Unparsed,
}

impl Country {
    /// Decode a stored `country` value. Returns None when the key is absent.
    fn from_value(value: Option<&Value>) -> Option<Self> {
        match value? {
            Value::Null => Some(Country::Unparsed),
            Value::String(s) if s == NOT_FOUND_SENTINEL => Some(Country::NotFound),
            Value::String(s) if s == ERROR_SENTINEL => Some(Country::LookupError),
            Value::String(s) => Some(Country::Name(s.clone())),
            other => Some(Country::Name(other.to_string())),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Country::Name(name) => Value::String(name.clone()),
            Country::NotFound => Value::String(NOT_FOUND_SENTINEL.to_string()),
            Country::LookupError => Value::String(ERROR_SENTINEL.to_string()),
            Country::Unparsed => Value::Null,
        }
    }
}

/// A single place entry. Keys are kept in file order; unknown keys are
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Location {
    fields: Map<String, Value>,
}

impl Location {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Place name to look up. Empty strings count as missing.
    pub fn place(&self) -> Option<&str> {
        self.fields
            .get("place")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn lat(&self) -> Option<f64> {
        self.fields.get("lat").and_then(Value::as_f64)
    }

    pub fn lon(&self) -> Option<f64> {
        self.fields.get("lon").and_then(Value::as_f64)
    }

    /// Decoded `country`. A stored `null` decodes to [`Country::Unparsed`].
    pub fn country(&self) -> Option<Country> {
        Country::from_value(self.fields.get("country"))
    }

    pub fn set_coordinates(&mut self, lat: f64, lon: f64) {
        self.set_number("lat", lat);
        self.set_number("lon", lon);
    }

    pub fn set_country(&mut self, country: Country) {
        self.fields.insert("country".to_string(), country.to_value());
    }

    /// True when `lat`, `lon` and `country` all hold a non-null value, or when
    /// `country` records a failed lookup. Failed places are never retried.
    pub fn is_complete(&self) -> bool {
        if matches!(self.country(), Some(Country::NotFound | Country::LookupError)) {
            return true;
        }
        ["lat", "lon", "country"].iter().all(|key| self.has_value(key))
    }

    fn has_value(&self, key: &str) -> bool {
        self.fields.get(key).map(|v| !v.is_null()).unwrap_or(false)
    }

    fn set_number(&mut self, key: &str, value: f64) {
        // NaN and infinities have no JSON form
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        self.fields.insert(key.to_string(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// The travel data file: a `locations` array plus any other root keys
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Map<String, Value>,
    pub locations: Vec<Location>,
}

impl Document {
    /// Load and parse the document at `path`
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        if !path.exists() {
            return Err(DocumentError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let data = fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&data).map_err(|reason| DocumentError::Malformed {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse document text. Errors describe why the content was rejected.
    pub fn parse(data: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(data).map_err(|e| e.to_string())?;

        let mut root = match value {
            Value::Object(map) => map,
            other => return Err(format!("expected an object at the root, found {}", kind(&other))),
        };

        let locations = match root.get_mut(LOCATIONS_KEY).map(Value::take) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(fields) => Ok(Location::new(fields)),
                    other => Err(format!("locations[{}] is {}, expected an object", i, kind(&other))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(format!("\"locations\" is {}, expected an array", kind(&other)))
            }
        };

        Ok(Self { root, locations })
    }

    /// Write the document back to `path`, overwriting it
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let data = self.to_pretty_json().map_err(|source| DocumentError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;

        fs::write(path, data).map_err(|source| DocumentError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Pretty JSON with 2-space indentation. Non-ASCII is written as-is.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut root = self.root.clone();
        let locations = self
            .locations
            .iter()
            .map(|loc| Value::Object(loc.fields.clone()))
            .collect();
        // Replaces the value in place when the key already exists, keeping root key order
        root.insert(LOCATIONS_KEY.to_string(), Value::Array(locations));

        serde_json::to_string_pretty(&Value::Object(root))
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
