use crate::error::OverlayError;
use crate::settings::Settings;
use reqwest::blocking::Client;
use serde_json::Value;
use std::sync::mpsc::{channel, Receiver};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://ipapi.co/json/",
    "https://ipinfo.io/json",
    "https://ipwho.is/",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// May be empty when the service only knows the country.
    pub city: String,
    pub country: String,
}

impl Location {
    pub fn describe(&self) -> String {
        if self.city.is_empty() {
            self.country.clone()
        } else {
            format!("{}, {}", self.city, self.country)
        }
    }
}

fn field<'a>(json: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .filter_map(|k| json.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

/// Extract a location from a geolocation response. Understands the field
/// names used by ipapi.co, ipinfo.io and ipwho.is.
pub fn parse_location(json: &Value) -> Option<Location> {
    let city = field(json, &["city", "region"]);
    let country = field(json, &["country_name", "country"]);
    if country.is_empty() {
        return None;
    }
    Some(Location {
        city: city.to_string(),
        country: country.to_string(),
    })
}

/// Best-effort public IP geolocation against a list of endpoints.
#[derive(Debug, Clone)]
pub struct IpLocator {
    endpoints: Vec<String>,
    timeout: Duration,
}

impl IpLocator {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Self {
        Self { endpoints, timeout }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let endpoints = settings
            .ip_lookup_endpoints
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect());
        Self::new(endpoints, settings.ip_lookup_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn fetch(&self, client: &Client, url: &str) -> Result<Location, OverlayError> {
        let text = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| OverlayError::Network(e.to_string()))?;
        let json: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        parse_location(&json)
            .ok_or_else(|| OverlayError::Network(format!("{url}: response had no location")))
    }

    /// Try each endpoint in order. Every failure is logged and skipped.
    pub fn lookup(&self) -> Option<Location> {
        let client = match Client::builder()
            .user_agent(concat!("glitch-overlay/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(error = %e, "failed to build http client");
                return None;
            }
        };
        for url in &self.endpoints {
            match self.fetch(&client, url) {
                Ok(loc) => {
                    tracing::debug!(%url, location = %loc.describe(), "ip lookup succeeded");
                    return Some(loc);
                }
                Err(e) => tracing::debug!(%url, error = %e, "ip lookup failed"),
            }
        }
        None
    }

    /// Run [`lookup`](Self::lookup) on a background thread.
    pub fn spawn(self) -> LocationLookup {
        let (tx, rx) = channel();
        let deadline = Instant::now() + self.timeout;
        let spawned = thread::Builder::new()
            .name("ip-lookup".to_string())
            .spawn(move || {
                let _ = tx.send(self.lookup());
            });
        if let Err(e) = spawned {
            tracing::debug!(error = %e, "failed to spawn ip lookup thread");
        }
        LocationLookup { rx, deadline }
    }
}

/// Pending result of a background lookup.
pub struct LocationLookup {
    rx: Receiver<Option<Location>>,
    deadline: Instant,
}

impl LocationLookup {
    /// Wait for the result, but never past the locator's timeout counted
    /// from when the lookup was spawned.
    pub fn wait(self) -> Option<Location> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match self.rx.recv_timeout(remaining) {
            Ok(loc) => loc,
            Err(_) => {
                tracing::debug!("ip lookup did not finish in time; continuing without it");
                None
            }
        }
    }
}
