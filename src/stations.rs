// src/stations.rs
//! Static gauge roster: parses the whitespace-separated station table
//! (`id name... lat lon`) and holds the validated stations in input order.

use std::fs;
use std::path::Path;

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ParseError, StationCoordinateError};

/// id, free-form name (may contain single spaces), lat, lon.
static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s+(.+?)\s+(\S+)\s+(\S+)$").expect("station row regex"));

/// A gauge station. `id` is opaque: some are 15-digit codes with leading zeros.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone)]
pub struct StationRegistry {
    stations: Vec<Station>,
    dropped: Vec<StationCoordinateError>,
}

impl StationRegistry {
    /// Parse the raw station table. Rows with missing or invalid coordinates
    /// are dropped and counted; fails only when nothing usable remains.
    pub fn load(raw: &str) -> Result<Self, ParseError> {
        let mut stations = Vec::new();
        let mut dropped = Vec::new();

        for (idx, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_row(idx + 1, line) {
                Ok(st) => stations.push(st),
                Err(e) => {
                    debug!(line = e.line, reason = %e.reason, "dropping station row");
                    dropped.push(e);
                }
            }
        }

        if stations.is_empty() {
            return Err(if dropped.is_empty() {
                ParseError::Empty
            } else {
                ParseError::NoValidRows {
                    dropped: dropped.len(),
                }
            });
        }

        Ok(Self { stations, dropped })
    }

    /// Read the station table from disk and parse it.
    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading station list from {}", path.display()))?;
        let reg = Self::load(&raw)
            .with_context(|| format!("parsing station list {}", path.display()))?;
        info!(
            stations = reg.len(),
            dropped = reg.dropped.len(),
            path = %path.display(),
            "station registry loaded"
        );
        Ok(reg)
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn ids(&self) -> Vec<String> {
        self.stations.iter().map(|s| s.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Rows rejected during load.
    pub fn dropped(&self) -> &[StationCoordinateError] {
        &self.dropped
    }

    /// Mean latitude/longitude of all stations; used as the initial map center.
    pub fn centroid(&self) -> (f64, f64) {
        let n = self.stations.len().max(1) as f64;
        let (lat, lon) = self
            .stations
            .iter()
            .fold((0.0, 0.0), |(la, lo), s| (la + s.lat, lo + s.lon));
        (lat / n, lon / n)
    }
}

fn parse_row(line: usize, text: &str) -> Result<Station, StationCoordinateError> {
    let reject = |reason: String| StationCoordinateError { line, reason };

    let caps = ROW_RE
        .captures(text)
        .ok_or_else(|| reject("expected 4 columns: id, name, lat, lon".to_string()))?;

    let lat = parse_coord(&caps[3])
        .ok_or_else(|| reject(format!("lat `{}` is not a number", &caps[3])))?;
    let lon = parse_coord(&caps[4])
        .ok_or_else(|| reject(format!("lon `{}` is not a number", &caps[4])))?;

    if !(-90.0..=90.0).contains(&lat) {
        return Err(reject(format!("lat {lat} outside [-90, 90]")));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(reject(format!("lon {lon} outside [-180, 180]")));
    }

    Ok(Station {
        id: caps[1].to_string(),
        name: caps[2].trim().to_string(),
        lat,
        lon,
    })
}

// Rejects NaN/inf, which `f64::from_str` would otherwise accept.
fn parse_coord(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "site_no station_nm      lat     lon
03207965        GRAPEVINE CREEK NEAR PHYLLIS, KY        37.43260479     -82.3537563
03208000        LEVISA FORK BELOW FISHTRAP DAM NEAR MILLARD, KY 37.42593725     -82.4123701
371144082383401 ELKHORN CREEK AT BARNHILL RD NR DUNHAM, KY      37.19571667     -82.6428778
";

    #[test]
    fn parses_rows_and_drops_header() {
        let reg = StationRegistry::load(SAMPLE).unwrap();
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.dropped().len(), 1);
        assert_eq!(reg.dropped()[0].line, 1);

        let first = &reg.stations()[0];
        assert_eq!(first.name, "GRAPEVINE CREEK NEAR PHYLLIS, KY");
        assert!((first.lat - 37.43260479).abs() < 1e-9);
        assert!((first.lon + 82.3537563).abs() < 1e-9);
    }

    #[test]
    fn ids_keep_leading_zeros_and_input_order() {
        let reg = StationRegistry::load(SAMPLE).unwrap();
        assert_eq!(
            reg.ids(),
            vec!["03207965", "03208000", "371144082383401"]
        );
        assert!(reg.get("03207965").is_some());
        assert!(reg.get("3207965").is_none());
    }

    #[test]
    fn tolerates_tabs_and_single_spaces() {
        let raw = "01\tA\t1.5\t2.5\n02 B C 3 4\n";
        let reg = StationRegistry::load(raw).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.stations()[1].name, "B C");
    }

    #[test]
    fn out_of_range_and_non_finite_coordinates_are_dropped() {
        let raw = "A ok 10 20\nB north 91 0\nC east 0 181\nD nan NaN 0\nE short 1\n";
        let reg = StationRegistry::load(raw).unwrap();
        assert_eq!(reg.ids(), vec!["A"]);
        assert_eq!(reg.dropped().len(), 4);
    }

    #[test]
    fn empty_or_all_invalid_input_is_a_parse_error() {
        assert!(matches!(
            StationRegistry::load("  \n\n"),
            Err(ParseError::Empty)
        ));
        assert!(matches!(
            StationRegistry::load("site_no station_nm lat lon\n"),
            Err(ParseError::NoValidRows { dropped: 1 })
        ));
    }

    #[test]
    fn centroid_is_mean_position() {
        let reg = StationRegistry::load("a x 10 -80\nb y 20 -90\n").unwrap();
        let (lat, lon) = reg.centroid();
        assert!((lat - 15.0).abs() < 1e-9);
        assert!((lon + 85.0).abs() < 1e-9);
    }
}
