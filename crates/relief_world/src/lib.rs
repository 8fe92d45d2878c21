//! Reference-data loading shared by the daemon and tests: regions, crop
//! calendars, and domain nodes from JSON files in a content directory.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use relief_core::{CropCalendar, NodeRecord, Region};
use serde::Deserialize;

#[derive(Deserialize)]
struct RegionsFile {
    regions: Vec<Region>,
}

#[derive(Deserialize)]
struct CropCalendarFile {
    entries: Vec<CropCalendar>,
}

#[derive(Deserialize)]
struct NodesFile {
    nodes: Vec<NodeRecord>,
}

/// Read-only inputs a scenario works from, loaded once at daemon startup.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub regions: Vec<Region>,
    pub crops: Vec<CropCalendar>,
    pub nodes: Vec<NodeRecord>,
}

impl ReferenceData {
    /// Subset of regions (and their calendars) matching `filter`, or
    /// everything when no filter is given. Returns `None` when the filter
    /// matches nothing.
    pub fn select_regions(
        &self,
        filter: Option<&[String]>,
    ) -> Option<(Vec<Region>, Vec<CropCalendar>)> {
        let regions: Vec<Region> = match filter {
            Some(names) => self
                .regions
                .iter()
                .filter(|r| names.contains(&r.name))
                .cloned()
                .collect(),
            None => self.regions.clone(),
        };
        if regions.is_empty() {
            return None;
        }
        let names: HashSet<&str> = regions.iter().map(|r| r.name.as_str()).collect();
        let crops = self
            .crops
            .iter()
            .filter(|c| names.contains(c.region.as_str()))
            .cloned()
            .collect();
        Some((regions, crops))
    }
}

/// Validates cross-references in loaded reference data, panicking on any
/// authoring error.
///
/// Catches mistakes like: a crop-calendar entry pointing at an unknown
/// region, or a harvest month outside 1..=12.
pub fn validate_reference(data: &ReferenceData) {
    let region_names: HashSet<&str> = data.regions.iter().map(|r| r.name.as_str()).collect();

    for entry in &data.crops {
        assert!(
            region_names.contains(entry.region.as_str()),
            "crop calendar entry '{}' references unknown region '{}'",
            entry.crop,
            entry.region,
        );
        for month in [entry.harvest_start, entry.harvest_end] {
            assert!(
                (1..=12).contains(&month),
                "crop calendar entry '{}' has harvest month {} outside 1..=12",
                entry.crop,
                month,
            );
        }
        assert!(
            entry.quantity_min_kg <= entry.quantity_max_kg,
            "crop calendar entry '{}' has an inverted quantity range",
            entry.crop,
        );
    }
}

pub fn load_reference(content_dir: &str) -> Result<ReferenceData> {
    let dir = Path::new(content_dir);
    let regions_file: RegionsFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("regions.json")).context("reading regions.json")?,
    )
    .context("parsing regions.json")?;
    let calendar_file: CropCalendarFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("crop_calendar.json"))
            .context("reading crop_calendar.json")?,
    )
    .context("parsing crop_calendar.json")?;
    let nodes_file: NodesFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("nodes.json")).context("reading nodes.json")?,
    )
    .context("parsing nodes.json")?;
    let data = ReferenceData {
        regions: regions_file.regions,
        crops: calendar_file.entries,
        nodes: nodes_file.nodes,
    };
    validate_reference(&data);
    Ok(data)
}
