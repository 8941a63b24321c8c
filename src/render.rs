use crate::config::AppConfig;
use crate::processing::{self, BedCountStat, HousingTypeStat, RegionStat};
use crate::types::Dataset;
use geojson::{Feature, FeatureCollection, Geometry};
use serde::Serialize;
use serde_json::{json, Map};

/// Colors for the housing-type and bed-status charts, distinct from the
/// per-SPA palette. Cycled when a dataset has more housing types.
const GROUP_COLORS: [&str; 3] = ["#4D4D4D", "#FFFF66", "#FFFFFF"];

/// Everything the front end needs to redraw the four panels.
#[derive(Debug, Serialize)]
pub struct DashboardFigures {
    /// The selection after expanding the ALL sentinel, echoed back so the
    /// dropdown can show what "Select All" resolved to.
    pub selection: Vec<String>,
    pub map: MapFigure,
    pub utilization: BarFigure,
    pub housing: GroupedBarFigure,
    pub beds: GroupedBarFigure,
}

#[derive(Debug, Serialize)]
pub struct MapFigure {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
    /// Boundaries of the selected regions, each feature carrying `name`,
    /// `color`, and `utilization` properties.
    pub boundaries: FeatureCollection,
}

#[derive(Debug, Serialize)]
pub struct BarFigure {
    pub bars: Vec<Bar>,
}

#[derive(Debug, Serialize)]
pub struct Bar {
    pub region: String,
    pub value: f64,
    pub color: String,
}

/// One trace per group, with y values aligned to the shared region axis
/// (null where a region has no rows for the group).
#[derive(Debug, Serialize)]
pub struct GroupedBarFigure {
    pub regions: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Serialize)]
pub struct Series {
    pub name: String,
    pub color: String,
    pub values: Vec<Option<f64>>,
}

pub fn dashboard_figures(
    config: &AppConfig,
    dataset: &Dataset,
    requested: &[String],
) -> DashboardFigures {
    let selection = processing::resolve_selection(dataset, requested);

    let region_stats = processing::utilization_by_region(dataset, &selection);
    let housing_stats = processing::utilization_by_housing_type(dataset, &selection);
    let bed_stats = processing::bed_counts(dataset, &selection);

    DashboardFigures {
        map: map_figure(config, dataset, &selection, &region_stats),
        utilization: utilization_figure(dataset, &region_stats),
        housing: housing_figure(&selection, &housing_stats),
        beds: beds_figure(&selection, &bed_stats),
        selection,
    }
}

fn map_figure(
    config: &AppConfig,
    dataset: &Dataset,
    selection: &[String],
    region_stats: &[RegionStat],
) -> MapFigure {
    let features = dataset.regions.iter()
        .filter(|region| selection.contains(&region.name))
        .map(|region| {
            let utilization = region_stats.iter()
                .find(|s| s.region == region.name)
                .map(|s| s.mean_utilization);

            let mut properties = Map::new();
            properties.insert("name".to_string(), json!(region.name));
            properties.insert("color".to_string(), json!(region.color));
            properties.insert("utilization".to_string(), json!(utilization));

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&region.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    MapFigure {
        center_lat: config.map.center_lat,
        center_lon: config.map.center_lon,
        zoom: config.map.zoom,
        boundaries: FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        },
    }
}

fn utilization_figure(dataset: &Dataset, region_stats: &[RegionStat]) -> BarFigure {
    let bars = region_stats.iter()
        .map(|stat| {
            let color = dataset.regions.iter()
                .find(|r| r.name == stat.region)
                .map(|r| r.color.clone())
                .unwrap_or_else(|| GROUP_COLORS[0].to_string());
            Bar {
                region: stat.region.clone(),
                value: stat.mean_utilization,
                color,
            }
        })
        .collect();

    BarFigure { bars }
}

fn housing_figure(selection: &[String], stats: &[HousingTypeStat]) -> GroupedBarFigure {
    let mut housing_types: Vec<&str> = stats.iter().map(|s| s.housing_type.as_str()).collect();
    housing_types.sort_unstable();
    housing_types.dedup();

    let series = housing_types.iter().enumerate()
        .map(|(i, housing_type)| Series {
            name: housing_type.to_string(),
            color: GROUP_COLORS[i % GROUP_COLORS.len()].to_string(),
            values: selection.iter()
                .map(|region| {
                    stats.iter()
                        .find(|s| &s.region == region && s.housing_type == *housing_type)
                        .map(|s| s.mean_utilization)
                })
                .collect(),
        })
        .collect();

    GroupedBarFigure {
        regions: selection.to_vec(),
        series,
    }
}

fn beds_figure(selection: &[String], stats: &[BedCountStat]) -> GroupedBarFigure {
    let value_of = |region: &str, pick: fn(&BedCountStat) -> u64| -> Option<f64> {
        stats.iter().find(|s| s.region == region).map(|s| pick(s) as f64)
    };

    GroupedBarFigure {
        regions: selection.to_vec(),
        series: vec![
            Series {
                name: "Utilized Beds".to_string(),
                color: GROUP_COLORS[0].to_string(),
                values: selection.iter().map(|r| value_of(r, |s| s.utilized)).collect(),
            },
            Series {
                name: "Empty Beds".to_string(),
                color: GROUP_COLORS[1].to_string(),
                values: selection.iter().map(|r| value_of(r, |s| s.empty)).collect(),
            },
        ],
    }
}
