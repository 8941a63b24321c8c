use crate::config::AppConfig;
use crate::types::{BedRecord, Dataset, Region};
use anyhow::{Context, Result, anyhow};
use csv::ReaderBuilder;
use geo::MultiPolygon;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};

pub fn load_data(config: &AppConfig) -> Result<Dataset> {
    println!("Loading data...");

    // 1. Load inventory CSV
    let records = load_inventory(config)?;
    println!("Loaded {} inventory records", records.len());

    // 2. Load SPA boundaries
    let boundaries = load_boundaries(config)?;
    println!("Loaded boundaries for {} regions", boundaries.len());

    // 3. Join by region name, keeping only regions present in both files
    let dataset = join(config, records, boundaries)?;
    println!("Joined dataset covers {} regions", dataset.regions.len());

    Ok(dataset)
}

fn load_inventory(config: &AppConfig) -> Result<Vec<BedRecord>> {
    let file = File::open(&config.input.inventory_csv)
        .with_context(|| format!("Failed to open CSV file: {:?}", config.input.inventory_csv))?;
    read_inventory(config, file)
}

/// Parses inventory rows from any reader. Malformed cells are fatal; the
/// dashboard must not launch over a partially parsed dataset.
fn read_inventory<R: Read>(config: &AppConfig, reader: R) -> Result<Vec<BedRecord>> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers()?.clone();

    let col = |name: &str| -> Result<usize> {
        headers.iter().position(|h| h == name)
            .ok_or_else(|| anyhow!("Column '{}' not found in CSV", name))
    };

    let join_idx = col(&config.input.join_column_csv)?;
    let housing_idx = col(&config.input.columns.housing_type)?;
    let rate_idx = col(&config.input.columns.utilization_rate)?;
    let pit_idx = col(&config.input.columns.pit_count)?;
    let beds_idx = col(&config.input.columns.total_beds)?;

    let mut records = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let line = row + 2; // 1-based, after the header

        let code = record.get(join_idx).unwrap_or("").trim();
        if code.is_empty() {
            continue;
        }

        // The configured region table is the authority on SPA codes.
        let region = config.regions.get(code)
            .ok_or_else(|| anyhow!("CSV line {}: unknown SPA code '{}'", line, code))?;

        let parse_u32 = |idx: usize, name: &str| -> Result<u32> {
            record.get(idx).unwrap_or("").trim().parse()
                .with_context(|| format!("CSV line {}: malformed '{}' value", line, name))
        };

        let utilization_rate: f64 = record.get(rate_idx).unwrap_or("").trim().parse()
            .with_context(|| format!(
                "CSV line {}: malformed '{}' value", line, config.input.columns.utilization_rate
            ))?;

        records.push(BedRecord {
            region: region.name.clone(),
            housing_type: record.get(housing_idx).unwrap_or("").trim().to_string(),
            utilization_rate,
            pit_count: parse_u32(pit_idx, &config.input.columns.pit_count)?,
            total_beds: parse_u32(beds_idx, &config.input.columns.total_beds)?,
        });
    }

    Ok(records)
}

fn load_boundaries(config: &AppConfig) -> Result<Vec<Region>> {
    use geojson::GeoJson;

    let file = File::open(&config.input.boundaries)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", config.input.boundaries))?;
    let reader = BufReader::new(file);
    let geojson = GeoJson::from_reader(reader).context("Failed to parse boundary GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("Boundary GeoJSON must be a FeatureCollection")),
    };

    let mut regions = Vec::new();

    for feature in collection.features {
        let code_val = feature.properties.as_ref()
            .and_then(|props| props.get(&config.input.join_column_geo));

        let code = match code_val {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => continue, // Skip features without a usable code
        };

        let region_config = match config.regions.get(&code) {
            Some(rc) => rc,
            None => {
                tracing::warn!("Boundary file has unconfigured SPA code '{}', skipping", code);
                continue;
            }
        };

        let geometry = match feature.geometry {
            Some(geom) => {
                let valid_geo: geo::Geometry<f64> = geom.value.try_into()
                    .map_err(|e| anyhow!("Failed to convert geometry for SPA '{}': {:?}", code, e))?;

                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        regions.push(Region {
            code,
            name: region_config.name.clone(),
            color: region_config.color.clone(),
            geometry,
        });
    }

    regions.sort_by(|a, b| a.code.cmp(&b.code));
    Ok(regions)
}

/// Keeps exactly the regions present in both files. Records for regions
/// without a boundary (and boundaries without records) are dropped with a
/// warning.
fn join(
    config: &AppConfig,
    records: Vec<BedRecord>,
    boundaries: Vec<Region>,
) -> Result<Dataset> {
    let record_regions: HashSet<&str> = records.iter().map(|r| r.region.as_str()).collect();

    let regions: Vec<Region> = boundaries.into_iter()
        .filter(|region| {
            let present = record_regions.contains(region.name.as_str());
            if !present {
                tracing::warn!("Region '{}' has a boundary but no inventory rows", region.name);
            }
            present
        })
        .collect();

    let joined_names: HashSet<&str> = regions.iter().map(|r| r.name.as_str()).collect();

    let mut dropped: HashMap<String, usize> = HashMap::new();
    let records: Vec<BedRecord> = records.into_iter()
        .filter(|rec| {
            let present = joined_names.contains(rec.region.as_str());
            if !present {
                *dropped.entry(rec.region.clone()).or_default() += 1;
            }
            present
        })
        .collect();

    for (region, count) in &dropped {
        tracing::warn!("Dropped {} inventory rows for region '{}' with no boundary", count, region);
    }

    if regions.is_empty() {
        return Err(anyhow!(
            "No region appears in both {:?} and {:?}; check the join columns",
            config.input.inventory_csv, config.input.boundaries
        ));
    }

    Ok(Dataset { records, regions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnConfig, InputConfig, MapConfig, RegionConfig, ServerConfig};
    use std::collections::HashMap;

    fn test_config() -> AppConfig {
        let mut regions = HashMap::new();
        regions.insert("1".to_string(), RegionConfig {
            name: "Antelope Valley".to_string(),
            color: "#636EFA".to_string(),
        });
        regions.insert("4".to_string(), RegionConfig {
            name: "Metro Los Angeles".to_string(),
            color: "#AB63FA".to_string(),
        });

        AppConfig {
            input: InputConfig {
                inventory_csv: "inventory.csv".into(),
                boundaries: "boundaries.geojson".into(),
                join_column_csv: "SPA".to_string(),
                join_column_geo: "SPA".to_string(),
                columns: ColumnConfig {
                    housing_type: "Housing Type".to_string(),
                    utilization_rate: "Utilization Rate".to_string(),
                    pit_count: "PIT Count".to_string(),
                    total_beds: "Total Beds".to_string(),
                },
            },
            regions,
            map: MapConfig { center_lat: 34.0522, center_lon: -118.2437, zoom: 7.35 },
            server: ServerConfig { port: 8050 },
        }
    }

    const CSV: &str = "\
SPA,Housing Type,Utilization Rate,PIT Count,Total Beds
1,Emergency Shelter,80.0,80,100
1,Transitional Housing,90.0,45,50
4,Emergency Shelter,100.0,30,30
";

    #[test]
    fn parses_and_maps_region_names() {
        let config = test_config();
        let records = read_inventory(&config, CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].region, "Antelope Valley");
        assert_eq!(records[2].region, "Metro Los Angeles");
        assert_eq!(records[1].pit_count, 45);
        assert_eq!(records[1].utilization_rate, 90.0);
    }

    #[test]
    fn unknown_spa_code_is_fatal() {
        let config = test_config();
        let csv = "SPA,Housing Type,Utilization Rate,PIT Count,Total Beds\n9,Safe Haven,50.0,5,10\n";
        let err = read_inventory(&config, csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unknown SPA code '9'"));
    }

    #[test]
    fn malformed_count_is_fatal() {
        let config = test_config();
        let csv = "SPA,Housing Type,Utilization Rate,PIT Count,Total Beds\n1,Safe Haven,50.0,five,10\n";
        let err = read_inventory(&config, csv.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("PIT Count"));
    }

    #[test]
    fn missing_column_is_fatal() {
        let config = test_config();
        let csv = "SPA,Housing Type,Utilization Rate\n1,Safe Haven,50.0\n";
        let err = read_inventory(&config, csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("PIT Count"));
    }

    #[test]
    fn loads_boundaries_from_geojson_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boundaries.geojson");
        std::fs::write(&path, r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"SPA": "4"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-118.3, 34.0], [-118.2, 34.0], [-118.2, 34.1], [-118.3, 34.1], [-118.3, 34.0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {"SPA": 1},
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [[[[-118.4, 34.6], [-118.0, 34.6], [-118.0, 34.8], [-118.4, 34.8], [-118.4, 34.6]]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {"SPA": "99"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                    }
                }
            ]
        }"#).unwrap();

        let mut config = test_config();
        config.input.boundaries = path;

        let regions = load_boundaries(&config).unwrap();
        // Unconfigured SPA 99 skipped; numeric codes accepted; ordered by code.
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].code, "1");
        assert_eq!(regions[0].name, "Antelope Valley");
        assert_eq!(regions[1].name, "Metro Los Angeles");
    }

    #[test]
    fn join_keeps_only_regions_in_both_files() {
        use geo::{polygon, MultiPolygon};

        let config = test_config();
        let records = read_inventory(&config, CSV.as_bytes()).unwrap();

        // Boundary only for SPA 1; SPA 4 rows must be dropped.
        let boundaries = vec![Region {
            code: "1".to_string(),
            name: "Antelope Valley".to_string(),
            color: "#636EFA".to_string(),
            geometry: MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0),
            ]]),
        }];

        let dataset = join(&config, records, boundaries).unwrap();
        assert_eq!(dataset.region_names(), vec!["Antelope Valley"]);
        assert_eq!(dataset.records.len(), 2);
        assert!(dataset.records.iter().all(|r| r.region == "Antelope Valley"));
    }
}
