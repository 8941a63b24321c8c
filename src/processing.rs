use crate::types::Dataset;
use std::collections::HashSet;

/// Dropdown sentinel that expands to every region.
pub const SELECT_ALL: &str = "ALL";

#[derive(Debug, Clone, PartialEq)]
pub struct RegionStat {
    pub region: String,
    pub mean_utilization: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HousingTypeStat {
    pub region: String,
    pub housing_type: String,
    pub mean_utilization: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BedCountStat {
    pub region: String,
    pub utilized: u64,
    pub empty: u64,
}

/// Expands the requested selection to concrete region names, in dataset
/// order. An empty selection or one containing the ALL sentinel means every
/// region; unknown names are ignored.
pub fn resolve_selection(dataset: &Dataset, requested: &[String]) -> Vec<String> {
    if requested.is_empty() || requested.iter().any(|v| v == SELECT_ALL) {
        return dataset.region_names();
    }

    let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
    dataset.regions.iter()
        .filter(|r| wanted.contains(r.name.as_str()))
        .map(|r| r.name.clone())
        .collect()
}

/// Arithmetic mean of the utilization rate over all rows per selected region.
pub fn utilization_by_region(dataset: &Dataset, selection: &[String]) -> Vec<RegionStat> {
    selection.iter()
        .filter_map(|region| {
            let rates: Vec<f64> = dataset.records.iter()
                .filter(|rec| &rec.region == region)
                .map(|rec| rec.utilization_rate)
                .collect();
            mean(&rates).map(|mean_utilization| RegionStat {
                region: region.clone(),
                mean_utilization,
            })
        })
        .collect()
}

/// Mean utilization per (region, housing type) over the selected rows.
/// Housing types are emitted in alphabetical order within each region.
pub fn utilization_by_housing_type(dataset: &Dataset, selection: &[String]) -> Vec<HousingTypeStat> {
    let mut stats = Vec::new();

    for region in selection {
        let mut housing_types: Vec<&str> = dataset.records.iter()
            .filter(|rec| &rec.region == region)
            .map(|rec| rec.housing_type.as_str())
            .collect();
        housing_types.sort_unstable();
        housing_types.dedup();

        for housing_type in housing_types {
            let rates: Vec<f64> = dataset.records.iter()
                .filter(|rec| &rec.region == region && rec.housing_type == housing_type)
                .map(|rec| rec.utilization_rate)
                .collect();
            if let Some(mean_utilization) = mean(&rates) {
                stats.push(HousingTypeStat {
                    region: region.clone(),
                    housing_type: housing_type.to_string(),
                    mean_utilization,
                });
            }
        }
    }

    stats
}

/// Utilized (PIT count) and empty bed totals per selected region.
pub fn bed_counts(dataset: &Dataset, selection: &[String]) -> Vec<BedCountStat> {
    selection.iter()
        .map(|region| {
            let mut utilized: u64 = 0;
            let mut total: u64 = 0;
            for rec in dataset.records.iter().filter(|rec| &rec.region == region) {
                utilized += rec.pit_count as u64;
                total += rec.total_beds as u64;
            }
            BedCountStat {
                region: region.clone(),
                utilized,
                // Over-utilized inventories (PIT count above capacity) clamp to 0.
                empty: total.saturating_sub(utilized),
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
