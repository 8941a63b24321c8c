use geo::MultiPolygon;

/// One facility row from the housing inventory count.
#[derive(Debug, Clone)]
pub struct BedRecord {
    pub region: String,
    pub housing_type: String,
    /// Bed utilization rate in percent.
    pub utilization_rate: f64,
    /// Beds occupied at the point-in-time count.
    pub pit_count: u32,
    pub total_beds: u32,
}

/// A Service Planning Area with its boundary geometry.
#[derive(Debug, Clone)]
pub struct Region {
    pub code: String,
    pub name: String,
    pub color: String, // Hex code
    pub geometry: MultiPolygon<f64>,
}

/// The joined, immutable dataset the dashboard runs on.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<BedRecord>,
    /// Regions present in both the inventory CSV and the boundary file,
    /// ordered by SPA code.
    pub regions: Vec<Region>,
}

impl Dataset {
    pub fn region_names(&self) -> Vec<String> {
        self.regions.iter().map(|r| r.name.clone()).collect()
    }
}
