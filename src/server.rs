use crate::config::AppConfig;
use crate::render::{self, DashboardFigures};
use crate::processing::SELECT_ALL;
use crate::types::{Dataset, Region};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use geo::algorithm::contains::Contains;
use geo::{Point, Rect};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::cors::CorsLayer;

// Wrapper for RTree indexing
struct RegionIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for RegionIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct AppState {
    pub dataset: Dataset,
    pub tree: RTree<RegionIndex>,
    pub config: AppConfig,
}

#[derive(Deserialize)]
pub struct DashboardParams {
    /// Comma-separated region names, or the ALL sentinel. Absent means all.
    regions: Option<String>,
}

#[derive(Deserialize)]
pub struct LookupParams {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
pub struct LookupResponse {
    code: String,
    name: String,
}

#[derive(Serialize)]
pub struct DropdownOption {
    label: String,
    value: String,
}

fn build_index(dataset: &Dataset) -> RTree<RegionIndex> {
    let tree_items: Vec<RegionIndex> = dataset.regions.iter().enumerate().map(|(i, region)| {
        use geo::bounding_rect::BoundingRect;
        let rect = region.geometry.bounding_rect().unwrap_or(
            Rect::new(
                geo::Coord { x: 0.0, y: 0.0 },
                geo::Coord { x: 0.0, y: 0.0 }
            )
        );
        RegionIndex {
            index: i,
            aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
        }
    }).collect();

    RTree::bulk_load(tree_items)
}

/// Finds the region containing the point: envelope query first, then an
/// exact containment check on the candidates.
fn locate<'a>(dataset: &'a Dataset, tree: &RTree<RegionIndex>, lon: f64, lat: f64) -> Option<&'a Region> {
    let point = Point::new(lon, lat);
    let envelope = AABB::from_point([lon, lat]);

    tree.locate_in_envelope_intersecting(&envelope)
        .filter_map(|candidate| dataset.regions.get(candidate.index))
        .find(|region| region.geometry.contains(&point))
}

pub async fn start_server(config: AppConfig, dataset: Dataset) -> Result<()> {
    println!("Building spatial index...");
    let tree = build_index(&dataset);

    let state = Arc::new(AppState {
        dataset,
        tree,
        config: config.clone(),
    });

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    println!("Starting server on http://{}", addr);

    let app = Router::new()
        .route("/api/options", get(options_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/lookup", get(lookup_handler))
        .fallback_service(ServeDir::new("assets"))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Dropdown contents: "Select All" followed by the regions in SPA-code order.
async fn options_handler(State(state): State<Arc<AppState>>) -> Json<Vec<DropdownOption>> {
    let mut options = vec![DropdownOption {
        label: "Select All".to_string(),
        value: SELECT_ALL.to_string(),
    }];
    options.extend(state.dataset.regions.iter().map(|r| DropdownOption {
        label: r.name.clone(),
        value: r.name.clone(),
    }));
    Json(options)
}

async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DashboardParams>,
) -> Json<DashboardFigures> {
    let requested: Vec<String> = params.regions
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    Json(render::dashboard_figures(&state.config, &state.dataset, &requested))
}

async fn lookup_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> Json<Option<LookupResponse>> {
    Json(locate(&state.dataset, &state.tree, params.lon, params.lat).map(|region| LookupResponse {
        code: region.code.clone(),
        name: region.name.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn test_dataset() -> Dataset {
        Dataset {
            records: Vec::new(),
            regions: vec![
                // Triangle: its bounding box covers (0,0)..(2,2) but the
                // polygon itself only the lower-left half.
                Region {
                    code: "1".to_string(),
                    name: "Antelope Valley".to_string(),
                    color: "#636EFA".to_string(),
                    geometry: MultiPolygon::new(vec![polygon![
                        (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0),
                    ]]),
                },
                Region {
                    code: "4".to_string(),
                    name: "Metro Los Angeles".to_string(),
                    color: "#AB63FA".to_string(),
                    geometry: MultiPolygon::new(vec![polygon![
                        (x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 6.0), (x: 5.0, y: 6.0),
                    ]]),
                },
            ],
        }
    }

    #[test]
    fn point_inside_a_region_resolves_to_it() {
        let dataset = test_dataset();
        let tree = build_index(&dataset);

        let region = locate(&dataset, &tree, 5.5, 5.5).unwrap();
        assert_eq!(region.code, "4");
        assert_eq!(region.name, "Metro Los Angeles");

        let region = locate(&dataset, &tree, 0.5, 0.5).unwrap();
        assert_eq!(region.code, "1");
    }

    #[test]
    fn point_in_bounding_box_but_outside_polygon_is_not_matched() {
        let dataset = test_dataset();
        let tree = build_index(&dataset);

        // (1.8, 1.8) is inside the triangle's envelope, above its hypotenuse.
        assert!(locate(&dataset, &tree, 1.8, 1.8).is_none());
    }

    #[test]
    fn point_outside_every_region_returns_none() {
        let dataset = test_dataset();
        let tree = build_index(&dataset);

        assert!(locate(&dataset, &tree, 10.0, 10.0).is_none());
    }
}
