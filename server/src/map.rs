//! Map geometry: landmasses, start and finish points, and hull-versus-land collision.

use crate::boat::Boat;
use crate::error::{Result, SimError};
use crate::geometry::Polygon;
use serde::{Deserialize, Serialize};
use shared::Vector2;

/// One landmass as stored in `maps/<name>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LandmassFile {
    pub coords: Vec<Vector2>,
    /// A point known to lie inside `coords`.
    pub rep_point: Vector2,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[u8; 3]>,
}

/// Map document. Also sent verbatim to joining clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapFile {
    pub size: Vector2,
    pub start: Vector2,
    pub end: Vector2,
    #[serde(default)]
    pub landmasses: Vec<LandmassFile>,
}

/// Validated, immutable map.
#[derive(Debug, Clone)]
pub struct MapModel {
    file: MapFile,
    landmasses: Vec<Polygon>,
}

impl MapModel {
    pub fn new(file: MapFile) -> Result<MapModel> {
        let mut landmasses = Vec::with_capacity(file.landmasses.len());
        for (i, landmass) in file.landmasses.iter().enumerate() {
            if landmass.coords.len() < 3 {
                return Err(SimError::Load(format!(
                    "landmass {} needs at least 3 points",
                    i
                )));
            }
            let polygon = Polygon::new(&landmass.coords);
            if !polygon.contains_point(landmass.rep_point) {
                return Err(SimError::Load(format!(
                    "representative point of landmass {} is not inside its perimeter",
                    i
                )));
            }
            landmasses.push(polygon);
        }

        for (i, a) in landmasses.iter().enumerate() {
            for (j, b) in landmasses.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    return Err(SimError::Load(format!(
                        "landmasses {} and {} overlap or contain each other",
                        i, j
                    )));
                }
            }
        }

        Ok(MapModel { file, landmasses })
    }

    pub fn file(&self) -> &MapFile {
        &self.file
    }

    pub fn start(&self) -> Vector2 {
        self.file.start
    }

    pub fn end(&self) -> Vector2 {
        self.file.end
    }

    pub fn landmasses(&self) -> &[Polygon] {
        &self.landmasses
    }

    pub fn is_on_water(&self, point: Vector2) -> bool {
        !self.landmasses.iter().any(|land| land.contains_point(point))
    }

    /// Whether the hull touches land, or the path since the last update crossed any.
    pub fn detect_hull_collision(&self, boat: &Boat) -> bool {
        let hull = boat.hull_global();
        self.landmasses.iter().any(|land| {
            hull.overlaps(land) || land.intersects_segment(boat.prev_pos, boat.pos)
        })
    }

    /// Whether the finish point lies inside the hull.
    pub fn reached_end(&self, boat: &Boat) -> bool {
        boat.hull_global().contains_point(self.file.end)
    }
}
