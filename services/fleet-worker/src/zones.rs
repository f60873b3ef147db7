use fleet_geo::Polygon;
use fleet_storage::{PolygonRepository, StorageError};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ZoneFileError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid coverage file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to store coverage zone: {0}")]
    Store(#[from] StorageError),
}

/// Loads the coverage file into `store`; returns how many zones were written.
pub async fn load_into(store: &impl PolygonRepository, path: &Path) -> Result<usize, ZoneFileError> {
    let polygons = load_polygons(path).await?;
    let count = polygons.len();
    for polygon in polygons {
        store.upsert(polygon).await?;
    }
    Ok(count)
}

/// Reads the coverage polygons. A missing file means no coverage zones.
pub async fn load_polygons(path: &Path) -> Result<Vec<Polygon>, ZoneFileError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "coverage file not found, starting without zones");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(ZoneFileError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let polygons = parse_polygons(&raw).map_err(|source| ZoneFileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let malformed = polygons.iter().filter(|p| !p.is_well_formed()).count();
    info!(
        path = %path.display(),
        polygons = polygons.len(),
        malformed,
        "coverage zones loaded"
    );
    Ok(polygons)
}

pub fn parse_polygons(raw: &str) -> Result<Vec<Polygon>, serde_json::Error> {
    serde_json::from_str(raw)
}
