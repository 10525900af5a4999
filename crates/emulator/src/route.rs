//! Route files and waypoint cycling.

use crate::EmulatorError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One bus route: a name and its ordered waypoints.
///
/// Route files carry more (stations, etc.); only these keys are read.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Route {
    pub name: String,
    /// `[lat, lng]` pairs in driving order.
    pub coordinates: Vec<[f64; 2]>,
}

impl Route {
    /// Parse a route from JSON text.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Waypoints starting at `offset`, wrapping around forever.
    ///
    /// Empty routes yield nothing.
    pub fn waypoints_from(&self, offset: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
        let skip = if self.coordinates.is_empty() {
            0
        } else {
            offset % self.coordinates.len()
        };
        self.coordinates
            .iter()
            .cycle()
            .skip(skip)
            .map(|[lat, lng]| (*lat, *lng))
    }
}

/// Load up to `limit` routes from the `*.json` files in `dir`.
///
/// Files are taken in name order. Routes without waypoints are skipped.
pub fn load_routes(dir: &Path, limit: Option<usize>) -> Result<Vec<Route>, EmulatorError> {
    let read_err = |source| EmulatorError::Routes {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(read_err)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();
    if let Some(limit) = limit {
        paths.truncate(limit);
    }

    let mut routes = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = std::fs::read_to_string(&path).map_err(|source| EmulatorError::Routes {
            path: path.clone(),
            source,
        })?;
        let route = Route::from_json(&raw)
            .map_err(|source| EmulatorError::RouteParse { path: path.clone(), source })?;

        if route.coordinates.is_empty() {
            warn!("Route {} in {} has no coordinates, skipping", route.name, path.display());
            continue;
        }
        debug!("Loaded route {} ({} waypoints)", route.name, route.coordinates.len());
        routes.push(route);
    }

    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn route() -> Route {
        Route {
            name: "156".to_string(),
            coordinates: vec![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]],
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "bus-tracker-routes-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_route_from_json_ignores_extra_keys() {
        let raw = r#"{"name": "156", "station_start_name": "A", "coordinates": [[55.7, 37.6], [55.8, 37.7]]}"#;
        let route = Route::from_json(raw).unwrap();
        assert_eq!(route.name, "156");
        assert_eq!(route.coordinates, vec![[55.7, 37.6], [55.8, 37.7]]);
    }

    #[test]
    fn test_waypoints_from_offset_wraps() {
        let points: Vec<_> = route().waypoints_from(1).take(5).collect();
        assert_eq!(
            points,
            vec![(2.0, 20.0), (3.0, 30.0), (1.0, 10.0), (2.0, 20.0), (3.0, 30.0)]
        );
    }

    #[test]
    fn test_waypoints_offset_beyond_length() {
        let first = route().waypoints_from(4).next();
        assert_eq!(first, Some((2.0, 20.0)));
    }

    #[test]
    fn test_waypoints_of_empty_route() {
        let empty = Route {
            name: "0".to_string(),
            coordinates: Vec::new(),
        };
        assert_eq!(empty.waypoints_from(3).next(), None);
    }

    #[test]
    fn test_load_routes_filters_and_limits() {
        let dir = temp_dir("load");
        std::fs::write(dir.join("a.json"), r#"{"name":"a","coordinates":[[1,2]]}"#).unwrap();
        std::fs::write(dir.join("b.json"), r#"{"name":"b","coordinates":[[3,4]]}"#).unwrap();
        std::fs::write(dir.join("c.json"), r#"{"name":"c","coordinates":[]}"#).unwrap();
        std::fs::write(dir.join("notes.txt"), "not a route").unwrap();

        let all = load_routes(&dir, None).unwrap();
        let names: Vec<_> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let limited = load_routes(&dir, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].name, "a");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_routes_reports_bad_file() {
        let dir = temp_dir("bad");
        std::fs::write(dir.join("broken.json"), "{").unwrap();

        let err = load_routes(&dir, None).unwrap_err();
        assert!(matches!(err, EmulatorError::RouteParse { .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_routes_missing_dir() {
        let dir = std::env::temp_dir().join("bus-tracker-routes-does-not-exist");
        assert!(matches!(
            load_routes(&dir, None),
            Err(EmulatorError::Routes { .. })
        ));
    }
}
