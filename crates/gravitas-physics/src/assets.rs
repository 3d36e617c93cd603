//! Shape assets: collider descriptions looked up by a key derived from an
//! object's display name.
//!
//! An asset `<key>` is the TOML file `<dir>/<key>.toml` in the first
//! directory of the search path that contains it:
//!
//! ```toml
//! shape = "cuboid"
//! half_extents = [0.05, 0.05, 0.06]
//! mass = 0.3
//! friction = 0.7
//! ```
//!
//! Open containers (boxes, mugs, bins) use `shape = "container"`: a floor and
//! four walls of thickness `wall` inside the outer `half_extents`, so objects
//! can rest inside them.
//!
//! Assets can also be registered in memory, which is how tests and the
//! deterministic engine provide shapes without touching the file system.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use gravitas_types::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::PhysicsError;

/// Derive the shape-asset key of an object from its display name.
///
/// Separators (`_`, `.`, `-`) become word breaks, the name is lowercased,
/// purely numeric tokens (instance counters) are dropped and the remaining
/// words are joined with `_`.
///
/// ```rust
/// use gravitas_physics::asset_key;
/// assert_eq!(asset_key("Coffee-Mug.002"), "coffee_mug");
/// ```
pub fn asset_key(name: &str) -> String {
    name.replace(['_', '.', '-'], " ")
        .to_lowercase()
        .split_whitespace()
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join("_")
}

/// Collider primitive of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Cuboid,
    Ball,
    /// Upright cylinder, axis along world z.
    Cylinder,
    /// Open-top box: floor and four walls, `half_extents` is the outer hull.
    Container,
}

/// Wall and floor thickness of a container without an explicit `wall`.
pub const DEFAULT_WALL: f32 = 0.01;

fn default_friction() -> f32 {
    0.7
}

/// Collider description stored in a shape-asset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeAsset {
    pub shape: ShapeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub half_extents: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub half_height: Option<f32>,
    /// Container wall thickness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall: Option<f32>,
    /// Zero makes the body fixed.
    #[serde(default)]
    pub mass: f32,
    #[serde(default = "default_friction")]
    pub friction: f32,
    #[serde(default)]
    pub restitution: f32,
}

impl ShapeAsset {
    /// A dynamic box.
    pub fn cuboid(half_extents: [f32; 3], mass: f32) -> Self {
        Self {
            shape: ShapeType::Cuboid,
            half_extents: Some(half_extents),
            radius: None,
            half_height: None,
            wall: None,
            mass,
            friction: default_friction(),
            restitution: 0.0,
        }
    }

    /// A dynamic sphere.
    pub fn ball(radius: f32, mass: f32) -> Self {
        Self {
            shape: ShapeType::Ball,
            half_extents: None,
            radius: Some(radius),
            half_height: None,
            wall: None,
            mass,
            friction: default_friction(),
            restitution: 0.0,
        }
    }

    /// A dynamic open-top container with walls `wall` thick.
    pub fn container(half_extents: [f32; 3], wall: f32, mass: f32) -> Self {
        Self {
            shape: ShapeType::Container,
            wall: Some(wall),
            ..Self::cuboid(half_extents, mass)
        }
    }

    /// Wall thickness used for a container.
    pub fn wall_thickness(&self) -> f32 {
        self.wall.unwrap_or(DEFAULT_WALL)
    }

    pub fn is_fixed(&self) -> bool {
        self.mass <= 0.0
    }

    /// Half sizes of the axis-aligned box enclosing the shape in its own
    /// frame.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::Instantiation`] when a dimension required by the
    /// shape type is missing or not strictly positive.
    pub fn bounding_half_extents(&self, key: &str) -> Result<Vec3, PhysicsError> {
        let invalid = |details: &str| PhysicsError::Instantiation {
            key: key.to_string(),
            details: details.to_string(),
        };
        let positive = |v: f32| v.is_finite() && v > 0.0;

        match self.shape {
            ShapeType::Cuboid => {
                let he = self.half_extents.ok_or_else(|| invalid("cuboid requires half_extents"))?;
                if !he.iter().all(|v| positive(*v)) {
                    return Err(invalid("half_extents must be positive"));
                }
                Ok(Vec3::from(he))
            }
            ShapeType::Container => {
                let he = self.half_extents.ok_or_else(|| invalid("container requires half_extents"))?;
                if !he.iter().all(|v| positive(*v)) {
                    return Err(invalid("half_extents must be positive"));
                }
                let wall = self.wall_thickness();
                if !positive(wall) || he.iter().any(|v| wall >= *v) {
                    return Err(invalid("wall must be positive and thinner than every half extent"));
                }
                Ok(Vec3::from(he))
            }
            ShapeType::Ball => {
                let r = self.radius.ok_or_else(|| invalid("ball requires radius"))?;
                if !positive(r) {
                    return Err(invalid("radius must be positive"));
                }
                Ok(Vec3::new(r, r, r))
            }
            ShapeType::Cylinder => {
                let r = self.radius.ok_or_else(|| invalid("cylinder requires radius"))?;
                let hh = self
                    .half_height
                    .ok_or_else(|| invalid("cylinder requires half_height"))?;
                if !positive(r) || !positive(hh) {
                    return Err(invalid("radius and half_height must be positive"));
                }
                Ok(Vec3::new(r, r, hh))
            }
        }
    }
}

/// Resolves asset keys against in-memory registrations first, then the
/// directories of the search path in order.
#[derive(Debug, Clone, Default)]
pub struct ShapeLibrary {
    search_path: Vec<PathBuf>,
    registered: HashMap<String, ShapeAsset>,
}

impl ShapeLibrary {
    pub fn new<I, P>(search_path: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_path: search_path.into_iter().map(Into::into).collect(),
            registered: HashMap::new(),
        }
    }

    /// A library with no search path; only registered assets resolve.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Register `asset` under `key`, shadowing any file with that key.
    pub fn with_asset(mut self, key: impl Into<String>, asset: ShapeAsset) -> Self {
        self.registered.insert(key.into(), asset);
        self
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Load and validate the asset `key`.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::AssetMissing`] when no directory holds `<key>.toml`,
    /// [`PhysicsError::Instantiation`] when the file cannot be read, parsed
    /// or describes an invalid shape.
    pub fn load(&self, key: &str) -> Result<ShapeAsset, PhysicsError> {
        if let Some(asset) = self.registered.get(key) {
            asset.bounding_half_extents(key)?;
            return Ok(asset.clone());
        }

        let path = self
            .search_path
            .iter()
            .map(|dir| dir.join(format!("{key}.toml")))
            .find(|p| p.is_file())
            .ok_or_else(|| PhysicsError::AssetMissing(key.to_string()))?;

        let asset = read_asset(key, &path)?;
        asset.bounding_half_extents(key)?;
        debug!(asset = key, path = %path.display(), "shape asset resolved");
        Ok(asset)
    }
}

fn read_asset(key: &str, path: &Path) -> Result<ShapeAsset, PhysicsError> {
    let text = fs::read_to_string(path).map_err(|e| PhysicsError::Instantiation {
        key: key.to_string(),
        details: format!("cannot read {}: {e}", path.display()),
    })?;
    toml::from_str(&text).map_err(|e| PhysicsError::Instantiation {
        key: key.to_string(),
        details: format!("invalid asset {}: {e}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn asset_key_normalises_display_names() {
        assert_eq!(asset_key("Cube"), "cube");
        assert_eq!(asset_key("red_cube_2"), "red_cube");
        assert_eq!(asset_key("Coffee-Mug.002"), "coffee_mug");
        assert_eq!(asset_key("box 12 lid"), "box_lid");
        assert_eq!(asset_key("__42__"), "");
    }

    #[test]
    fn asset_key_keeps_mixed_alphanumeric_tokens() {
        assert_eq!(asset_key("shelf_b2"), "shelf_b2");
    }

    #[test]
    fn loads_asset_from_search_path() {
        let empty = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("mug.toml"),
            "shape = \"cylinder\"\nradius = 0.04\nhalf_height = 0.05\nmass = 0.3\n",
        )
        .unwrap();

        let lib = ShapeLibrary::new([empty.path(), dir.path()]);
        let asset = lib.load("mug").unwrap();
        assert_eq!(asset.shape, ShapeType::Cylinder);
        assert!((asset.friction - 0.7).abs() < f32::EPSILON);
        let he = asset.bounding_half_extents("mug").unwrap();
        assert!((he.z - 0.05).abs() < 1e-6);
    }

    #[test]
    fn missing_file_is_asset_missing() {
        let dir = TempDir::new().unwrap();
        let lib = ShapeLibrary::new([dir.path()]);
        assert_eq!(lib.load("ghost"), Err(PhysicsError::AssetMissing("ghost".into())));
    }

    #[test]
    fn malformed_file_is_instantiation_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blob.toml"), "shape = \"blob\"\n").unwrap();
        let lib = ShapeLibrary::new([dir.path()]);
        assert!(matches!(lib.load("blob"), Err(PhysicsError::Instantiation { .. })));
    }

    #[test]
    fn cuboid_without_extents_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("crate.toml"), "shape = \"cuboid\"\nmass = 1.0\n").unwrap();
        let lib = ShapeLibrary::new([dir.path()]);
        assert!(matches!(lib.load("crate"), Err(PhysicsError::Instantiation { .. })));
    }

    #[test]
    fn container_loads_with_default_wall() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("bin.toml"),
            "shape = \"container\"\nhalf_extents = [0.2, 0.15, 0.1]\nmass = 0.5\n",
        )
        .unwrap();
        let asset = ShapeLibrary::new([dir.path()]).load("bin").unwrap();
        assert_eq!(asset.shape, ShapeType::Container);
        assert!((asset.wall_thickness() - DEFAULT_WALL).abs() < f32::EPSILON);
        assert_eq!(asset.bounding_half_extents("bin").unwrap(), Vec3::new(0.2, 0.15, 0.1));
    }

    #[test]
    fn container_wall_must_fit() {
        let lib = ShapeLibrary::in_memory().with_asset("tray", ShapeAsset::container([0.2, 0.2, 0.02], 0.05, 0.3));
        assert!(matches!(lib.load("tray"), Err(PhysicsError::Instantiation { .. })));
    }

    #[test]
    fn registered_asset_shadows_search_path() {
        let lib = ShapeLibrary::in_memory().with_asset("cube", ShapeAsset::cuboid([0.05; 3], 0.1));
        let asset = lib.load("cube").unwrap();
        assert!(!asset.is_fixed());
        assert!(lib.search_path().is_empty());
    }
}
