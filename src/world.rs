//! Document-side types: brushes, their sides and the cameras saved with a
//! map, including the string forms map files store them in.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use glam::{Vec3, Vec4};
use thiserror::Error;
use tinyjson::{InnerAsRef, JsonValue};

use crate::error::DocumentError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected {expected}, found \"{found}\"")]
pub struct ParseError {
    expected: &'static str,
    found: String,
}

fn parse_floats<const N: usize>(
    s: &str,
    open: char,
    close: char,
    expected: &'static str,
) -> Result<[f32; N], ParseError> {
    let error = || ParseError {
        expected,
        found: s.to_string(),
    };
    let inner = s
        .trim()
        .strip_prefix(open)
        .and_then(|s| s.strip_suffix(close))
        .ok_or_else(error)?;
    let mut values = [0.0; N];
    let mut parts = inner.split_whitespace();
    for value in values.iter_mut() {
        *value = parts
            .next()
            .and_then(|part| part.parse().ok())
            .ok_or_else(error)?;
    }
    if parts.next().is_some() {
        return Err(error());
    }
    Ok(values)
}

/// Parses `"[x y z]"`.
pub fn parse_vec3(s: &str) -> Result<Vec3, ParseError> {
    parse_floats::<3>(s, '[', ']', "a vector \"[x y z]\"").map(Vec3::from_array)
}

/// Three points on a side's plane: bottom-left, top-left and top-right
/// corners of the face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane(pub [Vec3; 3]);

impl Plane {
    /// The unnormalized plane normal, `(p1 - p0) x (p2 - p0)`.
    pub fn normal(&self) -> Vec3 {
        let [p0, p1, p2] = self.0;
        (p1 - p0).cross(p2 - p0)
    }

    /// The corner opposite `p1`, completing the parallelogram.
    pub fn fourth_corner(&self) -> Vec3 {
        let [p0, p1, p2] = self.0;
        p2 - (p1 - p0)
    }
}

impl FromStr for Plane {
    type Err = ParseError;

    /// Parses `"(x y z) (x y z) (x y z)"`.
    fn from_str(s: &str) -> Result<Plane, ParseError> {
        let expected = "a plane \"(x y z) (x y z) (x y z)\"";
        let mut points = [Vec3::ZERO; 3];
        let mut rest = s.trim();
        for point in points.iter_mut() {
            let end = rest.find(')').ok_or_else(|| ParseError {
                expected,
                found: s.to_string(),
            })?;
            *point = Vec3::from_array(parse_floats(&rest[..=end], '(', ')', expected)?);
            rest = rest[end + 1..].trim_start();
        }
        if !rest.is_empty() {
            return Err(ParseError {
                expected,
                found: s.to_string(),
            });
        }
        Ok(Plane(points))
    }
}

/// Texture projection along one axis: `u = dot(axis.xyz, p) / scale + axis.w`,
/// in texels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvAxis {
    pub axis: Vec4,
    pub scale: f32,
}

impl UvAxis {
    pub fn new(axis: Vec4, scale: f32) -> UvAxis {
        UvAxis { axis, scale }
    }

    pub fn project(&self, point: Vec3) -> f32 {
        let scale = if self.scale == 0.0 { 1.0 } else { self.scale };
        self.axis.truncate().dot(point) / scale + self.axis.w
    }
}

impl FromStr for UvAxis {
    type Err = ParseError;

    /// Parses `"[x y z shift] scale"`.
    fn from_str(s: &str) -> Result<UvAxis, ParseError> {
        let expected = "a texture axis \"[x y z shift] scale\"";
        let error = || ParseError {
            expected,
            found: s.to_string(),
        };
        let end = s.find(']').ok_or_else(error)?;
        let axis = parse_floats::<4>(&s[..=end], '[', ']', expected)?;
        let scale = s[end + 1..].trim().parse().map_err(|_| error())?;
        Ok(UvAxis::new(Vec4::from_array(axis), scale))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Side {
    pub id: i32,
    pub plane: Plane,
    pub material: String,
    pub u_axis: UvAxis,
    pub v_axis: UvAxis,
    pub rotation: f32,
    pub lightmap_scale: f32,
    pub smoothing_groups: bool,
}

impl Side {
    pub fn new(id: i32, plane: Plane, material: impl Into<String>, u_axis: UvAxis, v_axis: UvAxis) -> Side {
        Side {
            id,
            plane,
            material: material.into(),
            u_axis,
            v_axis,
            rotation: 0.0,
            lightmap_scale: 16.0,
            smoothing_groups: false,
        }
    }
}

/// A convex brush.
#[derive(Debug, Clone, PartialEq)]
pub struct Solid {
    pub id: i32,
    pub sides: Vec<Side>,
}

impl Solid {
    pub fn new(id: i32, sides: Vec<Side>) -> Solid {
        Solid { id, sides }
    }

    /// An axis-aligned box from `min` to `max`, every side using `material`
    /// with world-aligned texture axes. Side ids are `id * 6 + face`.
    pub fn block(id: i32, min: Vec3, max: Vec3, material: &str) -> Solid {
        let size = max - min;
        // (first corner, edge a, edge b) with a x b pointing out of the box.
        let faces = [
            (Vec3::new(min.x, min.y, max.z), Vec3::X * size.x, Vec3::Y * size.y),
            (min, Vec3::Y * size.y, Vec3::X * size.x),
            (Vec3::new(max.x, min.y, min.z), Vec3::Y * size.y, Vec3::Z * size.z),
            (min, Vec3::Z * size.z, Vec3::Y * size.y),
            (Vec3::new(min.x, max.y, min.z), Vec3::Z * size.z, Vec3::X * size.x),
            (min, Vec3::X * size.x, Vec3::Z * size.z),
        ];
        let sides = faces
            .into_iter()
            .enumerate()
            .map(|(face, (p0, a, b))| {
                let plane = Plane([p0, p0 + a, p0 + a + b]);
                let (u, v) = world_axes(plane.normal());
                Side::new(
                    id * 6 + face as i32,
                    plane,
                    material,
                    UvAxis::new(u.extend(0.0), 0.25),
                    UvAxis::new(v.extend(0.0), 0.25),
                )
            })
            .collect();
        Solid::new(id, sides)
    }
}

/// Texture axes aligned to the dominant axis of `normal`.
fn world_axes(normal: Vec3) -> (Vec3, Vec3) {
    let n = normal.abs();
    if n.z >= n.x && n.z >= n.y {
        (Vec3::X, Vec3::NEG_Y)
    } else if n.x >= n.y {
        (Vec3::Y, Vec3::NEG_Z)
    } else {
        (Vec3::X, Vec3::NEG_Z)
    }
}

/// A camera saved in the document. `look` holds pitch, yaw and roll in
/// degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentCamera {
    pub position: Vec3,
    pub look: Vec3,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub solids: Vec<Solid>,
    pub cameras: Vec<DocumentCamera>,
}

impl Document {
    /// A closed room of six walls with a pillar in the middle.
    pub fn sample_room() -> Document {
        let (lo, hi, t) = (-512.0, 512.0, 16.0);
        let blocks = [
            (Vec3::new(lo, lo, lo - t), Vec3::new(hi, hi, lo), "dev/dev_measuregeneric01"),
            (Vec3::new(lo, lo, hi), Vec3::new(hi, hi, hi + t), "dev/dev_measuregeneric01b"),
            (Vec3::new(lo - t, lo, lo), Vec3::new(lo, hi, hi), "dev/dev_measurewall01a"),
            (Vec3::new(hi, lo, lo), Vec3::new(hi + t, hi, hi), "dev/dev_measurewall01a"),
            (Vec3::new(lo, lo - t, lo), Vec3::new(hi, lo, hi), "dev/dev_measurewall01c"),
            (Vec3::new(lo, hi, lo), Vec3::new(hi, hi + t, hi), "dev/dev_measurewall01c"),
            (Vec3::new(-64.0, -64.0, lo), Vec3::new(64.0, 64.0, 0.0), "tools/toolsnodraw"),
        ];
        let solids = blocks
            .into_iter()
            .enumerate()
            .map(|(i, (min, max, material))| Solid::block(i as i32 + 1, min, max, material))
            .collect();
        Document {
            solids,
            cameras: vec![DocumentCamera {
                position: Vec3::new(-400.0, -400.0, 0.0),
                look: Vec3::new(-10.0, 45.0, 0.0),
            }],
        }
    }

    pub fn load(path: &Path) -> Result<Document, DocumentError> {
        let source = fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Document::from_json(&source)
    }

    /// Reads a document saved as JSON. Geometry and camera values use the
    /// same string forms as map files:
    ///
    /// ```json
    /// {
    ///   "solids": [{ "id": 1, "sides": [{
    ///     "id": 1,
    ///     "plane": "(-64 64 0) (64 64 0) (64 -64 0)",
    ///     "material": "dev/dev_measuregeneric01",
    ///     "uaxis": "[1 0 0 0] 0.25",
    ///     "vaxis": "[0 -1 0 0] 0.25"
    ///   }]}],
    ///   "cameras": [{ "position": "[0 0 64]", "look": "[0 90 0]" }]
    /// }
    /// ```
    pub fn from_json(source: &str) -> Result<Document, DocumentError> {
        let root: JsonValue = source
            .parse()
            .map_err(|err: tinyjson::JsonParseError| DocumentError::Json(err.to_string()))?;
        let root: &HashMap<String, JsonValue> = root.get().ok_or(DocumentError::Field("root"))?;

        let mut document = Document::default();
        if let Some(solids) = root.get("solids") {
            let solids: &Vec<JsonValue> = solids.get().ok_or(DocumentError::Field("solids"))?;
            for solid in solids {
                document.solids.push(parse_solid(object(solid, "solid")?)?);
            }
        }
        if let Some(cameras) = root.get("cameras") {
            let cameras: &Vec<JsonValue> = cameras.get().ok_or(DocumentError::Field("cameras"))?;
            for camera in cameras {
                let camera = object(camera, "camera")?;
                document.cameras.push(DocumentCamera {
                    position: parse_vec3(field::<String>(camera, "position", "camera.position")?)?,
                    look: parse_vec3(field::<String>(camera, "look", "camera.look")?)?,
                });
            }
        }
        Ok(document)
    }
}

type JsonObject = HashMap<String, JsonValue>;

fn object<'a>(value: &'a JsonValue, what: &'static str) -> Result<&'a JsonObject, DocumentError> {
    value.get().ok_or(DocumentError::Field(what))
}

fn field<'a, T: InnerAsRef>(
    object: &'a JsonObject,
    key: &str,
    what: &'static str,
) -> Result<&'a T, DocumentError> {
    object
        .get(key)
        .and_then(|value| value.get())
        .ok_or(DocumentError::Field(what))
}

fn optional_number(object: &JsonObject, key: &str, what: &'static str) -> Result<Option<f64>, DocumentError> {
    match object.get(key) {
        Some(value) => value.get().copied().map(Some).ok_or(DocumentError::Field(what)),
        None => Ok(None),
    }
}

fn parse_solid(solid: &JsonObject) -> Result<Solid, DocumentError> {
    let id = *field::<f64>(solid, "id", "solid.id")? as i32;
    let sides = field::<Vec<JsonValue>>(solid, "sides", "solid.sides")?
        .iter()
        .map(|side| parse_side(object(side, "side")?))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Solid::new(id, sides))
}

fn parse_side(side: &JsonObject) -> Result<Side, DocumentError> {
    let mut parsed = Side::new(
        *field::<f64>(side, "id", "side.id")? as i32,
        field::<String>(side, "plane", "side.plane")?.parse()?,
        field::<String>(side, "material", "side.material")?.as_str(),
        field::<String>(side, "uaxis", "side.uaxis")?.parse()?,
        field::<String>(side, "vaxis", "side.vaxis")?.parse()?,
    );
    if let Some(rotation) = optional_number(side, "rotation", "side.rotation")? {
        parsed.rotation = rotation as f32;
    }
    if let Some(scale) = optional_number(side, "lightmapscale", "side.lightmapscale")? {
        parsed.lightmap_scale = scale as f32;
    }
    if let Some(groups) = optional_number(side, "smoothing_groups", "side.smoothing_groups")? {
        parsed.smoothing_groups = groups != 0.0;
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plane() {
        let plane: Plane = "(-64 64 0) (64 64 0) (64 -64 0)".parse().unwrap();
        assert_eq!(plane.0[0], Vec3::new(-64.0, 64.0, 0.0));
        assert_eq!(plane.0[2], Vec3::new(64.0, -64.0, 0.0));
        assert_eq!(plane.fourth_corner(), Vec3::new(-64.0, -64.0, 0.0));
        assert!("(1 2 3) (4 5 6)".parse::<Plane>().is_err());
        assert!("(1 2 3) (4 5 6) (7 8 9) (1 1 1)".parse::<Plane>().is_err());
        assert!("(1 2 x) (4 5 6) (7 8 9)".parse::<Plane>().is_err());
    }

    #[test]
    fn parses_uv_axis() {
        let axis: UvAxis = "[1 0 0 16] 0.25".parse().unwrap();
        assert_eq!(axis, UvAxis::new(Vec4::new(1.0, 0.0, 0.0, 16.0), 0.25));
        assert_eq!(axis.project(Vec3::new(8.0, 100.0, 100.0)), 48.0);
        assert!("[1 0 0] 0.25".parse::<UvAxis>().is_err());
        assert!("[1 0 0 0]".parse::<UvAxis>().is_err());
    }

    #[test]
    fn parses_vec3() {
        assert_eq!(parse_vec3(" [1 -2 3.5] ").unwrap(), Vec3::new(1.0, -2.0, 3.5));
        assert!(parse_vec3("1 2 3").is_err());
    }

    #[test]
    fn block_sides_face_outwards() {
        let min = Vec3::new(-1.0, -2.0, -3.0);
        let max = Vec3::new(4.0, 5.0, 6.0);
        let solid = Solid::block(7, min, max, "brick");
        let center = (min + max) / 2.0;
        assert_eq!(solid.sides.len(), 6);
        for side in &solid.sides {
            let outwards = side.plane.0[0] - center;
            assert!(side.plane.normal().dot(outwards) > 0.0, "{side:?}");
        }
        assert_eq!(solid.sides[5].id, 47);
    }

    #[test]
    fn reads_json_documents() {
        let document = Document::from_json(
            r#"{
                "solids": [{ "id": 4, "sides": [{
                    "id": 9,
                    "plane": "(-64 64 0) (64 64 0) (64 -64 0)",
                    "material": "dev/floor",
                    "uaxis": "[1 0 0 8] 0.25",
                    "vaxis": "[0 -1 0 0] 0.5",
                    "lightmapscale": 32,
                    "smoothing_groups": 1
                }]}],
                "cameras": [{ "position": "[0 0 64]", "look": "[0 90 0]" }],
                "entities": []
            }"#,
        )
        .unwrap();
        assert_eq!(document.solids.len(), 1);
        let side = &document.solids[0].sides[0];
        assert_eq!(document.solids[0].id, 4);
        assert_eq!(side.id, 9);
        assert_eq!(side.material, "dev/floor");
        assert_eq!(side.u_axis, UvAxis::new(Vec4::new(1.0, 0.0, 0.0, 8.0), 0.25));
        assert_eq!(side.v_axis.scale, 0.5);
        assert_eq!(side.lightmap_scale, 32.0);
        assert!(side.smoothing_groups);
        assert_eq!(document.cameras[0].position, Vec3::new(0.0, 0.0, 64.0));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(
            Document::from_json("{"),
            Err(DocumentError::Json(_))
        ));
        assert!(matches!(
            Document::from_json(r#"{ "solids": [{ "sides": [] }] }"#),
            Err(DocumentError::Field("solid.id"))
        ));
        assert!(matches!(
            Document::from_json(
                r#"{ "solids": [{ "id": 1, "sides": [{ "id": 1, "plane": "(0 0 0)",
                    "material": "", "uaxis": "[1 0 0 0] 1", "vaxis": "[0 1 0 0] 1" }] }] }"#
            ),
            Err(DocumentError::Value(_))
        ));
        assert_eq!(Document::from_json("{}").unwrap(), Document::default());
    }
}
