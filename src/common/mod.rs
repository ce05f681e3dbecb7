//! Common types for the Prometheus trajectory service
//!
//! Field geometry shared by the planner, the sampler and the wire protocol.
//! The serde derives below *are* the JSON contract, so field names must not change.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// A 2D field coordinate in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Create a new position
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.to_vector() - other.to_vector()).norm()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<Vector2<f64>> for Position {
    fn from(v: Vector2<f64>) -> Self {
        Position { x: v.x, y: v.y }
    }
}

/// A field pose: translation in meters, rotation in radians (not normalized)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub translation: Position,
    pub rotation: f64,
}

impl Pose {
    /// Create a new pose
    pub fn new(x: f64, y: f64, rotation: f64) -> Self {
        Pose {
            translation: Position::new(x, y),
            rotation,
        }
    }
}

/// A trajectory request as sent by a client
///
/// `points` are the intermediate waypoints in path order. The list may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRequest {
    pub start: Pose,
    pub points: Vec<Position>,
    pub end: Pose,
}

impl TrajectoryRequest {
    /// Create a new request
    pub fn new(start: Pose, points: Vec<Position>, end: Pose) -> Self {
        TrajectoryRequest { start, points, end }
    }

    /// Decode a request from one JSON document
    ///
    /// The whole document is rejected if any field is missing or mistyped.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(bytes).map_err(ProtocolError::MalformedRequest)
    }

    /// Encode the request as a JSON document
    pub fn to_vec(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }
}

/// Discrete positions sampled from a trajectory, in time order
///
/// Serialized as a bare JSON array; `[]` means no trajectory could be computed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampledTrajectory(Vec<Position>);

impl SampledTrajectory {
    /// The empty trajectory sent when planning fails
    pub fn empty() -> Self {
        SampledTrajectory(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn positions(&self) -> &[Position] {
        &self.0
    }

    pub fn first(&self) -> Option<&Position> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Position> {
        self.0.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Position> {
        self.0.iter()
    }

    /// Decode a response document
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(bytes).map_err(ProtocolError::MalformedResponse)
    }

    /// Encode as a JSON array of positions
    pub fn to_vec(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }
}

impl From<Vec<Position>> for SampledTrajectory {
    fn from(points: Vec<Position>) -> Self {
        SampledTrajectory(points)
    }
}

impl FromIterator<Position> for SampledTrajectory {
    fn from_iter<I: IntoIterator<Item = Position>>(iter: I) -> Self {
        SampledTrajectory(iter.into_iter().collect())
    }
}

impl IntoIterator for SampledTrajectory {
    type Item = Position;
    type IntoIter = std::vec::IntoIter<Position>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Body sent back for a request that could not be decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub const MALFORMED_REQUEST: &'static str = "malformed_request";

    pub fn malformed(message: impl Into<String>) -> Self {
        ErrorResponse {
            error: Self::MALFORMED_REQUEST.to_string(),
            message: message.into(),
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const REQUEST: &str = r#"{
        "start": {"translation": {"x": 0.0, "y": 0.5}, "rotation": 0.0},
        "points": [{"x": 1.0, "y": 1.0}, {"x": 2.0, "y": 2.0}, {"x": 1.5, "y": 3.0}],
        "end": {"translation": {"x": 5.0, "y": 0.0}, "rotation": 3.5}
    }"#;

    #[test]
    fn decodes_a_full_request() {
        let request = TrajectoryRequest::from_slice(REQUEST.as_bytes()).unwrap();

        assert_eq!(request.start, Pose::new(0.0, 0.5, 0.0));
        assert_eq!(request.end, Pose::new(5.0, 0.0, 3.5));
        assert_eq!(
            request.points,
            vec![
                Position::new(1.0, 1.0),
                Position::new(2.0, 2.0),
                Position::new(1.5, 3.0)
            ]
        );
    }

    #[test]
    fn request_survives_encode_and_decode() {
        let request = TrajectoryRequest::from_slice(REQUEST.as_bytes()).unwrap();
        let bytes = request.to_vec().unwrap();
        assert_eq!(TrajectoryRequest::from_slice(&bytes).unwrap(), request);
    }

    #[test]
    fn integer_coordinates_are_accepted() {
        let doc = r#"{"start": {"translation": {"x": 0, "y": 0}, "rotation": 0},
                      "points": [], "end": {"translation": {"x": 5, "y": 0}, "rotation": 0}}"#;
        let request = TrajectoryRequest::from_slice(doc.as_bytes()).unwrap();
        assert!(request.points.is_empty());
        assert_eq!(request.end.translation, Position::new(5.0, 0.0));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let doc = r#"{"start": {"translation": {"x": 0, "y": 0}, "rotation": 0},
                      "points": [], "end": {"translation": {"x": 1, "y": 0}, "rotation": 0},
                      "name": "auto-1"}"#;
        assert!(TrajectoryRequest::from_slice(doc.as_bytes()).is_ok());
    }

    #[rstest]
    #[case::start_not_a_pose(r#"{"start": "not-a-pose"}"#)]
    #[case::missing_end(
        r#"{"start": {"translation": {"x": 0, "y": 0}, "rotation": 0}, "points": []}"#
    )]
    #[case::missing_points(
        r#"{"start": {"translation": {"x": 0, "y": 0}, "rotation": 0},
            "end": {"translation": {"x": 1, "y": 0}, "rotation": 0}}"#
    )]
    #[case::points_not_array(
        r#"{"start": {"translation": {"x": 0, "y": 0}, "rotation": 0}, "points": {"x": 1, "y": 1},
            "end": {"translation": {"x": 1, "y": 0}, "rotation": 0}}"#
    )]
    #[case::point_missing_y(
        r#"{"start": {"translation": {"x": 0, "y": 0}, "rotation": 0}, "points": [{"x": 1}],
            "end": {"translation": {"x": 1, "y": 0}, "rotation": 0}}"#
    )]
    #[case::rotation_is_string(
        r#"{"start": {"translation": {"x": 0, "y": 0}, "rotation": "north"}, "points": [],
            "end": {"translation": {"x": 1, "y": 0}, "rotation": 0}}"#
    )]
    #[case::truncated(r#"{"start": {"translation": {"x": 0"#)]
    #[case::not_json("hello robot")]
    fn rejects_malformed_requests(#[case] doc: &str) {
        let err = TrajectoryRequest::from_slice(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedRequest(_)));
    }

    #[test]
    fn sampled_trajectory_is_a_bare_array() {
        let samples = SampledTrajectory::from(vec![Position::new(0.0, 0.0), Position::new(0.5, 0.25)]);
        let json = String::from_utf8(samples.to_vec().unwrap()).unwrap();
        assert_eq!(json, r#"[{"x":0.0,"y":0.0},{"x":0.5,"y":0.25}]"#);
        assert_eq!(SampledTrajectory::from_slice(json.as_bytes()).unwrap(), samples);
    }

    #[test]
    fn empty_trajectory_encodes_as_empty_array() {
        assert_eq!(SampledTrajectory::empty().to_vec().unwrap(), b"[]");
    }

    #[test]
    fn malformed_error_body() {
        let body = ErrorResponse::malformed("expected struct Pose");
        let value: serde_json::Value = serde_json::from_slice(&body.to_vec().unwrap()).unwrap();
        assert_eq!(value["error"], "malformed_request");
        assert_eq!(value["message"], "expected struct Pose");
    }

    #[test]
    fn vector_conversion() {
        let p = Position::new(3.0, 4.0);
        assert_eq!(Position::from(p.to_vector()), p);
        assert_eq!(p.distance_to(&Position::default()), 5.0);
    }
}
