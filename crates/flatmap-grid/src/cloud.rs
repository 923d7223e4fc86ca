//! Point-cloud frames as consumed by the classifier.

use crate::error::GridError;
use crate::point_types::Point3;
use crate::snapshot::Stamp;

/// Bytes taken by the packed x, y, z fields at the start of a record.
pub const XYZ_RECORD_BYTES: usize = 12;

/// An unordered set of 3D points, consumed as a single unit.
///
/// Points may carry non-finite coordinates; those are filtered during
/// classification rather than here.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointCloudFrame {
    /// Acquisition time of the frame.
    pub stamp: Stamp,
    /// The point records.
    pub points: Vec<Point3>,
}

impl PointCloudFrame {
    /// Construct a frame from already decoded points.
    pub fn new(stamp: Stamp, points: Vec<Point3>) -> Self {
        PointCloudFrame { stamp, points }
    }

    /// Decodes a packed buffer of `point_step`-byte records whose first
    /// twelve bytes are little-endian `f32` x, y and z.
    ///
    /// Trailing fields in each record (intensity, ring, ...) are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Err(GridError::MalformedCloud)` if `point_step` is smaller
    /// than an xyz record or the buffer is not a whole number of records.
    pub fn from_le_bytes(stamp: Stamp, bytes: &[u8], point_step: usize) -> Result<Self, GridError> {
        if point_step < XYZ_RECORD_BYTES {
            return Err(GridError::MalformedCloud(
                "Point step is smaller than an xyz record",
            ));
        }
        if bytes.len() % point_step != 0 {
            return Err(GridError::MalformedCloud(
                "Buffer length is not a multiple of the point step",
            ));
        }
        let points = bytes
            .chunks_exact(point_step)
            .map(|record| {
                Point3::new(
                    read_f32_le(record, 0),
                    read_f32_le(record, 4),
                    read_f32_le(record, 8),
                )
            })
            .collect();
        Ok(PointCloudFrame { stamp, points })
    }

    /// Number of points in the frame.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the frame holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn read_f32_le(record: &[u8], offset: usize) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&record[offset..offset + 4]);
    f32::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(points: &[[f32; 4]]) -> Vec<u8> {
        points
            .iter()
            .flat_map(|p| p.iter().flat_map(|v| v.to_le_bytes()))
            .collect()
    }

    #[test]
    fn test_decode_with_padding() {
        // x, y, z, intensity
        let bytes = pack(&[[1.0, 2.0, 3.0, 99.0], [-0.5, 0.25, f32::NAN, 0.0]]);
        let frame = PointCloudFrame::from_le_bytes(Stamp::new(5, 0), &bytes, 16).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.stamp.sec, 5);
        assert_eq!(frame.points[0], Point3::new(1.0, 2.0, 3.0));
        assert_eq!(frame.points[1].x, -0.5);
        assert_eq!(frame.points[1].y, 0.25);
        assert!(frame.points[1].z.is_nan());
    }

    #[test]
    fn test_decode_empty() {
        let frame = PointCloudFrame::from_le_bytes(Stamp::default(), &[], 12).unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_decode_errors() {
        let bytes = pack(&[[1.0, 2.0, 3.0, 4.0]]);
        assert!(matches!(
            PointCloudFrame::from_le_bytes(Stamp::default(), &bytes, 8),
            Err(GridError::MalformedCloud(_))
        ));
        assert!(matches!(
            PointCloudFrame::from_le_bytes(Stamp::default(), &bytes[..15], 12),
            Err(GridError::MalformedCloud(_))
        ));
    }
}
