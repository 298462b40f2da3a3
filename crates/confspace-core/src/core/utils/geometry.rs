use nalgebra::{Matrix3, Point3, Rotation3, Vector3};

/// Computes the rigid-body transform that best superposes `from_points` onto
/// `to_points` in the least-squares sense (Kabsch algorithm).
///
/// Both slices must have the same length; at least 3 non-collinear point
/// pairs are needed for the rotation to be well determined.
///
/// # Return
///
/// Returns `None` if the point sets are empty or of mismatched length.
pub fn superpose(
    from_points: &[Point3<f64>],
    to_points: &[Point3<f64>],
) -> Option<(Rotation3<f64>, Vector3<f64>)> {
    if from_points.is_empty() || from_points.len() != to_points.len() {
        return None;
    }

    let from_centroid_sum: Vector3<f64> = from_points.iter().map(|p| p.coords).sum();
    let from_centroid = Point3::from(from_centroid_sum / from_points.len() as f64);
    let to_centroid_sum: Vector3<f64> = to_points.iter().map(|p| p.coords).sum();
    let to_centroid = Point3::from(to_centroid_sum / to_points.len() as f64);

    let centered_from: Vec<_> = from_points.iter().map(|p| p - from_centroid).collect();
    let centered_to: Vec<_> = to_points.iter().map(|p| p - to_centroid).collect();

    let h = centered_from
        .iter()
        .zip(centered_to.iter())
        .fold(Matrix3::zeros(), |acc, (f, t)| acc + t * f.transpose());

    let svd = h.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;

    let d = (u * v_t.transpose()).determinant();
    let mut correction = Matrix3::identity();
    if d < 0.0 {
        correction[(2, 2)] = -1.0;
    }

    let rotation_matrix = u * correction * v_t;
    let rotation = Rotation3::from_matrix(&rotation_matrix);
    let translation = to_centroid.coords - rotation * from_centroid.coords;

    Some((rotation, translation))
}

/// Measures the dihedral angle defined by four points, in degrees.
///
/// The angle is the signed rotation about the b-c axis taking the a-b-c plane
/// onto the b-c-d plane, in `(-180, 180]`.
pub fn measure_dihedral(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
) -> f64 {
    let b1 = b - a;
    let b2 = c - b;
    let b3 = d - c;

    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    let m1 = n1.cross(&b2.normalize());

    let x = n1.dot(&n2);
    let y = m1.dot(&n2);

    y.atan2(x).to_degrees()
}
