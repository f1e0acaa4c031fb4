use nbdb_core::Coordinates;

/// Mean position of the valid coordinates, or `None` when fewer than two
/// are available.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn centroid<'a>(points: impl IntoIterator<Item = &'a Coordinates>) -> Option<Coordinates> {
    let valid: Vec<&Coordinates> = points.into_iter().filter(|c| c.is_valid()).collect();
    if valid.len() < 2 {
        return None;
    }
    let count = valid.len() as f64;
    let latitude = valid.iter().map(|c| c.latitude).sum::<f64>() / count;
    let longitude = valid.iter().map(|c| c.longitude).sum::<f64>() / count;
    Some(Coordinates::new(latitude, longitude))
}

/// Distance from `center` when `point` is valid and further than `limit_km`.
pub(crate) fn outlier_distance(point: &Coordinates, center: &Coordinates, limit_km: f64) -> Option<f64> {
    if !point.is_valid() {
        return None;
    }
    let distance = point.distance_km(center);
    (distance > limit_km).then_some(distance)
}
