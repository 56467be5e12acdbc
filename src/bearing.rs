/// Initial compass bearing between two WGS84 points.
///
/// Formula:
///   θ = atan2(sin(Δlong)·cos(lat2),
///             cos(lat1)·sin(lat2) − sin(lat1)·cos(lat2)·cos(Δlong))
///
/// atan2 yields (-180°, 180°]; the result is shifted into [0°, 360°).
/// Identical points give atan2(0, 0) = 0, so `bearing(a, a) == 0.0`.
///
/// Coordinates are decimal degrees. Out-of-range input is the caller's problem.
pub fn bearing(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let x = d_lon.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lon.cos();

    let initial = x.atan2(y).to_degrees();
    (initial + 360.0) % 360.0
}
