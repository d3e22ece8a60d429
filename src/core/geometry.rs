//! WGS84 geodesy and small 3D vector helpers shared by the geocoding chain

/// WGS84 semi-major axis (m)
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 first eccentricity squared
pub const WGS84_E2: f64 = 0.006_694_379_990_14;

pub type Vec3 = [f64; 3];

#[inline]
pub fn add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn scale(a: &Vec3, s: f64) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm(a: &Vec3) -> f64 {
    dot(a, a).sqrt()
}

/// Unit vector along `a`; `None` for a zero or non-finite vector
pub fn normalize(a: &Vec3) -> Option<Vec3> {
    let n = norm(a);
    if n > 0.0 && n.is_finite() {
        Some(scale(a, 1.0 / n))
    } else {
        None
    }
}

/// Convert geodetic latitude/longitude (degrees) and ellipsoidal height (m)
/// to Earth-fixed Cartesian coordinates
pub fn geodetic_to_ecef(lat: f64, lon: f64, height: f64) -> Vec3 {
    let lat_rad = lat.to_radians();
    let lon_rad = lon.to_radians();

    let n = WGS84_A / (1.0 - WGS84_E2 * lat_rad.sin().powi(2)).sqrt();

    [
        (n + height) * lat_rad.cos() * lon_rad.cos(),
        (n + height) * lat_rad.cos() * lon_rad.sin(),
        (n * (1.0 - WGS84_E2) + height) * lat_rad.sin(),
    ]
}

/// Convert Earth-fixed Cartesian coordinates to (latitude, longitude, height)
/// with latitude/longitude in degrees.
///
/// Fixed-point iteration on latitude; converges to sub-millimetre height in a
/// handful of iterations for points near the surface.
pub fn ecef_to_geodetic(p: &Vec3) -> (f64, f64, f64) {
    let (x, y, z) = (p[0], p[1], p[2]);
    let lon = y.atan2(x);
    let rho = (x * x + y * y).sqrt();

    let mut lat = z.atan2(rho * (1.0 - WGS84_E2));
    let mut height = 0.0;
    for _ in 0..10 {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        height = if lat.cos().abs() > 1e-10 {
            rho / lat.cos() - n
        } else {
            z.abs() - n * (1.0 - WGS84_E2)
        };
        let next = z.atan2(rho * (1.0 - WGS84_E2 * n / (n + height)));
        if (next - lat).abs() < 1e-14 {
            lat = next;
            break;
        }
        lat = next;
    }

    (lat.to_degrees(), lon.to_degrees(), height)
}
