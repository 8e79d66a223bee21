use serde::Serialize;
use thiserror::Error;

use crate::models::courier::GeoPoint;
use crate::models::drop_point::DropPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeoError {
    #[error("no active drop points")]
    NoActiveDropPoints,
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

/// Rejects latitudes outside [-90, 90], longitudes outside [-180, 180] and
/// non-finite values.
pub fn validate_point(point: &GeoPoint) -> Result<(), GeoError> {
    if !(-90.0..=90.0).contains(&point.lat) {
        return Err(GeoError::InvalidCoordinates(format!(
            "latitude {} is out of range",
            point.lat
        )));
    }
    if !(-180.0..=180.0).contains(&point.lng) {
        return Err(GeoError::InvalidCoordinates(format!(
            "longitude {} is out of range",
            point.lng
        )));
    }
    Ok(())
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedDropPoint {
    pub drop_point: DropPoint,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearestDropPoint {
    pub nearest: RankedDropPoint,
    pub all_sorted: Vec<RankedDropPoint>,
}

/// Ranks the active drop points by distance from `point`. Equal distances
/// keep their input order.
pub fn find_nearest(point: &GeoPoint, drop_points: &[DropPoint]) -> Result<NearestDropPoint, GeoError> {
    let mut ranked: Vec<RankedDropPoint> = drop_points
        .iter()
        .filter(|dp| dp.is_active())
        .map(|dp| RankedDropPoint {
            distance_km: haversine_km(point, &dp.location),
            drop_point: dp.clone(),
        })
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    let nearest = ranked.first().cloned().ok_or(GeoError::NoActiveDropPoints)?;

    Ok(NearestDropPoint {
        nearest,
        all_sorted: ranked,
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeeBreakdown {
    pub distance_km: f64,
    pub radius_max_km: f64,
    pub excess_km: u32,
    pub charge_per_km: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeeQuote {
    pub fee: i64,
    pub is_inside_radius: bool,
    pub breakdown: FeeBreakdown,
}

/// Distance-tiered delivery fee. Any started km beyond the free radius is
/// billed as a whole km.
pub fn compute_fee(distance_km: f64, radius_max_km: f64, charge_outside_radius: i64) -> FeeQuote {
    if distance_km <= radius_max_km {
        return FeeQuote {
            fee: 0,
            is_inside_radius: true,
            breakdown: FeeBreakdown {
                distance_km,
                radius_max_km,
                excess_km: 0,
                charge_per_km: charge_outside_radius,
            },
        };
    }

    let excess_km = (distance_km - radius_max_km).ceil() as u32;

    FeeQuote {
        fee: i64::from(excess_km).saturating_mul(charge_outside_radius),
        is_inside_radius: false,
        breakdown: FeeBreakdown {
            distance_km,
            radius_max_km,
            excess_km,
            charge_per_km: charge_outside_radius,
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{GeoError, compute_fee, find_nearest, haversine_km, validate_point};
    use crate::models::courier::GeoPoint;
    use crate::models::drop_point::{DropPoint, DropPointStatus};

    fn drop_point(id_seed: u128, lat: f64, lng: f64, status: DropPointStatus) -> DropPoint {
        DropPoint {
            id: Uuid::from_u128(id_seed),
            name: format!("dp-{id_seed}"),
            address: "somewhere".to_string(),
            location: GeoPoint { lat, lng },
            capacity: 50,
            current_load: 0,
            radius_max_km: 5.0,
            charge_outside_radius: 2000,
            status,
            admin_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: -6.2088,
            lng: 106.8456,
        };
        let distance = haversine_km(&p, &p);
        assert_eq!(distance, 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint {
            lat: -6.2088,
            lng: 106.8456,
        };
        let b = GeoPoint {
            lat: -6.9175,
            lng: 107.6191,
        };
        assert_eq!(haversine_km(&a, &b), haversine_km(&b, &a));
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint {
            lat: 51.5074,
            lng: -0.1278,
        };
        let paris = GeoPoint {
            lat: 48.8566,
            lng: 2.3522,
        };
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn inside_radius_is_free() {
        let quote = compute_fee(4.9, 5.0, 2000);
        assert_eq!(quote.fee, 0);
        assert!(quote.is_inside_radius);
        assert_eq!(quote.breakdown.excess_km, 0);
    }

    #[test]
    fn exactly_on_radius_is_free() {
        let quote = compute_fee(5.0, 5.0, 2000);
        assert_eq!(quote.fee, 0);
        assert!(quote.is_inside_radius);
    }

    #[test]
    fn partial_km_beyond_radius_bills_a_whole_km() {
        let quote = compute_fee(5.1, 5.0, 2000);
        assert_eq!(quote.breakdown.excess_km, 1);
        assert_eq!(quote.fee, 2000);
        assert!(!quote.is_inside_radius);
    }

    #[test]
    fn whole_km_beyond_radius_is_not_rounded_further() {
        let quote = compute_fee(7.0, 5.0, 2000);
        assert_eq!(quote.breakdown.excess_km, 2);
        assert_eq!(quote.fee, 4000);
    }

    #[test]
    fn huge_charge_saturates_instead_of_wrapping() {
        let quote = compute_fee(20_000.0, 5.0, i64::MAX / 2);
        assert_eq!(quote.fee, i64::MAX);
    }

    #[test]
    fn coordinates_must_be_on_the_globe() {
        assert!(validate_point(&GeoPoint { lat: 90.0, lng: -180.0 }).is_ok());
        assert!(validate_point(&GeoPoint { lat: -6.2, lng: 106.8 }).is_ok());

        for (lat, lng) in [(400.0, 0.0), (-90.5, 0.0), (0.0, 181.0), (f64::NAN, 0.0), (0.0, f64::INFINITY)] {
            assert!(
                matches!(
                    validate_point(&GeoPoint { lat, lng }),
                    Err(GeoError::InvalidCoordinates(_))
                ),
                "({lat}, {lng}) should be rejected"
            );
        }
    }

    #[test]
    fn fee_is_deterministic() {
        assert_eq!(compute_fee(12.34, 5.0, 1500), compute_fee(12.34, 5.0, 1500));
    }

    #[test]
    fn nearest_skips_inactive_drop_points() {
        let origin = GeoPoint {
            lat: -6.2000,
            lng: 106.8000,
        };
        let points = vec![
            drop_point(1, -6.2001, 106.8001, DropPointStatus::Inactive),
            drop_point(2, -6.2500, 106.8500, DropPointStatus::Active),
            drop_point(3, -6.2100, 106.8100, DropPointStatus::Active),
        ];

        let result = find_nearest(&origin, &points).unwrap();

        assert_eq!(result.nearest.drop_point.id, Uuid::from_u128(3));
        assert_eq!(result.all_sorted.len(), 2);
        assert!(result.all_sorted[0].distance_km <= result.all_sorted[1].distance_km);
    }

    #[test]
    fn equal_distances_keep_input_order() {
        let origin = GeoPoint {
            lat: 0.0,
            lng: 0.0,
        };
        let points = vec![
            drop_point(7, 0.0, 0.1, DropPointStatus::Active),
            drop_point(4, 0.0, 0.1, DropPointStatus::Active),
        ];

        let result = find_nearest(&origin, &points).unwrap();

        assert_eq!(result.all_sorted[0].drop_point.id, Uuid::from_u128(7));
        assert_eq!(result.all_sorted[1].drop_point.id, Uuid::from_u128(4));
    }

    #[test]
    fn no_active_drop_points_is_an_error() {
        let origin = GeoPoint {
            lat: 0.0,
            lng: 0.0,
        };
        let points = vec![drop_point(1, 0.0, 0.1, DropPointStatus::Inactive)];

        let err = find_nearest(&origin, &points).unwrap_err();
        assert_eq!(err, GeoError::NoActiveDropPoints);
        assert_eq!(find_nearest(&origin, &[]).unwrap_err(), GeoError::NoActiveDropPoints);
    }
}
