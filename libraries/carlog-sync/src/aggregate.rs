//! Aggregate derivation from detail payloads.
//!
//! Pure mapping from wire detail records onto aggregate rows. Extremes come
//! from the embedded time series; the charger classification follows the
//! backend's convention that DC charging reports no positive phase count.

use carlog_client::{ChargeDetail, DriveDetail};
use carlog_core::{compute, CarId, ChargeId, DriveId, GridCell, AGGREGATE_SCHEMA_VERSION};
use carlog_storage::aggregates::{ChargeAggregate, DriveAggregate};

/// Derive a drive aggregate from its detail payload.
///
/// The grid cell is taken from the first position carrying a coordinate;
/// drives with no usable positions get no cell and are skipped by the
/// geocoding pipeline.
pub(crate) fn drive_aggregate_from_detail(
    car_id: CarId,
    drive_id: DriveId,
    detail: &DriveDetail,
    computed_at: i64,
) -> DriveAggregate {
    let positions = &detail.positions;

    let speeds: Vec<i64> = positions.iter().filter_map(|p| p.speed).collect();
    let speed_max = speeds.iter().copied().max().unwrap_or(0);
    let speed_min = speeds.iter().copied().filter(|s| *s > 0).min().unwrap_or(0);

    let powers: Vec<i64> = positions.iter().filter_map(|p| p.power).collect();
    let power_max = powers.iter().copied().max().unwrap_or(0);
    let power_min = powers.iter().copied().min().unwrap_or(0);

    let elevations: Vec<i64> = positions.iter().filter_map(|p| p.elevation).collect();
    let elevation_max = elevations.iter().copied().max().unwrap_or(0);
    let elevation_min = elevations.iter().copied().min().unwrap_or(0);
    let (elevation_gain, elevation_loss) = compute::elevation_change(&elevations);

    let start_coord = positions
        .iter()
        .find_map(|p| p.latitude.zip(p.longitude));
    let cell = start_coord.map(|(lat, lon)| GridCell::from_coords(lat, lon));

    DriveAggregate {
        drive_id,
        car_id,
        schema_version: AGGREGATE_SCHEMA_VERSION,
        computed_at,
        speed_max,
        speed_min,
        power_max,
        power_min,
        elevation_max,
        elevation_min,
        elevation_gain,
        elevation_loss,
        start_elevation: elevations.first().copied(),
        end_elevation: elevations.last().copied(),
        position_count: positions.len() as i64,
        start_latitude: start_coord.map(|(lat, _)| lat),
        start_longitude: start_coord.map(|(_, lon)| lon),
        grid_lat: cell.map(|c| c.lat),
        grid_lon: cell.map(|c| c.lon),
        country_code: None,
        country_name: None,
        region_name: None,
        city: None,
    }
}

/// Derive a charge aggregate from its detail payload.
///
/// The grid cell comes from the summary's charger coordinate, which every
/// charge record carries.
pub(crate) fn charge_aggregate_from_detail(
    car_id: CarId,
    charge_id: ChargeId,
    latitude: f64,
    longitude: f64,
    detail: &ChargeDetail,
    computed_at: i64,
) -> ChargeAggregate {
    let points = &detail.charge_points;

    let phases: Vec<Option<i64>> = points.iter().map(|p| p.charger_phases).collect();
    let cell = GridCell::from_coords(latitude, longitude);

    ChargeAggregate {
        charge_id,
        car_id,
        schema_version: AGGREGATE_SCHEMA_VERSION,
        computed_at,
        is_fast_charger: compute::is_dc_charge(&phases),
        max_charger_power: points.iter().filter_map(|p| p.charger_power).max(),
        max_charger_voltage: points.iter().filter_map(|p| p.charger_voltage).max(),
        max_charger_current: points.iter().filter_map(|p| p.charger_current).max(),
        charger_phases: compute::mode_positive_phases(&phases),
        outside_temp_max: fold_max(points.iter().filter_map(|p| p.outside_temp)),
        outside_temp_min: fold_min(points.iter().filter_map(|p| p.outside_temp)),
        point_count: points.len() as i64,
        grid_lat: cell.lat,
        grid_lon: cell.lon,
        country_code: None,
        country_name: None,
        region_name: None,
        city: None,
    }
}

fn fold_max(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

fn fold_min(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use carlog_client::{ChargePoint, Position};

    fn position(speed: i64, power: i64, elevation: i64) -> Position {
        Position {
            latitude: None,
            longitude: None,
            speed: Some(speed),
            power: Some(power),
            elevation: Some(elevation),
            battery_level: None,
            outside_temp: None,
        }
    }

    #[test]
    fn drive_extremes_come_from_the_series() {
        let mut detail = DriveDetail {
            id: 7,
            positions: vec![position(40, 50, 100), position(90, 120, 160), position(0, -30, 140)],
        };
        detail.positions[0].latitude = Some(45.001);
        detail.positions[0].longitude = Some(9.001);

        let agg = drive_aggregate_from_detail(1, 7, &detail, 1_700_000_000);

        assert_eq!(agg.schema_version, AGGREGATE_SCHEMA_VERSION);
        assert_eq!(agg.speed_max, 90);
        assert_eq!(agg.speed_min, 40); // zero speeds are idle samples
        assert_eq!(agg.power_max, 120);
        assert_eq!(agg.power_min, -30);
        assert_eq!(agg.elevation_max, 160);
        assert_eq!(agg.elevation_min, 100);
        assert_eq!(agg.elevation_gain, 60);
        assert_eq!(agg.elevation_loss, 20);
        assert_eq!(agg.start_elevation, Some(100));
        assert_eq!(agg.end_elevation, Some(140));
        assert_eq!(agg.position_count, 3);
        assert_eq!((agg.grid_lat, agg.grid_lon), (Some(4500), Some(900)));
        assert!(agg.country_code.is_none());
    }

    #[test]
    fn drive_without_positions_has_no_grid_cell() {
        let detail = DriveDetail {
            id: 8,
            positions: vec![],
        };
        let agg = drive_aggregate_from_detail(1, 8, &detail, 0);

        assert_eq!(agg.position_count, 0);
        assert_eq!(agg.speed_max, 0);
        assert!(agg.grid_lat.is_none());
        assert!(agg.start_latitude.is_none());
    }

    fn charge_point(power: i64, phases: Option<i64>) -> ChargePoint {
        ChargePoint {
            charger_power: Some(power),
            charger_voltage: Some(230),
            charger_current: Some(16),
            charger_phases: phases,
            outside_temp: Some(18.5),
            battery_level: None,
        }
    }

    #[test]
    fn dc_charge_has_no_positive_phases() {
        let detail = ChargeDetail {
            id: 3,
            charge_points: vec![charge_point(150, None), charge_point(250, Some(0))],
        };
        let agg = charge_aggregate_from_detail(1, 3, 45.0, 9.0, &detail, 0);

        assert!(agg.is_fast_charger);
        assert_eq!(agg.charger_phases, None);
        assert_eq!(agg.max_charger_power, Some(250));
        assert_eq!((agg.grid_lat, agg.grid_lon), (4500, 900));
    }

    #[test]
    fn ac_charge_keeps_the_dominant_phase_count() {
        let detail = ChargeDetail {
            id: 4,
            charge_points: vec![
                charge_point(11, Some(3)),
                charge_point(11, Some(3)),
                charge_point(7, Some(1)),
            ],
        };
        let agg = charge_aggregate_from_detail(1, 4, 45.0, 9.0, &detail, 0);

        assert!(!agg.is_fast_charger);
        assert_eq!(agg.charger_phases, Some(3));
        assert_eq!(agg.outside_temp_max, Some(18.5));
    }

    #[test]
    fn empty_charge_detail_is_classified_dc() {
        // no points at all means no positive phase count was ever seen
        let detail = ChargeDetail {
            id: 5,
            charge_points: vec![],
        };
        let agg = charge_aggregate_from_detail(1, 5, 45.0, 9.0, &detail, 0);

        assert!(agg.is_fast_charger);
        assert_eq!(agg.max_charger_power, None);
        assert_eq!(agg.point_count, 0);
    }
}
