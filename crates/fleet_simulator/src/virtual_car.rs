use fleet_proto::fleet::v1::CarStatus;
use rand::Rng;

/// Manhattan, roughly
pub const LAT_MIN: f64 = 40.700;
pub const LAT_MAX: f64 = 40.850;
pub const LON_MIN: f64 = -74.020;
pub const LON_MAX: f64 = -73.930;

const STEP_DEGREES: f64 = 0.001;
const MAX_VELOCITY: f64 = 60.0;

/// A simulated car random-walking inside the bounding box
#[derive(Debug, Clone)]
pub struct VirtualCar {
    pub car_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub battery_level: f64,
    pub velocity: f64,
}

impl VirtualCar {
    pub fn spawn<R: Rng>(car_id: String, rng: &mut R) -> Self {
        Self {
            car_id,
            latitude: rng.gen_range(LAT_MIN..=LAT_MAX),
            longitude: rng.gen_range(LON_MIN..=LON_MAX),
            battery_level: rng.gen_range(20.0..=100.0),
            velocity: rng.gen_range(0.0..=MAX_VELOCITY),
        }
    }

    /// Advance one tick: move up to ~100 m, drain battery, resample speed
    pub fn step<R: Rng>(&mut self, rng: &mut R) {
        self.latitude = (self.latitude + STEP_DEGREES * rng.gen_range(-1.0..=1.0))
            .clamp(LAT_MIN, LAT_MAX);
        self.longitude = (self.longitude + STEP_DEGREES * rng.gen_range(-1.0..=1.0))
            .clamp(LON_MIN, LON_MAX);
        self.battery_level = (self.battery_level - rng.gen_range(0.1..=0.5)).max(0.0);
        self.velocity = rng.gen_range(0.0..=MAX_VELOCITY);
    }

    pub fn to_status(&self, timestamp_ms: i64) -> CarStatus {
        CarStatus {
            car_id: self.car_id.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            battery_level: self.battery_level,
            velocity: self.velocity,
            timestamp: timestamp_ms,
        }
    }
}

pub fn car_id(index: usize) -> String {
    format!("CAR-{:03}", index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_car_ids_are_zero_padded() {
        assert_eq!(car_id(1), "CAR-001");
        assert_eq!(car_id(42), "CAR-042");
    }

    #[test]
    fn test_walk_stays_in_bounds_and_battery_drains() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut car = VirtualCar::spawn(car_id(1), &mut rng);
        let start_battery = car.battery_level;

        for _ in 0..2_000 {
            let before = car.battery_level;
            car.step(&mut rng);

            assert!((LAT_MIN..=LAT_MAX).contains(&car.latitude));
            assert!((LON_MIN..=LON_MAX).contains(&car.longitude));
            assert!((0.0..=MAX_VELOCITY).contains(&car.velocity));
            assert!(car.battery_level <= before);
            assert!(car.battery_level >= 0.0);
        }

        assert!(car.battery_level < start_battery);
        // 2000 ticks drain at least 200 points, so the floor is reached
        assert_eq!(car.battery_level, 0.0);
    }

    #[test]
    fn test_status_mirrors_car() {
        let mut rng = StdRng::seed_from_u64(1);
        let car = VirtualCar::spawn(car_id(3), &mut rng);
        let status = car.to_status(1_701_532_800_000);

        assert_eq!(status.car_id, "CAR-003");
        assert_eq!(status.latitude, car.latitude);
        assert_eq!(status.battery_level, car.battery_level);
        assert_eq!(status.timestamp, 1_701_532_800_000);
    }
}
