//! Arcade-level vehicle physics.
//!
//! Every function here is pure and total: any numeric input yields a state,
//! nothing panics or errors. One simulation step is [`update_physics`]
//! (speed and RPM) followed by [`update_position`] (heading and
//! coordinates); [`step`] runs both after clamping the elapsed time.

use crate::geo::{meters_per_degree_longitude, METERS_PER_DEGREE_LATITUDE};
use crate::vehicle::{Gear, VehicleState, MAX_STEERING_ANGLE};

#[cfg(test)]
mod tests;

/// km/h per second at full throttle
pub const ACCELERATION: f64 = 5.0;
/// km/h per second at full brake
pub const BRAKE_FORCE: f64 = 15.0;
/// km/h per second of drag with no pedal input
pub const ENGINE_BRAKE: f64 = 2.0;
/// degrees per second at full lock
pub const TURN_RATE: f64 = 45.0;
pub const MAX_RPM: f64 = 8000.0;
pub const IDLE_RPM: f64 = 800.0;
/// RPM span available when revving in neutral
pub const NEUTRAL_REV_RANGE: f64 = 3000.0;
/// Reverse is capped here regardless of the gear table.
pub const REVERSE_SPEED_LIMIT: f64 = 30.0;
/// Clutch position (percent) from which drive is disconnected.
pub const CLUTCH_ENGAGE_THRESHOLD: f64 = 50.0;
/// Below this speed (km/h) the vehicle is treated as stationary.
pub const MIN_MOVING_SPEED: f64 = 0.1;
/// Speed (km/h) above which steering loses authority.
pub const FULL_STEER_SPEED: f64 = 50.0;

/// Largest time step (seconds) a single update may integrate.
pub const MAX_DELTA_TIME: f64 = 0.1;

/// Clamp an elapsed time into `[0, max]`. NaN and negative values become 0.
pub fn clamp_delta_time(dt: f64, max: f64) -> f64 {
    if dt.is_nan() || dt <= 0.0 {
        0.0
    } else {
        dt.min(max)
    }
}

/// Map any angle in degrees into `[0, 360)`.
pub fn normalize_heading(heading: f64) -> f64 {
    let h = heading.rem_euclid(360.0);
    // rem_euclid can round a tiny negative input up to exactly 360
    if h >= 360.0 {
        0.0
    } else {
        h
    }
}

fn speed_ratio(speed: f64, gear: &Gear) -> f64 {
    let max = gear.max_speed();
    if max > 0.0 {
        speed / max
    } else {
        0.0
    }
}

/// Advance speed and RPM by `dt` seconds.
pub fn update_physics(mut state: VehicleState, dt: f64) -> VehicleState {
    if !state.engine_on {
        state.speed = (state.speed - ENGINE_BRAKE * dt).max(0.0);
        state.rpm = 0.0;
        return state;
    }

    let max_speed = state.gear.max_speed();
    let ratio = speed_ratio(state.speed, &state.gear);

    if !state.gear.is_neutral() && state.clutch < CLUTCH_ENGAGE_THRESHOLD {
        let throttle = state.accelerator / 100.0;
        let brake = state.brake / 100.0;

        if throttle > 0.0 && state.speed < max_speed {
            let accel = ACCELERATION * throttle * (1.0 - ratio * 0.5);
            let limit = if state.gear.is_reverse() {
                REVERSE_SPEED_LIMIT
            } else {
                max_speed
            };
            state.speed = (state.speed + accel * dt).min(limit);
        }

        // Braking is not exclusive with throttle; both act in the same step.
        if brake > 0.0 {
            state.speed = (state.speed - BRAKE_FORCE * brake * dt).max(0.0);
        }

        if throttle == 0.0 && brake == 0.0 {
            state.speed = (state.speed - ENGINE_BRAKE * dt).max(0.0);
        }
    } else {
        // neutral or clutch pressed: coasting
        state.speed = (state.speed - ENGINE_BRAKE * 0.5 * dt).max(0.0);
    }

    let throttle = state.accelerator / 100.0;
    state.rpm = if state.clutch > CLUTCH_ENGAGE_THRESHOLD {
        IDLE_RPM + throttle * (MAX_RPM - IDLE_RPM)
    } else if state.gear.is_neutral() {
        IDLE_RPM + throttle * NEUTRAL_REV_RANGE
    } else {
        IDLE_RPM + ratio * (MAX_RPM - IDLE_RPM)
    };

    state
}

/// Advance heading and coordinates by `dt` seconds at the current speed.
pub fn update_position(mut state: VehicleState, dt: f64) -> VehicleState {
    if state.speed < MIN_MOVING_SPEED {
        return state;
    }

    let steering_factor = state.steering_angle / MAX_STEERING_ANGLE;
    let speed_factor = (state.speed / FULL_STEER_SPEED).min(1.0);
    let turn_rate = TURN_RATE * steering_factor * speed_factor;

    let reversing = state.gear.is_reverse();
    if reversing {
        state.heading -= turn_rate * dt;
    } else {
        state.heading += turn_rate * dt;
    }
    state.heading = normalize_heading(state.heading);

    // Heading 0 is north; the map frame is offset by a quarter turn.
    let heading_rad = (state.heading - 90.0).to_radians();
    let speed_ms = state.speed * 1000.0 / 3600.0;
    let distance = speed_ms * dt;

    let mut lat_delta = distance * heading_rad.cos() / METERS_PER_DEGREE_LATITUDE;
    let mut lng_delta = distance * heading_rad.sin() / meters_per_degree_longitude(state.lat);

    if reversing {
        lat_delta = -lat_delta;
        lng_delta = -lng_delta;
    }

    state.lat += lat_delta;
    state.lng += lng_delta;

    state
}

/// Run one full simulation step with `dt` clamped to `max_dt`.
pub fn step(state: VehicleState, dt: f64, max_dt: f64) -> VehicleState {
    let dt = clamp_delta_time(dt, max_dt);
    update_position(update_physics(state, dt), dt)
}
