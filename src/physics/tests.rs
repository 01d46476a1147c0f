use super::*;
use crate::geo::METERS_PER_DEGREE_LATITUDE;
use crate::vehicle::{Gear, VehicleState};

const EPS: f64 = 1e-9;

fn running_in(gear: Gear) -> VehicleState {
    VehicleState {
        gear,
        engine_on: true,
        ..VehicleState::at(12.9716, 77.5946)
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPS,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_engine_off_decays_speed_and_kills_rpm() {
    for (speed, dt, expected) in [(10.0, 0.5, 9.0), (0.3, 1.0, 0.0), (0.0, 0.1, 0.0), (120.0, 0.1, 119.8)] {
        let state = VehicleState {
            speed,
            rpm: 3000.0,
            gear: Gear::Third,
            accelerator: 100.0,
            ..VehicleState::default()
        };
        let next = update_physics(state, dt);
        assert_close(next.speed, expected);
        assert_eq!(next.rpm, 0.0);
    }
}

#[test]
fn test_first_gear_full_throttle_from_rest() {
    let state = VehicleState {
        accelerator: 100.0,
        ..running_in(Gear::First)
    };
    let next = update_physics(state, 1.0);
    assert_close(next.speed, 5.0);
    assert_close(next.rpm, 800.0);
}

#[test]
fn test_acceleration_tapers_toward_gear_ceiling() {
    let state = VehicleState {
        speed: 40.0,
        accelerator: 100.0,
        ..running_in(Gear::Second)
    };
    let next = update_physics(state, 1.0);
    // 5 * (1 - 0.5 * 0.5)
    assert_close(next.speed, 43.75);
    assert_close(next.rpm, 800.0 + 0.5 * 7200.0);
}

#[test]
fn test_forward_gear_never_exceeds_its_ceiling() {
    let state = VehicleState {
        speed: 39.9,
        accelerator: 100.0,
        ..running_in(Gear::First)
    };
    let next = update_physics(state, 1.0);
    assert_eq!(next.speed, 40.0);

    // already at the ceiling: throttle has no effect
    let held = update_physics(next, 1.0);
    assert_eq!(held.speed, 40.0);
    assert_close(held.rpm, MAX_RPM);
}

#[test]
fn test_neutral_coasts_at_half_engine_brake() {
    let state = VehicleState {
        speed: 20.0,
        accelerator: 50.0,
        ..running_in(Gear::Neutral)
    };
    let next = update_physics(state, 1.0);
    assert_close(next.speed, 19.0);
    // speed ratio is zero in neutral, revs follow the pedal
    assert_close(next.rpm, 800.0 + 0.5 * 3000.0);
}

#[test]
fn test_clutch_pressed_coasts_and_revs_freely() {
    let state = VehicleState {
        speed: 40.0,
        clutch: 80.0,
        accelerator: 100.0,
        ..running_in(Gear::Second)
    };
    let next = update_physics(state, 1.0);
    assert_close(next.speed, 39.0);
    assert_close(next.rpm, 8000.0);
}

#[test]
fn test_clutch_at_threshold_disconnects_drive_but_revs_follow_wheels() {
    let state = VehicleState {
        speed: 40.0,
        clutch: 50.0,
        accelerator: 100.0,
        ..running_in(Gear::Second)
    };
    let next = update_physics(state, 1.0);
    assert_close(next.speed, 39.0);
    assert_close(next.rpm, 800.0 + 0.5 * 7200.0);
}

#[test]
fn test_engine_brake_in_gear_without_pedals() {
    let state = VehicleState {
        speed: 40.0,
        ..running_in(Gear::Second)
    };
    let next = update_physics(state, 1.0);
    assert_close(next.speed, 38.0);
    // rpm uses the ratio from before the speed change
    assert_close(next.rpm, 800.0 + 0.5 * 7200.0);
}

#[test]
fn test_brake_and_throttle_both_apply() {
    let state = VehicleState {
        speed: 40.0,
        accelerator: 100.0,
        brake: 100.0,
        ..running_in(Gear::Second)
    };
    let next = update_physics(state, 0.1);
    // +3.75 * 0.1 then -15 * 0.1
    assert_close(next.speed, 40.0 + 0.375 - 1.5);
}

#[test]
fn test_brake_never_goes_negative() {
    let state = VehicleState {
        speed: 1.0,
        brake: 100.0,
        ..running_in(Gear::Third)
    };
    let next = update_physics(state, 1.0);
    assert_eq!(next.speed, 0.0);
}

#[test]
fn test_reverse_is_capped_at_thirty() {
    let state = VehicleState {
        speed: 29.9,
        accelerator: 100.0,
        ..running_in(Gear::Reverse)
    };
    assert_eq!(update_physics(state, 1.0).speed, 30.0);

    let mut state = VehicleState {
        accelerator: 100.0,
        ..running_in(Gear::Reverse)
    };
    for _ in 0..200 {
        state = update_physics(state, 0.1);
        assert!(state.speed <= REVERSE_SPEED_LIMIT);
    }
    assert!(state.speed > 29.0);
}

#[test]
fn test_unrecognized_gear_cannot_accelerate() {
    let state = VehicleState {
        accelerator: 100.0,
        ..running_in(Gear::parse("7"))
    };
    let next = update_physics(state, 1.0);
    assert_eq!(next.speed, 0.0);
    assert_close(next.rpm, IDLE_RPM);

    let rolling = VehicleState {
        speed: 10.0,
        ..running_in(Gear::parse("7"))
    };
    assert_close(update_physics(rolling, 1.0).speed, 8.0);
}

#[test]
fn test_constant_rate_branches_are_linear_in_dt() {
    let cases = [
        // braking in third
        VehicleState {
            speed: 30.0,
            brake: 100.0,
            ..running_in(Gear::Third)
        },
        // engine braking in fourth
        VehicleState {
            speed: 30.0,
            ..running_in(Gear::Fourth)
        },
        // coasting in neutral
        VehicleState {
            speed: 30.0,
            ..running_in(Gear::Neutral)
        },
        // engine off
        VehicleState {
            speed: 30.0,
            ..VehicleState::default()
        },
    ];

    for state in cases {
        let single = update_physics(state.clone(), 1.0);
        let mut stepped = state;
        for _ in 0..10 {
            stepped = update_physics(stepped, 0.1);
        }
        assert!((single.speed - stepped.speed).abs() < 1e-9);
    }
}

#[test]
fn test_small_steps_track_single_step_acceleration() {
    let state = VehicleState {
        accelerator: 100.0,
        ..running_in(Gear::First)
    };
    let single = update_physics(state.clone(), 1.0);

    let mut stepped = state;
    for _ in 0..10 {
        stepped = update_physics(stepped, 0.1);
    }

    // The taper uses the speed before each step, so small steps lag slightly.
    assert!(stepped.speed < single.speed);
    assert!((single.speed - stepped.speed).abs() < 0.2);
}

#[test]
fn test_stationary_vehicle_does_not_move() {
    let state = VehicleState {
        speed: 0.05,
        heading: 123.0,
        steering_angle: 540.0,
        ..running_in(Gear::First)
    };
    assert_eq!(update_position(state.clone(), 0.1), state);
}

#[test]
fn test_heading_stays_normalized() {
    for heading in [-720.0, -0.0001, 0.0, 180.0, 359.9999, 720.5] {
        for steering in [-540.0, -100.0, 0.0, 540.0] {
            for dt in [0.1, 1.0, 100.0] {
                for gear in [Gear::Second, Gear::Reverse] {
                    let state = VehicleState {
                        speed: 60.0,
                        heading,
                        steering_angle: steering,
                        ..running_in(gear)
                    };
                    let next = update_position(state, dt);
                    assert!(
                        (0.0..360.0).contains(&next.heading),
                        "heading {} out of range",
                        next.heading
                    );
                }
            }
        }
    }
}

#[test]
fn test_steering_turns_heading() {
    let state = VehicleState {
        speed: 100.0,
        steering_angle: 270.0,
        ..running_in(Gear::Third)
    };
    assert_close(update_position(state.clone(), 0.1).heading, 2.25);

    let reversing = VehicleState {
        gear: Gear::Reverse,
        ..state
    };
    assert_close(update_position(reversing, 0.1).heading, 357.75);
}

#[test]
fn test_turn_authority_scales_below_fifty() {
    let state = VehicleState {
        speed: 25.0,
        steering_angle: 540.0,
        ..running_in(Gear::Second)
    };
    // 45 * 1.0 * 0.5 deg/s
    assert_close(update_position(state, 1.0).heading, 22.5);
}

#[test]
fn test_heading_ninety_moves_along_latitude_axis() {
    let state = VehicleState {
        speed: 36.0,
        heading: 90.0,
        ..running_in(Gear::Second)
    };
    let next = update_position(state.clone(), 0.1);
    // 10 m/s for 0.1 s
    assert_close(next.lat - state.lat, 1.0 / METERS_PER_DEGREE_LATITUDE);
    assert_eq!(next.lng, state.lng);
}

#[test]
fn test_reverse_moves_opposite_to_forward() {
    let forward = VehicleState {
        speed: 20.0,
        heading: 45.0,
        ..running_in(Gear::First)
    };
    let backward = VehicleState {
        gear: Gear::Reverse,
        ..forward.clone()
    };

    let f = update_position(forward.clone(), 0.1);
    let r = update_position(backward, 0.1);

    let (f_lat, f_lng) = (f.lat - forward.lat, f.lng - forward.lng);
    let (r_lat, r_lng) = (r.lat - forward.lat, r.lng - forward.lng);
    assert!(f_lat.abs() > 0.0 && f_lng.abs() > 0.0);
    assert!((r_lat + f_lat).abs() < 1e-12);
    assert!((r_lng + f_lng).abs() < 1e-12);
}

#[test]
fn test_normalize_heading() {
    assert_eq!(normalize_heading(0.0), 0.0);
    assert_eq!(normalize_heading(360.0), 0.0);
    assert_eq!(normalize_heading(-90.0), 270.0);
    assert_eq!(normalize_heading(725.0), 5.0);
    assert_eq!(normalize_heading(-1e-20), 0.0);
}

#[test]
fn test_clamp_delta_time() {
    assert_eq!(clamp_delta_time(0.05, MAX_DELTA_TIME), 0.05);
    assert_eq!(clamp_delta_time(3.0, MAX_DELTA_TIME), MAX_DELTA_TIME);
    assert_eq!(clamp_delta_time(-1.0, MAX_DELTA_TIME), 0.0);
    assert_eq!(clamp_delta_time(f64::NAN, MAX_DELTA_TIME), 0.0);
    assert_eq!(clamp_delta_time(f64::INFINITY, MAX_DELTA_TIME), MAX_DELTA_TIME);
}

#[test]
fn test_step_clamps_large_gaps() {
    let state = VehicleState {
        accelerator: 100.0,
        ..running_in(Gear::First)
    };
    let next = step(state, 5.0, MAX_DELTA_TIME);
    assert_close(next.speed, 0.5);
}

#[test]
fn test_extreme_inputs_do_not_panic() {
    let state = VehicleState {
        speed: 1e9,
        heading: -1e12,
        steering_angle: 1e6,
        accelerator: 1e6,
        brake: -50.0,
        lat: 89.9999,
        ..running_in(Gear::Fifth)
    };
    let next = step(state, 0.1, MAX_DELTA_TIME);
    assert!((0.0..360.0).contains(&next.heading));
    assert!(next.speed >= 0.0);
}
