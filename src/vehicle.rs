use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geo::Coordinate;

pub const DEFAULT_LATITUDE: f64 = 12.9716;
pub const DEFAULT_LONGITUDE: f64 = 77.5946;

pub const MAX_STEERING_ANGLE: f64 = 540.0;

/// Transmission position. Anything a client sends outside the fixed set of
/// strings, JSON numbers included, is kept as `Unrecognized` and behaves like
/// a gear with no top speed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Gear {
    #[default]
    Neutral,
    Reverse,
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Unrecognized(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GearRepr {
    Text(String),
    Number(i64),
}

impl Gear {
    pub fn parse(value: &str) -> Self {
        match value {
            "N" => Gear::Neutral,
            "R" => Gear::Reverse,
            "1" => Gear::First,
            "2" => Gear::Second,
            "3" => Gear::Third,
            "4" => Gear::Fourth,
            "5" => Gear::Fifth,
            other => Gear::Unrecognized(other.to_string()),
        }
    }

    /// Top speed in km/h the gearbox allows in this gear.
    pub fn max_speed(&self) -> f64 {
        match self {
            Gear::Neutral => 0.0,
            Gear::Reverse => 30.0,
            Gear::First => 40.0,
            Gear::Second => 80.0,
            Gear::Third => 120.0,
            Gear::Fourth => 160.0,
            Gear::Fifth => 200.0,
            Gear::Unrecognized(_) => 0.0,
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, Gear::Neutral)
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self, Gear::Reverse)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Gear::Neutral => "N",
            Gear::Reverse => "R",
            Gear::First => "1",
            Gear::Second => "2",
            Gear::Third => "3",
            Gear::Fourth => "4",
            Gear::Fifth => "5",
            Gear::Unrecognized(raw) => raw,
        }
    }
}

impl Serialize for Gear {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Gear {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match GearRepr::deserialize(deserializer)? {
            GearRepr::Text(text) => Gear::parse(&text),
            GearRepr::Number(n) => Gear::Unrecognized(n.to_string()),
        })
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleState {
    pub lat: f64,
    pub lng: f64,
    /// Degrees clockwise from north, kept in [0, 360).
    pub heading: f64,
    /// km/h
    pub speed: f64,
    pub rpm: f64,
    pub gear: Gear,
    pub engine_on: bool,
    /// Steering wheel angle in degrees, -540..=540.
    pub steering_angle: f64,
    // Pedal positions in percent
    pub clutch: f64,
    pub brake: f64,
    pub accelerator: f64,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::at(DEFAULT_LATITUDE, DEFAULT_LONGITUDE)
    }
}

impl VehicleState {
    /// A parked vehicle with the engine off at the given coordinates.
    pub fn at(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            heading: 0.0,
            speed: 0.0,
            rpm: 0.0,
            gear: Gear::Neutral,
            engine_on: false,
            steering_angle: 0.0,
            clutch: 0.0,
            brake: 0.0,
            accelerator: 0.0,
        }
    }

    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionUpdate {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Control inputs sent by the driving client. Every field is optional and
/// only the ones present overwrite the stored state.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlUpdate {
    #[serde(alias = "session_id")]
    pub session_id: Option<String>,
    pub position: Option<PositionUpdate>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub gear: Option<Gear>,
    pub engine_on: Option<bool>,
    pub steering_angle: Option<f64>,
    pub clutch: Option<f64>,
    pub brake: Option<f64>,
    pub accelerator: Option<f64>,
}

impl ControlUpdate {
    pub fn apply(&self, state: &mut VehicleState) {
        if let Some(position) = &self.position {
            state.lat = position.lat.unwrap_or(state.lat);
            state.lng = position.lng.unwrap_or(state.lng);
        }
        if let Some(heading) = self.heading {
            state.heading = crate::physics::normalize_heading(heading);
        }
        if let Some(speed) = self.speed {
            state.speed = speed.max(0.0);
        }
        if let Some(gear) = &self.gear {
            state.gear = gear.clone();
        }
        if let Some(engine_on) = self.engine_on {
            state.engine_on = engine_on;
        }
        if let Some(angle) = self.steering_angle {
            state.steering_angle = angle.clamp(-MAX_STEERING_ANGLE, MAX_STEERING_ANGLE);
        }
        if let Some(clutch) = self.clutch {
            state.clutch = percent(clutch);
        }
        if let Some(brake) = self.brake {
            state.brake = percent(brake);
        }
        if let Some(accelerator) = self.accelerator {
            state.accelerator = percent(accelerator);
        }
    }
}

fn percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}
