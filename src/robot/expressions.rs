//! Expression choreography data
//!
//! Each expression is a sequence of movement steps over head pose (degrees),
//! antennas `[right, left]`, body yaw, and a step duration in seconds.
//! Antennas: 0 = flat, -30 = perked forward, 30 = drooped back.

/// Head orientation in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadPose {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl HeadPose {
    const fn pitch(pitch: f32) -> Self {
        Self {
            roll: 0.0,
            pitch,
            yaw: 0.0,
        }
    }

    const fn yaw(yaw: f32) -> Self {
        Self {
            roll: 0.0,
            pitch: 0.0,
            yaw,
        }
    }

    const fn new(roll: f32, pitch: f32, yaw: f32) -> Self {
        Self { roll, pitch, yaw }
    }
}

/// One step of an expression choreography
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveStep {
    /// Target head pose
    pub head: HeadPose,
    /// Antenna angles `[right, left]`
    pub antennas: [f32; 2],
    /// Body rotation in degrees
    pub body_yaw: f32,
    /// Step duration in seconds
    pub duration: f32,
}

const fn step(head: HeadPose, antennas: [f32; 2], body_yaw: f32, duration: f32) -> MoveStep {
    MoveStep {
        head,
        antennas,
        body_yaw,
        duration,
    }
}

const NEUTRAL: HeadPose = HeadPose::new(0.0, 0.0, 0.0);

const NOD: &[MoveStep] = &[
    step(HeadPose::pitch(-15.0), [-10.0, -10.0], 0.0, 0.3),
    step(HeadPose::pitch(10.0), [-10.0, -10.0], 0.0, 0.3),
    step(HeadPose::pitch(-10.0), [-10.0, -10.0], 0.0, 0.25),
    step(NEUTRAL, [0.0, 0.0], 0.0, 0.3),
];

const SHAKE_HEAD: &[MoveStep] = &[
    step(HeadPose::yaw(-20.0), [0.0, 0.0], 0.0, 0.25),
    step(HeadPose::yaw(20.0), [0.0, 0.0], 0.0, 0.25),
    step(HeadPose::yaw(-15.0), [0.0, 0.0], 0.0, 0.2),
    step(NEUTRAL, [0.0, 0.0], 0.0, 0.25),
];

const TILT_CURIOUS: &[MoveStep] = &[
    step(HeadPose::new(20.0, -5.0, 0.0), [-25.0, -15.0], 0.0, 0.5),
    step(NEUTRAL, [0.0, 0.0], 0.0, 0.5),
];

const WIGGLE_ANTENNA_HAPPY: &[MoveStep] = &[
    step(NEUTRAL, [-30.0, -30.0], 0.0, 0.2),
    step(NEUTRAL, [10.0, 10.0], 0.0, 0.2),
    step(NEUTRAL, [-30.0, -30.0], 0.0, 0.2),
    step(NEUTRAL, [10.0, 10.0], 0.0, 0.2),
    step(NEUTRAL, [0.0, 0.0], 0.0, 0.2),
];

const LOOK_AWAY_SHY: &[MoveStep] = &[
    step(HeadPose::new(-5.0, 10.0, 30.0), [15.0, 15.0], 10.0, 0.6),
    step(HeadPose::new(0.0, 5.0, 15.0), [5.0, 5.0], 5.0, 0.5),
    step(NEUTRAL, [0.0, 0.0], 0.0, 0.5),
];

const SURPRISE: &[MoveStep] = &[
    step(HeadPose::pitch(-15.0), [-30.0, -30.0], 0.0, 0.2),
    step(HeadPose::pitch(-10.0), [-30.0, -30.0], 0.0, 0.5),
    step(NEUTRAL, [0.0, 0.0], 0.0, 0.4),
];

const THINKING: &[MoveStep] = &[
    step(HeadPose::new(10.0, -10.0, 15.0), [-5.0, -20.0], 0.0, 0.5),
    step(HeadPose::new(10.0, -10.0, 15.0), [-5.0, -20.0], 0.0, 1.0),
    step(NEUTRAL, [0.0, 0.0], 0.0, 0.4),
];

const SAD: &[MoveStep] = &[
    step(HeadPose::pitch(20.0), [20.0, 20.0], 0.0, 0.6),
    step(HeadPose::pitch(15.0), [15.0, 15.0], 0.0, 0.8),
    step(NEUTRAL, [0.0, 0.0], 0.0, 0.5),
];

const EXCITED: &[MoveStep] = &[
    step(HeadPose::pitch(-10.0), [-30.0, -30.0], -5.0, 0.2),
    step(HeadPose::pitch(-5.0), [-30.0, -30.0], 5.0, 0.2),
    step(HeadPose::pitch(-10.0), [-30.0, -30.0], -5.0, 0.2),
    step(HeadPose::pitch(-5.0), [-30.0, -30.0], 5.0, 0.2),
    step(NEUTRAL, [0.0, 0.0], 0.0, 0.3),
];

/// All known expression names
pub const EXPRESSION_NAMES: &[&str] = &[
    "nod",
    "shake_head",
    "tilt_curious",
    "wiggle_antenna_happy",
    "look_away_shy",
    "surprise",
    "thinking",
    "sad",
    "excited",
];

/// All known look directions
pub const LOOK_DIRECTIONS: &[&str] = &["left", "right", "up", "down", "center", "user"];

/// Look up an expression choreography by name
#[must_use]
pub fn expression(name: &str) -> Option<&'static [MoveStep]> {
    match name {
        "nod" => Some(NOD),
        "shake_head" => Some(SHAKE_HEAD),
        "tilt_curious" => Some(TILT_CURIOUS),
        "wiggle_antenna_happy" => Some(WIGGLE_ANTENNA_HAPPY),
        "look_away_shy" => Some(LOOK_AWAY_SHY),
        "surprise" => Some(SURPRISE),
        "thinking" => Some(THINKING),
        "sad" => Some(SAD),
        "excited" => Some(EXCITED),
        _ => None,
    }
}

/// Look up a look-at head pose by direction name
#[must_use]
pub fn look_direction(name: &str) -> Option<HeadPose> {
    match name {
        "left" => Some(HeadPose::yaw(30.0)),
        "right" => Some(HeadPose::yaw(-30.0)),
        "up" => Some(HeadPose::pitch(-20.0)),
        "down" => Some(HeadPose::pitch(20.0)),
        "center" => Some(NEUTRAL),
        // Slightly look up at the user
        "user" => Some(HeadPose::pitch(-5.0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_expression_resolves() {
        for name in EXPRESSION_NAMES {
            let steps = expression(name).unwrap_or_else(|| panic!("missing {name}"));
            assert!(!steps.is_empty());
            assert!(steps.iter().all(|s| s.duration > 0.0));
        }
    }

    #[test]
    fn every_listed_direction_resolves() {
        for name in LOOK_DIRECTIONS {
            assert!(look_direction(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn unknown_names_return_none() {
        assert!(expression("backflip").is_none());
        assert!(look_direction("behind").is_none());
    }
}
