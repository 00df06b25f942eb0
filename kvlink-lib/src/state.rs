use crate::constants::STATUS_WIDTH;
use crate::registry::DeviceClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumString};

/// What the detector saw on the test station screen this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ScreenState {
    /// Test program is not on screen
    Disappeared,
    /// Front screen is up and waiting for a unit
    Ready,
    Pass,
    Fail,
}

impl ScreenState {
    pub const ALL: [ScreenState; 4] = [
        ScreenState::Disappeared,
        ScreenState::Ready,
        ScreenState::Pass,
        ScreenState::Fail,
    ];

    pub fn to_vector(self) -> StatusVector {
        state_to_vector(self)
    }
}

/// The four PLC status flags written to a device's result register.
///
/// Only obtainable from a [`ScreenState`], so no other bit combination can
/// reach the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusVector {
    front_ready: bool,
    program_on_top: bool,
    pass_flag: bool,
    fail_flag: bool,
}

impl StatusVector {
    pub fn front_ready(&self) -> bool {
        self.front_ready
    }

    pub fn program_on_top(&self) -> bool {
        self.program_on_top
    }

    pub fn pass_flag(&self) -> bool {
        self.pass_flag
    }

    pub fn fail_flag(&self) -> bool {
        self.fail_flag
    }

    pub fn words(&self) -> [u16; STATUS_WIDTH] {
        [
            self.front_ready as u16,
            self.program_on_top as u16,
            self.pass_flag as u16,
            self.fail_flag as u16,
        ]
    }
}

impl fmt::Display for StatusVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.words();
        write!(f, "{a} {b} {c} {d}")
    }
}

impl From<ScreenState> for StatusVector {
    fn from(state: ScreenState) -> Self {
        state_to_vector(state)
    }
}

pub fn state_to_vector(state: ScreenState) -> StatusVector {
    let (front_ready, program_on_top, pass_flag, fail_flag) = match state {
        ScreenState::Disappeared => (false, false, false, false),
        ScreenState::Ready => (true, true, false, false),
        ScreenState::Pass => (false, true, true, false),
        ScreenState::Fail => (false, true, false, true),
    };
    StatusVector {
        front_ready,
        program_on_top,
        pass_flag,
        fail_flag,
    }
}

/// Raw pattern matches from one detector pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorMatches {
    pub fail: bool,
    pub pass: bool,
    pub front: bool,
    /// The expected NFC model screen; only consulted for NFC stations
    pub nfc_model: bool,
}

impl DetectorMatches {
    /// Collapse simultaneous matches into one state.
    ///
    /// Fail wins over Pass, Pass over Ready. An NFC station showing the front
    /// screen without the expected model is a Fail.
    pub fn resolve(&self, class: DeviceClass) -> ScreenState {
        if self.fail {
            ScreenState::Fail
        } else if self.pass {
            ScreenState::Pass
        } else if self.front {
            match class {
                DeviceClass::Nfc if !self.nfc_model => ScreenState::Fail,
                _ => ScreenState::Ready,
            }
        } else {
            ScreenState::Disappeared
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_vector_table() {
        assert_eq!(ScreenState::Disappeared.to_vector().to_string(), "0 0 0 0");
        assert_eq!(ScreenState::Ready.to_vector().to_string(), "1 1 0 0");
        assert_eq!(ScreenState::Pass.to_vector().to_string(), "0 1 1 0");
        assert_eq!(ScreenState::Fail.to_vector().to_string(), "0 1 0 1");
    }

    #[test]
    fn test_mapping_is_injective() {
        let vectors: HashSet<_> = ScreenState::ALL.iter().map(|s| s.to_vector()).collect();
        assert_eq!(vectors.len(), ScreenState::ALL.len());
    }

    #[test]
    fn test_priority() {
        let all = DetectorMatches {
            fail: true,
            pass: true,
            front: true,
            nfc_model: true,
        };
        assert_eq!(all.resolve(DeviceClass::Standard), ScreenState::Fail);

        let pass_and_front = DetectorMatches {
            pass: true,
            front: true,
            ..Default::default()
        };
        assert_eq!(pass_and_front.resolve(DeviceClass::Standard), ScreenState::Pass);

        let front = DetectorMatches {
            front: true,
            ..Default::default()
        };
        assert_eq!(front.resolve(DeviceClass::Standard), ScreenState::Ready);
        assert_eq!(DetectorMatches::default().resolve(DeviceClass::Standard), ScreenState::Disappeared);
    }

    #[test]
    fn test_nfc_requires_model_match() {
        let front = DetectorMatches {
            front: true,
            ..Default::default()
        };
        assert_eq!(front.resolve(DeviceClass::Nfc), ScreenState::Fail);

        let front_with_model = DetectorMatches {
            front: true,
            nfc_model: true,
            ..Default::default()
        };
        assert_eq!(front_with_model.resolve(DeviceClass::Nfc), ScreenState::Ready);

        // Model screen alone does not make a station ready
        let model_only = DetectorMatches {
            nfc_model: true,
            ..Default::default()
        };
        assert_eq!(model_only.resolve(DeviceClass::Nfc), ScreenState::Disappeared);
    }

    #[test]
    fn test_parse_state_names() {
        assert_eq!("READY".parse::<ScreenState>().unwrap(), ScreenState::Ready);
        assert_eq!("disappeared".parse::<ScreenState>().unwrap(), ScreenState::Disappeared);
        assert!("testing".parse::<ScreenState>().is_err());
    }
}
