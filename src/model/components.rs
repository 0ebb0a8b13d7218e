use crate::error::BivError;
use std::fmt;
use std::str::FromStr;

/// Anatomical surface regions of the biventricular template.
///
/// The discriminants follow the sorted order of the labels in the model asset,
/// with `ThruWall` appended for the septum/epicardium closure faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    AortaValve = 0,
    AortaValveCut = 1,
    LvEndocardial = 2,
    LvEpicardial = 3,
    MitralValve = 4,
    MitralValveCut = 5,
    PulmonaryValve = 6,
    PulmonaryValveCut = 7,
    RvEpicardial = 8,
    RvFreewall = 9,
    RvSeptum = 10,
    TricuspidValve = 11,
    TricuspidValveCut = 12,
    ThruWall = 13,
}

impl Component {
    pub const ALL: [Component; 14] = [
        Component::AortaValve,
        Component::AortaValveCut,
        Component::LvEndocardial,
        Component::LvEpicardial,
        Component::MitralValve,
        Component::MitralValveCut,
        Component::PulmonaryValve,
        Component::PulmonaryValveCut,
        Component::RvEpicardial,
        Component::RvFreewall,
        Component::RvSeptum,
        Component::TricuspidValve,
        Component::TricuspidValveCut,
        Component::ThruWall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::AortaValve => "AORTA_VALVE",
            Component::AortaValveCut => "AORTA_VALVE_CUT",
            Component::LvEndocardial => "LV_ENDOCARDIAL",
            Component::LvEpicardial => "LV_EPICARDIAL",
            Component::MitralValve => "MITRAL_VALVE",
            Component::MitralValveCut => "MITRAL_VALVE_CUT",
            Component::PulmonaryValve => "PULMONARY_VALVE",
            Component::PulmonaryValveCut => "PULMONARY_VALVE_CUT",
            Component::RvEpicardial => "RV_EPICARDIAL",
            Component::RvFreewall => "RV_FREEWALL",
            Component::RvSeptum => "RV_SEPTUM",
            Component::TricuspidValve => "TRICUSPID_VALVE",
            Component::TricuspidValveCut => "TRICUSPID_VALVE_CUT",
            Component::ThruWall => "THRU_WALL",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Component {
    type Err = BivError;

    /// Labels are matched case-insensitively; spaces and dashes count as underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_uppercase().replace([' ', '-'], "_");
        Component::ALL
            .iter()
            .find(|c| c.as_str() == normalised)
            .copied()
            .ok_or_else(|| BivError::UnknownComponent {
                label: s.to_string(),
            })
    }
}
