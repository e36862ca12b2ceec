//! Room settings - host-owned game configuration

use serde::{Deserialize, Serialize};

use super::player::Role;

/// One entry in the host's role selection list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChoice {
    pub role: Role,
    pub selected: bool,
}

/// Game configuration owned by the host
///
/// Replaced wholesale on every update; the server never merges fields.
/// Durations of zero mean the corresponding phase has no timer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub wolf_count: u32,
    pub day_secs: u32,
    pub night_secs: u32,
    pub roles: Vec<RoleChoice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_roundtrip() {
        let settings = RoomSettings {
            wolf_count: 2,
            day_secs: 120,
            night_secs: 60,
            roles: vec![
                RoleChoice {
                    role: Role::Seer,
                    selected: true,
                },
                RoleChoice {
                    role: Role::Guard,
                    selected: false,
                },
            ],
        };

        let json = serde_json::to_string(&settings).unwrap();
        let back: RoomSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
