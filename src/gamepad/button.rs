//! Logical gamepad buttons, using the XUSB (Xbox 360) report bit layout.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Digital buttons of the virtual pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Start,
    Back,
    LeftThumb,
    RightThumb,
    LeftShoulder,
    RightShoulder,
    Guide,
    A,
    B,
    X,
    Y,
}

impl Button {
    /// All buttons, in report bit order.
    pub const ALL: [Button; 15] = [
        Button::DpadUp,
        Button::DpadDown,
        Button::DpadLeft,
        Button::DpadRight,
        Button::Start,
        Button::Back,
        Button::LeftThumb,
        Button::RightThumb,
        Button::LeftShoulder,
        Button::RightShoulder,
        Button::Guide,
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
    ];

    /// Bit of this button in the report's `buttons` word.
    #[must_use]
    pub const fn mask(self) -> u16 {
        match self {
            Button::DpadUp => 0x0001,
            Button::DpadDown => 0x0002,
            Button::DpadLeft => 0x0004,
            Button::DpadRight => 0x0008,
            Button::Start => 0x0010,
            Button::Back => 0x0020,
            Button::LeftThumb => 0x0040,
            Button::RightThumb => 0x0080,
            Button::LeftShoulder => 0x0100,
            Button::RightShoulder => 0x0200,
            Button::Guide => 0x0400,
            Button::A => 0x1000,
            Button::B => 0x2000,
            Button::X => 0x4000,
            Button::Y => 0x8000,
        }
    }

    /// Config / protocol name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Button::DpadUp => "dpad_up",
            Button::DpadDown => "dpad_down",
            Button::DpadLeft => "dpad_left",
            Button::DpadRight => "dpad_right",
            Button::Start => "start",
            Button::Back => "back",
            Button::LeftThumb => "left_thumb",
            Button::RightThumb => "right_thumb",
            Button::LeftShoulder => "left_shoulder",
            Button::RightShoulder => "right_shoulder",
            Button::Guide => "guide",
            Button::A => "a",
            Button::B => "b",
            Button::X => "x",
            Button::Y => "y",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Button {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Button::ALL
            .into_iter()
            .find(|b| b.name() == wanted)
            .ok_or_else(|| format!("unknown button '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_are_distinct_bits() {
        let mut seen = 0u16;
        for button in Button::ALL {
            let mask = button.mask();
            assert_eq!(mask.count_ones(), 1, "{} must be a single bit", button);
            assert_eq!(seen & mask, 0, "{} overlaps another button", button);
            seen |= mask;
        }
    }

    #[test]
    fn test_name_round_trip() {
        for button in Button::ALL {
            assert_eq!(button.name().parse::<Button>().unwrap(), button);
        }
        assert_eq!(" A ".parse::<Button>().unwrap(), Button::A);
        assert!("turbo".parse::<Button>().is_err());
    }

    #[test]
    fn test_deserialize_snake_case() {
        #[derive(Deserialize)]
        struct Holder {
            button: Button,
        }
        let h: Holder = toml::from_str(r#"button = "right_shoulder""#).unwrap();
        assert_eq!(h.button, Button::RightShoulder);
    }
}
