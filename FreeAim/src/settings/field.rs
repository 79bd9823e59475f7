//!
//! @file field.rs
//! @author Gothic Free Aim Developers
//! @brief Wraps a single field in an INI file, and the value types Gothic stores in them.
//! @bug No known bugs.
//!

use std::fmt;
use std::str::FromStr;

use ini::Ini;

use super::config::IniUnnamedReadable;
use crate::gothic::signals::KEY_EVENTS;

/// Wraps a field which can be loaded from an INI file.
#[derive(Default)]
pub struct IniField<T: Default>(Option<T>);

///
/// A boolean as Gothic writes it.
///
/// The game writes 0 and 1, but hand-edited files often say true or false.
///
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct GothicBool(pub bool);

///
/// The binding of a Gothic key setting.
///
/// Gothic stores up to two bindings of a key as a string of hex bytes, each binding a
/// little-endian u16 code. The first keyboard binding is used, or the first binding if both are
/// mouse buttons.
///
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct KeyBinding(pub u16);

/// Reported when a field holds a value of the wrong form.
#[derive(Debug)]
pub struct BadValue;

impl<T: Copy + Default> IniField<T> {
    /// Gets the configured value for this field, or the type default if it was never read.
    pub fn get(
        &self
    ) -> T {
        self.0.unwrap_or_default()
    }
}

impl<T: Copy + FromStr + fmt::Display + Default> IniUnnamedReadable for IniField<T> {
    type Value = T;
    fn read_ini_unnamed(
        &mut self,
        ini: &Ini,
        section: &str,
        name: &str,
        default: Self::Value
    ) {
        let value = match ini.get_from(Some(section), name) {
            None => default,
            Some(s) => T::from_str(s.trim()).unwrap_or_else(|_| {
                log::warn!("[{}] {}={} is malformed, using {}", section, name, s, default);
                default
            })
        };
        self.0 = Some(value);
    }
}

impl FromStr for GothicBool {
    type Err = BadValue;
    fn from_str(
        s: &str
    ) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Self(true)),
            "0" => Ok(Self(false)),
            s if s.eq_ignore_ascii_case("true") => Ok(Self(true)),
            s if s.eq_ignore_ascii_case("false") => Ok(Self(false)),
            _ => Err(BadValue)
        }
    }
}

impl fmt::Display for GothicBool {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
    ) -> Result<(), fmt::Error> {
        write!(f, "{}", self.0 as u8)
    }
}

impl FromStr for KeyBinding {
    type Err = BadValue;
    fn from_str(
        s: &str
    ) -> Result<Self, Self::Err> {
        let first = parse_code(s.get(0..4).ok_or(BadValue)?)?;
        let second = s.get(4..8).and_then(|h| parse_code(h).ok());

        // Prefer a keyboard binding; the action key is read from the key events.
        let key = [Some(first), second].into_iter().flatten().find(|c| *c < KEY_EVENTS);
        Ok(Self(key.unwrap_or(first)))
    }
}

/// Parses one binding, a little endian u16 in hex.
fn parse_code(
    hex: &str
) -> Result<u16, BadValue> {
    if !hex.is_ascii() {
        return Err(BadValue);
    }
    let lo = u8::from_str_radix(&hex[0..2], 16).map_err(|_| BadValue)?;
    let hi = u8::from_str_radix(&hex[2..4], 16).map_err(|_| BadValue)?;
    Ok(u16::from_le_bytes([lo, hi]))
}

impl fmt::Display for KeyBinding {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
    ) -> Result<(), fmt::Error> {
        let [lo, hi] = self.0.to_le_bytes();
        write!(f, "{:02x}{:02x}", lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_accept_both_spellings() {
        assert_eq!("1".parse::<GothicBool>().unwrap(), GothicBool(true));
        assert_eq!("0".parse::<GothicBool>().unwrap(), GothicBool(false));
        assert_eq!("True".parse::<GothicBool>().unwrap(), GothicBool(true));
        assert_eq!("false".parse::<GothicBool>().unwrap(), GothicBool(false));
        assert!("yes".parse::<GothicBool>().is_err());
    }

    #[test]
    fn key_bindings_prefer_the_keyboard() {
        assert_eq!("1d00".parse::<KeyBinding>().unwrap(), KeyBinding(0x1d));
        assert_eq!("2a000c02".parse::<KeyBinding>().unwrap(), KeyBinding(0x2a));
        assert_eq!("0c02".parse::<KeyBinding>().unwrap(), KeyBinding(0x020c));
        assert_eq!("0c021d00".parse::<KeyBinding>().unwrap(), KeyBinding(0x1d));
        assert_eq!("0c02zz".parse::<KeyBinding>().unwrap(), KeyBinding(0x020c));
        assert!("1".parse::<KeyBinding>().is_err());
        assert_eq!(KeyBinding(0x1d).to_string(), "1d00");
    }

    #[test]
    fn malformed_values_fall_back_to_the_default() {
        let ini = Ini::load_from_str("[GAME]\nmouseSensitivity=fast\n").unwrap();
        let mut field = IniField::<f32>::default();
        field.read_ini_unnamed(&ini, "GAME", "mouseSensitivity", 0.5);
        assert_eq!(field.get(), 0.5);
    }
}
