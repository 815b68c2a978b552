//! Palettes serialize as a base64 string of RGB bytes so they stay compact in TOML and other
//! text-based config formats.

use crate::NesPalette;
use base64::Engine;
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const BASE64_ENGINE: base64::engine::GeneralPurpose =
    base64::engine::general_purpose::STANDARD_NO_PAD;

impl Serialize for NesPalette {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64_ENGINE.encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for NesPalette {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = BASE64_ENGINE.decode(encoded.as_bytes()).map_err(D::Error::custom)?;
        NesPalette::from_bytes(&bytes).map_err(D::Error::custom)
    }
}
