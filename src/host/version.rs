//! RGSS engine generations

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Engine generation; decides which script container the game ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RgssVersion {
    /// RGSS1 (XP)
    Xp,
    /// RGSS2 (VX)
    Vx,
    /// RGSS3 (VX Ace)
    #[default]
    VxAce,
}

impl RgssVersion {
    /// Numeric generation, 1 to 3.
    pub fn as_u8(&self) -> u8 {
        match self {
            RgssVersion::Xp => 1,
            RgssVersion::Vx => 2,
            RgssVersion::VxAce => 3,
        }
    }

    /// Container path relative to the game root.
    pub fn scripts_file(&self) -> &'static str {
        match self {
            RgssVersion::Xp => "Data/Scripts.rxdata",
            RgssVersion::Vx => "Data/Scripts.rvdata",
            RgssVersion::VxAce => "Data/Scripts.rvdata2",
        }
    }

    /// Container path under `game_dir`.
    pub fn container_path(
        &self,
        game_dir: &Path,
    ) -> PathBuf {
        game_dir.join(self.scripts_file())
    }
}

impl TryFrom<u8> for RgssVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RgssVersion::Xp),
            2 => Ok(RgssVersion::Vx),
            3 => Ok(RgssVersion::VxAce),
            other => Err(format!("unknown RGSS version {} (expected 1, 2 or 3)", other)),
        }
    }
}

impl From<RgssVersion> for u8 {
    fn from(version: RgssVersion) -> Self {
        version.as_u8()
    }
}

impl std::fmt::Display for RgssVersion {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "RGSS{}", self.as_u8())
    }
}
