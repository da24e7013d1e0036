//! Output verbosity.

use std::str::FromStr;

/// How much the CLI prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Status lines and spinners.
    #[default]
    Normal,
    /// Final results only, no spinners.
    Quiet,
    /// Nothing except errors.
    Silent,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "quiet" => Ok(Self::Quiet),
            "silent" => Ok(Self::Silent),
            _ => Err(format!("unknown output mode: {}", s)),
        }
    }
}

impl OutputMode {
    pub fn shows_spinners(&self) -> bool {
        matches!(self, Self::Normal)
    }

    pub fn shows_status(&self) -> bool {
        !matches!(self, Self::Silent)
    }
}
