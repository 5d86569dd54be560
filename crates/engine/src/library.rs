use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Python compositing library the generated code targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditingLibrary {
    #[default]
    MoviePy,
    Movis,
}

impl EditingLibrary {
    pub const ALL: [EditingLibrary; 2] = [EditingLibrary::MoviePy, EditingLibrary::Movis];

    pub fn as_str(&self) -> &'static str {
        match self {
            EditingLibrary::MoviePy => "MoviePy",
            EditingLibrary::Movis => "Movis",
        }
    }
}

impl fmt::Display for EditingLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditingLibrary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EditingLibrary::ALL
            .into_iter()
            .find(|lib| lib.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unsupported library choice: {}", s))
    }
}
