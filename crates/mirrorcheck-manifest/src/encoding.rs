use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Separator between pairs in the double-pipe encoding.
pub const PAIR_SEPARATOR: &str = "||";

/// How a raw manifest text encodes its `path=checksum` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestEncoding {
    /// One pair per line.
    #[serde(alias = "line")]
    Lines,
    /// Pairs joined by `||`, optionally wrapped in a single leading and trailing `|`.
    #[serde(alias = "double-pipe", alias = "pipe")]
    DoublePipe,
    /// Decide per text with [`ManifestEncoding::detect`].
    Auto,
}

impl ManifestEncoding {
    /// Guess the encoding of `text`: any `||` means double-pipe.
    pub fn detect(text: &str) -> Self {
        if text.contains(PAIR_SEPARATOR) {
            Self::DoublePipe
        } else {
            Self::Lines
        }
    }

    /// Resolve `Auto` against the text; concrete encodings are returned unchanged.
    pub fn resolve(self, text: &str) -> Self {
        match self {
            Self::Auto => Self::detect(text),
            other => other,
        }
    }

    /// Rewrite `text` into line form.
    ///
    /// Double-pipe input has every `||` replaced by a newline, then at most one
    /// leading and one trailing `|` removed. A trailing line terminator (as left
    /// by `cat` or a saved file) does not count as the last character.
    pub fn to_lines(self, text: &str) -> Cow<'_, str> {
        match self.resolve(text) {
            Self::DoublePipe => {
                let text = text.trim_end_matches(['\r', '\n']);
                let replaced = text.replace(PAIR_SEPARATOR, "\n");
                let stripped = replaced.strip_prefix('|').unwrap_or(&replaced);
                let stripped = stripped.strip_suffix('|').unwrap_or(stripped);
                Cow::Owned(stripped.to_owned())
            }
            _ => Cow::Borrowed(text),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lines => "lines",
            Self::DoublePipe => "double_pipe",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for ManifestEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManifestEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lines" | "line" => Ok(Self::Lines),
            "double_pipe" | "double-pipe" | "pipe" => Ok(Self::DoublePipe),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "unknown manifest encoding '{other}', expected lines, double_pipe or auto"
            )),
        }
    }
}
