// ebook-drm-check - DRM detection for eBook libraries
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Container format sniffing
//!
//! Extensions are unreliable (renamed or truncated downloads), so the
//! extension only picks which magic check runs. The magic check decides.
//!
//! | Extension              | Confirmation                                 |
//! |------------------------|----------------------------------------------|
//! | `.epub`                | ZIP signature at offset 0                    |
//! | `.mobi` `.azw3` `.azw` | PalmDB type/creator at offset 60             |

pub mod header;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

pub use header::{ExthRecords, MobiHeaderInfo};

/// Type/creator of a Mobipocket book
pub const BOOKMOBI: &[u8; 8] = b"BOOKMOBI";
/// Type/creator of a Topaz (KF8) container
pub const TPZ3: &[u8; 8] = b"TPZ3TPZ3";
/// Type prefix shared by other Kindle variants
pub const BOOK: &[u8; 4] = b"BOOK";

/// Extensions the sniffer knows how to confirm
pub const SUPPORTED_EXTENSIONS: &[&str] = &["epub", "mobi", "azw3", "azw"];

/// Sniffed eBook container kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Epub,
    Mobi,
    Azw3,
    Azw,
    Unknown,
}

impl ContainerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epub => "epub",
            Self::Mobi => "mobi",
            Self::Azw3 => "azw3",
            Self::Azw => "azw",
            Self::Unknown => "unknown",
        }
    }

    /// MOBI and its Kindle descendants share the PalmDB layout
    pub fn is_palmdoc(&self) -> bool {
        matches!(self, Self::Mobi | Self::Azw3 | Self::Azw)
    }

    /// Classify a PalmDB type/creator field
    pub fn from_type_creator(field: &[u8; 8]) -> Self {
        if field == BOOKMOBI {
            Self::Mobi
        } else if field == TPZ3 {
            Self::Azw3
        } else if &field[..4] == BOOK {
            Self::Azw
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cased extension without the dot
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Determine the container format of a file
///
/// Never fails: unreadable files and unknown extensions are
/// [`ContainerFormat::Unknown`].
pub async fn detect_format(path: &Path) -> ContainerFormat {
    let format = match extension_of(path).as_deref() {
        Some("epub") => {
            if header::is_valid_zip(path).await {
                ContainerFormat::Epub
            } else {
                ContainerFormat::Unknown
            }
        }
        Some("mobi" | "azw3" | "azw") => match header::read_type_creator(path).await {
            Ok(Some(field)) => ContainerFormat::from_type_creator(&field),
            Ok(None) => ContainerFormat::Unknown,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "PalmDB probe failed");
                ContainerFormat::Unknown
            }
        },
        _ => ContainerFormat::Unknown,
    };

    debug!(path = %path.display(), format = %format, "sniffed container format");
    format
}
