//! Checksum manifest parsing, normalization, and comparison for mirrorcheck.
//!
//! A manifest lists relative file paths with their SHA-256 digests. The two
//! synchronized systems publish it in different encodings (`path=sum` per line,
//! or pairs joined by `||`). This crate decodes either form into a canonical
//! [`ChecksumManifest`] and diffs two of them ([`compare`]).

pub mod diff;
pub mod encoding;
pub mod manifest;

pub use diff::{compare, ChecksumMismatch, ManifestDiff};
pub use encoding::ManifestEncoding;
pub use manifest::{
    parse_manifest, parse_manifest_detailed, parse_manifest_file, ChecksumManifest, ManifestError,
    ParsedManifest,
};
