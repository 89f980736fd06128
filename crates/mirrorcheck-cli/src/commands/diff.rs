use super::{exit_code, json_pretty};
use mirrorcheck_manifest::{compare, parse_manifest_file, ChecksumManifest, ManifestEncoding};
use std::path::Path;

fn load(path: &Path, encoding: ManifestEncoding) -> Result<ChecksumManifest, String> {
    parse_manifest_file(path, encoding).map_err(|e| format!("{e} ({})", path.display()))
}

pub fn run(
    left: &Path,
    right: &Path,
    left_encoding: ManifestEncoding,
    right_encoding: ManifestEncoding,
    json: bool,
) -> Result<u8, String> {
    let left_manifest = load(left, left_encoding)?;
    let right_manifest = load(right, right_encoding)?;
    let diff = compare(&left_manifest, &right_manifest);

    if json {
        let out = serde_json::json!({
            "left": left,
            "right": right,
            "equal": diff.is_equal(),
            "diff": diff,
        });
        println!("{}", json_pretty(&out)?);
    } else if diff.is_equal() {
        println!("manifests match ({} entries)", left_manifest.len());
    } else {
        println!(
            "{} divergent paths between {} and {}:",
            diff.len(),
            left.display(),
            right.display()
        );
        for path in &diff.only_left {
            println!("  - {path}");
        }
        for path in &diff.only_right {
            println!("  + {path}");
        }
        for m in &diff.mismatched {
            println!("  ~ {} ({} != {})", m.path, m.left, m.right);
        }
    }
    Ok(exit_code(diff.is_equal()))
}
