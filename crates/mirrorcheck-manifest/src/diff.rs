use crate::manifest::ChecksumManifest;
use serde::Serialize;

/// A path present on both sides with different checksums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksumMismatch {
    pub path: String,
    pub left: String,
    pub right: String,
}

/// Divergence between two manifests. Empty means the manifests are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestDiff {
    pub only_left: Vec<String>,
    pub only_right: Vec<String>,
    pub mismatched: Vec<ChecksumMismatch>,
}

impl ManifestDiff {
    pub fn is_equal(&self) -> bool {
        self.only_left.is_empty() && self.only_right.is_empty() && self.mismatched.is_empty()
    }

    /// Number of divergent paths.
    pub fn len(&self) -> usize {
        self.only_left.len() + self.only_right.len() + self.mismatched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_equal()
    }

    /// Every divergent path, sorted.
    pub fn divergent_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .only_left
            .iter()
            .chain(&self.only_right)
            .map(String::as_str)
            .chain(self.mismatched.iter().map(|m| m.path.as_str()))
            .collect();
        paths.sort_unstable();
        paths
    }

    /// The same divergence seen from the other side.
    #[must_use]
    pub fn mirrored(&self) -> Self {
        Self {
            only_left: self.only_right.clone(),
            only_right: self.only_left.clone(),
            mismatched: self
                .mismatched
                .iter()
                .map(|m| ChecksumMismatch {
                    path: m.path.clone(),
                    left: m.right.clone(),
                    right: m.left.clone(),
                })
                .collect(),
        }
    }
}

/// Compare two manifests key by key. Output lists are sorted by path.
pub fn compare(left: &ChecksumManifest, right: &ChecksumManifest) -> ManifestDiff {
    let mut diff = ManifestDiff::default();

    for (path, left_sum) in left.iter() {
        match right.get(path) {
            None => diff.only_left.push(path.to_owned()),
            Some(right_sum) if right_sum != left_sum => diff.mismatched.push(ChecksumMismatch {
                path: path.to_owned(),
                left: left_sum.to_owned(),
                right: right_sum.to_owned(),
            }),
            Some(_) => {}
        }
    }
    diff.only_right = right
        .paths()
        .filter(|path| !left.contains(path))
        .map(str::to_owned)
        .collect();

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(pairs: &[(&str, &str)]) -> ChecksumManifest {
        pairs.iter().copied().collect()
    }

    #[test]
    fn identical_manifests_are_equal() {
        let a = manifest(&[("x", "1")]);
        let diff = compare(&a, &manifest(&[("x", "1")]));
        assert!(diff.is_equal());
        assert_eq!(diff, ManifestDiff::default());
    }

    #[test]
    fn reports_value_mismatch_and_right_only_key() {
        let diff = compare(&manifest(&[("x", "1")]), &manifest(&[("x", "2"), ("y", "3")]));
        assert!(!diff.is_equal());
        assert!(diff.only_left.is_empty());
        assert_eq!(diff.only_right, vec!["y"]);
        assert_eq!(
            diff.mismatched,
            vec![ChecksumMismatch {
                path: "x".to_owned(),
                left: "1".to_owned(),
                right: "2".to_owned(),
            }]
        );
        assert_eq!(diff.len(), 2);
    }

    #[test]
    fn reports_left_only_key() {
        let diff = compare(&manifest(&[("a", "1"), ("b", "2")]), &manifest(&[("a", "1")]));
        assert_eq!(diff.only_left, vec!["b"]);
        assert!(diff.only_right.is_empty());
    }

    #[test]
    fn swapping_sides_mirrors_the_diff() {
        let a = manifest(&[("x", "1"), ("z", "5")]);
        let b = manifest(&[("x", "2"), ("y", "3")]);
        assert_eq!(compare(&b, &a), compare(&a, &b).mirrored());
    }

    #[test]
    fn divergent_paths_are_sorted() {
        let diff = compare(
            &manifest(&[("m", "1"), ("z", "1")]),
            &manifest(&[("m", "2"), ("a", "1")]),
        );
        assert_eq!(diff.divergent_paths(), vec!["a", "m", "z"]);
    }

    #[test]
    fn empty_manifests_are_equal() {
        assert!(compare(&ChecksumManifest::new(), &ChecksumManifest::new()).is_equal());
    }
}
