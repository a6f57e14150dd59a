//! Presigned-package discovery via seapp policy parsing.
//!
//! Presigning intent is declared in SELinux app-domain policy, not in any
//! package manifest: an application whose seapp entry carries a recognized
//! seinfo must keep its stock signature. This resolver recursively scans the
//! configured policy directories for seapp declaration files, builds a
//! package→presigned map with the same directory-precedence rule as context
//! provenance (later directory wins), and intersects the map with the
//! discovered-package list supplied by the caller.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::DeltaError;
use crate::model::types::PackagePolicy;

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// Build the package→presigned map from every configured policy directory.
///
/// `markers` is the recognized presigned seinfo set (normally
/// [`crate::model::types::PRESIGNED_SEINFO`]); it is a parameter so tests can
/// substitute their own table.
///
/// # Errors
///
/// A configured directory that cannot be read is fatal.
pub fn scan_seapp_policies(
    dirs: &[PathBuf],
    markers: &[&str],
) -> Result<PackagePolicy, DeltaError> {
    let mut policy = PackagePolicy::default();
    for dir in dirs {
        let entries = scan_seapp_dir(dir, markers)?;
        debug!(dir = %dir.display(), entries = entries.len(), "scanned seapp policies");
        for (package, presigned) in entries {
            policy.insert(package, presigned);
        }
    }
    Ok(policy)
}

/// Scan one directory for seapp declaration files, in sorted traversal order
/// so later files deterministically override earlier ones within the
/// directory.
fn scan_seapp_dir(dir: &Path, markers: &[&str]) -> Result<Vec<(String, bool)>, DeltaError> {
    if !dir.is_dir() {
        return Err(DeltaError::io(
            dir,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "configured policy directory not found",
            ),
        ));
    }

    let mut entries = Vec::new();
    for item in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let item = item.map_err(|e| walk_error(dir, e))?;
        if !item.file_type().is_file() {
            continue;
        }
        if !item
            .file_name()
            .to_string_lossy()
            .contains("seapp_contexts")
        {
            continue;
        }
        let text = std::fs::read_to_string(item.path())
            .map_err(|e| DeltaError::io(item.path(), e))?;
        entries.extend(parse_seapp_entries(&text, markers));
    }
    Ok(entries)
}

/// Parse seapp declaration text into `(package, presigned)` entries.
///
/// Each non-comment line is a series of `key=value` selectors. Only entries
/// with a `name=` package selector classify a package; its seinfo decides
/// presignedness. Entries without a `seinfo=` value are recorded as not
/// presigned.
fn parse_seapp_entries(text: &str, markers: &[&str]) -> Vec<(String, bool)> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut name = None;
        let mut seinfo = None;
        for token in line.split_whitespace() {
            if let Some((key, value)) = token.split_once('=') {
                match key {
                    "name" => name = Some(value),
                    "seinfo" => seinfo = Some(value),
                    _ => {}
                }
            }
        }
        if let Some(package) = name {
            let presigned = seinfo.is_some_and(|s| markers.contains(&s));
            entries.push((package.to_owned(), presigned));
        }
    }
    entries
}

fn walk_error(dir: &Path, err: walkdir::Error) -> DeltaError {
    let path = err
        .path()
        .map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("directory loop detected"));
    DeltaError::io(path, source)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Intersect the policy map with discovered packages, producing the sorted
/// list of blob paths that must keep their stock signature.
///
/// `discovered` pairs a package name with the combined `partition/path` of
/// its blob, as supplied by an external packaging inspector. A package absent
/// from the policy map is not presigned.
#[must_use]
pub fn classify_packages(
    policy: &PackagePolicy,
    discovered: &[(String, String)],
) -> Vec<String> {
    let mut paths: Vec<String> = discovered
        .iter()
        .filter(|(package, _)| policy.is_presigned(package))
        .map(|(_, path)| path.clone())
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

/// Parse a discovered-packages list file: one `package<whitespace>path` pair
/// per line, `#` comments allowed.
#[must_use]
pub fn parse_package_list(text: &str) -> Vec<(String, String)> {
    let mut packages = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((package, path)) = line.split_once(char::is_whitespace) {
            packages.push((package.trim().to_owned(), path.trim().to_owned()));
        }
    }
    packages
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::PRESIGNED_SEINFO;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    // -- parsing --

    #[test]
    fn entry_with_recognized_seinfo_is_presigned() {
        let text = "user=_app seinfo=platform name=com.acme.camera domain=platform_app type=app_data_file\n";
        let entries = parse_seapp_entries(text, PRESIGNED_SEINFO);
        assert_eq!(entries, vec![("com.acme.camera".to_owned(), true)]);
    }

    #[test]
    fn entry_with_other_seinfo_is_not_presigned() {
        let text = "user=_app seinfo=default name=com.acme.notes domain=untrusted_app\n";
        let entries = parse_seapp_entries(text, PRESIGNED_SEINFO);
        assert_eq!(entries, vec![("com.acme.notes".to_owned(), false)]);
    }

    #[test]
    fn entry_without_name_selector_classifies_nothing() {
        let text = "user=_app seinfo=platform domain=platform_app\n";
        assert!(parse_seapp_entries(text, PRESIGNED_SEINFO).is_empty());
    }

    #[test]
    fn entry_without_seinfo_is_not_presigned() {
        let text = "user=_app name=com.acme.plain domain=untrusted_app\n";
        let entries = parse_seapp_entries(text, PRESIGNED_SEINFO);
        assert_eq!(entries, vec![("com.acme.plain".to_owned(), false)]);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = "# header\n\nuser=_app seinfo=media name=com.acme.tv domain=mediaprovider\n";
        let entries = parse_seapp_entries(text, PRESIGNED_SEINFO);
        assert_eq!(entries.len(), 1);
    }

    // -- directory precedence --

    #[test]
    fn later_directory_overrides_earlier_entry() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir_a = tmp.path().join("a");
        let dir_b = tmp.path().join("b");
        write(
            &dir_a,
            "plat_seapp_contexts",
            "user=_app seinfo=platform name=com.acme.app domain=platform_app\n",
        );
        write(
            &dir_b,
            "vendor_seapp_contexts",
            "user=_app seinfo=default name=com.acme.app domain=untrusted_app\n",
        );

        let policy =
            scan_seapp_policies(&[dir_a, dir_b], PRESIGNED_SEINFO).expect("scan succeeds");
        assert!(!policy.is_presigned("com.acme.app"));
    }

    #[test]
    fn non_seapp_files_are_ignored() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("policy");
        write(&dir, "foo.te", "type not_a_package;\n");
        write(
            &dir,
            "seapp_contexts",
            "user=_app seinfo=shared name=com.acme.shared domain=platform_app\n",
        );

        let policy =
            scan_seapp_policies(&[dir], PRESIGNED_SEINFO).expect("scan succeeds");
        assert_eq!(policy.len(), 1);
        assert!(policy.is_presigned("com.acme.shared"));
    }

    #[test]
    fn missing_policy_directory_is_fatal() {
        let err =
            scan_seapp_policies(&[PathBuf::from("/does/not/exist")], PRESIGNED_SEINFO)
                .unwrap_err();
        assert!(matches!(err, DeltaError::Io { .. }));
    }

    // -- classification --

    #[test]
    fn classification_intersects_policy_with_discovered() {
        let mut policy = PackagePolicy::default();
        policy.insert("com.acme.camera", true);
        policy.insert("com.acme.notes", false);

        let discovered = vec![
            ("com.acme.camera".to_owned(), "product/app/Camera/Camera.apk".to_owned()),
            ("com.acme.notes".to_owned(), "product/app/Notes/Notes.apk".to_owned()),
            ("com.acme.unknown".to_owned(), "product/app/Unknown/Unknown.apk".to_owned()),
        ];
        let presigned = classify_packages(&policy, &discovered);
        assert_eq!(presigned, vec!["product/app/Camera/Camera.apk".to_owned()]);
    }

    #[test]
    fn package_list_parses_whitespace_pairs() {
        let text = "# discovered\ncom.acme.camera\tproduct/app/Camera/Camera.apk\ncom.acme.notes product/app/Notes/Notes.apk\n";
        let packages = parse_package_list(text);
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].0, "com.acme.camera");
        assert_eq!(packages[1].1, "product/app/Notes/Notes.apk");
    }
}
