use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Flat cookie-name → value map consumed by the session bootstrap.
/// BTreeMap keeps keys sorted when the bundle is written back out.
pub type CookieBundle = BTreeMap<String, String>;

/// One entry of a browser cookie-export array. Exports carry many more
/// fields (domain, path, expirationDate, ...); only name and value matter.
#[derive(Debug, Deserialize)]
struct ExportedCookie {
    name: Option<String>,
    value: Option<String>,
}

/// Convert a browser cookie-export JSON array into a flat bundle.
/// Entries missing either field are dropped; duplicate names resolve
/// last-write-wins.
pub fn convert_export(json: &str) -> Result<CookieBundle> {
    let entries: Vec<ExportedCookie> =
        serde_json::from_str(json).context("cookie export is not a JSON array")?;

    let mut bundle = CookieBundle::new();
    for entry in entries {
        if let (Some(name), Some(value)) = (entry.name, entry.value) {
            if !name.is_empty() && !value.is_empty() {
                bundle.insert(name, value);
            }
        }
    }
    Ok(bundle)
}

pub fn convert_export_file(input: &Path, output: &Path) -> Result<CookieBundle> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("failed to read cookie export {}", input.display()))?;
    let bundle = convert_export(&raw)?;
    write_bundle(output, &bundle)?;
    Ok(bundle)
}

pub fn write_bundle(path: &Path, bundle: &CookieBundle) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(bundle)?;
    fs::write(path, json)
        .with_context(|| format!("failed to write cookie bundle {}", path.display()))
}

pub fn load_bundle(path: &Path) -> Result<CookieBundle> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read cookie bundle {}", path.display()))?;
    let bundle: CookieBundle =
        serde_json::from_str(&raw).context("cookie bundle is not a JSON object")?;
    ensure_essential(&bundle)?;
    Ok(bundle)
}

/// The private API rejects requests without the auth-token and CSRF cookies,
/// so refuse to start a session without them.
pub fn ensure_essential(bundle: &CookieBundle) -> Result<()> {
    for name in ["auth_token", "ct0"] {
        if !bundle.contains_key(name) {
            bail!("cookie bundle is missing the {name} cookie");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_keeps_complete_entries_only() {
        let json = r#"[
            {"name": "ct0", "value": "abc", "domain": ".x.com"},
            {"name": "orphan"},
            {"value": "no-name"},
            {"name": "auth_token", "value": "tok"}
        ]"#;
        let bundle = convert_export(json).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle["ct0"], "abc");
        assert_eq!(bundle["auth_token"], "tok");
    }

    #[test]
    fn test_convert_duplicates_last_write_wins() {
        let json = r#"[
            {"name": "ct0", "value": "first"},
            {"name": "ct0", "value": "second"}
        ]"#;
        let bundle = convert_export(json).unwrap();
        assert_eq!(bundle["ct0"], "second");
    }

    #[test]
    fn test_convert_drops_empty_values() {
        let json = r#"[{"name": "ct0", "value": ""}, {"name": "", "value": "x"}]"#;
        let bundle = convert_export(json).unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn test_convert_keys_come_out_sorted() {
        let json = r#"[
            {"name": "zeta", "value": "1"},
            {"name": "alpha", "value": "2"},
            {"name": "mid", "value": "3"}
        ]"#;
        let bundle = convert_export(json).unwrap();
        let keys: Vec<&str> = bundle.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_convert_rejects_non_array() {
        assert!(convert_export(r#"{"name": "ct0"}"#).is_err());
    }

    #[test]
    fn test_ensure_essential_requires_both_cookies() {
        let mut bundle = CookieBundle::new();
        bundle.insert("auth_token".into(), "tok".into());
        assert!(ensure_essential(&bundle).is_err());
        bundle.insert("ct0".into(), "csrf".into());
        assert!(ensure_essential(&bundle).is_ok());
    }

    #[test]
    fn test_bundle_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let mut bundle = CookieBundle::new();
        bundle.insert("auth_token".into(), "tok".into());
        bundle.insert("ct0".into(), "csrf".into());
        write_bundle(&path, &bundle).unwrap();
        let loaded = load_bundle(&path).unwrap();
        assert_eq!(loaded, bundle);
    }
}
