use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

const DATASHEET_VARIANT_SUFFIX: &str = "-01";
const CATALOG_SUFFIX_LETTERS: [char; 2] = ['D', 'J'];
const UNKNOWN_ID: &str = "unknown";
const ID_HOSTILE_CHARS: [char; 10] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '#'];

/// Manufacturer names (and known aliases) mapped to the short code used in identifiers.
const BUILTIN_SHORT_NAMES: &[(&str, &str)] = &[
    ("Murata", "Murata"),
    ("Murata Manufacturing", "Murata"),
    ("Texas Instruments", "TI"),
    ("TI", "TI"),
    ("Vishay", "Vishay"),
    ("Vishay Siliconix", "Vishay"),
    ("Vishay Intertechnology", "Vishay"),
    ("KEMET", "KEMET"),
    ("TDK", "TDK"),
    ("Samsung", "Samsung"),
    ("Yageo", "Yageo"),
    ("Analog Devices", "Analog_Devices"),
    ("Analog Devices Inc.", "Analog_Devices"),
    ("Analog Devices Inc", "Analog_Devices"),
    ("Broadcom", "Broadcom"),
    ("Broadcom Limited", "Broadcom"),
    ("MACOM Technology Solutions", "MACOM_Technology_Solutions"),
    ("MACOM Technology Solutions Inc.", "MACOM_Technology_Solutions"),
    ("Micron", "Micron"),
    ("Micron Technology", "Micron"),
    ("Micron Technology Inc.", "Micron"),
    ("Micron Technology, Inc.", "Micron"),
    ("Infineon", "Infineon"),
    ("Infineon Technologies", "Infineon"),
    ("Infineon Technologies AG", "Infineon"),
    ("STMicroelectronics", "ST"),
    ("STMicroelectronics N.V.", "ST"),
    ("ST", "ST"),
    ("NXP", "NXP"),
    ("NXP Semiconductors", "NXP"),
    ("NXP Semiconductors N.V.", "NXP"),
    ("NXP USA Inc.", "NXP"),
    ("NXP USA", "NXP"),
    ("Renesas", "Renesas"),
    ("Renesas Electronics", "Renesas"),
    ("Renesas Electronics Corporation", "Renesas"),
    ("Rohm", "Rohm"),
    ("Rohm Semiconductor", "Rohm"),
    ("ROHM Semiconductor", "Rohm"),
    ("ROHM Co., Ltd.", "Rohm"),
    ("ROHM", "Rohm"),
];

/// Immutable manufacturer lookup built once and shared by reference.
#[derive(Debug, Clone)]
pub struct ManufacturerTable {
    short_names: HashMap<String, String>,
    /// Distinct `code_` prefixes, longest first so the maximal prefix always wins.
    prefixes: Vec<String>,
}

impl ManufacturerTable {
    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN_SHORT_NAMES.iter().copied())
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let short_names: HashMap<String, String> = pairs
            .into_iter()
            .map(|(name, code)| (name.to_string(), code.to_string()))
            .collect();

        let mut prefixes: Vec<String> = short_names
            .values()
            .collect::<HashSet<_>>()
            .into_iter()
            .map(|code| format!("{code}_"))
            .collect();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Self {
            short_names,
            prefixes,
        }
    }

    pub fn short_name(&self, manufacturer: &str) -> Option<&str> {
        self.short_names
            .get(manufacturer)
            .or_else(|| self.short_names.get(manufacturer.trim()))
            .map(String::as_str)
    }

    /// `Manufacturer_MPN` composite id, e.g. ("Texas Instruments", "LM358M") -> "TI_LM358M".
    /// Unknown manufacturers yield `None`; no fallback id is invented here.
    pub fn mfg_mpn_datasheet_id(&self, manufacturer: Option<&str>, mpn: &str) -> Option<String> {
        let manufacturer = manufacturer.filter(|value| !value.is_empty())?;
        if mpn.is_empty() {
            return None;
        }
        let short = self.short_name(manufacturer)?;
        Some(format!("{short}_{}", sanitize_for_id(mpn)))
    }

    /// Like [`Self::mfg_mpn_datasheet_id`] but falls back to the sanitized raw manufacturer
    /// name, for callers that must always produce an id.
    pub fn datasheet_id_or_fallback(&self, manufacturer: &str, mpn: &str) -> String {
        let short = self
            .short_name(manufacturer)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| sanitize_for_id(manufacturer));
        format!("{short}_{}", sanitize_for_id(mpn))
    }

    pub fn strip_manufacturer_prefix<'a>(&self, id: &'a str) -> Option<&'a str> {
        self.prefixes
            .iter()
            .find_map(|prefix| id.strip_prefix(prefix.as_str()))
            .filter(|rest| !rest.is_empty())
    }
}

/// Whitespace runs and filesystem-hostile characters become `_`. Empty and dot-only
/// results (`.`, `..`) become `unknown` so the id is always a single path component.
pub fn sanitize_for_id(value: &str) -> String {
    let mut sanitized = String::with_capacity(value.len());
    let mut in_whitespace = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                sanitized.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ID_HOSTILE_CHARS.contains(&ch) {
            sanitized.push('_');
        } else {
            sanitized.push(ch);
        }
    }

    if sanitized.chars().all(|ch| ch == '.') {
        UNKNOWN_ID.to_string()
    } else {
        sanitized
    }
}

/// Guesses the datasheet-side id from a catalog-style id (trailing `D` -> `-01`).
pub fn to_datasheet_target_id(id: &str) -> String {
    match id.strip_suffix('D') {
        Some(base) => format!("{base}{DATASHEET_VARIANT_SUFFIX}"),
        None => id.to_string(),
    }
}

/// Every catalog-facing key one stored record should answer to.
pub fn to_response_candidate_keys(id: &str) -> Vec<String> {
    let with_letters = |base: &str| {
        CATALOG_SUFFIX_LETTERS
            .iter()
            .map(|letter| format!("{base}{letter}"))
            .collect::<Vec<_>>()
    };

    match id.strip_suffix(DATASHEET_VARIANT_SUFFIX) {
        Some(base) => with_letters(base),
        None => {
            let mut keys = vec![id.to_string()];
            keys.extend(with_letters(id));
            keys
        }
    }
}

/// Keys derived from the record's own file id outrank keys derived from the
/// manufacturer-stripped remainder when two records claim the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyPriority {
    Stripped,
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateKey {
    pub key: String,
    pub priority: KeyPriority,
}

pub fn candidate_key_set(table: &ManufacturerTable, file_id: &str) -> Vec<CandidateKey> {
    let mut keys: Vec<CandidateKey> = to_response_candidate_keys(file_id)
        .into_iter()
        .map(|key| CandidateKey {
            key,
            priority: KeyPriority::Direct,
        })
        .collect();

    if let Some(mpn) = table.strip_manufacturer_prefix(file_id) {
        for key in to_response_candidate_keys(mpn) {
            if keys.iter().all(|existing| existing.key != key) {
                keys.push(CandidateKey {
                    key,
                    priority: KeyPriority::Stripped,
                });
            }
        }
    }

    keys
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStrategy {
    ManufacturerComposite,
    RawTarget,
    DatasheetTransform,
    SuffixScan,
}

impl DiscoveryStrategy {
    pub const ORDER: [Self; 4] = [
        Self::ManufacturerComposite,
        Self::RawTarget,
        Self::DatasheetTransform,
        Self::SuffixScan,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManufacturerComposite => "manufacturer_composite",
            Self::RawTarget => "raw_target",
            Self::DatasheetTransform => "datasheet_transform",
            Self::SuffixScan => "suffix_scan",
        }
    }

    fn directory_names(self, request: &DiscoveryRequest<'_>, root: &Path) -> Vec<String> {
        match self {
            Self::ManufacturerComposite => request
                .table
                .mfg_mpn_datasheet_id(request.manufacturer, request.target_id)
                .into_iter()
                .collect(),
            Self::RawTarget => vec![request.target_id.to_string()],
            Self::DatasheetTransform => vec![to_datasheet_target_id(request.target_id)],
            Self::SuffixScan => {
                let directories = list_directory_names(root);
                request
                    .base_ids()
                    .iter()
                    .filter_map(|base| {
                        let suffix = format!("_{base}");
                        directories
                            .iter()
                            .find(|name| name.ends_with(&suffix) && name.len() > suffix.len())
                            .cloned()
                    })
                    .collect()
            }
        }
    }
}

pub struct DiscoveryRequest<'a> {
    pub target_id: &'a str,
    pub manufacturer: Option<&'a str>,
    pub table: &'a ManufacturerTable,
}

impl DiscoveryRequest<'_> {
    fn base_ids(&self) -> Vec<String> {
        let mut ids = vec![self.target_id.to_string()];
        let transformed = to_datasheet_target_id(self.target_id);
        if transformed != self.target_id {
            ids.push(transformed);
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDirectory {
    pub path: PathBuf,
    pub strategy: DiscoveryStrategy,
}

/// Walks the strategies in order; the first existing, non-empty directory wins.
/// `None` means no result set exists for the target, which is not an error.
pub fn discover_result_directory(
    root: &Path,
    request: &DiscoveryRequest<'_>,
) -> Option<DiscoveredDirectory> {
    let mut tried = HashSet::new();

    for strategy in DiscoveryStrategy::ORDER {
        for name in strategy.directory_names(request, root) {
            if !tried.insert(name.clone()) {
                continue;
            }
            let path = root.join(&name);
            if directory_has_entries(&path) {
                debug!(
                    strategy = strategy.as_str(),
                    directory = %path.display(),
                    "result directory found"
                );
                return Some(DiscoveredDirectory { path, strategy });
            }
        }
    }

    None
}

fn directory_has_entries(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

fn list_directory_names(root: &Path) -> Vec<String> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(root = %root.display(), error = %err, "failed to list result root");
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().to_str().map(ToOwned::to_owned))
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn make_result_dir(root: &Path, name: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).expect("create result dir");
        fs::write(dir.join("candidate.json"), "{}").expect("write candidate file");
    }

    #[test]
    fn datasheet_target_id_swaps_trailing_d() {
        assert_eq!(
            to_datasheet_target_id("GRM188R60J105KA01D"),
            "GRM188R60J105KA01-01"
        );
        assert_eq!(to_datasheet_target_id("LM358M"), "LM358M");
        assert_eq!(
            to_datasheet_target_id("GRM188R60J105KA01J"),
            "GRM188R60J105KA01J"
        );
    }

    #[test]
    fn response_keys_for_datasheet_variant_use_letter_suffixes() {
        assert_eq!(
            to_response_candidate_keys("GRM188R60J105KA01-01"),
            vec!["GRM188R60J105KA01D", "GRM188R60J105KA01J"]
        );
    }

    #[test]
    fn response_keys_for_plain_id_include_the_id_itself() {
        assert_eq!(
            to_response_candidate_keys("LM358M"),
            vec!["LM358M", "LM358MD", "LM358MJ"]
        );
    }

    #[test]
    fn short_name_lookup_tolerates_padding() {
        let table = ManufacturerTable::builtin();
        assert_eq!(table.short_name("Texas Instruments"), Some("TI"));
        assert_eq!(table.short_name("  Murata Manufacturing "), Some("Murata"));
        assert_eq!(table.short_name("Acme Parts"), None);
    }

    #[test]
    fn composite_id_requires_known_manufacturer() {
        let table = ManufacturerTable::builtin();
        assert_eq!(
            table.mfg_mpn_datasheet_id(Some("Texas Instruments"), "LM358M"),
            Some("TI_LM358M".to_string())
        );
        assert_eq!(
            table.mfg_mpn_datasheet_id(Some("Broadcom"), "ATF 511P8/BLK"),
            Some("Broadcom_ATF_511P8_BLK".to_string())
        );
        assert_eq!(table.mfg_mpn_datasheet_id(Some("Acme Parts"), "X1"), None);
        assert_eq!(table.mfg_mpn_datasheet_id(None, "X1"), None);
    }

    #[test]
    fn fallback_id_sanitizes_unknown_manufacturer() {
        let table = ManufacturerTable::builtin();
        assert_eq!(
            table.datasheet_id_or_fallback("Acme Parts", "X1"),
            "Acme_Parts_X1"
        );
        assert_eq!(table.datasheet_id_or_fallback("", "X1"), "unknown_X1");
    }

    #[test]
    fn sanitized_ids_are_single_path_components() {
        assert_eq!(sanitize_for_id("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_for_id(".."), "unknown");
        assert_eq!(sanitize_for_id("."), "unknown");
        assert_eq!(sanitize_for_id(""), "unknown");
        assert_eq!(sanitize_for_id("LM358.1"), "LM358.1");
    }

    #[test]
    fn prefix_stripping_prefers_longest_code() {
        let table =
            ManufacturerTable::from_pairs([("Analog", "Analog"), ("ADI", "Analog_Devices")]);
        assert_eq!(
            table.strip_manufacturer_prefix("Analog_Devices_AD8605"),
            Some("AD8605")
        );
        assert_eq!(table.strip_manufacturer_prefix("Analog_OPA1"), Some("OPA1"));
        assert_eq!(table.strip_manufacturer_prefix("LM358M"), None);
        assert_eq!(table.strip_manufacturer_prefix("TI_"), None);
    }

    #[test]
    fn key_set_adds_stripped_keys_at_lower_priority() {
        let table = ManufacturerTable::builtin();
        let keys = candidate_key_set(&table, "TI_LM358M");
        let direct: Vec<&str> = keys
            .iter()
            .filter(|key| key.priority == KeyPriority::Direct)
            .map(|key| key.key.as_str())
            .collect();
        let stripped: Vec<&str> = keys
            .iter()
            .filter(|key| key.priority == KeyPriority::Stripped)
            .map(|key| key.key.as_str())
            .collect();
        assert_eq!(direct, vec!["TI_LM358M", "TI_LM358MD", "TI_LM358MJ"]);
        assert_eq!(stripped, vec!["LM358M", "LM358MD", "LM358MJ"]);
    }

    #[test]
    fn discovery_prefers_manufacturer_composite() {
        let root = TempDir::new().expect("tempdir");
        make_result_dir(root.path(), "TI_LM358M");
        make_result_dir(root.path(), "LM358M");
        let table = ManufacturerTable::builtin();

        let found = discover_result_directory(
            root.path(),
            &DiscoveryRequest {
                target_id: "LM358M",
                manufacturer: Some("Texas Instruments"),
                table: &table,
            },
        )
        .expect("directory should be found");
        assert_eq!(found.strategy, DiscoveryStrategy::ManufacturerComposite);
        assert_eq!(found.path, root.path().join("TI_LM358M"));
    }

    #[test]
    fn discovery_only_prefixed_directory_resolves_with_manufacturer() {
        let root = TempDir::new().expect("tempdir");
        make_result_dir(root.path(), "TI_LM358M");
        let table = ManufacturerTable::builtin();

        let found = discover_result_directory(
            root.path(),
            &DiscoveryRequest {
                target_id: "LM358M",
                manufacturer: Some("Texas Instruments"),
                table: &table,
            },
        )
        .expect("directory should be found");
        assert_eq!(found.strategy, DiscoveryStrategy::ManufacturerComposite);
    }

    #[test]
    fn discovery_falls_back_through_raw_and_datasheet_forms() {
        let root = TempDir::new().expect("tempdir");
        let table = ManufacturerTable::builtin();
        make_result_dir(root.path(), "GRM188R60J105KA01-01");

        let found = discover_result_directory(
            root.path(),
            &DiscoveryRequest {
                target_id: "GRM188R60J105KA01D",
                manufacturer: Some("Murata"),
                table: &table,
            },
        )
        .expect("directory should be found");
        assert_eq!(found.strategy, DiscoveryStrategy::DatasheetTransform);

        make_result_dir(root.path(), "GRM188R60J105KA01D");
        let found = discover_result_directory(
            root.path(),
            &DiscoveryRequest {
                target_id: "GRM188R60J105KA01D",
                manufacturer: None,
                table: &table,
            },
        )
        .expect("directory should be found");
        assert_eq!(found.strategy, DiscoveryStrategy::RawTarget);
    }

    #[test]
    fn discovery_suffix_scan_handles_unrequested_prefix() {
        let root = TempDir::new().expect("tempdir");
        make_result_dir(root.path(), "TI_LM358M");
        let table = ManufacturerTable::builtin();

        let found = discover_result_directory(
            root.path(),
            &DiscoveryRequest {
                target_id: "LM358M",
                manufacturer: None,
                table: &table,
            },
        )
        .expect("directory should be found");
        assert_eq!(found.strategy, DiscoveryStrategy::SuffixScan);
        assert_eq!(found.path, root.path().join("TI_LM358M"));
    }

    #[test]
    fn discovery_skips_empty_directories() {
        let root = TempDir::new().expect("tempdir");
        fs::create_dir_all(root.path().join("LM358M")).expect("create empty dir");
        make_result_dir(root.path(), "Acme_LM358M");
        let table = ManufacturerTable::builtin();

        let found = discover_result_directory(
            root.path(),
            &DiscoveryRequest {
                target_id: "LM358M",
                manufacturer: None,
                table: &table,
            },
        )
        .expect("directory should be found");
        assert_eq!(found.strategy, DiscoveryStrategy::SuffixScan);
        assert_eq!(found.path, root.path().join("Acme_LM358M"));
    }

    #[test]
    fn discovery_returns_none_when_nothing_matches() {
        let root = TempDir::new().expect("tempdir");
        let table = ManufacturerTable::builtin();
        let request = DiscoveryRequest {
            target_id: "LM358M",
            manufacturer: None,
            table: &table,
        };
        assert_eq!(discover_result_directory(root.path(), &request), None);
        assert_eq!(
            discover_result_directory(&root.path().join("missing"), &request),
            None
        );
    }
}
