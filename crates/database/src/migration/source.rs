use crate::error::{DatabaseError, Result};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

lazy_static::lazy_static! {
    // V<version>__<description>.sql, e.g. V1__create_product_table.sql or V1_2__add_index.sql
    static ref SCRIPT_NAME_REGEX: regex::Regex =
        regex::Regex::new(r"^V([0-9]+(?:[._][0-9]+)*)__([^/\\]+)\.sql$").unwrap();
    static ref VERSION_REGEX: regex::Regex =
        regex::Regex::new(r"^[0-9]+(?:[._][0-9]+)*$").unwrap();
}

/// Dotted numeric version. Segments compare numerically and missing trailing
/// segments count as zero, so `1` == `1.0` < `1.1` < `2` < `10`.
#[derive(Debug, Clone)]
pub struct MigrationVersion {
    segments: Vec<u64>,
    raw: String,
}

impl MigrationVersion {
    pub fn parse(raw: &str) -> Result<Self> {
        if !VERSION_REGEX.is_match(raw) {
            return Err(DatabaseError::MigrationSource(format!(
                "invalid migration version '{}'",
                raw
            )));
        }

        let segments = raw
            .split(['.', '_'])
            .map(|s| {
                s.parse::<u64>().map_err(|_| {
                    DatabaseError::MigrationSource(format!("version segment too large in '{}'", raw))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            segments,
            raw: raw.replace('_', "."),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for MigrationVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|i| {
                let a = self.segments.get(i).copied().unwrap_or(0);
                let b = other.segments.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for MigrationVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MigrationVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MigrationVersion {}

/// One versioned change unit.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: MigrationVersion,
    pub description: String,
    pub script: String,
    pub sql: String,
    pub checksum: String,
}

impl Migration {
    pub fn new(version: &str, description: &str, sql: impl Into<String>) -> Result<Self> {
        let version = MigrationVersion::parse(version)?;
        let sql = sql.into();
        let script = format!("V{}__{}.sql", version, description.replace(' ', "_"));

        Ok(Self {
            checksum: checksum(&sql),
            version,
            description: description.to_string(),
            script,
            sql,
        })
    }
}

/// SHA-256 of the script body, hex encoded.
pub fn checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// Ordered collection of migration units shared by all tenant schemas.
#[derive(Debug, Clone)]
pub struct MigrationSource {
    location: String,
    migrations: Vec<Migration>,
}

impl MigrationSource {
    /// Build from in-memory units. Order of input does not matter.
    pub fn new(location: impl Into<String>, migrations: Vec<Migration>) -> Result<Self> {
        let location = location.into();
        let mut migrations = migrations;
        migrations.sort_by(|a, b| a.version.cmp(&b.version));

        if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(DatabaseError::MigrationSource(format!(
                "duplicate migration version {} in {} ({} and {})",
                pair[1].version, location, pair[0].script, pair[1].script
            )));
        }

        Ok(Self {
            location,
            migrations,
        })
    }

    /// Load every `V<version>__<description>.sql` file in `dir`.
    ///
    /// Files that are not `.sql` scripts are skipped; a `V`-prefixed `.sql`
    /// file whose name does not follow the pattern is an error.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let location = dir.display().to_string();

        let entries = std::fs::read_dir(dir).map_err(|e| {
            DatabaseError::MigrationSource(format!("cannot read migrations at {}: {}", location, e))
        })?;

        let mut migrations = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                DatabaseError::MigrationSource(format!("cannot read migrations at {}: {}", location, e))
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !file_name.ends_with(".sql") || !file_name.starts_with('V') {
                tracing::debug!("Skipping non-migration file {}", path.display());
                continue;
            }

            let captures = SCRIPT_NAME_REGEX.captures(&file_name).ok_or_else(|| {
                DatabaseError::MigrationSource(format!(
                    "migration file '{}' must be named V<version>__<description>.sql",
                    file_name
                ))
            })?;

            let sql = std::fs::read_to_string(&path).map_err(|e| {
                DatabaseError::MigrationSource(format!("cannot read {}: {}", path.display(), e))
            })?;

            let version = MigrationVersion::parse(&captures[1])?;
            migrations.push(Migration {
                checksum: checksum(&sql),
                version,
                description: captures[2].replace('_', " "),
                script: file_name,
                sql,
            });
        }

        Self::new(location, migrations)
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// All units in strictly increasing version order.
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn get(&self, version: &MigrationVersion) -> Option<&Migration> {
        self.migrations.iter().find(|m| &m.version == version)
    }

    pub fn latest_version(&self) -> Option<&MigrationVersion> {
        self.migrations.last().map(|m| &m.version)
    }

    /// Units newer than `high_water` (all of them when nothing is applied).
    pub fn pending_after<'a>(
        &'a self,
        high_water: Option<&'a MigrationVersion>,
    ) -> impl Iterator<Item = &'a Migration> + 'a {
        self.migrations
            .iter()
            .filter(move |m| high_water.map_or(true, |hw| &m.version > hw))
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: &str) -> MigrationVersion {
        MigrationVersion::parse(raw).unwrap()
    }

    #[test]
    fn test_version_ordering() {
        assert!(v("1") < v("1.1"));
        assert!(v("1.1") < v("2"));
        assert!(v("2") < v("10"));
        assert_eq!(v("1"), v("1.0"));
        assert_eq!(v("1_2").as_str(), "1.2");
    }

    #[test]
    fn test_invalid_versions() {
        for raw in ["", "a", "1.", ".1", "1..2", "-1"] {
            assert!(MigrationVersion::parse(raw).is_err(), "{:?} should be rejected", raw);
        }
    }

    #[test]
    fn test_source_sorts_and_rejects_duplicates() {
        let source = MigrationSource::new(
            "memory",
            vec![
                Migration::new("10", "ten", "SELECT 10").unwrap(),
                Migration::new("2", "two", "SELECT 2").unwrap(),
                Migration::new("1", "one", "SELECT 1").unwrap(),
            ],
        )
        .unwrap();
        let versions: Vec<&str> = source.migrations().iter().map(|m| m.version.as_str()).collect();
        assert_eq!(versions, vec!["1", "2", "10"]);
        assert_eq!(source.latest_version().unwrap().as_str(), "10");

        let duplicate = MigrationSource::new(
            "memory",
            vec![
                Migration::new("1", "one", "SELECT 1").unwrap(),
                Migration::new("1.0", "again", "SELECT 1").unwrap(),
            ],
        );
        assert!(matches!(duplicate, Err(DatabaseError::MigrationSource(_))));
    }

    #[test]
    fn test_pending_after_high_water_mark() {
        let source = MigrationSource::new(
            "memory",
            vec![
                Migration::new("1", "one", "SELECT 1").unwrap(),
                Migration::new("2", "two", "SELECT 2").unwrap(),
                Migration::new("3", "three", "SELECT 3").unwrap(),
            ],
        )
        .unwrap();

        assert_eq!(source.pending_after(None).count(), 3);
        let hw = v("2");
        let pending: Vec<&str> = source
            .pending_after(Some(&hw))
            .map(|m| m.version.as_str())
            .collect();
        assert_eq!(pending, vec!["3"]);
    }

    #[test]
    fn test_checksum_tracks_content() {
        let a = Migration::new("1", "one", "CREATE TABLE a (id INT)").unwrap();
        let b = Migration::new("1", "one", "CREATE TABLE a (id BIGINT)").unwrap();
        assert_eq!(a.checksum.len(), 64);
        assert_ne!(a.checksum, b.checksum);
        assert_eq!(a.script, "V1__one.sql");
    }

    #[test]
    fn test_from_dir() {
        let dir = std::env::temp_dir().join(format!("catalog-migrations-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("V2__add_index.sql"), "CREATE INDEX i ON t (id);").unwrap();
        std::fs::write(dir.join("V1__create_table.sql"), "CREATE TABLE t (id INT);").unwrap();
        std::fs::write(dir.join("README.md"), "notes").unwrap();

        let source = MigrationSource::from_dir(&dir).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.migrations()[0].description, "create table");
        assert_eq!(source.migrations()[1].script, "V2__add_index.sql");

        std::fs::write(dir.join("Vx__broken.sql"), "SELECT 1;").unwrap();
        assert!(matches!(
            MigrationSource::from_dir(&dir),
            Err(DatabaseError::MigrationSource(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_from_missing_dir() {
        assert!(matches!(
            MigrationSource::from_dir("/definitely/not/here"),
            Err(DatabaseError::MigrationSource(_))
        ));
    }

    #[test]
    fn test_bundled_migrations_parse() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
        let source = MigrationSource::from_dir(dir).unwrap();
        assert!(!source.is_empty());
        assert_eq!(source.migrations()[0].version.as_str(), "1");
    }
}
