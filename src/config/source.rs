use log::{ debug, info };
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::ConfigError;

/// A raw value as found in one configuration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Text(String),
    List(Vec<String>),
}

impl RawValue {
    /// Blank values count as absent so the chain falls through to the next source.
    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::List(items) => items.iter().all(|item| item.trim().is_empty()),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            RawValue::Text(s) => s.trim().to_string(),
            RawValue::List(items) =>
                items
                    .iter()
                    .map(|item| item.trim())
                    .filter(|item| !item.is_empty())
                    .collect::<Vec<_>>()
                    .join(","),
        }
    }

    /// Splits a comma separated string, or takes a list as-is, dropping empty items.
    pub fn into_list(self) -> Vec<String> {
        let items = match self {
            RawValue::Text(s) => s.split(',').map(str::to_string).collect::<Vec<_>>(),
            RawValue::List(items) => items,
        };
        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

pub trait ValueSource: Send + Sync {
    fn name(&self) -> &str;
    fn lookup(&self, key: &str) -> Option<RawValue>;
}

/// Snapshot of process environment variables.
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Entries whose name or value is not valid UTF-8 are skipped.
    pub fn capture() -> Self {
        Self::from_vars(
            std::env
                ::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        )
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
        where I: IntoIterator<Item = (K, V)>, K: Into<String>, V: Into<String>
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ValueSource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn lookup(&self, key: &str) -> Option<RawValue> {
        self.vars.get(key).cloned().map(RawValue::Text)
    }
}

/// Key/value pairs read from a TOML secrets file.
pub struct SecretsSource {
    values: HashMap<String, RawValue>,
}

impl SecretsSource {
    pub fn empty() -> Self {
        Self { values: HashMap::new() }
    }

    /// A missing file yields an empty source; an unreadable or invalid one is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No secrets file at '{}', skipping", path.display());
                return Ok(Self::empty());
            }
            Err(e) => {
                return Err(ConfigError::SecretsIo {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };

        let source = Self::parse(&content).map_err(|e| ConfigError::SecretsParse {
            path: path.display().to_string(),
            source: e,
        })?;
        info!("Loaded {} secret(s) from '{}'", source.values.len(), path.display());
        Ok(source)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let table: toml::Table = toml::from_str(content)?;
        let values = table
            .into_iter()
            .filter_map(|(key, value)| to_raw_value(value).map(|raw| (key, raw)))
            .collect();
        Ok(Self { values })
    }
}

fn to_raw_value(value: toml::Value) -> Option<RawValue> {
    match value {
        toml::Value::String(s) => Some(RawValue::Text(s)),
        toml::Value::Array(items) =>
            Some(
                RawValue::List(
                    items
                        .into_iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect()
                )
            ),
        toml::Value::Integer(i) => Some(RawValue::Text(i.to_string())),
        toml::Value::Float(f) => Some(RawValue::Text(f.to_string())),
        toml::Value::Boolean(b) => Some(RawValue::Text(b.to_string())),
        toml::Value::Datetime(_) | toml::Value::Table(_) => None,
    }
}

impl ValueSource for SecretsSource {
    fn name(&self) -> &str {
        "secrets"
    }

    fn lookup(&self, key: &str) -> Option<RawValue> {
        self.values.get(key).cloned()
    }
}

/// Fixed values, used for built-in defaults.
pub struct StaticSource {
    name: String,
    values: HashMap<String, String>,
}

impl StaticSource {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), values: HashMap::new() }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl ValueSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<RawValue> {
        self.values.get(key).cloned().map(RawValue::Text)
    }
}

/// Ordered list of sources; the first non-blank value wins.
#[derive(Default)]
pub struct ResolverChain {
    sources: Vec<Box<dyn ValueSource>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source<S: ValueSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn resolve(&self, key: &str) -> Option<RawValue> {
        for source in &self.sources {
            if let Some(value) = source.lookup(key) {
                if value.is_blank() {
                    continue;
                }
                debug!("Resolved {} from {}", key, source.name());
                return Some(value);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_wins_over_secrets() {
        let chain = ResolverChain::new()
            .with_source(EnvSource::from_vars([("OPENAI_MODEL", "gpt-4o")]))
            .with_source(StaticSource::new("secrets").with("OPENAI_MODEL", "gpt-4.1"));

        assert_eq!(chain.resolve("OPENAI_MODEL"), Some(RawValue::Text("gpt-4o".into())));
    }

    #[test]
    fn blank_values_fall_through() {
        let chain = ResolverChain::new()
            .with_source(EnvSource::from_vars([("OPENAI_MODEL", "   ")]))
            .with_source(StaticSource::new("secrets").with("OPENAI_MODEL", "gpt-4.1"));

        assert_eq!(chain.resolve("OPENAI_MODEL"), Some(RawValue::Text("gpt-4.1".into())));
    }

    #[test]
    fn unknown_key_is_absent() {
        let chain = ResolverChain::new().with_source(EnvSource::from_vars(Vec::<(String, String)>::new()));
        assert_eq!(chain.resolve("VECTOR_STORE_IDS"), None);
    }

    #[cfg(unix)]
    #[test]
    fn capture_skips_non_utf8_variables() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        std::env::set_var("SQL_WRITER_TEST_NON_UTF8", OsStr::from_bytes(&[0x66, 0xff, 0x6f]));
        std::env::set_var("SQL_WRITER_TEST_UTF8", "present");

        let source = EnvSource::capture();

        assert_eq!(source.lookup("SQL_WRITER_TEST_NON_UTF8"), None);
        assert_eq!(source.lookup("SQL_WRITER_TEST_UTF8"), Some(RawValue::Text("present".into())));
    }

    #[test]
    fn secrets_file_accepts_strings_and_arrays() {
        let source = SecretsSource::parse(
            r#"
OPENAI_API_KEY = "sk-test"
VECTOR_STORE_IDS = ["vs_1", " vs_2 ", ""]
"#
        ).unwrap();

        assert_eq!(source.lookup("OPENAI_API_KEY"), Some(RawValue::Text("sk-test".into())));
        let ids = source.lookup("VECTOR_STORE_IDS").unwrap().into_list();
        assert_eq!(ids, vec!["vs_1".to_string(), "vs_2".to_string()]);
    }

    #[test]
    fn comma_separated_text_splits_into_list() {
        let ids = RawValue::Text("vs_a, vs_b,,".into()).into_list();
        assert_eq!(ids, vec!["vs_a".to_string(), "vs_b".to_string()]);
    }

    #[test]
    fn missing_secrets_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = SecretsSource::load(dir.path().join("secrets.toml")).unwrap();
        assert_eq!(source.lookup("OPENAI_API_KEY"), None);
    }

    #[test]
    fn invalid_secrets_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "OPENAI_API_KEY = ").unwrap();

        let err = SecretsSource::load(&path).err().unwrap();
        assert!(matches!(err, ConfigError::SecretsParse { .. }));
    }
}
