//! INI file configuration adapter.

use crate::domain::error::QuantsimError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, QuantsimError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| QuantsimError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, QuantsimError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| QuantsimError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(true),
            "false" | "no" | "0" | "off" => Some(false),
            _ => None,
        }
    }

    /// Present but blank counts as absent.
    fn non_empty(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .filter(|v| !v.trim().is_empty())
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.non_empty(section, key).map(|v| v.trim().to_string())
    }

    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, QuantsimError> {
        if self.non_empty(section, key).is_none() {
            return Ok(None);
        }
        self.config
            .getint(section, key)
            .map_err(|reason| QuantsimError::invalid(section, key, reason))
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, QuantsimError> {
        if self.non_empty(section, key).is_none() {
            return Ok(None);
        }
        self.config
            .getfloat(section, key)
            .map_err(|reason| QuantsimError::invalid(section, key, reason))
    }

    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, QuantsimError> {
        match self.non_empty(section, key) {
            None => Ok(None),
            Some(v) => Self::parse_bool(&v).map(Some).ok_or_else(|| {
                QuantsimError::invalid(section, key, format!("expected a boolean, got '{v}'"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[backtest]
initial_capital = 100000.0
symbol = BTCUSDT

[strategy]
name = trend_following
short_window = 10
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "symbol"),
            Some("BTCUSDT".to_string())
        );
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("trend_following".to_string())
        );
        assert_eq!(adapter.get_int("strategy", "short_window").unwrap(), Some(10));
    }

    #[test]
    fn get_string_returns_none_for_missing_or_blank_key() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = 100\nsymbol =\n")
                .unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("backtest", "symbol"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_missing_is_none() {
        let adapter = FileConfigAdapter::from_string("[strategy]\n").unwrap();
        assert_eq!(adapter.get_int("strategy", "grid_num").unwrap(), None);
    }

    #[test]
    fn get_int_non_numeric_is_invalid() {
        let adapter = FileConfigAdapter::from_string("[strategy]\ngrid_num = abc\n").unwrap();
        let err = adapter.get_int("strategy", "grid_num").unwrap_err();
        assert!(matches!(err, QuantsimError::ConfigInvalid { ref key, .. } if key == "grid_num"));
    }

    #[test]
    fn get_double_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = 100000.5\n").unwrap();
        assert_eq!(
            adapter.get_double("backtest", "initial_capital").unwrap(),
            Some(100000.5)
        );
    }

    #[test]
    fn get_double_non_numeric_is_invalid() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ncommission = 0.0o1\n").unwrap();
        assert!(adapter.get_double("backtest", "commission").is_err());
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[sweep]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        for key in ["a", "b", "c"] {
            assert_eq!(adapter.get_bool("sweep", key).unwrap(), Some(true));
        }
        for key in ["d", "e", "f"] {
            assert_eq!(adapter.get_bool("sweep", key).unwrap(), Some(false));
        }
        assert_eq!(adapter.get_bool("sweep", "missing").unwrap(), None);
    }

    #[test]
    fn get_bool_rejects_garbage() {
        let adapter = FileConfigAdapter::from_string("[sweep]\nparallel = maybe\n").unwrap();
        assert!(adapter.get_bool("sweep", "parallel").is_err());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[logging]\nlevel = debug\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("logging", "level"),
            Some("debug".to_string())
        );
    }

    #[test]
    fn from_file_returns_parse_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(QuantsimError::ConfigParse { .. })));
    }
}
