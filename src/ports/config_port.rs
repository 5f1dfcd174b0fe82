//! Configuration access port trait.
//!
//! Typed getters distinguish an absent key (`Ok(None)`) from one that is
//! present but unparseable (`Err(ConfigInvalid)`).

use crate::domain::error::QuantsimError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, QuantsimError>;
    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, QuantsimError>;
    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, QuantsimError>;
}
