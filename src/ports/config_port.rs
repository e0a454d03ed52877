//! Configuration access port trait.

use crate::domain::error::IndiforgeError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Like [`get_string`](Self::get_string), but a missing or blank value is
    /// a [`IndiforgeError::ConfigMissing`].
    fn require_string(&self, section: &str, key: &str) -> Result<String, IndiforgeError> {
        self.get_string(section, key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| IndiforgeError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            })
    }
}
