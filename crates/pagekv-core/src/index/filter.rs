use crate::{config::IndexConfig, index::page::OPT_OUT_KEY};
use pagekv_utils::kebab_key;

///
/// KeyFilter
///
/// Decides which context keys get attribute indices. Exclusion wins over
/// inclusion; an empty include list admits everything not excluded. The
/// opt-out key itself is never indexed.
///

#[derive(Clone, Debug, Default)]
pub(crate) struct KeyFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl KeyFilter {
    pub(crate) fn from_config(config: &IndexConfig) -> Self {
        let config = config.clone().normalized();

        Self {
            include: config.include_keys,
            exclude: config.exclude_keys,
        }
    }

    pub(crate) fn admits(&self, key: &str) -> bool {
        let key = kebab_key(key);

        if key.is_empty() || key == OPT_OUT_KEY || self.exclude.contains(&key) {
            return false;
        }

        self.include.is_empty() || self.include.contains(&key)
    }
}
