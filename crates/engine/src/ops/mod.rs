use sea_orm::DatabaseConnection;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{EngineError, ResultEngine};

mod balances;
mod expenses;
mod groups;
mod members;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Duplicate-detection key for member names: NFKD, combining marks stripped,
/// lowercased, inner whitespace collapsed. "José " and "jose" collide.
fn normalize_member_key(value: &str) -> String {
    let decomposed: String = value
        .trim()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    let lowered = decomposed.to_lowercase();

    let mut key = String::with_capacity(lowered.len());
    let mut last_was_space = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !last_was_space && !key.is_empty() {
                key.push(' ');
            }
            last_was_space = true;
        } else {
            key.push(ch);
            last_was_space = false;
        }
    }
    key.trim_end().to_string()
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_keys_fold_case_accents_and_spacing() {
        assert_eq!(normalize_member_key("  José   Silva "), "jose silva");
        assert_eq!(normalize_member_key("JOSE SILVA"), "jose silva");
        assert_eq!(normalize_member_key("Åsa"), "asa");
        assert_eq!(normalize_member_key("   "), "");
    }
}
