//! Sort-column validation and `orderBy` parsing.
//!
//! Column names cannot be bound as query parameters, so the validated name is the
//! only user input ever concatenated into SQL.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    #[error("sort column `{column}` contains characters outside [A-Za-z0-9_]")]
    InjectionAttempt { column: String },
    #[error("invalid sort direction `{value}`")]
    InvalidDirection { value: String },
}

/// Return `column` unchanged when it is a plain identifier.
pub fn validate_sort_column(column: &str) -> Result<&str, OrderingError> {
    let lexically_safe = !column.is_empty()
        && column
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if lexically_safe {
        Ok(column)
    } else {
        Err(OrderingError::InjectionAttempt {
            column: column.to_string(),
        })
    }
}

/// Map externally visible sort keys to their storage column names.
pub type ColumnAliases = &'static [(&'static str, &'static str)];

pub const PRODUCT_COLUMN_ALIASES: ColumnAliases = &[];
pub const CATEGORY_COLUMN_ALIASES: ColumnAliases = &[("position", "pos")];

/// A requested ordering, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub column: String,
    pub ascending: bool,
}

impl SortOrder {
    /// Parse `column` or `column:asc|desc`. Without a direction the order is descending.
    ///
    /// Returns `Ok(None)` for an absent or empty value.
    pub fn parse(raw: Option<&str>, aliases: ColumnAliases) -> Result<Option<Self>, OrderingError> {
        let raw = match raw {
            None | Some("") => return Ok(None),
            Some(raw) => raw,
        };

        let mut parts = raw.split(':');
        let column = parts.next().unwrap_or_default();
        let ascending = match (parts.next(), parts.next()) {
            (None, _) => false,
            (Some(direction), None) => match direction {
                "asc" => true,
                "desc" => false,
                _ => {
                    return Err(OrderingError::InvalidDirection {
                        value: raw.to_string(),
                    });
                }
            },
            (Some(_), Some(_)) => {
                return Err(OrderingError::InvalidDirection {
                    value: raw.to_string(),
                });
            }
        };

        let column = aliases
            .iter()
            .find(|(external, _)| *external == column)
            .map(|(_, internal)| (*internal).to_string())
            .unwrap_or_else(|| column.to_string());

        Ok(Some(Self { column, ascending }))
    }

    pub fn direction_sql(&self) -> &'static str {
        if self.ascending { "ASC" } else { "DESC" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert_eq!(validate_sort_column("title").unwrap(), "title");
        assert_eq!(validate_sort_column("pos").unwrap(), "pos");
        assert_eq!(validate_sort_column("created_at").unwrap(), "created_at");
        assert_eq!(validate_sort_column("Col9").unwrap(), "Col9");
    }

    #[test]
    fn rejects_anything_outside_identifier_charset() {
        for column in [
            "title; DROP TABLE x",
            "title desc",
            "title--",
            "ti\"tle",
            "pos,id",
            "tïtle",
            "",
        ] {
            assert_eq!(
                validate_sort_column(column),
                Err(OrderingError::InjectionAttempt {
                    column: column.to_string()
                })
            );
        }
    }

    #[test]
    fn direction_defaults_to_descending() {
        let order = SortOrder::parse(Some("title"), PRODUCT_COLUMN_ALIASES)
            .unwrap()
            .unwrap();
        assert_eq!(order.column, "title");
        assert!(!order.ascending);
        assert_eq!(order.direction_sql(), "DESC");
    }

    #[test]
    fn explicit_direction_must_be_lowercase() {
        let order = SortOrder::parse(Some("price:asc"), PRODUCT_COLUMN_ALIASES)
            .unwrap()
            .unwrap();
        assert!(order.ascending);
        let order = SortOrder::parse(Some("price:desc"), PRODUCT_COLUMN_ALIASES)
            .unwrap()
            .unwrap();
        assert!(!order.ascending);
        assert!(matches!(
            SortOrder::parse(Some("price:ASC"), PRODUCT_COLUMN_ALIASES),
            Err(OrderingError::InvalidDirection { .. })
        ));
    }

    #[test]
    fn bad_direction_is_rejected() {
        assert!(matches!(
            SortOrder::parse(Some("price:sideways"), PRODUCT_COLUMN_ALIASES),
            Err(OrderingError::InvalidDirection { .. })
        ));
        assert!(matches!(
            SortOrder::parse(Some("price:asc:desc"), PRODUCT_COLUMN_ALIASES),
            Err(OrderingError::InvalidDirection { .. })
        ));
    }

    #[test]
    fn position_aliases_to_pos_for_categories_only() {
        let order = SortOrder::parse(Some("position:asc"), CATEGORY_COLUMN_ALIASES)
            .unwrap()
            .unwrap();
        assert_eq!(order.column, "pos");
        let order = SortOrder::parse(Some("position"), PRODUCT_COLUMN_ALIASES)
            .unwrap()
            .unwrap();
        assert_eq!(order.column, "position");
    }

    #[test]
    fn absent_order_is_none() {
        assert_eq!(SortOrder::parse(None, PRODUCT_COLUMN_ALIASES).unwrap(), None);
        assert_eq!(SortOrder::parse(Some(""), PRODUCT_COLUMN_ALIASES).unwrap(), None);
    }
}
