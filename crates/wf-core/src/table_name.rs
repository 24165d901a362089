//! Strongly-typed warehouse table name.

use crate::newtype_string::define_newtype_string;
use crate::sql_utils::quote_qualified;

define_newtype_string! {
    /// A possibly schema-qualified warehouse table name (`songplays`,
    /// `staging.events`).
    pub struct TableName;
}

impl TableName {
    /// The name quoted for direct interpolation into SQL.
    pub fn quoted(&self) -> String {
        quote_qualified(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_qualified_name() {
        assert_eq!(TableName::new("staging.events").quoted(), r#""staging"."events""#);
    }

    #[test]
    fn test_quoted_reserved_word() {
        assert_eq!(TableName::new("time").quoted(), r#""time""#);
    }
}
