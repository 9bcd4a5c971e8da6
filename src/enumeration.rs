//! Symbolic value sets bound to integer fields.

use std::sync::Arc;

use crate::errors::CompileError;

/// A named set of symbolic members, each mapped to a raw integer.
///
/// Enum fields store the raw integer; reads return the member name and
/// builds reject raw values outside the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    name: String,
    members: Vec<(String, i64)>,
}

impl EnumType {
    /// Creates an enum type. Fails if `members` is empty or repeats a name or value.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (S, i64)>,
    ) -> Result<Arc<Self>, CompileError> {
        let name = name.into();
        let members: Vec<(String, i64)> = members
            .into_iter()
            .map(|(member, value)| (member.into(), value))
            .collect();

        let repeats = members.iter().enumerate().any(|(i, (member, value))| {
            members[..i]
                .iter()
                .any(|(other, other_value)| other == member || other_value == value)
        });

        if members.is_empty() || repeats {
            return Err(CompileError::InvalidEnum(name));
        }

        Ok(Arc::new(Self { name, members }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in declaration order.
    pub fn members(&self) -> &[(String, i64)] {
        &self.members
    }

    /// Raw value of `member`.
    pub fn value_of(&self, member: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, value)| *value)
    }

    /// Member name for a raw value.
    pub fn member_of(&self, value: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, raw)| *raw == value)
            .map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, value: i64) -> bool {
        self.member_of(value).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let status = EnumType::new("Status", [("OK", 0), ("FAIL", 1)]).unwrap();
        assert_eq!(status.value_of("FAIL"), Some(1));
        assert_eq!(status.member_of(0), Some("OK"));
        assert_eq!(status.member_of(2), None);
        assert!(!status.contains(2));
    }

    #[test]
    fn test_empty_enum() {
        let members: Vec<(&str, i64)> = vec![];
        assert_eq!(
            EnumType::new("Empty", members).unwrap_err(),
            CompileError::InvalidEnum("Empty".to_string())
        );
    }

    #[test]
    fn test_repeated_value() {
        assert!(EnumType::new("Status", [("OK", 0), ("ALSO_OK", 0)]).is_err());
        assert!(EnumType::new("Status", [("OK", 0), ("OK", 1)]).is_err());
    }
}
