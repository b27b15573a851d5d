//! Strongly typed user identifier accepted from either JSON strings or integers.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("User identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("User identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier exceeded the allowed character count.
	#[error("User identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Identifier of the authenticated dashboard user.
///
/// The auth backend emits numeric primary keys while persisted sessions store strings, so both
/// JSON representations deserialize into the same value.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct UserId(String);
impl UserId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for UserId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for UserId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for UserId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<UserId> for String {
	fn from(value: UserId) -> Self {
		value.0
	}
}
impl From<u64> for UserId {
	fn from(value: u64) -> Self {
		Self(value.to_string())
	}
}
impl<'de> Deserialize<'de> for UserId {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		match RawUserId::deserialize(deserializer)? {
			RawUserId::Number(number) => Ok(Self::from(number)),
			RawUserId::Text(text) => Self::new(text).map_err(serde::de::Error::custom),
		}
	}
}
impl Debug for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "User({})", self.0)
	}
}
impl Display for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for UserId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserId {
	Number(u64),
	Text(String),
}

fn validate_view(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace);
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn numeric_and_string_ids_converge() {
		let numeric: UserId = serde_json::from_str("42").expect("Numeric id should deserialize.");
		let text: UserId = serde_json::from_str("\"42\"").expect("String id should deserialize.");

		assert_eq!(numeric, text);
		assert_eq!(serde_json::to_string(&numeric).expect("Id should serialize."), "\"42\"");
	}

	#[test]
	fn invalid_ids_are_rejected() {
		assert_eq!(UserId::new(""), Err(IdentifierError::Empty));
		assert_eq!(UserId::new("user 1"), Err(IdentifierError::ContainsWhitespace));
		assert!(serde_json::from_str::<UserId>("\"\"").is_err());
		assert!(serde_json::from_str::<UserId>("-3").is_err());

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert_eq!(UserId::new(&too_long), Err(IdentifierError::TooLong { max: IDENTIFIER_MAX_LEN }));
	}
}
