#![forbid(unsafe_code)]

pub mod auth;
pub mod model;
pub mod policy;
pub mod properties;
pub mod reconcile;

pub mod ids {
    use serde::{Deserialize, Serialize};

    const MAX_ID_LEN: usize = 128;

    #[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
    pub enum IdError {
        #[error("{kind} id must not be empty")]
        Empty { kind: &'static str },
        #[error("{kind} id is too long")]
        TooLong { kind: &'static str },
        #[error("{kind} id must start with an ascii letter or digit")]
        InvalidFirstChar { kind: &'static str },
        #[error("{kind} id contains invalid char {ch:?} at {index}")]
        InvalidChar {
            kind: &'static str,
            ch: char,
            index: usize,
        },
        #[error("{kind} id must look like {prefix}NNN")]
        InvalidFormat {
            kind: &'static str,
            prefix: &'static str,
        },
    }

    fn validate_id(kind: &'static str, value: &str) -> Result<(), IdError> {
        if value.is_empty() {
            return Err(IdError::Empty { kind });
        }
        if value.len() > MAX_ID_LEN {
            return Err(IdError::TooLong { kind });
        }
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(IdError::Empty { kind });
        };
        if !first.is_ascii_alphanumeric() {
            return Err(IdError::InvalidFirstChar { kind });
        }
        for (index, ch) in value.chars().enumerate().skip(1) {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '/' | '-' | ':') {
                continue;
            }
            return Err(IdError::InvalidChar { kind, ch, index });
        }
        Ok(())
    }

    fn validate_sequenced_id(
        kind: &'static str,
        prefix: &'static str,
        value: &str,
    ) -> Result<(), IdError> {
        if value.is_empty() {
            return Err(IdError::Empty { kind });
        }
        let Some(digits) = value.strip_prefix(prefix) else {
            return Err(IdError::InvalidFormat { kind, prefix });
        };
        if digits.len() < 3 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(IdError::InvalidFormat { kind, prefix });
        }
        Ok(())
    }

    macro_rules! caller_id {
        ($name:ident, $kind:literal) => {
            #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(try_from = "String", into = "String")]
            pub struct $name(String);

            impl $name {
                pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
                    let value = value.into();
                    let value = value.trim().to_string();
                    validate_id($kind, &value)?;
                    Ok(Self(value))
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }

                pub fn into_string(self) -> String {
                    self.0
                }
            }

            impl TryFrom<String> for $name {
                type Error = IdError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    Self::try_new(value)
                }
            }

            impl From<$name> for String {
                fn from(value: $name) -> Self {
                    value.0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }
        };
    }

    macro_rules! sequenced_id {
        ($name:ident, $kind:literal, $prefix:literal) => {
            #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(try_from = "String", into = "String")]
            pub struct $name(String);

            impl $name {
                pub const PREFIX: &'static str = $prefix;

                pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
                    let value = value.into();
                    let value = value.trim().to_string();
                    validate_sequenced_id($kind, $prefix, &value)?;
                    Ok(Self(value))
                }

                pub fn from_seq(seq: i64) -> Self {
                    Self(format!("{}{seq:03}", $prefix))
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }

                pub fn into_string(self) -> String {
                    self.0
                }
            }

            impl TryFrom<String> for $name {
                type Error = IdError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    Self::try_new(value)
                }
            }

            impl From<$name> for String {
                fn from(value: $name) -> Self {
                    value.0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }
        };
    }

    caller_id!(ParticipantId, "participant");
    caller_id!(AgentId, "agent");
    caller_id!(GroupId, "group");
    caller_id!(ServiceTypeId, "service type");
    sequenced_id!(ServiceId, "service", "SVC-");
    sequenced_id!(JobId, "job", "JOB-");
}
