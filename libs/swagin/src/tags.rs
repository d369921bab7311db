//! Parser for Go-style struct tag strings such as
//! `json:"name,omitempty" binding:"required" description:"User name"`.
//!
//! Field metadata is declared with this vocabulary so the same string drives
//! both schema derivation and request binding.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("empty struct tag key at byte {offset}")]
    EmptyKey { offset: usize },
    #[error("struct tag key `{key}` is not followed by `:`")]
    MissingColon { key: String },
    #[error("value of struct tag `{key}` must be double quoted")]
    MissingQuote { key: String },
    #[error("value of struct tag `{key}` is not terminated")]
    Unterminated { key: String },
    #[error("invalid rule `{token}` in struct tag `{key}`")]
    InvalidRule { key: String, token: String },
}

/// One `key:"value"` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    /// Value up to the first comma.
    pub fn name(&self) -> &str {
        self.value.split(',').next().unwrap_or_default()
    }

    /// Comma separated pieces after the name.
    pub fn options(&self) -> impl Iterator<Item = &str> {
        self.value.split(',').skip(1)
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options().any(|o| o == option)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn parse(raw: &str) -> Result<Self, TagError> {
        let mut tags = Vec::new();
        let mut chars = raw.char_indices().peekable();

        loop {
            while chars.next_if(|&(_, c)| c == ' ').is_some() {}
            let Some(&(start, _)) = chars.peek() else {
                break;
            };

            let mut end = start;
            while let Some((i, c)) =
                chars.next_if(|&(_, c)| c > ' ' && c != ':' && c != '"' && c != '\u{7f}')
            {
                end = i + c.len_utf8();
            }
            let key = &raw[start..end];
            if key.is_empty() {
                return Err(TagError::EmptyKey { offset: start });
            }

            if chars.next_if(|&(_, c)| c == ':').is_none() {
                return Err(TagError::MissingColon { key: key.to_owned() });
            }
            if chars.next_if(|&(_, c)| c == '"').is_none() {
                return Err(TagError::MissingQuote { key: key.to_owned() });
            }

            let mut value = String::new();
            loop {
                match chars.next() {
                    None => return Err(TagError::Unterminated { key: key.to_owned() }),
                    Some((_, '"')) => break,
                    Some((_, '\\')) => match chars.next() {
                        Some((_, 'n')) => value.push('\n'),
                        Some((_, 't')) => value.push('\t'),
                        Some((_, 'r')) => value.push('\r'),
                        Some((_, '"')) => value.push('"'),
                        Some((_, '\\')) => value.push('\\'),
                        // Unknown escapes stay verbatim so regex classes like \d survive.
                        Some((_, other)) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => return Err(TagError::Unterminated { key: key.to_owned() }),
                    },
                    Some((_, c)) => value.push(c),
                }
            }

            tags.push(Tag {
                key: key.to_owned(),
                value,
            });
        }

        Ok(Self(tags))
    }

    /// First tag with the given key.
    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.0.iter().find(|t| t.key == key)
    }

    /// Full value of a tag, commas included.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).map(|t| t.value.as_str())
    }

    /// Name part of a tag, `None` when absent or empty.
    pub fn name(&self, key: &str) -> Option<&str> {
        self.get(key).map(Tag::name).filter(|n| !n.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key under which the field appears in JSON documents and schemas.
    /// `None` when the field has no `json` tag or is excluded with `-`.
    pub fn json_name(&self) -> Option<&str> {
        self.name("json").filter(|n| *n != "-")
    }

    pub fn binding_required(&self) -> bool {
        self.get("binding")
            .map(|t| t.name() == "required" || t.has_option("required"))
            .unwrap_or(false)
    }
}
