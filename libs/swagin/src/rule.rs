//! The `rule` tag mini-language: `rule:"regexp=^\d+$,nonzero,min=1"`.

use crate::tags::{Tag, TagError};

/// Typed constraints extracted from a `rule` tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rules {
    pub pattern: Option<String>,
    pub required: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl Rules {
    /// Tokens are searched in the tag name first, then each option in order.
    pub fn parse(tag: &Tag) -> Result<Self, TagError> {
        let mut rules = Rules::default();
        let tokens = std::iter::once(tag.name()).chain(tag.options());

        for token in tokens.map(str::trim) {
            if let Some(pattern) = token.strip_prefix("regexp=") {
                if rules.pattern.is_none() {
                    rules.pattern = Some(pattern.to_owned());
                }
            } else if token == "nonnil" || token == "nonzero" {
                rules.required = true;
            } else if let Some(min) = token.strip_prefix("min=") {
                rules.minimum.get_or_insert(bound(tag, token, min)?);
            } else if let Some(max) = token.strip_prefix("max=") {
                rules.maximum.get_or_insert(bound(tag, token, max)?);
            }
        }

        Ok(rules)
    }
}

fn bound(tag: &Tag, token: &str, raw: &str) -> Result<f64, TagError> {
    raw.parse::<f64>().map_err(|_| TagError::InvalidRule {
        key: tag.key.clone(),
        token: token.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Tags;

    fn rules(raw: &str) -> Rules {
        let tags = Tags::parse(raw).unwrap();
        Rules::parse(tags.get("rule").unwrap()).unwrap()
    }

    #[test]
    fn regexp_in_primary_value() {
        let r = rules(r#"rule:"regexp=^\d+$""#);
        assert_eq!(r.pattern.as_deref(), Some(r"^\d+$"));
        assert!(!r.required);
    }

    #[test]
    fn regexp_in_option() {
        let r = rules(r#"rule:"nonzero,regexp=^[a-z]+$""#);
        assert_eq!(r.pattern.as_deref(), Some("^[a-z]+$"));
        assert!(r.required);
    }

    #[test]
    fn first_regexp_wins() {
        let r = rules(r#"rule:"regexp=^a$,regexp=^b$""#);
        assert_eq!(r.pattern.as_deref(), Some("^a$"));
    }

    #[test]
    fn nonnil_and_nonzero_mark_required() {
        assert!(rules(r#"rule:"nonnil""#).required);
        assert!(rules(r#"rule:"nonzero""#).required);
        assert!(rules(r#"rule:"regexp=^x$,nonzero""#).required);
        assert!(!rules(r#"rule:"regexp=^x$""#).required);
    }

    #[test]
    fn numeric_bounds() {
        let r = rules(r#"rule:"min=1,max=99.5""#);
        assert_eq!(r.minimum, Some(1.0));
        assert_eq!(r.maximum, Some(99.5));
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        assert_eq!(rules(r#"rule:"len=3,uuid""#), Rules::default());
    }

    #[test]
    fn invalid_bound_is_an_error() {
        let tags = Tags::parse(r#"rule:"min=abc""#).unwrap();
        let err = Rules::parse(tags.get("rule").unwrap()).unwrap_err();
        assert_eq!(
            err,
            TagError::InvalidRule {
                key: "rule".into(),
                token: "min=abc".into()
            }
        );
    }
}
