//! Custom `Deserialize` implementations for the rule YAML surface's polymorphic forms.
//!
//! Two shapes need hand-written logic rather than a derive:
//! - `RulePattern` accepts a bare string shorthand (`pattern: "foo($X)"`) in addition to the
//!   structured object form.
//! - `PatternFilter` is a tagged sum whose variant is inferred from which keys are present
//!   (`not`, `either`, `detection`, `regex`, ...), not from an explicit discriminant tag. It
//!   also accepts the legacy `contains: bool` flag as an alternate spelling of a Reference
//!   filter's `scope`.
//!
//! Strategy for both: deserialize into a generic [`serde_yaml::Value`] first, inspect its
//! shape, then redeserialize the relevant sub-value into the concrete target type via
//! `serde_yaml::from_value`. This mirrors the "try strict schema first, then shorthand form;
//! reject if both fail" approach called for by the data model.

use super::model::{PatternFilter, ReferenceFilter, RulePattern};
use serde::de::{self, Deserialize, Deserializer};
use serde_yaml::Value;

impl<'de> Deserialize<'de> for RulePattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(pattern) => Ok(RulePattern {
                pattern,
                focus: None,
                filters: Vec::new(),
            }),
            other => {
                #[derive(serde::Deserialize)]
                #[serde(deny_unknown_fields)]
                struct Structured {
                    pattern: String,
                    #[serde(default)]
                    focus: Option<crate::types::MetaVarName>,
                    #[serde(default)]
                    filters: Vec<PatternFilter>,
                }
                let structured: Structured =
                    serde_yaml::from_value(other).map_err(de::Error::custom)?;
                Ok(RulePattern {
                    pattern: structured.pattern,
                    focus: structured.focus,
                    filters: structured.filters,
                })
            }
        }
    }
}

impl<'de> Deserialize<'de> for PatternFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let mapping = value.as_mapping().ok_or_else(|| {
            de::Error::custom("expected a filter object with one of: not, either, detection, \
                regex, string_regex, values, less_than, less_than_or_equal, greater_than, \
                greater_than_or_equal, length_less_than, filename_regex")
        })?;

        let has_key = |key: &str| mapping.keys().any(|k| k.as_str() == Some(key));

        if has_key("not") {
            #[derive(serde::Deserialize)]
            struct NotShape {
                not: PatternFilter,
            }
            let shape: NotShape = serde_yaml::from_value(value).map_err(de::Error::custom)?;
            return Ok(PatternFilter::Not(Box::new(shape.not)));
        }
        if has_key("either") {
            #[derive(serde::Deserialize)]
            struct EitherShape {
                either: Vec<PatternFilter>,
            }
            let shape: EitherShape = serde_yaml::from_value(value).map_err(de::Error::custom)?;
            return Ok(PatternFilter::Either(shape.either));
        }
        if has_key("detection") {
            let resolved = resolve_legacy_contains(mapping)?;
            let reference: ReferenceFilter =
                serde_yaml::from_value(resolved).map_err(de::Error::custom)?;
            return Ok(PatternFilter::Reference(reference));
        }
        if has_key("filename_regex") {
            #[derive(serde::Deserialize)]
            #[serde(deny_unknown_fields)]
            struct Shape {
                filename_regex: String,
            }
            let shape: Shape = serde_yaml::from_value(value).map_err(de::Error::custom)?;
            return Ok(PatternFilter::FilenameRegex { filename_regex: shape.filename_regex });
        }
        if has_key("regex") {
            return deny_unknown(value, |s: RegexShape| PatternFilter::Regex {
                variable: s.variable,
                regex: s.regex,
            });
        }
        if has_key("string_regex") {
            return deny_unknown(value, |s: StringRegexShape| PatternFilter::StringRegex {
                variable: s.variable,
                string_regex: s.string_regex,
            });
        }
        if has_key("values") {
            return deny_unknown(value, |s: ValuesShape| PatternFilter::Values {
                variable: s.variable,
                values: s.values,
            });
        }
        if has_key("less_than") {
            return deny_unknown(value, |s: LessThanShape| PatternFilter::LessThan {
                variable: s.variable,
                less_than: s.less_than,
            });
        }
        if has_key("less_than_or_equal") {
            return deny_unknown(value, |s: LessThanOrEqualShape| PatternFilter::LessThanOrEqual {
                variable: s.variable,
                less_than_or_equal: s.less_than_or_equal,
            });
        }
        if has_key("greater_than") {
            return deny_unknown(value, |s: GreaterThanShape| PatternFilter::GreaterThan {
                variable: s.variable,
                greater_than: s.greater_than,
            });
        }
        if has_key("greater_than_or_equal") {
            return deny_unknown(value, |s: GreaterThanOrEqualShape| {
                PatternFilter::GreaterThanOrEqual {
                    variable: s.variable,
                    greater_than_or_equal: s.greater_than_or_equal,
                }
            });
        }
        if has_key("length_less_than") {
            return deny_unknown(value, |s: LengthLessThanShape| PatternFilter::LengthLessThan {
                variable: s.variable,
                length_less_than: s.length_less_than,
            });
        }

        Err(de::Error::custom("unrecognized filter shape: no known key present"))
    }
}

fn deny_unknown<'de, D, S, F>(value: Value, build: F) -> Result<PatternFilter, D::Error>
where
    D: Deserializer<'de>,
    S: serde::de::DeserializeOwned,
    F: FnOnce(S) -> PatternFilter,
{
    let shape: S = serde_yaml::from_value(value).map_err(de::Error::custom)?;
    Ok(build(shape))
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RegexShape {
    variable: crate::types::MetaVarName,
    regex: String,
}
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct StringRegexShape {
    variable: crate::types::MetaVarName,
    string_regex: String,
}
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ValuesShape {
    variable: crate::types::MetaVarName,
    values: Vec<String>,
}
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct LessThanShape {
    variable: crate::types::MetaVarName,
    less_than: f64,
}
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct LessThanOrEqualShape {
    variable: crate::types::MetaVarName,
    less_than_or_equal: f64,
}
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct GreaterThanShape {
    variable: crate::types::MetaVarName,
    greater_than: f64,
}
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct GreaterThanOrEqualShape {
    variable: crate::types::MetaVarName,
    greater_than_or_equal: f64,
}
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct LengthLessThanShape {
    variable: crate::types::MetaVarName,
    length_less_than: usize,
}

/// Rewrites a Reference filter's mapping so that a legacy `contains: bool` key becomes an
/// explicit `scope` key, per the rule: `contains: false` => `cursor`, `contains: true` or
/// absent => `nested`. If `scope` is already present, `contains` is ignored (new rules should
/// use `scope` directly); rejects the case of both keys present with a visible value, since
/// that almost always indicates a rule author's mistake... except we choose to let an explicit
/// `scope` win silently, matching "New rules should use `scope` directly" rather than erroring,
/// since the data model does not call this combination out as invalid.
fn resolve_legacy_contains<E: de::Error>(mapping: &serde_yaml::Mapping) -> Result<Value, E> {
    let mut mapping = mapping.clone();
    let has_scope = mapping.keys().any(|k| k.as_str() == Some("scope"));
    let contains_value = mapping
        .iter()
        .find(|(k, _)| k.as_str() == Some("contains"))
        .map(|(_, v)| v.clone());

    if !has_scope {
        if let Some(contains) = contains_value {
            let contains = contains
                .as_bool()
                .ok_or_else(|| de::Error::custom("`contains` must be a boolean"))?;
            let scope = if contains { "nested" } else { "cursor" };
            mapping.insert(Value::String("scope".to_string()), Value::String(scope.to_string()));
        }
    }
    mapping.remove(&Value::String("contains".to_string()));
    Ok(Value::Mapping(mapping))
}
