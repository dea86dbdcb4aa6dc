//! Built-in rules embedded at compile time via `include_str!`, gated per language behind cargo
//! features so a consumer only pays for the languages it enables.

#[cfg(feature = "lang-ruby")]
const RUBY_RULES: &[(&str, &str)] =
    &[("ruby/logging.yml", include_str!("../../built_in_rules/ruby/logging.yml"))];

#[cfg(feature = "lang-rust")]
const RUST_RULES: &[(&str, &str)] =
    &[("rust/logging.yml", include_str!("../../built_in_rules/rust/logging.yml"))];

#[cfg(feature = "lang-python")]
const PYTHON_RULES: &[(&str, &str)] =
    &[("python/logging.yml", include_str!("../../built_in_rules/python/logging.yml"))];

/// Version of the compiled-in rule set. Bumped whenever a built-in rule's id, pattern shape, or
/// trigger semantics changes in a way a caller pinning `LoaderConfig::required_version` would
/// need to know about.
pub const RULES_VERSION: &str = "1";

/// All embedded built-in rule sources, as `(source_path, yaml_text)`, for the languages enabled
/// by cargo features. Each entry is a full YAML document (a list of rules), matching the shape
/// accepted for an external rules directory.
pub fn sources() -> Vec<(&'static str, &'static str)> {
    let mut out = Vec::new();
    #[cfg(feature = "lang-ruby")]
    out.extend_from_slice(RUBY_RULES);
    #[cfg(feature = "lang-rust")]
    out.extend_from_slice(RUST_RULES);
    #[cfg(feature = "lang-python")]
    out.extend_from_slice(PYTHON_RULES);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_sources_parse_as_yaml_rule_lists() {
        for (path, text) in sources() {
            let parsed: Result<Vec<crate::rules::model::Rule>, _> = serde_yaml::from_str(text);
            assert!(parsed.is_ok(), "{path} failed to parse: {:?}", parsed.err());
        }
    }
}
