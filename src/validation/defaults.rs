use super::ValidationRule;

const SIMPLE_XSS: &str = r"(?is).*(<|%3C)\s*(/|%2F)*\s*[a-z0-9%]+\s*(>|%3E).*";
const IMG_XSS: &str = r"(?is).*(<|%3C)\s*(i|%69|%49)(m|%6D|%4D)(g|%67|%47)[^\n]+(>|%3E).*";
const SCRIPT_XSS: &str = r"(?is).*(<|%3C)\s*script.*|.*javascript\s*:.*";

/// Returns the built-in reject rules applied to editable parameters.
pub fn default_rules() -> Vec<ValidationRule> {
    [
        ("simpleXSS", SIMPLE_XSS),
        ("imgXSS", IMG_XSS),
        ("scriptXSS", SCRIPT_XSS),
    ]
    .into_iter()
    .map(|(name, pattern)| ValidationRule::new(name).rejecting(pattern).into_default())
    .collect()
}
