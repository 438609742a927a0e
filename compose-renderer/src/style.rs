//! Style compilation: class and element rules to inline styles.
//!
//! Web output converts every declaration 1:1. Email output filters each
//! declaration through the [`EmailCssPolicy`] table for the target platform,
//! so the platform rules can change without touching renderer code.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use compose_core::{ElementTag, ParsedStylesheet, StyleMap};
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Destination email service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailPlatform {
    /// Mailchimp.
    Mailchimp,
    /// SendGrid, whose design editor validates CSS strictly.
    Sendgrid,
    /// Any other provider.
    #[default]
    Generic,
}

impl EmailPlatform {
    /// Lowercase platform name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mailchimp => "mailchimp",
            Self::Sendgrid => "sendgrid",
            Self::Generic => "generic",
        }
    }

    /// Merge tag the platform replaces with the recipient's unsubscribe link.
    #[must_use]
    pub const fn unsubscribe_tag(self) -> &'static str {
        match self {
            Self::Mailchimp => "*|UNSUB|*",
            Self::Sendgrid => "{{{unsubscribe}}}",
            Self::Generic => "#",
        }
    }
}

impl fmt::Display for EmailPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mailchimp" => Ok(Self::Mailchimp),
            "sendgrid" => Ok(Self::Sendgrid),
            "generic" => Ok(Self::Generic),
            other => Err(format!(
                "unknown email platform '{other}' (expected mailchimp, sendgrid or generic)"
            )),
        }
    }
}

/// CSS restrictions for one email platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformRules {
    /// Properties dropped outright.
    pub denied_properties: Vec<String>,
    /// Property prefixes dropped outright, e.g. `-webkit-`.
    pub denied_prefixes: Vec<String>,
    /// Property values dropped, e.g. `display: flex`.
    pub denied_values: BTreeMap<String, Vec<String>>,
    /// Length units whose presence drops the declaration, e.g. `rem`.
    pub denied_units: Vec<String>,
    /// Remove `!important` instead of passing it through.
    pub strip_important: bool,
}

impl PlatformRules {
    /// Apply the rules to one declaration.
    ///
    /// Returns the value to emit, or `None` when the declaration is dropped.
    #[must_use]
    pub fn apply(&self, property: &str, value: &str) -> Option<String> {
        let property = property.trim().to_ascii_lowercase();
        let mut value = value.trim().to_string();

        if self.denied_properties.iter().any(|p| p.eq_ignore_ascii_case(&property))
            || self
                .denied_prefixes
                .iter()
                .any(|prefix| property.starts_with(&prefix.to_ascii_lowercase()))
        {
            return None;
        }

        if self.strip_important {
            if let Some(stripped) = strip_important(&value) {
                value = stripped;
            }
        }

        let bare = strip_important(&value).unwrap_or_else(|| value.clone());
        if self
            .denied_values
            .get(&property)
            .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(&bare)))
        {
            return None;
        }

        if self.denied_units.iter().any(|unit| uses_unit(&value, unit)) {
            return None;
        }

        (!value.is_empty()).then_some(value)
    }
}

/// Per-platform email CSS policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailCssPolicy {
    /// Mailchimp rules.
    pub mailchimp: PlatformRules,
    /// SendGrid rules.
    pub sendgrid: PlatformRules,
    /// Rules for any other provider.
    pub generic: PlatformRules,
}

impl Default for EmailCssPolicy {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();

        let baseline_properties = [
            "position",
            "z-index",
            "transition",
            "animation",
            "transform",
            "cursor",
            "pointer-events",
        ];
        let layout_values = BTreeMap::from([(
            "display".to_string(),
            strings(&["flex", "inline-flex", "grid", "inline-grid"]),
        )]);

        let generic = PlatformRules {
            denied_properties: strings(&baseline_properties),
            denied_prefixes: strings(&["-webkit-", "-moz-", "-ms-", "-o-"]),
            denied_values: layout_values.clone(),
            denied_units: Vec::new(),
            strip_important: false,
        };

        let mut sendgrid_properties = baseline_properties.to_vec();
        sendgrid_properties.extend([
            "box-shadow",
            "text-shadow",
            "filter",
            "backdrop-filter",
            "clip-path",
            "object-fit",
            "object-position",
            "float",
            "gap",
            "outline",
            "opacity",
        ]);
        let mut sendgrid_values = layout_values;
        sendgrid_values.insert(
            "display".to_string(),
            strings(&["flex", "inline-flex", "grid", "inline-grid", "contents"]),
        );
        sendgrid_values.insert("overflow".to_string(), strings(&["scroll", "auto"]));

        let sendgrid = PlatformRules {
            denied_properties: strings(&sendgrid_properties),
            denied_prefixes: strings(&[
                "-webkit-",
                "-moz-",
                "-ms-",
                "-o-",
                "grid-",
                "flex-",
                "animation-",
                "transition-",
            ]),
            denied_values: sendgrid_values,
            denied_units: strings(&["rem", "vh", "vw", "vmin", "vmax", "ch"]),
            strip_important: true,
        };

        Self {
            mailchimp: generic.clone(),
            sendgrid,
            generic,
        }
    }
}

impl EmailCssPolicy {
    /// Rules for a platform.
    #[must_use]
    pub fn rules(&self, platform: EmailPlatform) -> &PlatformRules {
        match platform {
            EmailPlatform::Mailchimp => &self.mailchimp,
            EmailPlatform::Sendgrid => &self.sendgrid,
            EmailPlatform::Generic => &self.generic,
        }
    }

    /// Parse a policy from JSON. Platforms missing from the JSON keep their
    /// default rules; a listed platform replaces its rules entirely.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a policy.
    pub fn from_json(json: &str) -> RenderResult<Self> {
        serde_json::from_str(json).map_err(|e| RenderError::Policy(e.to_string()))
    }

    /// Load a policy from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> RenderResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| RenderError::Policy(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}

/// Convert a class rule to inline styles for web output.
///
/// Every declared property is carried over unchanged.
#[must_use]
pub fn class_styles_to_inline(rule: &StyleMap) -> StyleMap {
    rule.iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(property, value)| (property.to_string(), value.trim().to_string()))
        .collect()
}

/// Convert a class rule to email-safe inline styles for `platform`.
#[must_use]
pub fn class_styles_to_email_inline(
    rule: &StyleMap,
    platform: EmailPlatform,
    policy: &EmailCssPolicy,
) -> StyleMap {
    let rules = policy.rules(platform);
    rule.iter()
        .filter_map(|(property, value)| match rules.apply(property, value) {
            Some(value) => Some((property.to_string(), value)),
            None => {
                tracing::debug!(
                    platform = %platform,
                    property = property,
                    value = value,
                    "dropping email declaration"
                );
                None
            }
        })
        .collect()
}

/// Where compiled styles end up.
#[derive(Debug, Clone, Copy)]
pub enum StyleTarget<'a> {
    /// Browser output; no filtering.
    Web,
    /// Email output filtered for a platform.
    Email {
        /// Destination platform.
        platform: EmailPlatform,
        /// Policy table.
        policy: &'a EmailCssPolicy,
    },
}

impl StyleTarget<'_> {
    /// Whether this is an email target.
    #[must_use]
    pub fn is_email(&self) -> bool {
        matches!(self, Self::Email { .. })
    }

    fn compile(&self, rule: &StyleMap) -> StyleMap {
        match self {
            Self::Web => class_styles_to_inline(rule),
            Self::Email { platform, policy } => class_styles_to_email_inline(rule, *platform, policy),
        }
    }
}

/// Default styles for a bare element tag, or an empty map.
#[must_use]
pub fn element_styles(
    tag: ElementTag,
    stylesheet: Option<&ParsedStylesheet>,
    target: StyleTarget<'_>,
) -> StyleMap {
    stylesheet
        .and_then(|sheet| sheet.element_rule(tag))
        .map(|rule| target.compile(rule))
        .unwrap_or_default()
}

/// Explicit styling context passed into every render.
///
/// Holds the resolved stylesheet, if styling is enabled, and the output
/// target. With no stylesheet every lookup yields an empty map and blocks
/// render with structural defaults only.
#[derive(Debug, Clone, Copy)]
pub struct StyleContext<'a> {
    stylesheet: Option<&'a ParsedStylesheet>,
    target: StyleTarget<'a>,
}

impl<'a> StyleContext<'a> {
    /// Context over a resolved stylesheet.
    #[must_use]
    pub fn new(stylesheet: Option<&'a ParsedStylesheet>, target: StyleTarget<'a>) -> Self {
        Self { stylesheet, target }
    }

    /// Context without any class-derived styles.
    #[must_use]
    pub fn unstyled(target: StyleTarget<'a>) -> Self {
        Self::new(None, target)
    }

    /// Output target.
    #[must_use]
    pub fn target(&self) -> StyleTarget<'a> {
        self.target
    }

    /// Whether output is email.
    #[must_use]
    pub fn is_email(&self) -> bool {
        self.target.is_email()
    }

    /// Whether a stylesheet is active.
    #[must_use]
    pub fn has_stylesheet(&self) -> bool {
        self.stylesheet.is_some()
    }

    /// Inline styles for a block's class, or an empty map.
    #[must_use]
    pub fn class_styles(&self, class_name: Option<&str>) -> StyleMap {
        match (self.stylesheet, class_name) {
            (Some(sheet), Some(class)) => sheet
                .class_rule(class)
                .map(|rule| self.target.compile(rule))
                .unwrap_or_default(),
            _ => StyleMap::new(),
        }
    }

    /// Element defaults for `tag`, or an empty map.
    #[must_use]
    pub fn element_styles(&self, tag: ElementTag) -> StyleMap {
        element_styles(tag, self.stylesheet, self.target)
    }

    /// Element defaults merged with class styles; the class wins.
    #[must_use]
    pub fn merged(&self, tag: ElementTag, class_name: Option<&str>) -> StyleMap {
        self.element_styles(tag)
            .merged(&self.class_styles(class_name))
    }

    /// Filter block-derived styles for the target.
    #[must_use]
    pub fn compile(&self, styles: &StyleMap) -> StyleMap {
        self.target.compile(styles)
    }
}

/// Whether `value` uses `unit` on a number, e.g. `1.5rem`.
fn uses_unit(value: &str, unit: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    let unit = unit.to_ascii_lowercase();
    lower.match_indices(&unit).any(|(index, _)| {
        let before = lower[..index].chars().next_back();
        let after = lower[index + unit.len()..].chars().next();
        before.is_some_and(|c| c.is_ascii_digit() || c == '.')
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

fn strip_important(value: &str) -> Option<String> {
    let trimmed = value.trim_end();
    let lower = trimmed.to_ascii_lowercase();
    lower
        .ends_with("!important")
        .then(|| trimmed[..trimmed.len() - "!important".len()].trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use compose_core::{parse_css, TextElement};

    #[test]
    fn test_class_styles_to_inline_is_one_to_one() {
        let rule = StyleMap::new()
            .with("color", "red")
            .with("display", "flex")
            .with("margin", "1rem");
        let inline = class_styles_to_inline(&rule);
        assert_eq!(inline, rule);
    }

    #[test]
    fn test_sendgrid_drops_unsupported() {
        let policy = EmailCssPolicy::default();
        let rule = StyleMap::new()
            .with("color", "red")
            .with("display", "flex")
            .with("box-shadow", "0 0 1px #000")
            .with("margin", "1rem")
            .with("font-weight", "bold !important")
            .with("-webkit-text-size-adjust", "100%");

        let inline = class_styles_to_email_inline(&rule, EmailPlatform::Sendgrid, &policy);

        assert_eq!(inline.get("color"), Some("red"));
        assert_eq!(inline.get("font-weight"), Some("bold"));
        assert_eq!(inline.get("display"), None);
        assert_eq!(inline.get("box-shadow"), None);
        assert_eq!(inline.get("margin"), None);
        assert_eq!(inline.get("-webkit-text-size-adjust"), None);
    }

    #[test]
    fn test_mailchimp_is_less_strict() {
        let policy = EmailCssPolicy::default();
        let rule = StyleMap::new()
            .with("box-shadow", "0 0 1px #000")
            .with("margin", "1rem")
            .with("position", "absolute");

        let inline = class_styles_to_email_inline(&rule, EmailPlatform::Mailchimp, &policy);

        assert_eq!(inline.get("box-shadow"), Some("0 0 1px #000"));
        assert_eq!(inline.get("margin"), Some("1rem"));
        assert_eq!(inline.get("position"), None);
    }

    #[test]
    fn test_policy_from_json_overrides_defaults() {
        let policy = EmailCssPolicy::from_json(
            r#"{ "generic": { "denied_properties": ["color"] } }"#,
        )
        .expect("should parse");
        let rule = StyleMap::new().with("color", "red").with("display", "flex");

        let inline = class_styles_to_email_inline(&rule, EmailPlatform::Generic, &policy);

        assert_eq!(inline.get("color"), None);
        assert_eq!(inline.get("display"), Some("flex"));
        assert_eq!(policy.sendgrid, EmailCssPolicy::default().sendgrid);
    }

    #[test]
    fn test_policy_from_invalid_json() {
        match EmailCssPolicy::from_json("[1, 2]") {
            Err(RenderError::Policy(_)) => {}
            other => panic!("Expected Policy error, got {other:?}"),
        }
    }

    #[test]
    fn test_uses_unit() {
        assert!(uses_unit("1.5rem", "rem"));
        assert!(uses_unit("0 2vh", "vh"));
        assert!(!uses_unit("remove", "rem"));
        assert!(!uses_unit("each", "ch"));
        assert!(!uses_unit("10px", "rem"));
    }

    #[test]
    fn test_element_styles_empty_without_rule() {
        let sheet = parse_css("h1 { color: blue; }");
        let styles = element_styles(
            ElementTag::Text(TextElement::P),
            Some(&sheet),
            StyleTarget::Web,
        );
        assert!(styles.is_empty());
        assert!(element_styles(ElementTag::Img, None, StyleTarget::Web).is_empty());
    }

    #[test]
    fn test_class_wins_over_element_default() {
        let sheet = parse_css("p { color: blue; margin: 0 } .lead { color: red }");
        let context = StyleContext::new(Some(&sheet), StyleTarget::Web);

        let merged = context.merged(ElementTag::Text(TextElement::P), Some("lead"));

        assert_eq!(merged.get("color"), Some("red"));
        assert_eq!(merged.get("margin"), Some("0"));
    }

    #[test]
    fn test_unstyled_context_yields_nothing() {
        let context = StyleContext::unstyled(StyleTarget::Web);
        assert!(context.class_styles(Some("lead")).is_empty());
        assert!(!context.has_stylesheet());
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!("SendGrid".parse::<EmailPlatform>(), Ok(EmailPlatform::Sendgrid));
        assert!("aol".parse::<EmailPlatform>().is_err());
        assert_eq!(EmailPlatform::Mailchimp.unsubscribe_tag(), "*|UNSUB|*");
    }
}
