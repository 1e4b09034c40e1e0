//! Layer rules: mapping CAD layer names to machining operations
//!
//! CAD files encode machining intent in layer names. Rather than re-parsing
//! those strings wherever they are needed, a layer name is resolved once into
//! a typed [`OperationKind`]:
//!
//! - configured [`LayerRule`]s are tried first, matched on the normalized
//!   (trimmed, upper-case) name or, when written `re:<regex>`, by regex;
//! - then the built-in conventions `HOLE_<diameter>_<depth>` and
//!   `SLOT_<width>_<depth>`, where `-` stands in for the decimal point;
//! - then the contour layers `borda_externa` and `contorno`.
//!
//! Anything else resolves to [`OperationKind::Ignore`].

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Layer names that carry a part's outer contour
pub const CONTOUR_LAYERS: [&str; 2] = ["BORDA_EXTERNA", "CONTORNO"];

const REGEX_PREFIX: &str = "re:";

/// Operation encoded by a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
    Hole { diameter: f64, depth: f64 },
    Slot { width: f64, depth: f64 },
    Contour,
    /// Decorative or reference layer
    Ignore,
}

/// Configured mapping from a layer pattern to an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRule {
    /// Layer name, or `re:<regex>` matched against the normalized name
    pub pattern: String,
    pub kind: OperationKind,
    /// Overrides the depth carried by `kind`
    #[serde(default)]
    pub depth: Option<f64>,
    /// Tool code that must serve this layer
    #[serde(default)]
    pub tool: Option<String>,
}

/// Result of resolving a layer name
#[derive(Debug, Clone, PartialEq)]
pub struct LayerMatch {
    pub kind: OperationKind,
    pub tool: Option<String>,
}

impl LayerMatch {
    fn ignored() -> Self {
        Self {
            kind: OperationKind::Ignore,
            tool: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Pattern(Regex),
}

impl Matcher {
    fn matches(&self, normalized: &str) -> bool {
        match self {
            Self::Exact(name) => name == normalized,
            Self::Pattern(re) => re.is_match(normalized),
        }
    }
}

/// Compiled layer rules
#[derive(Debug, Clone, Default)]
pub struct LayerRuleSet {
    rules: Vec<(Matcher, LayerRule)>,
}

impl LayerRuleSet {
    /// Compile configured rules; regex patterns are validated here
    pub fn new(rules: &[LayerRule]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let matcher = match rule.pattern.strip_prefix(REGEX_PREFIX) {
                // Layer names are upper-cased before matching
                Some(expr) => Matcher::Pattern(Regex::new(&format!("(?i){expr}")).map_err(|e| {
                    Error::InvalidLayerRule {
                        pattern: rule.pattern.clone(),
                        reason: e.to_string(),
                    }
                })?),
                None => Matcher::Exact(normalize_layer_name(&rule.pattern)),
            };
            compiled.push((matcher, rule.clone()));
        }
        Ok(Self { rules: compiled })
    }

    /// Resolve a layer name to its operation kind
    pub fn resolve(&self, layer: &str) -> LayerMatch {
        let normalized = normalize_layer_name(layer);

        if let Some((_, rule)) = self.rules.iter().find(|(m, _)| m.matches(&normalized)) {
            let kind = match (&rule.kind, rule.depth) {
                (OperationKind::Hole { diameter, .. }, Some(depth)) => OperationKind::Hole {
                    diameter: *diameter,
                    depth,
                },
                (OperationKind::Slot { width, .. }, Some(depth)) => OperationKind::Slot {
                    width: *width,
                    depth,
                },
                (kind, _) => kind.clone(),
            };
            return LayerMatch {
                kind,
                tool: rule.tool.clone(),
            };
        }

        parse_convention(&normalized).map_or_else(LayerMatch::ignored, |kind| LayerMatch {
            kind,
            tool: None,
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Per-job memo of resolved layer names
#[derive(Debug)]
pub struct LayerResolver<'a> {
    rules: &'a LayerRuleSet,
    cache: HashMap<String, LayerMatch>,
}

impl<'a> LayerResolver<'a> {
    pub fn new(rules: &'a LayerRuleSet) -> Self {
        Self {
            rules,
            cache: HashMap::new(),
        }
    }

    /// Resolve a layer, parsing each distinct name at most once
    pub fn resolve(&mut self, layer: &str) -> &LayerMatch {
        let rules = self.rules;
        self.cache
            .entry(normalize_layer_name(layer))
            .or_insert_with(|| rules.resolve(layer))
    }
}

/// Trim and upper-case a layer name
pub fn normalize_layer_name(layer: &str) -> String {
    layer.trim().to_uppercase()
}

/// Whether the layer carries the part's outer contour
pub fn is_contour_layer(layer: &str) -> bool {
    let normalized = normalize_layer_name(layer);
    CONTOUR_LAYERS.contains(&normalized.as_str())
}

fn convention_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(HOLE|SLOT)_(\d+(?:[-.]\d+)?)_(\d+(?:[-.]\d+)?)$").ok())
        .as_ref()
}

/// Parse a number written with `-` in place of the decimal point
fn parse_layer_number(text: &str) -> Option<f64> {
    text.replace('-', ".").parse::<f64>().ok()
}

fn parse_convention(normalized: &str) -> Option<OperationKind> {
    if CONTOUR_LAYERS.contains(&normalized) {
        return Some(OperationKind::Contour);
    }
    let caps = convention_regex()?.captures(normalized)?;
    let size = parse_layer_number(&caps[2])?;
    let depth = parse_layer_number(&caps[3])?;
    match &caps[1] {
        "HOLE" => Some(OperationKind::Hole {
            diameter: size,
            depth,
        }),
        "SLOT" => Some(OperationKind::Slot { width: size, depth }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hole_layer_with_escaped_decimals() {
        let rules = LayerRuleSet::default();
        assert_eq!(
            rules.resolve("HOLE_8-0_12-5").kind,
            OperationKind::Hole {
                diameter: 8.0,
                depth: 12.5
            }
        );
        assert_eq!(
            rules.resolve("slot_50_10").kind,
            OperationKind::Slot {
                width: 50.0,
                depth: 10.0
            }
        );
    }

    #[test]
    fn test_contour_and_unknown_layers() {
        let rules = LayerRuleSet::default();
        assert_eq!(rules.resolve("Borda_Externa").kind, OperationKind::Contour);
        assert_eq!(rules.resolve("contorno").kind, OperationKind::Contour);
        assert_eq!(rules.resolve("COTAS").kind, OperationKind::Ignore);
        assert_eq!(rules.resolve("HOLE_8").kind, OperationKind::Ignore);
    }

    #[test]
    fn test_configured_rules_take_precedence() {
        let rules = LayerRuleSet::new(&[
            LayerRule {
                pattern: "hole_8_12".to_string(),
                kind: OperationKind::Hole {
                    diameter: 8.0,
                    depth: 12.0,
                },
                depth: Some(13.0),
                tool: Some("2".to_string()),
            },
            LayerRule {
                pattern: "re:^CAVILHA.*".to_string(),
                kind: OperationKind::Hole {
                    diameter: 8.0,
                    depth: 30.0,
                },
                depth: None,
                tool: None,
            },
        ])
        .expect("rules compile");

        let m = rules.resolve("HOLE_8_12");
        assert_eq!(
            m.kind,
            OperationKind::Hole {
                diameter: 8.0,
                depth: 13.0
            }
        );
        assert_eq!(m.tool.as_deref(), Some("2"));
        assert!(matches!(
            rules.resolve("cavilha_lateral").kind,
            OperationKind::Hole { depth, .. } if depth == 30.0
        ));
    }

    #[test]
    fn test_regex_rules_ignore_case() {
        let rules = LayerRuleSet::new(&[LayerRule {
            pattern: "re:^cavilha_\\d+".to_string(),
            kind: OperationKind::Hole {
                diameter: 8.0,
                depth: 30.0,
            },
            depth: None,
            tool: None,
        }])
        .expect("rules compile");

        assert!(matches!(rules.resolve("Cavilha_8").kind, OperationKind::Hole { .. }));
        assert_eq!(rules.resolve("cavilha").kind, OperationKind::Ignore);
    }

    #[test]
    fn test_invalid_regex_rule_is_rejected() {
        let result = LayerRuleSet::new(&[LayerRule {
            pattern: "re:(".to_string(),
            kind: OperationKind::Ignore,
            depth: None,
            tool: None,
        }]);
        assert!(matches!(result, Err(Error::InvalidLayerRule { .. })));
    }

    #[test]
    fn test_resolver_memoizes() {
        let rules = LayerRuleSet::default();
        let mut resolver = LayerResolver::new(&rules);
        let first = resolver.resolve("hole_5_10").clone();
        let second = resolver.resolve(" HOLE_5_10 ").clone();
        assert_eq!(first, second);
        assert_eq!(resolver.cache.len(), 1);
    }
}
