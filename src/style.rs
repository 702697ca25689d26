//! Line, mark, color and scale kinds: a closed set of built-ins plus
//! user-registered definitions declared in a description's global section.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleCategory {
    Line,
    Mark,
    Color,
    Scale,
}

impl StyleCategory {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "line" => Some(Self::Line),
            "mark" => Some(Self::Mark),
            "color" => Some(Self::Color),
            "scale" => Some(Self::Scale),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Mark => "mark",
            Self::Color => "color",
            Self::Scale => "scale",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Solid,
    Dashed,
    Dotted,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
    None,
    Circle,
    Square,
    Triangle,
    Diamond,
    Cross,
    Star,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorKind {
    Black,
    Red,
    Green,
    Blue,
    Magenta,
    Cyan,
    Orange,
    Brown,
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleKind {
    Linear,
    Log,
    Category,
}

/// A kind registered at runtime: its name, the text shown to users and an
/// optional renderer-specific payload (e.g. a plotting-tool style code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStyle {
    pub category: StyleCategory,
    pub name: String,
    pub display: String,
    pub payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleKind {
    Line(LineKind),
    Mark(MarkKind),
    Color(ColorKind),
    Scale(ScaleKind),
    Custom(UserStyle),
}

impl StyleKind {
    pub fn name(&self) -> &str {
        match self {
            Self::Line(kind) => match kind {
                LineKind::Solid => "solid",
                LineKind::Dashed => "dashed",
                LineKind::Dotted => "dotted",
                LineKind::None => "none",
            },
            Self::Mark(kind) => match kind {
                MarkKind::None => "none",
                MarkKind::Circle => "circle",
                MarkKind::Square => "square",
                MarkKind::Triangle => "triangle",
                MarkKind::Diamond => "diamond",
                MarkKind::Cross => "cross",
                MarkKind::Star => "star",
            },
            Self::Color(kind) => match kind {
                ColorKind::Black => "black",
                ColorKind::Red => "red",
                ColorKind::Green => "green",
                ColorKind::Blue => "blue",
                ColorKind::Magenta => "magenta",
                ColorKind::Cyan => "cyan",
                ColorKind::Orange => "orange",
                ColorKind::Brown => "brown",
                ColorKind::Gray => "gray",
            },
            Self::Scale(kind) => match kind {
                ScaleKind::Linear => "linear",
                ScaleKind::Log => "log",
                ScaleKind::Category => "category",
            },
            Self::Custom(style) => &style.name,
        }
    }

    pub fn display(&self) -> &str {
        match self {
            Self::Custom(style) => &style.display,
            other => other.name(),
        }
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Custom(style) => style.payload.as_deref(),
            _ => None,
        }
    }

    /// Scale semantics; user-registered scales behave linearly.
    pub fn scale(&self) -> ScaleKind {
        match self {
            Self::Scale(kind) => *kind,
            _ => ScaleKind::Linear,
        }
    }
}

impl fmt::Display for StyleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const AUTO: &str = "auto";

#[derive(Debug, Clone)]
pub struct StyleRegistry {
    entries: BTreeMap<(StyleCategory, String), StyleKind>,
    cycles: BTreeMap<StyleCategory, Vec<StyleKind>>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        let lines = [LineKind::Solid, LineKind::Dashed, LineKind::Dotted, LineKind::None];
        let marks = [
            MarkKind::None,
            MarkKind::Circle,
            MarkKind::Square,
            MarkKind::Triangle,
            MarkKind::Diamond,
            MarkKind::Cross,
            MarkKind::Star,
        ];
        let colors = [
            ColorKind::Black,
            ColorKind::Red,
            ColorKind::Green,
            ColorKind::Blue,
            ColorKind::Magenta,
            ColorKind::Cyan,
            ColorKind::Orange,
            ColorKind::Brown,
            ColorKind::Gray,
        ];
        let scales = [ScaleKind::Linear, ScaleKind::Log, ScaleKind::Category];

        let mut registry = Self {
            entries: BTreeMap::new(),
            cycles: BTreeMap::new(),
        };
        for kind in lines {
            registry.insert(StyleCategory::Line, StyleKind::Line(kind));
        }
        for kind in marks {
            registry.insert(StyleCategory::Mark, StyleKind::Mark(kind));
        }
        for kind in colors {
            registry.insert(StyleCategory::Color, StyleKind::Color(kind));
        }
        for kind in scales {
            registry.insert(StyleCategory::Scale, StyleKind::Scale(kind));
        }

        registry.cycles.insert(
            StyleCategory::Line,
            vec![
                StyleKind::Line(LineKind::Solid),
                StyleKind::Line(LineKind::Dashed),
                StyleKind::Line(LineKind::Dotted),
            ],
        );
        registry.cycles.insert(
            StyleCategory::Mark,
            marks[1..].iter().copied().map(StyleKind::Mark).collect(),
        );
        registry.cycles.insert(
            StyleCategory::Color,
            colors.iter().copied().map(StyleKind::Color).collect(),
        );
        registry
    }
}

impl StyleRegistry {
    fn insert(&mut self, category: StyleCategory, kind: StyleKind) {
        self.entries
            .insert((category, kind.name().to_string()), kind);
    }

    /// Registers a user kind; redefining a built-in or an earlier user kind
    /// is rejected.
    pub fn register(&mut self, style: UserStyle) -> Result<(), String> {
        let name = style.name.trim().to_ascii_lowercase();
        if name.is_empty() || name == AUTO {
            return Err(format!("invalid {} kind name '{}'", style.category.as_str(), style.name));
        }
        let key = (style.category, name.clone());
        if self.entries.contains_key(&key) {
            return Err(format!("{} kind '{}' is already defined", style.category.as_str(), name));
        }
        self.entries.insert(key, StyleKind::Custom(UserStyle { name, ..style }));
        Ok(())
    }

    pub fn lookup(&self, category: StyleCategory, name: &str) -> Option<&StyleKind> {
        self.entries
            .get(&(category, name.trim().to_ascii_lowercase()))
    }

    /// Resolves a configured name, or picks the `index`-th entry of the
    /// category's auto cycle when the name is absent or `auto`.
    pub fn resolve(
        &self,
        category: StyleCategory,
        name: Option<&str>,
        index: usize,
    ) -> Result<StyleKind, String> {
        match name.map(str::trim) {
            Some(name) if !name.eq_ignore_ascii_case(AUTO) => self
                .lookup(category, name)
                .cloned()
                .ok_or_else(|| format!("unknown {} kind '{}'", category.as_str(), name)),
            _ => Ok(self.cycle(category, index)),
        }
    }

    pub fn cycle(&self, category: StyleCategory, index: usize) -> StyleKind {
        match self.cycles.get(&category) {
            Some(cycle) if !cycle.is_empty() => cycle[index % cycle.len()].clone(),
            _ => match category {
                StyleCategory::Scale => StyleKind::Scale(ScaleKind::Linear),
                StyleCategory::Line => StyleKind::Line(LineKind::Solid),
                StyleCategory::Mark => StyleKind::Mark(MarkKind::None),
                StyleCategory::Color => StyleKind::Color(ColorKind::Black),
            },
        }
    }

    pub fn is_known(&self, category: StyleCategory, name: &str) -> bool {
        name.trim().eq_ignore_ascii_case(AUTO) || self.lookup(category, name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_resolve_case_insensitively() {
        let registry = StyleRegistry::default();
        assert_eq!(
            registry.resolve(StyleCategory::Color, Some("Red"), 0),
            Ok(StyleKind::Color(ColorKind::Red))
        );
        assert!(registry.resolve(StyleCategory::Mark, Some("hexagon"), 0).is_err());
    }

    #[test]
    fn auto_cycles_through_builtins() {
        let registry = StyleRegistry::default();
        let first = registry.resolve(StyleCategory::Line, None, 0).expect("auto line");
        let fourth = registry.resolve(StyleCategory::Line, Some("auto"), 3).expect("auto line");
        assert_eq!(first, fourth);
        assert_eq!(
            registry.resolve(StyleCategory::Mark, None, 0),
            Ok(StyleKind::Mark(MarkKind::Circle))
        );
    }

    #[test]
    fn user_kinds_register_once() {
        let mut registry = StyleRegistry::default();
        let style = UserStyle {
            category: StyleCategory::Mark,
            name: "Hexagon".to_string(),
            display: "hexagon".to_string(),
            payload: Some("pt 14".to_string()),
        };
        registry.register(style.clone()).expect("first registration succeeds");
        assert!(registry.register(style).is_err());

        let kind = registry
            .resolve(StyleCategory::Mark, Some("hexagon"), 0)
            .expect("registered kind resolves");
        assert_eq!(kind.payload(), Some("pt 14"));
        assert!(registry.lookup(StyleCategory::Color, "hexagon").is_none());

        let builtin = UserStyle {
            category: StyleCategory::Color,
            name: "red".to_string(),
            display: "crimson".to_string(),
            payload: None,
        };
        assert!(registry.register(builtin).is_err());
    }
}
