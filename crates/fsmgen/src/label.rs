//! Transition labels and their attributes.

use crate::{grammar::GrammarKind, util::write_quoted};
use std::fmt;

/// The four independent flags carried by a symbol transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Attributes {
    /// Consume the symbol. A label without `read` is a zero-width lookahead.
    pub read: bool,
    /// Push the entered state onto the parse stack.
    pub stack: bool,
    /// Retain the token text.
    pub keep: bool,
    /// Build a tree node.
    pub node: bool,
}

impl Attributes {
    /// A pure lookahead label.
    pub const LOOK: Self = Self {
        read: false,
        stack: false,
        keep: false,
        node: false,
    };

    /// `read,keep,noStack,noNode`
    pub const SCANNER: Self = Self {
        read: true,
        stack: false,
        keep: true,
        node: false,
    };

    /// `read,noKeep,stack,noNode`
    pub const PARSER_TERMINAL: Self = Self {
        read: true,
        stack: true,
        keep: false,
        node: false,
    };

    /// `read,noKeep,stack,node`
    pub const PARSER_NONTERMINAL: Self = Self {
        read: true,
        stack: true,
        keep: false,
        node: true,
    };

    /// The default bundle for a symbol in a grammar of the given kind.
    pub fn default_for(kind: GrammarKind, is_nonterminal: bool) -> Self {
        match kind {
            GrammarKind::Scanner | GrammarKind::SuperScanner => Self::SCANNER,
            GrammarKind::Parser if is_nonterminal => Self::PARSER_NONTERMINAL,
            GrammarKind::Parser => Self::PARSER_TERMINAL,
        }
    }

    /// Fold the textual attribute vocabulary over `self`.
    ///
    /// Returns the name of the first unknown token on failure. An explicit
    /// `look` anywhere in the list yields [`Attributes::LOOK`].
    pub fn apply<'a, I>(self, tokens: I) -> Result<Self, &'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut attrs = self;
        let mut look = false;
        for token in tokens {
            match token {
                "read" => attrs.read = true,
                "look" => look = true,
                "stack" => attrs.stack = true,
                "noStack" => attrs.stack = false,
                "keep" => attrs.keep = true,
                "noKeep" => attrs.keep = false,
                "node" => attrs.node = true,
                "noNode" => attrs.node = false,
                unknown => return Err(unknown),
            }
        }
        Ok(if look { Self::LOOK } else { attrs })
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.read {
            return f.write_str("L");
        }
        f.write_str("R")?;
        if self.stack {
            f.write_str("S")?;
        }
        if self.keep {
            f.write_str("K")?;
        }
        if self.node {
            f.write_str("N")?;
        }
        Ok(())
    }
}

/// A parameter of a semantic action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionParam {
    Int(i64),
    Str(String),
}

impl fmt::Display for ActionParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write_quoted(f, s),
        }
    }
}

/// The label of an FSM transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    /// Matches one terminal or nonterminal, or looks at it without consuming.
    Symbol { name: String, attributes: Attributes },
    /// Fires a semantic action. Never consumes input.
    Action {
        name: String,
        params: Vec<ActionParam>,
        tree_building: bool,
    },
}

impl Label {
    pub fn symbol(name: impl Into<String>, attributes: Attributes) -> Self {
        Self::Symbol {
            name: name.into(),
            attributes,
        }
    }

    pub fn action(name: impl Into<String>, params: Vec<ActionParam>, tree_building: bool) -> Self {
        Self::Action {
            name: name.into(),
            params,
            tree_building,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Symbol { name, .. } | Self::Action { name, .. } => name,
        }
    }

    pub fn attributes(&self) -> Option<Attributes> {
        match self {
            Self::Symbol { attributes, .. } => Some(*attributes),
            Self::Action { .. } => None,
        }
    }

    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action { .. })
    }

    /// Whether traversing this label consumes input (and hence is visible on
    /// the parse stack).
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Symbol { attributes, .. } if attributes.read)
    }

    /// A zero-width lookahead label on the same symbol.
    pub fn as_look(&self) -> Self {
        Self::Symbol {
            name: self.name().to_owned(),
            attributes: Attributes::LOOK,
        }
    }

    /// The attribute string used by the table rows (`"L"` for actions).
    pub fn attribute_string(&self) -> String {
        self.attributes().unwrap_or(Attributes::LOOK).to_string()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol { name, attributes } => {
                write_quoted(f, name)?;
                write!(f, "/{}", attributes)
            }
            Self::Action { name, params, .. } => {
                write!(f, "{{{}:", name)?;
                for (i, param) in params.iter().enumerate() {
                    f.write_str(if i > 0 { ", " } else { " " })?;
                    write!(f, "{}", param)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bundles() {
        assert_eq!(
            Attributes::default_for(GrammarKind::Scanner, false).to_string(),
            "RK"
        );
        assert_eq!(
            Attributes::default_for(GrammarKind::Parser, false).to_string(),
            "RS"
        );
        assert_eq!(
            Attributes::default_for(GrammarKind::Parser, true).to_string(),
            "RSN"
        );
        assert_eq!(Attributes::LOOK.to_string(), "L");
    }

    #[test]
    fn apply_vocabulary() {
        let attrs = Attributes::PARSER_TERMINAL
            .apply(["noStack", "keep", "node"])
            .unwrap();
        assert_eq!(attrs.to_string(), "RKN");

        let look = Attributes::PARSER_NONTERMINAL
            .apply(["stack", "look", "keep"])
            .unwrap();
        assert_eq!(look, Attributes::LOOK);

        assert_eq!(Attributes::SCANNER.apply(["bogus"]), Err("bogus"));
    }

    #[test]
    fn look_strips_attributes() {
        let label = Label::symbol("a", Attributes::PARSER_TERMINAL);
        assert!(label.is_read());
        let look = label.as_look();
        assert!(!look.is_read());
        assert_eq!(look.name(), "a");
        assert_eq!(look.attribute_string(), "L");
    }
}
