//! Token stream shared by the structural renderer and the linearizer.
//!
//! The renderer produces one [`Line`] per block-level construct. A line is a
//! tree: list items contribute nested [`TokenTree::Group`]s so that the
//! structure of the Markdown document survives until [`Line::flatten`] turns
//! it into the linear stream the linearizer walks.

/// A single rendering instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "value", rename_all = "snake_case"))]
pub enum Token {
    /// Literal text.
    Text(String),
    /// Style applied to the destination cell as a whole (`h1`, `hrule`, ...).
    CellStyle(String),
    /// Inline style consumed by the next text token.
    TextStyle(String),
    /// Opens a hyperlink; the next text token is its visible text.
    Link(String),
    /// Opens a nested list.
    ListStart {
        /// Whether items are numbered.
        ordered: bool,
    },
    /// Closes the innermost list.
    ListEnd,
    /// Starts one entry of the innermost list.
    ListItem,
    /// Soft boundary inside a block.
    LineBreak,
}

impl Token {
    /// Shorthand for [`Token::Text`].
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Shorthand for [`Token::CellStyle`].
    pub fn cell_style(name: impl Into<String>) -> Self {
        Self::CellStyle(name.into())
    }

    /// Shorthand for [`Token::TextStyle`].
    pub fn text_style(name: impl Into<String>) -> Self {
        Self::TextStyle(name.into())
    }

    /// Shorthand for [`Token::Link`].
    pub fn link(target: impl Into<String>) -> Self {
        Self::Link(target.into())
    }
}

/// A token or a nested sequence of tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenTree {
    Token(Token),
    Group(Vec<TokenTree>),
}

impl From<Token> for TokenTree {
    fn from(token: Token) -> Self {
        Self::Token(token)
    }
}

/// Tokens of one block-level construct.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Line(pub Vec<TokenTree>);

impl Line {
    /// Create an empty line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the line holds no tokens at all (nested groups included).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        fn empty(trees: &[TokenTree]) -> bool {
            trees.iter().all(|tree| match tree {
                TokenTree::Token(_) => false,
                TokenTree::Group(children) => empty(children),
            })
        }
        empty(&self.0)
    }

    /// Flatten nested groups depth-first, left to right.
    #[must_use]
    pub fn flatten(&self) -> Vec<Token> {
        let mut out = Vec::new();
        flatten_into(&self.0, &mut out);
        out
    }
}

impl From<Vec<Token>> for Line {
    fn from(tokens: Vec<Token>) -> Self {
        Self(tokens.into_iter().map(TokenTree::Token).collect())
    }
}

fn flatten_into(trees: &[TokenTree], out: &mut Vec<Token>) {
    for tree in trees {
        match tree {
            TokenTree::Token(token) => out.push(token.clone()),
            TokenTree::Group(children) => flatten_into(children, out),
        }
    }
}
