//! Style names, format attributes, and the per-document style registry.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Separator used to build a registry cache key from style names.
const KEY_SEPARATOR: &str = "|";

/// Font used for inline code and code blocks.
pub const MONOSPACE_FONT: &str = "Courier";

/// Visual attributes a sink turns into its own format type.
///
/// Every field is optional so attribute sets can be merged: a later set
/// overrides an earlier one only where it has a value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FormatAttributes {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub strikeout: Option<bool>,
    pub font_name: Option<String>,
    pub font_size: Option<u16>,
}

impl FormatAttributes {
    /// Whether no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bold.is_none()
            && self.italic.is_none()
            && self.strikeout.is_none()
            && self.font_name.is_none()
            && self.font_size.is_none()
    }

    /// Shallow merge: values set in `other` win.
    #[must_use]
    pub fn merged_with(mut self, other: &Self) -> Self {
        if other.bold.is_some() {
            self.bold = other.bold;
        }
        if other.italic.is_some() {
            self.italic = other.italic;
        }
        if other.strikeout.is_some() {
            self.strikeout = other.strikeout;
        }
        if other.font_name.is_some() {
            self.font_name.clone_from(&other.font_name);
        }
        if other.font_size.is_some() {
            self.font_size = other.font_size;
        }
        self
    }

    /// Attributes registered for a style name.
    ///
    /// Unknown names have no attributes.
    #[must_use]
    pub fn for_style(name: &str) -> Self {
        let heading = |size| Self {
            font_size: Some(size),
            ..Self::default()
        };
        match name {
            "double_emphasis" => Self {
                bold: Some(true),
                ..Self::default()
            },
            "emphasis" => Self {
                italic: Some(true),
                ..Self::default()
            },
            "strikethrough" => Self {
                strikeout: Some(true),
                ..Self::default()
            },
            "codespan" => Self {
                font_name: Some(MONOSPACE_FONT.to_owned()),
                ..Self::default()
            },
            "h1" => heading(30),
            "h2" => heading(25),
            "h3" => heading(20),
            "h4" => heading(15),
            "h5" => heading(14),
            "h6" => heading(13),
            _ => Self::default(),
        }
    }
}

/// Ordered list of style names addressing one cached format.
///
/// Order is part of the identity: `["a", "b"]` and `["b", "a"]` are
/// distinct keys, and later names override earlier ones when merged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StyleKey(Vec<String>);

impl StyleKey {
    /// Build a key from style names, in order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Style names in this key.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Whether the key names no style.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merged attributes of all names, left to right.
    #[must_use]
    pub fn attributes(&self) -> FormatAttributes {
        self.0
            .iter()
            .fold(FormatAttributes::default(), |acc, name| {
                acc.merged_with(&FormatAttributes::for_style(name))
            })
    }

    fn cache_id(&self) -> String {
        self.0.join(KEY_SEPARATOR)
    }
}

impl fmt::Display for StyleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_id())
    }
}

/// Constructs sink-specific formats from attributes.
pub trait FormatFactory {
    /// The sink's format handle.
    type Format;

    /// Build a format. Called at most once per distinct style key.
    fn create_format(&mut self, attributes: &FormatAttributes) -> Self::Format;
}

/// Memoizing cache from [`StyleKey`] to format.
///
/// One registry belongs to one output document. Formats are shared through
/// [`Rc`], so the same key always yields the same instance and the registry
/// cannot leak into another thread's document build.
#[derive(Debug)]
pub struct StyleRegistry<F> {
    cache: HashMap<String, Option<Rc<F>>>,
    created: usize,
}

impl<F> StyleRegistry<F> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            created: 0,
        }
    }

    /// Return the format for `key`, building it on first use.
    ///
    /// Returns `None` when the key names no recognized style.
    pub fn resolve<S>(&mut self, key: &StyleKey, factory: &mut S) -> Option<Rc<F>>
    where
        S: FormatFactory<Format = F> + ?Sized,
    {
        let id = key.cache_id();
        if let Some(cached) = self.cache.get(&id) {
            return cached.clone();
        }

        let attributes = key.attributes();
        let format = if attributes.is_empty() {
            None
        } else {
            self.created += 1;
            Some(Rc::new(factory.create_format(&attributes)))
        };
        tracing::debug!(key = %id, created = format.is_some(), "Registered style key");

        self.cache.insert(id, format.clone());
        format
    }

    /// Convenience wrapper around [`resolve`](Self::resolve) for name slices.
    pub fn resolve_names<S>(&mut self, names: &[&str], factory: &mut S) -> Option<Rc<F>>
    where
        S: FormatFactory<Format = F> + ?Sized,
    {
        self.resolve(&StyleKey::new(names.iter().copied()), factory)
    }

    /// Number of cached keys, including keys without a format.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether nothing has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Number of formats built through the factory.
    #[must_use]
    pub fn formats_created(&self) -> usize {
        self.created
    }
}

impl<F> Default for StyleRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Factory that hands out its attributes and counts constructions.
    #[derive(Default)]
    struct CountingFactory {
        calls: usize,
    }

    impl FormatFactory for CountingFactory {
        type Format = FormatAttributes;

        fn create_format(&mut self, attributes: &FormatAttributes) -> FormatAttributes {
            self.calls += 1;
            attributes.clone()
        }
    }

    #[test]
    fn test_same_key_returns_same_instance() {
        let mut factory = CountingFactory::default();
        let mut registry = StyleRegistry::new();

        let first = registry
            .resolve_names(&["double_emphasis", "emphasis"], &mut factory)
            .unwrap();
        let second = registry
            .resolve(&StyleKey::new(["double_emphasis", "emphasis"]), &mut factory)
            .unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(factory.calls, 1);
        assert_eq!(registry.formats_created(), 1);
    }

    #[test]
    fn test_key_order_is_significant() {
        let mut factory = CountingFactory::default();
        let mut registry = StyleRegistry::new();

        let ab = registry
            .resolve_names(&["double_emphasis", "emphasis"], &mut factory)
            .unwrap();
        let ba = registry
            .resolve_names(&["emphasis", "double_emphasis"], &mut factory)
            .unwrap();

        assert!(!Rc::ptr_eq(&ab, &ba));
        assert_eq!(*ab, *ba);
        assert_eq!(registry.len(), 2);
        assert_eq!(factory.calls, 2);
    }

    #[test]
    fn test_single_names_match_default_table() {
        let mut factory = CountingFactory::default();
        let mut registry = StyleRegistry::new();
        let mut resolve = |name: &str| {
            registry
                .resolve_names(&[name], &mut factory)
                .map(|f| (*f).clone())
        };

        assert_eq!(
            resolve("double_emphasis"),
            Some(FormatAttributes {
                bold: Some(true),
                ..FormatAttributes::default()
            })
        );
        assert_eq!(
            resolve("emphasis"),
            Some(FormatAttributes {
                italic: Some(true),
                ..FormatAttributes::default()
            })
        );
        assert_eq!(
            resolve("strikethrough"),
            Some(FormatAttributes {
                strikeout: Some(true),
                ..FormatAttributes::default()
            })
        );
        assert_eq!(
            resolve("codespan"),
            Some(FormatAttributes {
                font_name: Some("Courier".to_owned()),
                ..FormatAttributes::default()
            })
        );
        for (name, size) in [
            ("h1", 30),
            ("h2", 25),
            ("h3", 20),
            ("h4", 15),
            ("h5", 14),
            ("h6", 13),
        ] {
            assert_eq!(
                resolve(name),
                Some(FormatAttributes {
                    font_size: Some(size),
                    ..FormatAttributes::default()
                }),
                "style {name}"
            );
        }
    }

    #[test]
    fn test_unknown_names_resolve_to_no_format() {
        let mut factory = CountingFactory::default();
        let mut registry: StyleRegistry<FormatAttributes> = StyleRegistry::new();

        assert!(registry.resolve_names(&["hrule"], &mut factory).is_none());
        assert!(registry.resolve_names(&["hrule"], &mut factory).is_none());
        assert!(registry.resolve_names(&[], &mut factory).is_none());
        assert_eq!(factory.calls, 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_names_are_ignored_in_composites() {
        let mut factory = CountingFactory::default();
        let mut registry = StyleRegistry::new();

        let format = registry
            .resolve_names(&["blockquote", "emphasis"], &mut factory)
            .unwrap();
        assert_eq!(format.italic, Some(true));
        assert_eq!(format.font_size, None);
    }

    #[test]
    fn test_later_names_override_earlier() {
        let key = StyleKey::new(["h1", "h3"]);
        assert_eq!(key.attributes().font_size, Some(20));

        let key = StyleKey::new(["h3", "h1"]);
        assert_eq!(key.attributes().font_size, Some(30));
    }

    #[test]
    fn test_heading_with_inline_style_merges() {
        let attrs = StyleKey::new(["h2", "double_emphasis"]).attributes();
        assert_eq!(
            attrs,
            FormatAttributes {
                bold: Some(true),
                font_size: Some(25),
                ..FormatAttributes::default()
            }
        );
    }

    #[test]
    fn test_style_key_display() {
        assert_eq!(StyleKey::new(["h1", "emphasis"]).to_string(), "h1|emphasis");
    }
}
