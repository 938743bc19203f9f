//! Token stream to cell write groups.
//!
//! The linearizer is a state machine over the flattened tokens of one line.
//! [`step`] is the transition function: it consumes the current
//! [`LineState`] and one token and returns the next state plus the group
//! flushed by that token, if any. At most one group is flushed per token.
//!
//! Flushed groups are [`GroupDraft`]s whose runs carry [`StyleKey`]s.
//! [`resolve_group`] turns a draft into a [`CellWriteGroup`] by looking the
//! keys up in the document's [`StyleRegistry`].

use std::rc::Rc;

use crate::error::RenderError;
use crate::style::{FormatFactory, StyleKey, StyleRegistry};
use crate::tokens::{Line, Token};

/// Number of leading tokens in a line whose text does not pick up the
/// cell style as an inline format.
const CELL_STYLE_LEAD: usize = 2;

/// One text run of a draft, styled by key.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DraftRun {
    pub text: String,
    pub style: Option<StyleKey>,
}

impl DraftRun {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
        }
    }
}

/// A flushed group whose formats are not resolved yet.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GroupDraft {
    pub runs: Vec<DraftRun>,
    pub cell_style: Option<String>,
    pub link: Option<String>,
    pub indent: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ListFrame {
    counter: usize,
    ordered: bool,
}

/// Pending state while walking one line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineState {
    runs: Vec<DraftRun>,
    cell_style: Option<String>,
    text_styles: Vec<String>,
    link: Option<String>,
    soft_newline: bool,
    /// The only pending run is a synthesized list prefix.
    prefix_only: bool,
    lists: Vec<ListFrame>,
}

impl LineState {
    /// Current indent level (number of open lists).
    #[must_use]
    pub fn indent(&self) -> usize {
        self.lists.len()
    }

    /// Whether text is waiting to be flushed.
    #[must_use]
    pub fn has_pending_runs(&self) -> bool {
        !self.runs.is_empty()
    }

    /// Pending hyperlink target.
    #[must_use]
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    /// Whether a soft boundary is active.
    #[must_use]
    pub fn soft_newline(&self) -> bool {
        self.soft_newline
    }

    /// Emit accumulated runs as a group. Always clears link and soft newline.
    fn flush(mut self) -> (Self, Option<GroupDraft>) {
        let link = self.link.take();
        self.soft_newline = false;
        self.prefix_only = false;
        if self.runs.is_empty() {
            return (self, None);
        }
        let draft = GroupDraft {
            runs: std::mem::take(&mut self.runs),
            cell_style: self.cell_style.clone(),
            link,
            indent: self.indent(),
        };
        (self, Some(draft))
    }
}

/// Apply one token (at `index` within the flattened line) to `state`.
///
/// # Errors
///
/// Returns [`RenderError::UnbalancedList`] for a `ListEnd` with no open list
/// and [`RenderError::OrphanListItem`] for a `ListItem` outside any list.
pub fn step(
    mut state: LineState,
    index: usize,
    token: Token,
) -> Result<(LineState, Option<GroupDraft>), RenderError> {
    match token {
        Token::TextStyle(name) => {
            state.text_styles.push(name);
            Ok((state, None))
        }
        Token::CellStyle(name) => {
            state.cell_style = Some(name);
            Ok((state, None))
        }
        // A list prefix stays pending so it becomes part of the link text
        Token::Link(target) if state.prefix_only => {
            state.soft_newline = true;
            state.link = Some(target);
            Ok((state, None))
        }
        Token::Link(target) => {
            let (mut state, draft) = state.flush();
            state.soft_newline = true;
            state.link = Some(target);
            Ok((state, draft))
        }
        Token::ListStart { ordered } => {
            let (mut state, draft) = state.flush();
            state.lists.push(ListFrame {
                counter: 1,
                ordered,
            });
            Ok((state, draft))
        }
        Token::ListEnd => {
            let (mut state, draft) = state.flush();
            state.lists.pop().ok_or(RenderError::UnbalancedList)?;
            state.soft_newline = true;
            Ok((state, draft))
        }
        Token::ListItem => {
            let (mut state, draft) = state.flush();
            let frame = state.lists.last_mut().ok_or(RenderError::OrphanListItem)?;
            if frame.ordered {
                let prefix = format!("{}. ", frame.counter);
                frame.counter += 1;
                state.runs.push(DraftRun::plain(prefix));
                state.prefix_only = true;
            }
            state.soft_newline = true;
            Ok((state, draft))
        }
        Token::LineBreak => {
            let (mut state, draft) = state.flush();
            state.soft_newline = true;
            Ok((state, draft))
        }
        Token::Text(mut content) => {
            if content.is_empty() {
                return Ok((state, None));
            }
            let styled = !state.text_styles.is_empty()
                || (state.cell_style.is_some() && index >= CELL_STYLE_LEAD);
            if state.prefix_only
                && state.link.is_some()
                && let Some(prefix) = state.runs.pop()
            {
                content.insert_str(0, &prefix.text);
            }
            state.prefix_only = false;
            let style = styled.then(|| {
                StyleKey::new(
                    state
                        .cell_style
                        .iter()
                        .cloned()
                        .chain(state.text_styles.drain(..)),
                )
            });
            state.runs.push(DraftRun {
                text: content,
                style,
            });
            if state.soft_newline && state.link.is_some() {
                return Ok(state.flush());
            }
            Ok((state, None))
        }
    }
}

/// Linearize one line into drafts, in row order.
///
/// # Errors
///
/// Propagates errors from [`step`].
pub fn linearize_line(line: &Line) -> Result<Vec<GroupDraft>, RenderError> {
    let mut drafts = Vec::new();
    let mut state = LineState::default();
    for (index, token) in line.flatten().into_iter().enumerate() {
        let (next, draft) = step(state, index, token)?;
        state = next;
        drafts.extend(draft);
    }
    drafts.extend(state.flush().1);
    Ok(drafts)
}

/// Linearize every line of a document.
///
/// # Errors
///
/// Propagates errors from [`step`].
pub fn linearize(lines: &[Line]) -> Result<Vec<GroupDraft>, RenderError> {
    let mut drafts = Vec::new();
    for line in lines {
        drafts.extend(linearize_line(line)?);
    }
    Ok(drafts)
}

/// One resolved text run.
#[derive(Debug, PartialEq)]
pub struct Run<F> {
    pub text: String,
    pub format: Option<Rc<F>>,
}

impl<F> Clone for Run<F> {
    fn clone(&self) -> Self {
        Self {
            text: self.text.clone(),
            format: self.format.clone(),
        }
    }
}

/// A fully resolved instruction for one destination cell.
#[derive(Debug, PartialEq)]
pub struct CellWriteGroup<F> {
    pub runs: Vec<Run<F>>,
    pub cell_format: Option<Rc<F>>,
    pub link: Option<String>,
    pub indent: usize,
}

impl<F> Clone for CellWriteGroup<F> {
    fn clone(&self) -> Self {
        Self {
            runs: self.runs.clone(),
            cell_format: self.cell_format.clone(),
            link: self.link.clone(),
            indent: self.indent,
        }
    }
}

/// Resolve a draft's style keys against the document registry.
pub fn resolve_group<F, S>(
    draft: GroupDraft,
    registry: &mut StyleRegistry<F>,
    factory: &mut S,
) -> CellWriteGroup<F>
where
    S: FormatFactory<Format = F> + ?Sized,
{
    let runs = draft
        .runs
        .into_iter()
        .map(|run| Run {
            format: run
                .style
                .and_then(|key| registry.resolve(&key, &mut *factory)),
            text: run.text,
        })
        .collect();
    let cell_format = draft
        .cell_style
        .and_then(|name| registry.resolve(&StyleKey::new([name]), &mut *factory));

    CellWriteGroup {
        runs,
        cell_format,
        link: draft.link,
        indent: draft.indent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::FormatAttributes;
    use crate::tokens::TokenTree;
    use pretty_assertions::assert_eq;

    fn plain(text: &str) -> DraftRun {
        DraftRun::plain(text)
    }

    fn styled(text: &str, names: &[&str]) -> DraftRun {
        DraftRun {
            text: text.to_owned(),
            style: Some(StyleKey::new(names.iter().copied())),
        }
    }

    fn draft(runs: Vec<DraftRun>) -> GroupDraft {
        GroupDraft {
            runs,
            cell_style: None,
            link: None,
            indent: 0,
        }
    }

    fn line(tokens: Vec<Token>) -> Line {
        Line::from(tokens)
    }

    #[test]
    fn test_step_text_style_is_pending_until_text() {
        let (state, out) = step(LineState::default(), 0, Token::text_style("emphasis")).unwrap();
        assert!(out.is_none());
        assert!(!state.has_pending_runs());

        let (state, out) = step(state, 1, Token::text("x")).unwrap();
        assert!(out.is_none());
        assert_eq!(state.runs, vec![styled("x", &["emphasis"])]);
        assert!(state.text_styles.is_empty());
    }

    #[test]
    fn test_step_link_flushes_and_arms_soft_newline() {
        let (state, _) = step(LineState::default(), 0, Token::text("before ")).unwrap();
        let (state, out) = step(state, 1, Token::link("http://x")).unwrap();

        assert_eq!(out, Some(draft(vec![plain("before ")])));
        assert_eq!(state.link(), Some("http://x"));
        assert!(state.soft_newline());
        assert!(!state.has_pending_runs());
    }

    #[test]
    fn test_step_text_after_link_flushes_eagerly() {
        let (state, _) = step(LineState::default(), 0, Token::link("http://x")).unwrap();
        let (state, out) = step(state, 1, Token::text("text")).unwrap();

        let expected = GroupDraft {
            link: Some("http://x".to_owned()),
            ..draft(vec![plain("text")])
        };
        assert_eq!(out, Some(expected));
        assert_eq!(state.link(), None);
        assert!(!state.soft_newline());
    }

    #[test]
    fn test_step_list_item_synthesizes_ordered_prefix() {
        let (state, _) = step(LineState::default(), 0, Token::ListStart { ordered: true }).unwrap();
        assert_eq!(state.indent(), 1);

        let (state, out) = step(state, 1, Token::ListItem).unwrap();
        assert!(out.is_none());
        assert_eq!(state.runs, vec![plain("1. ")]);
        assert!(state.soft_newline());
    }

    #[test]
    fn test_step_list_item_unordered_has_no_prefix() {
        let (state, _) =
            step(LineState::default(), 0, Token::ListStart { ordered: false }).unwrap();
        let (state, _) = step(state, 1, Token::ListItem).unwrap();
        assert!(!state.has_pending_runs());
    }

    #[test]
    fn test_step_list_end_without_list_fails() {
        let err = step(LineState::default(), 0, Token::ListEnd).unwrap_err();
        assert_eq!(err, RenderError::UnbalancedList);
    }

    #[test]
    fn test_step_list_item_without_list_fails() {
        let err = step(LineState::default(), 0, Token::ListItem).unwrap_err();
        assert_eq!(err, RenderError::OrphanListItem);
    }

    #[test]
    fn test_step_empty_text_is_ignored() {
        let (state, out) = step(LineState::default(), 0, Token::text("")).unwrap();
        assert!(out.is_none());
        assert_eq!(state, LineState::default());
    }

    #[test]
    fn test_plain_paragraph() {
        let drafts = linearize_line(&line(vec![Token::text("hello")])).unwrap();
        assert_eq!(drafts, vec![draft(vec![plain("hello")])]);
    }

    #[test]
    fn test_bold_then_plain_text() {
        let drafts = linearize_line(&line(vec![
            Token::text_style("double_emphasis"),
            Token::text("bold"),
            Token::text(" text"),
        ]))
        .unwrap();

        assert_eq!(
            drafts,
            vec![draft(vec![
                styled("bold", &["double_emphasis"]),
                plain(" text")
            ])]
        );
    }

    #[test]
    fn test_heading_lead_text_is_unstyled() {
        let drafts = linearize_line(&line(vec![
            Token::cell_style("h1"),
            Token::text("Title "),
            Token::text_style("emphasis"),
            Token::text("em"),
            Token::text(" tail"),
        ]))
        .unwrap();

        let expected = GroupDraft {
            cell_style: Some("h1".to_owned()),
            ..draft(vec![
                plain("Title "),
                styled("em", &["h1", "emphasis"]),
                styled(" tail", &["h1"]),
            ])
        };
        assert_eq!(drafts, vec![expected]);
    }

    #[test]
    fn test_ordered_list_two_items() {
        let list = Line(vec![
            Token::ListStart { ordered: true }.into(),
            TokenTree::Group(vec![Token::ListItem.into(), Token::text("a").into()]),
            TokenTree::Group(vec![Token::ListItem.into(), Token::text("b").into()]),
            Token::ListEnd.into(),
        ]);

        let drafts = linearize_line(&list).unwrap();
        assert_eq!(
            drafts,
            vec![
                GroupDraft {
                    indent: 1,
                    ..draft(vec![plain("1. "), plain("a")])
                },
                GroupDraft {
                    indent: 1,
                    ..draft(vec![plain("2. "), plain("b")])
                },
            ]
        );
    }

    #[test]
    fn test_nested_list_counters_reset_per_scope() {
        let list = Line(vec![
            Token::ListStart { ordered: true }.into(),
            TokenTree::Group(vec![
                Token::ListItem.into(),
                Token::text("a").into(),
                TokenTree::Group(vec![
                    Token::ListStart { ordered: true }.into(),
                    TokenTree::Group(vec![Token::ListItem.into(), Token::text("a1").into()]),
                    TokenTree::Group(vec![Token::ListItem.into(), Token::text("a2").into()]),
                    Token::ListEnd.into(),
                ]),
            ]),
            TokenTree::Group(vec![Token::ListItem.into(), Token::text("b").into()]),
            Token::ListEnd.into(),
        ]);

        let drafts = linearize_line(&list).unwrap();
        let summary: Vec<(usize, Vec<String>)> = drafts
            .iter()
            .map(|d| (d.indent, d.runs.iter().map(|r| r.text.clone()).collect()))
            .collect();

        assert_eq!(
            summary,
            vec![
                (1, vec!["1. ".to_owned(), "a".to_owned()]),
                (2, vec!["1. ".to_owned(), "a1".to_owned()]),
                (2, vec!["2. ".to_owned(), "a2".to_owned()]),
                (1, vec!["2. ".to_owned(), "b".to_owned()]),
            ]
        );
    }

    #[test]
    fn test_link_group() {
        let drafts =
            linearize_line(&line(vec![Token::link("http://x"), Token::text("text")])).unwrap();
        assert_eq!(
            drafts,
            vec![GroupDraft {
                link: Some("http://x".to_owned()),
                ..draft(vec![plain("text")])
            }]
        );
    }

    #[test]
    fn test_step_link_after_list_prefix_keeps_prefix_pending() {
        let (state, _) = step(LineState::default(), 0, Token::ListStart { ordered: true }).unwrap();
        let (state, _) = step(state, 1, Token::ListItem).unwrap();
        let (state, out) = step(state, 2, Token::link("http://x")).unwrap();

        assert!(out.is_none());
        assert_eq!(state.runs, vec![plain("1. ")]);
        assert_eq!(state.link(), Some("http://x"));
    }

    #[test]
    fn test_ordered_item_starting_with_link() {
        let drafts = linearize_line(&line(vec![
            Token::ListStart { ordered: true },
            Token::ListItem,
            Token::link("http://x"),
            Token::text("a"),
            Token::ListItem,
            Token::text("b"),
            Token::ListEnd,
        ]))
        .unwrap();

        assert_eq!(
            drafts,
            vec![
                GroupDraft {
                    link: Some("http://x".to_owned()),
                    indent: 1,
                    ..draft(vec![plain("1. a")])
                },
                GroupDraft {
                    indent: 1,
                    ..draft(vec![plain("2. "), plain("b")])
                },
            ]
        );
    }

    #[test]
    fn test_link_after_item_text_still_flushes() {
        let drafts = linearize_line(&line(vec![
            Token::ListStart { ordered: true },
            Token::ListItem,
            Token::text("see "),
            Token::link("http://x"),
            Token::text("a"),
            Token::ListEnd,
        ]))
        .unwrap();

        assert_eq!(
            drafts,
            vec![
                GroupDraft {
                    indent: 1,
                    ..draft(vec![plain("1. "), plain("see ")])
                },
                GroupDraft {
                    link: Some("http://x".to_owned()),
                    indent: 1,
                    ..draft(vec![plain("a")])
                },
            ]
        );
    }

    #[test]
    fn test_link_followed_by_two_texts_does_not_fail() {
        let drafts = linearize_line(&line(vec![
            Token::link("http://x"),
            Token::text("one"),
            Token::text("two"),
        ]))
        .unwrap();

        assert_eq!(
            drafts,
            vec![
                GroupDraft {
                    link: Some("http://x".to_owned()),
                    ..draft(vec![plain("one")])
                },
                draft(vec![plain("two")]),
            ]
        );
    }

    #[test]
    fn test_line_break_splits_groups() {
        let drafts = linearize_line(&line(vec![
            Token::text("first"),
            Token::LineBreak,
            Token::text("second"),
        ]))
        .unwrap();
        assert_eq!(
            drafts,
            vec![draft(vec![plain("first")]), draft(vec![plain("second")])]
        );
    }

    #[test]
    fn test_cell_style_without_text_is_suppressed() {
        let drafts = linearize_line(&line(vec![Token::cell_style("hrule")])).unwrap();
        assert!(drafts.is_empty());
    }

    #[test]
    fn test_heading_split_by_link_keeps_cell_style() {
        let drafts = linearize_line(&line(vec![
            Token::cell_style("h2"),
            Token::text("See "),
            Token::link("http://x"),
            Token::text("docs"),
        ]))
        .unwrap();

        assert_eq!(drafts.len(), 2);
        assert!(
            drafts
                .iter()
                .all(|d| d.cell_style.as_deref() == Some("h2"))
        );
        assert_eq!(drafts[1].link.as_deref(), Some("http://x"));
        assert_eq!(drafts[1].runs, vec![styled("docs", &["h2"])]);
    }

    #[test]
    fn test_linearize_is_deterministic() {
        let lines = vec![
            line(vec![
                Token::cell_style("h1"),
                Token::text("Head"),
                Token::text_style("emphasis"),
                Token::text("x"),
            ]),
            line(vec![Token::link("http://a"), Token::text("a"), Token::text("b")]),
        ];
        assert_eq!(linearize(&lines).unwrap(), linearize(&lines).unwrap());
    }

    struct AttrFactory;

    impl FormatFactory for AttrFactory {
        type Format = FormatAttributes;

        fn create_format(&mut self, attributes: &FormatAttributes) -> FormatAttributes {
            attributes.clone()
        }
    }

    #[test]
    fn test_resolve_group_shares_registry_formats() {
        let mut registry = StyleRegistry::new();
        let first = resolve_group(
            GroupDraft {
                cell_style: Some("h1".to_owned()),
                ..draft(vec![styled("a", &["double_emphasis"]), plain("b")])
            },
            &mut registry,
            &mut AttrFactory,
        );
        let second = resolve_group(
            draft(vec![styled("c", &["double_emphasis"])]),
            &mut registry,
            &mut AttrFactory,
        );

        let bold_a = first.runs[0].format.as_ref().unwrap();
        let bold_c = second.runs[0].format.as_ref().unwrap();
        assert!(Rc::ptr_eq(bold_a, bold_c));
        assert!(first.runs[1].format.is_none());
        assert_eq!(first.cell_format.as_ref().unwrap().font_size, Some(30));
    }

    #[test]
    fn test_resolve_group_unknown_cell_style_has_no_format() {
        let mut registry = StyleRegistry::new();
        let group = resolve_group(
            GroupDraft {
                cell_style: Some("blockquote".to_owned()),
                ..draft(vec![plain("quoted")])
            },
            &mut registry,
            &mut AttrFactory,
        );
        assert!(group.cell_format.is_none());
    }
}
