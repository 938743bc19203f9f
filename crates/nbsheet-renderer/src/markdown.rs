//! Markdown structural renderer.
//!
//! Walks the pulldown-cmark event stream and produces one [`Line`] per
//! block-level construct. Lists stay nested: every list item becomes a
//! [`TokenTree::Group`] inside the line of its outermost list.

use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};

use crate::error::RenderError;
use crate::tokens::{Line, Token, TokenTree};
use crate::util::{escape_text, heading_level_to_num, sanitize_link};

/// Default limit for list nesting.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 16;

const BLOCKQUOTE_STYLE: &str = "blockquote";
const CODE_STYLE: &str = "codespan";
const RULE_STYLE: &str = "hrule";
const TABLE_CELL_SEPARATOR: &str = " | ";

/// Markdown to token lines.
///
/// The renderer only holds options; every [`render`](Self::render) call
/// starts from fresh state, so one renderer can serve a whole notebook.
///
/// # Example
///
/// ```
/// use nbsheet_renderer::{MarkdownRenderer, Token};
///
/// let lines = MarkdownRenderer::new().render_markdown("# Hello").unwrap();
/// assert_eq!(
///     lines[0].flatten(),
///     vec![Token::cell_style("h1"), Token::text("Hello")]
/// );
/// ```
#[derive(Clone, Debug)]
pub struct MarkdownRenderer {
    gfm: bool,
    escape_html: bool,
    max_depth: usize,
}

impl MarkdownRenderer {
    /// Create a renderer with GFM and HTML escaping enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gfm: true,
            escape_html: true,
            max_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    /// Enable or disable GitHub Flavored Markdown features.
    ///
    /// GFM is enabled by default. When enabled, the parser supports:
    /// - Tables
    /// - Strikethrough (`~~text~~`)
    /// - Task lists (`- [ ] item`)
    /// - Footnotes
    #[must_use]
    pub fn with_gfm(mut self, enabled: bool) -> Self {
        self.gfm = enabled;
        self
    }

    /// Enable or disable escaping of `&`, `<` and `>` in text.
    #[must_use]
    pub fn with_html_escaping(mut self, enabled: bool) -> Self {
        self.escape_html = enabled;
        self
    }

    /// Set the maximum list nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Get parser options based on GFM configuration.
    #[must_use]
    pub fn parser_options(&self) -> Options {
        if self.gfm {
            Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_FOOTNOTES
                | Options::ENABLE_GFM
        } else {
            Options::empty()
        }
    }

    /// Create a configured parser for the given markdown text.
    #[must_use]
    pub fn create_parser<'a>(&self, markdown: &'a str) -> Parser<'a> {
        Parser::new_ext(markdown, self.parser_options())
    }

    /// Render markdown text using the configured parser options.
    ///
    /// # Errors
    ///
    /// See [`render`](Self::render).
    pub fn render_markdown(&self, markdown: &str) -> Result<Vec<Line>, RenderError> {
        self.render(self.create_parser(markdown))
    }

    /// Render markdown events into token lines.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NestingTooDeep`] when lists nest deeper than the
    /// configured limit, and [`RenderError::UnbalancedEnd`] or
    /// [`RenderError::OrphanListItem`] for event streams that do not nest.
    pub fn render<'a, I>(&self, events: I) -> Result<Vec<Line>, RenderError>
    where
        I: Iterator<Item = Event<'a>>,
    {
        let mut builder = LineBuilder::new(self.escape_html, self.max_depth);
        for event in events {
            builder.process_event(event)?;
        }
        builder.finish()
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-render state.
struct LineBuilder {
    escape_html: bool,
    max_depth: usize,
    lines: Vec<Line>,
    /// Open token containers: the line root, then one per open list item.
    containers: Vec<Vec<TokenTree>>,
    /// Blocks seen so far in each open list item.
    item_blocks: Vec<usize>,
    styles: Vec<&'static str>,
    text: String,
    list_depth: usize,
    quote_depth: usize,
    code: Option<String>,
    html: Option<String>,
    in_metadata: bool,
    table_cell: Option<usize>,
    line_prefix: Option<String>,
    /// Link target waiting for its first text.
    link: Option<String>,
}

impl LineBuilder {
    fn new(escape_html: bool, max_depth: usize) -> Self {
        Self {
            escape_html,
            max_depth,
            lines: Vec::new(),
            containers: Vec::new(),
            item_blocks: Vec::new(),
            styles: Vec::new(),
            text: String::new(),
            list_depth: 0,
            quote_depth: 0,
            code: None,
            html: None,
            in_metadata: false,
            table_cell: None,
            line_prefix: None,
            link: None,
        }
    }

    fn process_event(&mut self, event: Event<'_>) -> Result<(), RenderError> {
        match event {
            Event::Start(tag) => return self.start_tag(tag),
            Event::End(tag) => return self.end_tag(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.inline_code(&code),
            Event::Html(html) => self.block_html(&html),
            Event::InlineHtml(html) => self.text(&html),
            Event::SoftBreak => self.soft_break(),
            Event::HardBreak => self.emit(Token::LineBreak),
            Event::Rule => self.horizontal_rule(),
            Event::TaskListMarker(checked) => self.text(if checked { "[x] " } else { "[ ] " }),
            Event::FootnoteReference(label) => self.text(&format!("[^{label}]")),
            Event::InlineMath(math) => self.text(&format!("${math}$")),
            Event::DisplayMath(math) => self.text(&format!("$${math}$$")),
        }
        Ok(())
    }

    fn start_tag(&mut self, tag: Tag<'_>) -> Result<(), RenderError> {
        match tag {
            Tag::Paragraph | Tag::DefinitionListTitle | Tag::DefinitionListDefinition => {
                self.start_block();
            }
            Tag::Heading { level, .. } => {
                if self.list_depth > 0 {
                    self.start_block();
                } else {
                    self.close_line();
                    let style = format!("h{}", heading_level_to_num(level));
                    self.push(Token::CellStyle(style));
                }
            }
            Tag::BlockQuote(_) => {
                self.close_line();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(_) => {
                self.flush_text();
                self.code = Some(String::new());
            }
            Tag::HtmlBlock => {
                self.flush_text();
                self.html = Some(String::new());
            }
            Tag::List(start) => self.start_list(start.is_some())?,
            Tag::Item => self.start_item()?,
            Tag::FootnoteDefinition(label) => {
                self.close_line();
                self.line_prefix = Some(format!("[^{label}]: "));
            }
            Tag::Table(_) => self.close_line(),
            Tag::TableHead | Tag::TableRow => self.start_row(),
            Tag::TableCell => self.start_cell(),
            Tag::Emphasis => self.push_style("emphasis"),
            Tag::Strong => self.push_style("double_emphasis"),
            Tag::Strikethrough => self.push_style("strikethrough"),
            Tag::Link {
                link_type,
                dest_url,
                ..
            } => self.start_link(link_type, &dest_url),
            Tag::Image { dest_url, .. } => self.start_link(LinkType::Inline, &dest_url),
            Tag::MetadataBlock(_) => self.in_metadata = true,
            Tag::DefinitionList | Tag::Superscript | Tag::Subscript => {}
        }
        Ok(())
    }

    fn end_tag(&mut self, tag: TagEnd) -> Result<(), RenderError> {
        match tag {
            TagEnd::Paragraph
            | TagEnd::Heading(_)
            | TagEnd::DefinitionListTitle
            | TagEnd::DefinitionListDefinition => self.end_block(),
            TagEnd::BlockQuote(_) => {
                self.close_line();
                self.quote_depth = self
                    .quote_depth
                    .checked_sub(1)
                    .ok_or(RenderError::UnbalancedEnd("block quote"))?;
            }
            TagEnd::CodeBlock => self.end_code_block()?,
            TagEnd::HtmlBlock => self.end_html_block(),
            TagEnd::List(_) => self.end_list()?,
            TagEnd::Item => self.end_item()?,
            TagEnd::FootnoteDefinition => {
                self.close_line();
                self.line_prefix = None;
            }
            TagEnd::Table => self.close_line(),
            TagEnd::TableHead | TagEnd::TableRow => self.end_row(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.flush_text();
                self.styles
                    .pop()
                    .ok_or(RenderError::UnbalancedEnd("inline style"))?;
            }
            TagEnd::Link | TagEnd::Image => {
                self.flush_text();
                if let Some(target) = self.link.take() {
                    tracing::debug!(target = %target, "Dropped link without text");
                }
            }
            TagEnd::MetadataBlock(_) => self.in_metadata = false,
            TagEnd::TableCell
            | TagEnd::DefinitionList
            | TagEnd::Superscript
            | TagEnd::Subscript => {}
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Line>, RenderError> {
        if self.list_depth > 0 || self.containers.len() > 1 {
            return Err(RenderError::UnbalancedEnd("list"));
        }
        self.close_line();
        Ok(self.lines)
    }

    /// Open the line root if no line is being built.
    fn ensure_line(&mut self) {
        if !self.containers.is_empty() {
            return;
        }
        let mut root = Vec::new();
        if self.quote_depth > 0 {
            root.push(Token::cell_style(BLOCKQUOTE_STYLE).into());
        }
        self.containers.push(root);
        if let Some(prefix) = self.line_prefix.take() {
            self.text.insert_str(0, &prefix);
        }
    }

    /// Finish the current line unless a list is still open.
    fn close_line(&mut self) {
        self.flush_text();
        if self.containers.len() == 1
            && let Some(root) = self.containers.pop()
        {
            let line = Line(root);
            if !line.is_empty() {
                self.lines.push(line);
            }
        }
    }

    fn push(&mut self, token: Token) {
        self.ensure_line();
        if let Some(top) = self.containers.last_mut() {
            top.push(token.into());
        }
    }

    fn emit(&mut self, token: Token) {
        self.flush_text();
        self.push(token);
    }

    fn escaped(&self, text: &str) -> String {
        if self.escape_html {
            escape_text(text).into_owned()
        } else {
            text.to_owned()
        }
    }

    /// Emit pending text, re-declaring every open inline style before it.
    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        self.ensure_line();
        self.open_link();
        let text = std::mem::take(&mut self.text);
        let mut tokens: Vec<Token> = self.styles.iter().map(|s| Token::text_style(*s)).collect();
        tokens.push(Token::Text(self.escaped(&text)));
        for token in tokens {
            self.push(token);
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = self.code.as_mut() {
            code.push_str(text);
        } else if !self.in_metadata {
            self.text.push_str(text);
        }
    }

    fn soft_break(&mut self) {
        if let Some(code) = self.code.as_mut() {
            code.push('\n');
        } else {
            self.text.push(' ');
        }
    }

    fn inline_code(&mut self, code: &str) {
        self.flush_text();
        self.open_link();
        let mut tokens: Vec<Token> = self.styles.iter().map(|s| Token::text_style(*s)).collect();
        tokens.push(Token::text_style(CODE_STYLE));
        tokens.push(Token::Text(self.escaped(code)));
        for token in tokens {
            self.push(token);
        }
    }

    fn block_html(&mut self, html: &str) {
        if let Some(buffer) = self.html.as_mut() {
            buffer.push_str(html);
        } else {
            self.text(html);
        }
    }

    /// Record a new block inside the current list item.
    ///
    /// Returns `true` if an earlier block of the same item needs separating.
    fn next_item_block(&mut self) -> bool {
        match self.item_blocks.last_mut() {
            Some(count) => {
                *count += 1;
                *count > 1
            }
            None => false,
        }
    }

    fn start_block(&mut self) {
        if self.list_depth > 0 {
            self.flush_text();
            if self.next_item_block() {
                self.emit(Token::LineBreak);
            }
        } else {
            self.close_line();
            self.ensure_line();
        }
    }

    fn end_block(&mut self) {
        if self.list_depth > 0 {
            self.flush_text();
        } else {
            self.close_line();
        }
    }

    fn end_code_block(&mut self) -> Result<(), RenderError> {
        let code = self
            .code
            .take()
            .ok_or(RenderError::UnbalancedEnd("code block"))?;
        let content = code.trim_end_matches('\n');

        if self.list_depth > 0 {
            // Code inside a list item stays in the item, one break per line.
            self.next_item_block();
            for line in content.split('\n') {
                self.emit(Token::LineBreak);
                self.push(Token::text_style(CODE_STYLE));
                let text = self.escaped(line);
                self.push(Token::Text(text));
            }
        } else {
            self.close_line();
            for line in content.split('\n') {
                let text = self.escaped(line);
                self.lines
                    .push(Line::from(vec![Token::cell_style(CODE_STYLE), Token::Text(text)]));
            }
        }
        Ok(())
    }

    fn end_html_block(&mut self) {
        let html = self.html.take().unwrap_or_default();
        if html.trim_start().to_ascii_lowercase().starts_with("<style") {
            return;
        }
        for raw in html.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let text = self.escaped(raw);
            if self.list_depth > 0 {
                self.emit(Token::LineBreak);
                self.push(Token::Text(text));
            } else {
                self.close_line();
                self.lines.push(Line::from(vec![Token::Text(text)]));
            }
        }
    }

    fn horizontal_rule(&mut self) {
        if self.list_depth > 0 {
            self.emit(Token::LineBreak);
        } else {
            self.close_line();
            self.lines
                .push(Line::from(vec![Token::cell_style(RULE_STYLE)]));
        }
    }

    fn start_list(&mut self, ordered: bool) -> Result<(), RenderError> {
        let depth = self.list_depth + 1;
        if depth > self.max_depth {
            return Err(RenderError::NestingTooDeep {
                depth,
                limit: self.max_depth,
            });
        }
        if self.list_depth == 0 {
            self.close_line();
        }
        self.emit(Token::ListStart { ordered });
        self.list_depth = depth;
        Ok(())
    }

    fn end_list(&mut self) -> Result<(), RenderError> {
        if self.list_depth == 0 {
            return Err(RenderError::UnbalancedEnd("list"));
        }
        self.emit(Token::ListEnd);
        self.list_depth -= 1;
        if self.list_depth == 0 {
            self.close_line();
        }
        Ok(())
    }

    fn start_item(&mut self) -> Result<(), RenderError> {
        if self.list_depth == 0 {
            return Err(RenderError::OrphanListItem);
        }
        self.flush_text();
        self.containers.push(vec![Token::ListItem.into()]);
        self.item_blocks.push(0);
        Ok(())
    }

    fn end_item(&mut self) -> Result<(), RenderError> {
        self.flush_text();
        if self.containers.len() < 2 {
            return Err(RenderError::UnbalancedEnd("list item"));
        }
        self.item_blocks.pop();
        if let Some(item) = self.containers.pop()
            && let Some(parent) = self.containers.last_mut()
        {
            parent.push(TokenTree::Group(item));
        }
        Ok(())
    }

    fn start_row(&mut self) {
        if self.list_depth == 0 {
            self.close_line();
            self.ensure_line();
        }
        self.table_cell = Some(0);
    }

    fn start_cell(&mut self) {
        if let Some(index) = self.table_cell {
            // Inline styles are closed at cell end, so the row stays one text run
            if index > 0 {
                self.text.push_str(TABLE_CELL_SEPARATOR);
            }
            self.table_cell = Some(index + 1);
        }
    }

    fn end_row(&mut self) {
        self.table_cell = None;
        if self.list_depth == 0 {
            self.close_line();
        } else {
            self.emit(Token::LineBreak);
        }
    }

    /// Emit the pending link target ahead of its text.
    fn open_link(&mut self) {
        if let Some(target) = self.link.take() {
            self.push(Token::Link(target));
        }
    }

    fn push_style(&mut self, name: &'static str) {
        self.flush_text();
        self.styles.push(name);
    }

    fn start_link(&mut self, link_type: LinkType, dest_url: &str) {
        let target = match link_type {
            LinkType::Email if !dest_url.starts_with("mailto:") => format!("mailto:{dest_url}"),
            _ => dest_url.to_owned(),
        };
        match sanitize_link(&target) {
            Some(safe) => {
                self.flush_text();
                self.link = Some(safe.to_owned());
            }
            None => {
                tracing::debug!(target = %target, "Dropped unsafe or empty link target");
                self.flush_text();
            }
        }
    }
}
