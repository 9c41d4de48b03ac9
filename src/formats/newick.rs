//! Newick parser and writer.
//!
//! ## Newick Format
//!
//! * `tree ::= node ';'`
//! * `node ::= '(' node (',' node)* ')' [label] [':' length] | label [':' length]`
//!
//! Furthermore:
//! * Whitespace can occur between elements, just not within an unquoted
//!   label or a branch length
//! * Labels may be single-quoted; `''` inside quotes is a literal quote
//! * Comments are square brackets and can occur wherever whitespace can
//!
//! Labels of internal nodes (support values) are kept verbatim as strings.
//! Every tip needs a non-empty label and tip labels must be unique.
//!
//! The parser is iterative, so deeply nested (caterpillar) trees do not
//! exhaust the call stack.

use thiserror::Error;

use crate::tree::{NodeId, Tree, TreeNode};

/// Bytes ending an unquoted label or a branch length.
const LABEL_DELIMITERS: &[u8] = b"()[],:; \t\r\n";

/// Rough node count per input byte, for arena pre-allocation.
const BYTES_PER_NODE_GUESS: usize = 8;

/// Errors that can occur during Newick parsing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NewickError {
    #[error("Empty Newick input")]
    Empty,

    #[error("Unbalanced parentheses at byte {position}")]
    UnbalancedParentheses { position: usize },

    #[error("Missing tip label at byte {position}")]
    EmptyLabel { position: usize },

    #[error("Tree is not terminated by ';'")]
    MissingTerminator,

    #[error("Unexpected content after ';' at byte {position}")]
    TrailingContent { position: usize },

    #[error("Invalid branch length '{value}' at byte {position}")]
    InvalidBranchLength { value: String, position: usize },

    #[error("Unexpected character '{found}' at byte {position}")]
    UnexpectedCharacter { found: char, position: usize },

    #[error("Unclosed quoted label starting at byte {position}")]
    UnclosedQuote { position: usize },

    #[error("Unclosed comment starting at byte {position}")]
    UnclosedComment { position: usize },

    #[error("Tip node {0} has no label")]
    MissingTipLabel(NodeId),

    #[error("Duplicate tip name '{0}'")]
    DuplicateTip(String),
}

/// Result type for Newick operations.
pub type NewickResult<T> = Result<T, NewickError>;

// =#========================================================================#=
// READER
// =#========================================================================#=
/// Cursor over the Newick text.
struct NewickReader<'a> {
    text: &'a str,
    position: usize,
}

impl<'a> NewickReader<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, position: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.position).copied()
    }

    fn bump(&mut self) {
        self.position += 1;
    }

    fn at_end(&self) -> bool {
        self.position >= self.text.len()
    }

    fn unexpected(&self) -> NewickError {
        let found = self.text[self.position..].chars().next().unwrap_or('?');
        NewickError::UnexpectedCharacter {
            found,
            position: self.position,
        }
    }

    /// Skips whitespace and `[...]` comments.
    fn skip_insignificant(&mut self) -> NewickResult<()> {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => self.bump(),
                Some(b'[') => {
                    let start = self.position;
                    match self.text[start..].find(']') {
                        Some(offset) => self.position = start + offset + 1,
                        None => return Err(NewickError::UnclosedComment { position: start }),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Reads the bytes up to the next delimiter.
    fn read_token(&mut self) -> &'a str {
        let start = self.position;
        while let Some(b) = self.peek() {
            if LABEL_DELIMITERS.contains(&b) {
                break;
            }
            self.bump();
        }
        &self.text[start..self.position]
    }

    /// Reads an optional (quoted or unquoted) label.
    fn read_label(&mut self) -> NewickResult<Option<String>> {
        if self.peek() != Some(b'\'') {
            let token = self.read_token();
            return Ok((!token.is_empty()).then(|| token.to_string()));
        }

        let start = self.position;
        self.bump();
        let mut label = String::new();
        loop {
            let rest = &self.text[self.position..];
            let Some(offset) = rest.find('\'') else {
                return Err(NewickError::UnclosedQuote { position: start });
            };
            label.push_str(&rest[..offset]);
            self.position += offset + 1;
            if self.peek() == Some(b'\'') {
                label.push('\'');
                self.bump();
            } else {
                break;
            }
        }
        Ok((!label.is_empty()).then_some(label))
    }

    /// Reads an optional `:length` suffix.
    fn read_branch_length(&mut self) -> NewickResult<Option<f64>> {
        self.skip_insignificant()?;
        if self.peek() != Some(b':') {
            return Ok(None);
        }
        self.bump();
        self.skip_insignificant()?;

        let position = self.position;
        let token = self.read_token();
        match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Some(value)),
            _ => Err(NewickError::InvalidBranchLength {
                value: token.to_string(),
                position,
            }),
        }
    }
}

// =#========================================================================#=
// PARSING
// =#========================================================================#=
/// Parses a single `;`-terminated Newick tree.
///
/// Node ids are assigned in pre-order (root `0`).
///
/// # Errors
/// Fails on unbalanced parentheses, a missing tip label, a missing `;`,
/// content after the `;`, a malformed branch length or a repeated tip name.
///
/// # Example
/// ```
/// use phylotip::formats::newick::parse_newick;
///
/// let tree = parse_newick("((A:0.1,B:0.2)90:0.3,C:0.4);").unwrap();
/// assert_eq!(tree.tips_of(), vec!["A", "B", "C"]);
/// ```
pub fn parse_newick(text: &str) -> NewickResult<Tree> {
    let mut reader = NewickReader::new(text);
    let mut tree = Tree::with_capacity(text.len() / BYTES_PER_NODE_GUESS + 1);
    // Internal nodes whose closing parenthesis has not been read yet
    let mut open: Vec<NodeId> = Vec::new();

    reader.skip_insignificant()?;
    if reader.at_end() {
        return Err(NewickError::Empty);
    }

    'nodes: loop {
        // Expecting the start of a node
        reader.skip_insignificant()?;
        if reader.peek() == Some(b'(') {
            reader.bump();
            let id = tree.push_node(open.last().copied());
            open.push(id);
            continue;
        }

        let position = reader.position;
        let label = reader
            .read_label()?
            .ok_or(NewickError::EmptyLabel { position })?;
        let id = tree.push_node(open.last().copied());
        tree.set_label(id, Some(label));
        let branch_length = reader.read_branch_length()?;
        tree.set_branch_length(id, branch_length);

        // A node is complete; close groups until a sibling or the end follows
        loop {
            reader.skip_insignificant()?;
            let position = reader.position;
            match reader.peek() {
                Some(b',') if !open.is_empty() => {
                    reader.bump();
                    continue 'nodes;
                }
                Some(b')') => {
                    let id = open
                        .pop()
                        .ok_or(NewickError::UnbalancedParentheses { position })?;
                    reader.bump();
                    reader.skip_insignificant()?;
                    let label = reader.read_label()?;
                    tree.set_label(id, label);
                    let branch_length = reader.read_branch_length()?;
                    tree.set_branch_length(id, branch_length);
                }
                Some(b';') => {
                    if !open.is_empty() {
                        return Err(NewickError::UnbalancedParentheses { position });
                    }
                    reader.bump();
                    break 'nodes;
                }
                None if open.is_empty() => return Err(NewickError::MissingTerminator),
                None => return Err(NewickError::UnbalancedParentheses { position }),
                Some(_) => return Err(reader.unexpected()),
            }
        }
    }

    reader.skip_insignificant()?;
    if !reader.at_end() {
        return Err(NewickError::TrailingContent {
            position: reader.position,
        });
    }

    tree.index_tips()
}

// =#========================================================================#=
// WRITING
// =#========================================================================#=
/// Returns the Newick string of the subtree at `node`, terminated by `;`.
///
/// Non-empty `extra` nodes are written as further children of an unlabeled
/// root whose first child is `node`.
pub(crate) fn to_newick(tree: &Tree, node: NodeId, extra: &[NodeId]) -> String {
    let mut newick = String::new();
    if extra.is_empty() {
        write_node(tree, node, &mut newick);
    } else {
        newick.push('(');
        write_node(tree, node, &mut newick);
        for &other in extra {
            newick.push(',');
            write_node(tree, other, &mut newick);
        }
        newick.push(')');
    }
    newick.push(';');
    newick
}

/// Pending output while writing a subtree.
enum Step {
    Enter(NodeId),
    Comma,
    Close(NodeId),
}

/// Writes the subtree at `root` with an explicit stack.
fn write_node(tree: &Tree, root: NodeId, newick: &mut String) {
    let mut stack = vec![Step::Enter(root)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(index) => {
                let node = &tree[index];
                if node.is_tip() {
                    write_suffix(node, newick);
                    continue;
                }
                newick.push('(');
                stack.push(Step::Close(index));
                for (i, &child) in node.children().iter().enumerate().rev() {
                    stack.push(Step::Enter(child));
                    if i > 0 {
                        stack.push(Step::Comma);
                    }
                }
            }
            Step::Comma => newick.push(','),
            Step::Close(index) => {
                newick.push(')');
                write_suffix(&tree[index], newick);
            }
        }
    }
}

/// Label and branch length of a node.
fn write_suffix(node: &TreeNode, newick: &mut String) {
    if let Some(label) = node.label() {
        newick.push_str(&escape_label(label));
    }
    if let Some(branch_length) = node.branch_length() {
        newick.push(':');
        newick.push_str(&branch_length.to_string());
    }
}

/// Quotes a label if it contains delimiters or quotes.
pub fn escape_label(label: &str) -> String {
    let needs_quotes = label
        .bytes()
        .any(|b| b == b'\'' || LABEL_DELIMITERS.contains(&b));
    if !needs_quotes {
        return label.to_string();
    }
    format!("'{}'", label.replace('\'', "''"))
}
