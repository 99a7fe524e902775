//! Parser for hint strings such as `Dict[str, List[int]] | None`.
//!
//! Hints are Python expressions, so the text goes through tree-sitter's
//! Python grammar and the resulting nodes are mapped onto [`Hint`].

use std::sync::Arc;

use tree_sitter::{Node, Parser as TSParser, Tree};

use super::{builtin_protocol, Hint, Namespace, Origin};
use crate::error::{Error, Result};
use crate::value::{Value, BOOL, BYTES, COMPLEX, FLOAT, INT, OBJECT, STR, TUPLE};

/// Wraps a tree-sitter parser loaded with the Python grammar.
pub struct HintParser {
    parser: TSParser,
}

impl HintParser {
    /// Creates a parser for Python expressions.
    pub fn new() -> Result<Self> {
        let mut parser = TSParser::new();
        parser
            .set_language(tree_sitter_python::language())
            .map_err(|e| Error::hint_parse(format!("failed to load the Python grammar: {}", e)))?;
        Ok(Self { parser })
    }

    /// Parses `src` into a syntax tree, rejecting anything with syntax errors.
    pub fn parse_tree(&mut self, src: &str) -> Result<Tree> {
        let tree = self
            .parser
            .parse(src, None)
            .ok_or_else(|| Error::hint_parse(format!("failed to parse {:?}", src)))?;
        if tree.root_node().has_error() {
            return Err(Error::hint_parse(format!("{:?} is not a valid hint expression", src)));
        }
        Ok(tree)
    }

    /// Parses a hint string against `namespace`.
    pub fn parse(&mut self, src: &str, namespace: &Arc<Namespace>) -> Result<Hint> {
        let tree = self.parse_tree(src)?;
        let expression = single_expression(tree.root_node())?;
        Builder { src, namespace }.hint(expression)
    }
}

/// The lone expression of a module holding one expression statement.
fn single_expression(module: Node<'_>) -> Result<Node<'_>> {
    let statement = match module.named_child_count() {
        1 => module.named_child(0),
        0 => return Err(Error::hint_parse("empty hint")),
        _ => return Err(Error::hint_parse("a hint is a single expression")),
    };
    match statement {
        Some(statement)
            if statement.kind() == "expression_statement" && statement.named_child_count() == 1 =>
        {
            statement
                .named_child(0)
                .ok_or_else(|| Error::hint_parse("a hint is a single expression"))
        },
        _ => Err(Error::hint_parse("a hint is a single expression")),
    }
}

struct Builder<'a> {
    src: &'a str,
    namespace: &'a Arc<Namespace>,
}

impl<'a> Builder<'a> {
    fn text(&self, node: Node<'_>) -> Result<&'a str> {
        node.utf8_text(self.src.as_bytes())
            .map_err(|e| Error::hint_parse(format!("invalid UTF-8 in hint: {}", e)))
    }

    fn unexpected(&self, node: Node<'_>, what: &str) -> Error {
        let text = self.text(node).unwrap_or_default();
        Error::hint_parse(format!("expected {}, found {} {:?}", what, node.kind(), text))
    }

    fn hint(&self, node: Node<'_>) -> Result<Hint> {
        match node.kind() {
            "identifier" | "attribute" => self.named(node, None),
            "subscript" => {
                let value = node
                    .child_by_field_name("value")
                    .ok_or_else(|| self.unexpected(node, "a subscripted name"))?;
                if !matches!(value.kind(), "identifier" | "attribute") {
                    return Err(self.unexpected(value, "a name"));
                }
                let mut cursor = node.walk();
                let args: Vec<Node<'_>> = node.children_by_field_name("subscript", &mut cursor).collect();
                self.named(value, Some(&args))
            },
            "none" => Ok(Hint::NoneType),
            "string" => Ok(Hint::forward(self.string(node)?.0, self.namespace)),
            "binary_operator" => {
                let mut members = Vec::new();
                self.pipe_members(node, &mut members)?;
                Ok(Hint::Union(members))
            },
            "parenthesized_expression" => match node.named_child(0) {
                Some(inner) => self.hint(inner),
                None => Err(self.unexpected(node, "a hint")),
            },
            _ => Err(self.unexpected(node, "a hint")),
        }
    }

    /// Operands of a chain of `|`, left to right.
    fn pipe_members(&self, node: Node<'_>, out: &mut Vec<Hint>) -> Result<()> {
        let is_pipe = node.kind() == "binary_operator"
            && node.child_by_field_name("operator").map(|op| op.kind()) == Some("|");
        if !is_pipe {
            if node.kind() == "binary_operator" {
                return Err(self.unexpected(node, "'|' between hints"));
            }
            out.push(self.hint(node)?);
            return Ok(());
        }
        for field in ["left", "right"] {
            let operand = node
                .child_by_field_name(field)
                .ok_or_else(|| self.unexpected(node, "an operand of '|'"))?;
            self.pipe_members(operand, out)?;
        }
        Ok(())
    }

    /// Body of a string literal and whether it was a bytes literal.
    fn string(&self, node: Node<'_>) -> Result<(String, bool)> {
        let text = self.text(node)?;
        let at = text
            .find(|c: char| c == '\'' || c == '"')
            .ok_or_else(|| self.unexpected(node, "a string"))?;
        let (prefix, quoted) = text.split_at(at);
        let prefix = prefix.to_ascii_lowercase();
        if prefix.contains('f') {
            return Err(self.unexpected(node, "a plain string"));
        }
        let delimiter = if quoted.starts_with("'''") || quoted.starts_with("\"\"\"") {
            &quoted[..3]
        } else {
            &quoted[..1]
        };
        let body = quoted
            .strip_prefix(delimiter)
            .and_then(|rest| rest.strip_suffix(delimiter))
            .ok_or_else(|| self.unexpected(node, "a terminated string"))?;
        let body = if prefix.contains('r') { body.to_string() } else { unescape(body) };
        Ok((body, prefix.contains('b')))
    }

    fn literal(&self, node: Node<'_>) -> Result<Value> {
        match node.kind() {
            "integer" => self.integer(node, false),
            "unary_operator" => {
                let operator = node.child_by_field_name("operator").map(|op| op.kind());
                match (operator, node.child_by_field_name("argument")) {
                    (Some("-"), Some(arg)) if arg.kind() == "integer" => self.integer(arg, true),
                    _ => Err(self.unexpected(node, "a literal value")),
                }
            },
            "string" => {
                let (body, bytes) = self.string(node)?;
                Ok(if bytes { Value::Bytes(body.into_bytes().into()) } else { Value::from(body) })
            },
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "none" => Ok(Value::None),
            _ => Err(self.unexpected(node, "a literal value")),
        }
    }

    fn integer(&self, node: Node<'_>, negative: bool) -> Result<Value> {
        let text = self.text(node)?.replace('_', "");
        let sign = if negative { "-" } else { "" };
        let parsed = match text.get(..2).map(str::to_ascii_lowercase).as_deref() {
            Some("0x") => i64::from_str_radix(&format!("{}{}", sign, &text[2..]), 16),
            Some("0o") => i64::from_str_radix(&format!("{}{}", sign, &text[2..]), 8),
            Some("0b") => i64::from_str_radix(&format!("{}{}", sign, &text[2..]), 2),
            _ => format!("{}{}", sign, text).parse(),
        };
        parsed
            .map(Value::Int)
            .map_err(|_| Error::hint_parse(format!("integer literal {}{} out of range", sign, text)))
    }

    fn args(&self, args: &[Node<'_>]) -> Result<Vec<Hint>> {
        args.iter().map(|arg| self.hint(*arg)).collect()
    }

    fn generic(&self, origin: Origin, legacy: bool, args: Option<&[Node<'_>]>) -> Result<Hint> {
        let args = match args {
            Some(args) => self.args(args)?,
            None => Vec::new(),
        };
        Ok(Hint::Generic { origin, args, legacy })
    }

    fn tuple(&self, legacy: bool, args: Option<&[Node<'_>]>) -> Result<Hint> {
        let Some(args) = args else {
            return Ok(Hint::of(&TUPLE));
        };
        if let [only] = args {
            if only.kind() == "tuple" && only.named_child_count() == 0 {
                return Ok(Hint::Tuple { items: Vec::new(), variadic: false, legacy });
            }
        }
        let (args, variadic) = match args.split_last() {
            Some((last, rest)) if last.kind() == "ellipsis" => (rest, true),
            _ => (args, false),
        };
        if args.iter().any(|arg| arg.kind() == "ellipsis") || (variadic && args.len() != 1) {
            return Err(Error::hint_parse("'...' is only valid as tuple[T, ...]"));
        }
        Ok(Hint::Tuple { items: self.args(args)?, variadic, legacy })
    }

    fn named(&self, node: Node<'_>, args: Option<&[Node<'_>]>) -> Result<Hint> {
        let text: String = self.text(node)?.chars().filter(|c| !c.is_whitespace()).collect();
        let name = text.strip_prefix("typing.").unwrap_or(&text);
        let bare = |hint: Hint| match args {
            None => Ok(hint),
            Some(_) => Err(Error::hint_parse(format!("{} takes no type arguments", name))),
        };
        match name {
            "Any" => bare(Hint::Any),
            "None" | "NoneType" => bare(Hint::NoneType),
            "NoReturn" | "Never" => bare(Hint::NoReturn),
            "object" => bare(Hint::of(&OBJECT)),
            "int" => bare(Hint::of(&INT)),
            "bool" => bare(Hint::of(&BOOL)),
            "float" => bare(Hint::of(&FLOAT)),
            "complex" => bare(Hint::of(&COMPLEX)),
            "str" => bare(Hint::of(&STR)),
            "bytes" => bare(Hint::of(&BYTES)),
            "list" => self.generic(Origin::List, false, args),
            "List" => self.generic(Origin::List, true, args),
            "set" => self.generic(Origin::Set, false, args),
            "Set" => self.generic(Origin::Set, true, args),
            "frozenset" => self.generic(Origin::FrozenSet, false, args),
            "FrozenSet" => self.generic(Origin::FrozenSet, true, args),
            "dict" => self.generic(Origin::Dict, false, args),
            "Dict" => self.generic(Origin::Dict, true, args),
            "type" => self.generic(Origin::Type, false, args),
            "Type" => self.generic(Origin::Type, true, args),
            "tuple" => self.tuple(false, args),
            "Tuple" => self.tuple(true, args),
            "Union" => match args {
                Some(args) => Ok(Hint::Union(self.args(args)?)),
                None => Err(Error::hint_parse("Union requires type arguments")),
            },
            "Optional" => match args {
                Some([arg]) => Ok(Hint::optional(self.hint(*arg)?)),
                _ => Err(Error::hint_parse("Optional takes exactly one argument")),
            },
            "Literal" => match args {
                Some(args) if !args.is_empty() => {
                    Ok(Hint::Literal(args.iter().map(|arg| self.literal(*arg)).collect::<Result<_>>()?))
                },
                _ => Err(Error::hint_parse("Literal requires at least one value")),
            },
            "Annotated" => Err(Error::hint_parse("Annotated validators cannot be spelled as text")),
            other => match builtin_protocol(other) {
                Some(protocol) => bare(Hint::Protocol(protocol)),
                None => bare(
                    self.namespace
                        .lookup(other)
                        .unwrap_or_else(|| Hint::forward(other, self.namespace)),
                ),
            },
        }
    }
}

/// Resolves backslash escapes in a non-raw string body.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\x");
                        out.push_str(&hex);
                    },
                }
            },
            Some(c @ ('\\' | '\'' | '"')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            },
            None => out.push('\\'),
        }
    }
    out
}

/// Parses a hint string against `namespace`.
///
/// Quoted names become forward references. Unknown bare names resolve
/// against `namespace` immediately when bound, and become forward
/// references otherwise.
pub fn parse_hint(src: &str, namespace: &Arc<Namespace>) -> Result<Hint> {
    HintParser::new()?.parse(src, namespace)
}
