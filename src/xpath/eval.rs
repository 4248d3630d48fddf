//! Evaluation of parsed expressions against a [`Document`].

use super::ast::{ArithmeticOp, Axis, CompareOp, Expr, LocationPath, NodeTest, Step};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::node::{Node, NodeValue};
use std::collections::HashMap;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A member of a node-set: a node of the document, or an attribute.
///
/// Attributes are not nodes of the document store, so they are addressed by
/// their owner element and their index in its attribute map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Item {
    Node(Node),
    Attribute(Node, usize),
}

#[derive(Debug, Clone)]
pub(crate) enum Value {
    Nodes(Vec<Item>),
    Str(String),
    Num(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy)]
struct Context {
    item: Item,
    position: usize,
    size: usize,
}

pub(crate) struct Evaluator<'d> {
    doc: &'d Document,
    expression: &'d str,
    order: HashMap<Node, usize>,
}

impl<'d> Evaluator<'d> {
    pub(crate) fn new(doc: &'d Document, expression: &'d str) -> Evaluator<'d> {
        let container = doc.container();
        let mut order = HashMap::new();
        order.insert(container, 0);
        for (i, node) in container.children_recursive(doc).into_iter().enumerate() {
            order.insert(node, i + 1);
        }
        Evaluator {
            doc,
            expression,
            order,
        }
    }

    fn error<S: Into<String>>(&self, reason: S) -> Error {
        Error::query(self.expression, reason)
    }

    /// Evaluate `expr` with the container as context and return the selected items
    /// in document order.
    pub(crate) fn select(&self, expr: &Expr) -> Result<Vec<Item>> {
        let context = Context {
            item: Item::Node(self.doc.container()),
            position: 1,
            size: 1,
        };
        match self.evaluate(expr, &context)? {
            Value::Nodes(mut items) => {
                self.sort_dedup(&mut items);
                Ok(items)
            }
            _ => Err(self.error("expression does not select nodes")),
        }
    }

    fn order_key(&self, item: &Item) -> (usize, usize) {
        // Detached nodes are never reached from the container.
        match item {
            Item::Node(node) => (self.order.get(node).copied().unwrap_or(usize::MAX), 0),
            Item::Attribute(node, index) => (
                self.order.get(node).copied().unwrap_or(usize::MAX),
                index + 1,
            ),
        }
    }

    fn sort_dedup(&self, items: &mut Vec<Item>) {
        items.sort_by_key(|item| self.order_key(item));
        items.dedup();
    }

    fn evaluate(&self, expr: &Expr, context: &Context) -> Result<Value> {
        let value = match expr {
            Expr::Or(left, right) => Value::Bool(
                self.evaluate_bool(left, context)? || self.evaluate_bool(right, context)?,
            ),
            Expr::And(left, right) => Value::Bool(
                self.evaluate_bool(left, context)? && self.evaluate_bool(right, context)?,
            ),
            Expr::Compare(op, left, right) => {
                let left = self.evaluate(left, context)?;
                let right = self.evaluate(right, context)?;
                Value::Bool(self.compare(*op, left, right))
            }
            Expr::Arithmetic(op, left, right) => {
                let left = self.number(&self.evaluate(left, context)?);
                let right = self.number(&self.evaluate(right, context)?);
                Value::Num(match op {
                    ArithmeticOp::Add => left + right,
                    ArithmeticOp::Subtract => left - right,
                    ArithmeticOp::Multiply => left * right,
                    ArithmeticOp::Divide => left / right,
                    ArithmeticOp::Modulo => left % right,
                })
            }
            Expr::Negate(inner) => Value::Num(-self.number(&self.evaluate(inner, context)?)),
            Expr::Union(left, right) => {
                let mut items = self.evaluate_nodes(left, context)?;
                items.extend(self.evaluate_nodes(right, context)?);
                self.sort_dedup(&mut items);
                Value::Nodes(items)
            }
            Expr::Literal(literal) => Value::Str(literal.clone()),
            Expr::Number(number) => Value::Num(*number),
            Expr::Variable(name) => {
                return Err(self.error(format!("variable '${}' is not bound", name)));
            }
            Expr::FunctionCall(name, args) => self.call(name, args, context)?,
            Expr::Path(path) => Value::Nodes(self.location_path(path, context)?),
            Expr::Filter(primary, predicates) => {
                let mut items = self.evaluate_nodes(primary, context)?;
                self.sort_dedup(&mut items);
                for predicate in predicates {
                    items = self.filter(items, predicate)?;
                }
                Value::Nodes(items)
            }
            Expr::PathFrom(primary, steps) => {
                let items = self.evaluate_nodes(primary, context)?;
                Value::Nodes(self.steps(items, steps)?)
            }
        };
        Ok(value)
    }

    fn evaluate_bool(&self, expr: &Expr, context: &Context) -> Result<bool> {
        Ok(self.boolean(&self.evaluate(expr, context)?))
    }

    fn evaluate_nodes(&self, expr: &Expr, context: &Context) -> Result<Vec<Item>> {
        match self.evaluate(expr, context)? {
            Value::Nodes(items) => Ok(items),
            _ => Err(self.error("expected a node-set")),
        }
    }

    fn location_path(&self, path: &LocationPath, context: &Context) -> Result<Vec<Item>> {
        let start = if path.absolute {
            Item::Node(self.doc.container())
        } else {
            context.item
        };
        self.steps(vec![start], &path.steps)
    }

    fn steps(&self, start: Vec<Item>, steps: &[Step]) -> Result<Vec<Item>> {
        let mut current = start;
        for step in steps {
            let mut next = Vec::new();
            for item in &current {
                let mut candidates: Vec<Item> = self
                    .axis(*item, step.axis)
                    .into_iter()
                    .filter(|candidate| self.matches(*candidate, &step.test, step.axis))
                    .collect();
                for predicate in &step.predicates {
                    candidates = self.filter(candidates, predicate)?;
                }
                next.extend(candidates);
            }
            self.sort_dedup(&mut next);
            current = next;
        }
        Ok(current)
    }

    /// Keep the items for which `predicate` holds. A number predicate compares
    /// against the position in `items`.
    fn filter(&self, items: Vec<Item>, predicate: &Expr) -> Result<Vec<Item>> {
        let size = items.len();
        let mut kept = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let context = Context {
                item,
                position: index + 1,
                size,
            };
            let keep = match self.evaluate(predicate, &context)? {
                Value::Num(number) => number == context.position as f64,
                value => self.boolean(&value),
            };
            if keep {
                kept.push(item);
            }
        }
        Ok(kept)
    }

    /// Items on `axis` from `item`, nearest first for reverse axes.
    fn axis(&self, item: Item, axis: Axis) -> Vec<Item> {
        let doc = self.doc;
        let node = match item {
            Item::Node(node) => node,
            Item::Attribute(owner, _) => {
                return match axis {
                    Axis::SelfAxis | Axis::DescendantOrSelf => vec![item],
                    Axis::Parent => vec![Item::Node(owner)],
                    Axis::Ancestor => self.ancestors(owner, true),
                    Axis::AncestorOrSelf => {
                        let mut items = vec![item];
                        items.extend(self.ancestors(owner, true));
                        items
                    }
                    // Attributes come before the children of their owner.
                    Axis::Following => {
                        let mut items: Vec<Item> = owner
                            .children_recursive(doc)
                            .into_iter()
                            .map(Item::Node)
                            .collect();
                        items.extend(self.following(owner));
                        items
                    }
                    Axis::Preceding => self.preceding(owner),
                    _ => Vec::new(),
                };
            }
        };
        match axis {
            Axis::Child => node.children(doc).iter().copied().map(Item::Node).collect(),
            Axis::Descendant => node
                .children_recursive(doc)
                .into_iter()
                .map(Item::Node)
                .collect(),
            Axis::DescendantOrSelf => {
                let mut items = vec![item];
                items.extend(node.children_recursive(doc).into_iter().map(Item::Node));
                items
            }
            Axis::SelfAxis => vec![item],
            Axis::Parent => node.parent(doc).map(Item::Node).into_iter().collect(),
            Axis::Ancestor => self.ancestors(node, false),
            Axis::AncestorOrSelf => self.ancestors(node, true),
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let (parent, index) = match (node.parent(doc), node.index_in_parent(doc)) {
                    (Some(parent), Some(index)) => (parent, index),
                    _ => return Vec::new(),
                };
                let siblings = parent.children(doc);
                if axis == Axis::FollowingSibling {
                    siblings[index + 1..].iter().copied().map(Item::Node).collect()
                } else {
                    siblings[..index].iter().rev().copied().map(Item::Node).collect()
                }
            }
            Axis::Following => self.following(node),
            Axis::Preceding => self.preceding(node),
            Axis::Attribute => (0..node.attributes(doc).len())
                .map(|index| Item::Attribute(node, index))
                .collect(),
            Axis::Namespace => Vec::new(),
        }
    }

    /// Nodes after `node` in document order, descendants excluded.
    fn following(&self, node: Node) -> Vec<Item> {
        let doc = self.doc;
        let mut items = Vec::new();
        let mut current = Some(node);
        while let Some(node) = current {
            if let (Some(parent), Some(index)) = (node.parent(doc), node.index_in_parent(doc)) {
                for sibling in &parent.children(doc)[index + 1..] {
                    items.push(Item::Node(*sibling));
                    items.extend(sibling.children_recursive(doc).into_iter().map(Item::Node));
                }
            }
            current = node.parent(doc);
        }
        items
    }

    /// Nodes before `node` in document order, ancestors excluded, nearest first.
    fn preceding(&self, node: Node) -> Vec<Item> {
        let doc = self.doc;
        let mut items = Vec::new();
        let mut current = Some(node);
        while let Some(node) = current {
            if let (Some(parent), Some(index)) = (node.parent(doc), node.index_in_parent(doc)) {
                for sibling in parent.children(doc)[..index].iter().rev() {
                    let mut subtree = vec![*sibling];
                    subtree.extend(sibling.children_recursive(doc));
                    items.extend(subtree.into_iter().rev().map(Item::Node));
                }
            }
            current = node.parent(doc);
        }
        items
    }

    fn ancestors(&self, node: Node, include_self: bool) -> Vec<Item> {
        let mut items = Vec::new();
        let mut current = if include_self {
            Some(node)
        } else {
            node.parent(self.doc)
        };
        while let Some(node) = current {
            items.push(Item::Node(node));
            current = node.parent(self.doc);
        }
        items
    }

    fn matches(&self, item: Item, test: &NodeTest, axis: Axis) -> bool {
        let doc = self.doc;
        match item {
            Item::Attribute(owner, index) => {
                let name = match owner.attributes(doc).get_index(index) {
                    Some((name, _)) => name.as_str(),
                    None => return false,
                };
                match test {
                    NodeTest::Node => true,
                    _ if axis != Axis::Attribute => false,
                    NodeTest::Name(expected) => name == expected.as_str(),
                    NodeTest::Wildcard => true,
                    NodeTest::PrefixWildcard(prefix) => {
                        Node::separate_prefix_name(name).0 == prefix.as_str()
                    }
                    _ => false,
                }
            }
            Item::Node(node) => match (test, node.value(doc)) {
                (NodeTest::Node, NodeValue::DocType(_)) => false,
                (NodeTest::Node, _) => true,
                (NodeTest::Name(expected), NodeValue::Element(name)) => name == expected,
                (NodeTest::Wildcard, NodeValue::Element(_)) => true,
                (NodeTest::PrefixWildcard(prefix), NodeValue::Element(_)) => {
                    node.prefix(doc) == prefix.as_str()
                }
                (NodeTest::Text, NodeValue::Text(_)) | (NodeTest::Text, NodeValue::CData(_)) => {
                    true
                }
                (NodeTest::Comment, NodeValue::Comment(_)) => true,
                (NodeTest::PI(target), NodeValue::PI(_)) => target
                    .as_ref()
                    .map_or(true, |target| node.name(doc) == target.as_str()),
                _ => false,
            },
        }
    }

    fn string_value(&self, item: Item) -> String {
        let doc = self.doc;
        match item {
            Item::Attribute(owner, index) => owner
                .attributes(doc)
                .get_index(index)
                .map(|(_, value)| value.clone())
                .unwrap_or_default(),
            Item::Node(node) => match node.value(doc) {
                NodeValue::PI(text) => text
                    .trim_start()
                    .split_once(char::is_whitespace)
                    .map(|(_, data)| data.trim_start().to_string())
                    .unwrap_or_default(),
                NodeValue::DocType(_) => String::new(),
                _ => node.text_content(doc),
            },
        }
    }

    fn item_name(&self, item: Item, local: bool) -> String {
        let doc = self.doc;
        let name = match item {
            Item::Attribute(owner, index) => owner
                .attributes(doc)
                .get_index(index)
                .map_or("", |(name, _)| name.as_str()),
            Item::Node(node) => match node.value(doc) {
                NodeValue::Element(_) | NodeValue::PI(_) => node.name(doc),
                _ => "",
            },
        };
        if local {
            Node::separate_prefix_name(name).1.to_string()
        } else {
            name.to_string()
        }
    }

    /// Namespace declared for the prefix of `item`, searched from its element upwards.
    fn namespace_uri(&self, item: Item) -> String {
        let doc = self.doc;
        let (element, name, is_attribute) = match item {
            Item::Attribute(owner, index) => match owner.attributes(doc).get_index(index) {
                Some((name, _)) => (owner, name.as_str(), true),
                None => return String::new(),
            },
            Item::Node(node) if node.is_element(doc) => (node, node.name(doc), false),
            Item::Node(_) => return String::new(),
        };
        let (prefix, _) = Node::separate_prefix_name(name);
        let declaration = match prefix {
            "" if is_attribute => return String::new(),
            "" => String::from("xmlns"),
            "xml" => return XML_NAMESPACE.to_string(),
            "xmlns" => return String::new(),
            prefix => format!("xmlns:{}", prefix),
        };
        self.inherited_attribute(element, &declaration)
            .unwrap_or_default()
    }

    /// Value of `name` on `node` or the nearest ancestor that has it.
    fn inherited_attribute(&self, node: Node, name: &str) -> Option<String> {
        let mut current = Some(node);
        while let Some(node) = current {
            if let Some(value) = node.attribute(self.doc, name) {
                return Some(value.to_string());
            }
            current = node.parent(self.doc);
        }
        None
    }

    /// Elements whose `xml:id` is one of the whitespace separated tokens of `value`.
    fn ids(&self, value: &Value) -> Vec<Item> {
        let tokens: Vec<String> = match value {
            Value::Nodes(items) => items.iter().map(|item| self.string_value(*item)).collect(),
            other => vec![self.string(other)],
        };
        let wanted: Vec<&str> = tokens.iter().flat_map(|t| t.split_whitespace()).collect();
        let mut items: Vec<Item> = self
            .doc
            .container()
            .child_elements_recursive(self.doc)
            .into_iter()
            .filter(|element| {
                element
                    .attribute(self.doc, "xml:id")
                    .map_or(false, |id| wanted.contains(&id))
            })
            .map(Item::Node)
            .collect();
        self.sort_dedup(&mut items);
        items
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(items) => items
                .iter()
                .min_by_key(|item| self.order_key(item))
                .map(|item| self.string_value(*item))
                .unwrap_or_default(),
            Value::Str(string) => string.clone(),
            Value::Num(number) => format_number(*number),
            Value::Bool(boolean) => boolean.to_string(),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Num(number) => *number,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Str(string) => parse_number(string),
            Value::Nodes(_) => parse_number(&self.string(value)),
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(items) => !items.is_empty(),
            Value::Str(string) => !string.is_empty(),
            Value::Num(number) => *number != 0.0 && !number.is_nan(),
            Value::Bool(boolean) => *boolean,
        }
    }

    fn compare(&self, op: CompareOp, left: Value, right: Value) -> bool {
        match (left, right) {
            (Value::Nodes(left), Value::Nodes(right)) => {
                let right: Vec<String> = right.iter().map(|i| self.string_value(*i)).collect();
                left.iter().any(|item| {
                    let left = self.string_value(*item);
                    right.iter().any(|right| {
                        self.compare_atoms(op, &Value::Str(left.clone()), &Value::Str(right.clone()))
                    })
                })
            }
            (Value::Nodes(items), Value::Bool(boolean)) => {
                self.compare_atoms(op, &Value::Bool(!items.is_empty()), &Value::Bool(boolean))
            }
            (Value::Bool(boolean), Value::Nodes(items)) => {
                self.compare_atoms(op, &Value::Bool(boolean), &Value::Bool(!items.is_empty()))
            }
            (Value::Nodes(items), other) => items.iter().any(|item| {
                self.compare_atoms(op, &Value::Str(self.string_value(*item)), &other)
            }),
            (other, Value::Nodes(items)) => items.iter().any(|item| {
                self.compare_atoms(op, &other, &Value::Str(self.string_value(*item)))
            }),
            (left, right) => self.compare_atoms(op, &left, &right),
        }
    }

    fn compare_atoms(&self, op: CompareOp, left: &Value, right: &Value) -> bool {
        match op {
            CompareOp::Eq | CompareOp::NotEq => {
                let equal = match (left, right) {
                    (Value::Bool(_), _) | (_, Value::Bool(_)) => {
                        self.boolean(left) == self.boolean(right)
                    }
                    (Value::Num(_), _) | (_, Value::Num(_)) => {
                        self.number(left) == self.number(right)
                    }
                    _ => self.string(left) == self.string(right),
                };
                equal == (op == CompareOp::Eq)
            }
            CompareOp::Lt => self.number(left) < self.number(right),
            CompareOp::Le => self.number(left) <= self.number(right),
            CompareOp::Gt => self.number(left) > self.number(right),
            CompareOp::Ge => self.number(left) >= self.number(right),
        }
    }

    fn check_arity(&self, name: &str, args: &[Expr], min: usize, max: usize) -> Result<()> {
        if args.len() < min || args.len() > max {
            return Err(self.error(format!(
                "function {}() called with {} arguments",
                name,
                args.len()
            )));
        }
        Ok(())
    }

    /// First argument, or the context item as a node-set when omitted.
    fn optional_arg(&self, args: &[Expr], context: &Context) -> Result<Value> {
        match args.first() {
            Some(arg) => self.evaluate(arg, context),
            None => Ok(Value::Nodes(vec![context.item])),
        }
    }

    fn string_arg(&self, args: &[Expr], index: usize, context: &Context) -> Result<String> {
        Ok(self.string(&self.evaluate(&args[index], context)?))
    }

    fn call(&self, name: &str, args: &[Expr], context: &Context) -> Result<Value> {
        let value = match name {
            "position" => {
                self.check_arity(name, args, 0, 0)?;
                Value::Num(context.position as f64)
            }
            "last" => {
                self.check_arity(name, args, 0, 0)?;
                Value::Num(context.size as f64)
            }
            "count" => {
                self.check_arity(name, args, 1, 1)?;
                Value::Num(self.evaluate_nodes(&args[0], context)?.len() as f64)
            }
            "name" | "local-name" => {
                self.check_arity(name, args, 0, 1)?;
                let first = match args.first() {
                    Some(arg) => {
                        let items = self.evaluate_nodes(arg, context)?;
                        items.into_iter().min_by_key(|item| self.order_key(item))
                    }
                    None => Some(context.item),
                };
                Value::Str(
                    first
                        .map(|item| self.item_name(item, name == "local-name"))
                        .unwrap_or_default(),
                )
            }
            "string" => {
                self.check_arity(name, args, 0, 1)?;
                Value::Str(self.string(&self.optional_arg(args, context)?))
            }
            "string-length" => {
                self.check_arity(name, args, 0, 1)?;
                let string = self.string(&self.optional_arg(args, context)?);
                Value::Num(string.chars().count() as f64)
            }
            "normalize-space" => {
                self.check_arity(name, args, 0, 1)?;
                let string = self.string(&self.optional_arg(args, context)?);
                Value::Str(string.split_whitespace().collect::<Vec<_>>().join(" "))
            }
            "concat" => {
                self.check_arity(name, args, 2, usize::MAX)?;
                let mut buf = String::new();
                for index in 0..args.len() {
                    buf.push_str(&self.string_arg(args, index, context)?);
                }
                Value::Str(buf)
            }
            "contains" | "starts-with" | "ends-with" => {
                self.check_arity(name, args, 2, 2)?;
                let haystack = self.string_arg(args, 0, context)?;
                let needle = self.string_arg(args, 1, context)?;
                Value::Bool(match name {
                    "contains" => haystack.contains(needle.as_str()),
                    "starts-with" => haystack.starts_with(needle.as_str()),
                    _ => haystack.ends_with(needle.as_str()),
                })
            }
            "not" => {
                self.check_arity(name, args, 1, 1)?;
                Value::Bool(!self.evaluate_bool(&args[0], context)?)
            }
            "boolean" => {
                self.check_arity(name, args, 1, 1)?;
                Value::Bool(self.evaluate_bool(&args[0], context)?)
            }
            "true" | "false" => {
                self.check_arity(name, args, 0, 0)?;
                Value::Bool(name == "true")
            }
            "number" => {
                self.check_arity(name, args, 0, 1)?;
                Value::Num(self.number(&self.optional_arg(args, context)?))
            }
            "namespace-uri" => {
                self.check_arity(name, args, 0, 1)?;
                let first = match args.first() {
                    Some(arg) => {
                        let items = self.evaluate_nodes(arg, context)?;
                        items.into_iter().min_by_key(|item| self.order_key(item))
                    }
                    None => Some(context.item),
                };
                Value::Str(
                    first
                        .map(|item| self.namespace_uri(item))
                        .unwrap_or_default(),
                )
            }
            "id" => {
                self.check_arity(name, args, 1, 1)?;
                let value = self.evaluate(&args[0], context)?;
                Value::Nodes(self.ids(&value))
            }
            "lang" => {
                self.check_arity(name, args, 1, 1)?;
                let wanted = self.string_arg(args, 0, context)?.to_lowercase();
                let node = match context.item {
                    Item::Node(node) => node,
                    Item::Attribute(owner, _) => owner,
                };
                let lang = self
                    .inherited_attribute(node, "xml:lang")
                    .map(|lang| lang.to_lowercase());
                Value::Bool(lang.map_or(false, |lang| {
                    lang == wanted
                        || (lang.starts_with(wanted.as_str())
                            && lang[wanted.len()..].starts_with('-'))
                }))
            }
            "substring-before" | "substring-after" => {
                self.check_arity(name, args, 2, 2)?;
                let haystack = self.string_arg(args, 0, context)?;
                let needle = self.string_arg(args, 1, context)?;
                let part = match haystack.find(needle.as_str()) {
                    Some(index) if name == "substring-before" => &haystack[..index],
                    Some(index) => &haystack[index + needle.len()..],
                    None => "",
                };
                Value::Str(part.to_string())
            }
            "substring" => {
                self.check_arity(name, args, 2, 3)?;
                let string = self.string_arg(args, 0, context)?;
                let start = round(self.number(&self.evaluate(&args[1], context)?));
                let end = match args.get(2) {
                    Some(length) => Some(start + round(self.number(&self.evaluate(length, context)?))),
                    None => None,
                };
                Value::Str(substring(&string, start, end))
            }
            "translate" => {
                self.check_arity(name, args, 3, 3)?;
                let string = self.string_arg(args, 0, context)?;
                let from: Vec<char> = self.string_arg(args, 1, context)?.chars().collect();
                let to: Vec<char> = self.string_arg(args, 2, context)?.chars().collect();
                let translated = string
                    .chars()
                    .filter_map(|c| match from.iter().position(|f| *f == c) {
                        Some(index) => to.get(index).copied(),
                        None => Some(c),
                    })
                    .collect();
                Value::Str(translated)
            }
            "sum" => {
                self.check_arity(name, args, 1, 1)?;
                let items = self.evaluate_nodes(&args[0], context)?;
                Value::Num(
                    items
                        .iter()
                        .map(|item| parse_number(&self.string_value(*item)))
                        .sum(),
                )
            }
            "floor" | "ceiling" | "round" => {
                self.check_arity(name, args, 1, 1)?;
                let number = self.number(&self.evaluate(&args[0], context)?);
                Value::Num(match name {
                    "floor" => number.floor(),
                    "ceiling" => number.ceil(),
                    _ => round(number),
                })
            }
            _ => return Err(self.error(format!("unknown function '{}'", name))),
        };
        Ok(value)
    }
}

/// Number as XPath prints it: integers without a fraction.
fn format_number(number: f64) -> String {
    if number.is_nan() {
        String::from("NaN")
    } else if number.is_infinite() {
        String::from(if number > 0.0 { "Infinity" } else { "-Infinity" })
    } else if number == number.trunc() && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/// Nearest integer, halves rounded towards positive infinity.
fn round(number: f64) -> f64 {
    if number.is_nan() || number.is_infinite() {
        number
    } else {
        (number + 0.5).floor()
    }
}

/// Characters of `string` at 1-based positions `p` with `start <= p < end`.
/// NaN bounds select nothing.
fn substring(string: &str, start: f64, end: Option<f64>) -> String {
    string
        .chars()
        .enumerate()
        .filter(|(index, _)| {
            let position = (*index + 1) as f64;
            position >= start && end.map_or(true, |end| position < end)
        })
        .map(|(_, c)| c)
        .collect()
}

/// Parse `string` with the XPath number grammar. Anything else is NaN.
fn parse_number(string: &str) -> f64 {
    let trimmed = string.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1;
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}
