//! Recursive descent parser for path expressions.

use super::ast::{ArithmeticOp, Axis, CompareOp, Expr, LocationPath, NodeTest, Step};
use super::lexer::{tokenize, Token};
use crate::error::{Error, Result};

const NODE_TYPES: [&str; 4] = ["node", "text", "comment", "processing-instruction"];

/// Parse `expression` into an [`Expr`].
///
/// # Errors
///
/// [`Error::Query`] if the expression is not valid.
pub fn parse(expression: &str) -> Result<Expr> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        expression,
        tokens,
        pos: 0,
    };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("unexpected token {:?}", token)));
    }
    Ok(expr)
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error<S: Into<String>>(&self, reason: S) -> Error {
        Error::query(self.expression, reason)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", token, self.peek())))
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CompareOp::Eq,
                Some(Token::NotEq) => CompareOp::NotEq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::Le) => CompareOp::Le,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::Ge) => CompareOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithmeticOp::Add,
                Some(Token::Minus) => ArithmeticOp::Subtract,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Arithmetic(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Multiply) => ArithmeticOp::Multiply,
                Some(Token::Div) => ArithmeticOp::Divide,
                Some(Token::Mod) => ArithmeticOp::Modulo,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Arithmetic(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr> {
        let mut left = self.parse_path_expr()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn starts_filter_expr(&self) -> bool {
        match self.peek() {
            Some(Token::Literal(_))
            | Some(Token::Number(_))
            | Some(Token::Variable(_))
            | Some(Token::LParen) => true,
            Some(Token::Name(name)) => {
                self.peek_at(1) == Some(&Token::LParen) && !NODE_TYPES.contains(&name.as_str())
            }
            _ => false,
        }
    }

    fn parse_path_expr(&mut self) -> Result<Expr> {
        if !self.starts_filter_expr() {
            return Ok(Expr::Path(self.parse_location_path()?));
        }
        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        let filter = if predicates.is_empty() {
            primary
        } else {
            Expr::Filter(Box::new(primary), predicates)
        };
        let mut steps = Vec::new();
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
            }
            _ => return Ok(filter),
        }
        self.parse_relative_steps(&mut steps)?;
        Ok(Expr::PathFrom(Box::new(filter), steps))
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Literal(literal)) => Ok(Expr::Literal(literal)),
            Some(Token::Number(number)) => Ok(Expr::Number(number)),
            Some(Token::Variable(name)) => Ok(Expr::Variable(name)),
            Some(Token::Name(name)) => {
                self.expect(&Token::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                Ok(Expr::FunctionCall(name, args))
            }
            other => Err(self.error(format!("unexpected token {:?}", other))),
        }
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.parse_or()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(predicates)
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_))
                | Some(Token::Star)
                | Some(Token::At)
                | Some(Token::Dot)
                | Some(Token::DotDot)
        )
    }

    fn parse_location_path(&mut self) -> Result<LocationPath> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if !self.starts_step() {
                    return Ok(LocationPath {
                        absolute: true,
                        steps,
                    });
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
                true
            }
            _ => false,
        };
        self.parse_relative_steps(&mut steps)?;
        Ok(LocationPath { absolute, steps })
    }

    fn parse_relative_steps(&mut self, steps: &mut Vec<Step>) -> Result<()> {
        steps.push(self.parse_step()?);
        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(Step::descendant_or_self());
                }
                _ => return Ok(()),
            }
            steps.push(self.parse_step()?);
        }
    }

    fn parse_step(&mut self) -> Result<Step> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let (Some(Token::Name(name)), Some(Token::DoubleColon)) =
            (self.peek(), self.peek_at(1))
        {
            let axis = Axis::from_name(name)
                .ok_or_else(|| self.error(format!("unknown axis '{}'", name)))?;
            self.pos += 2;
            axis
        } else {
            Axis::Child
        };
        let test = self.parse_node_test()?;
        let predicates = self.parse_predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest> {
        match self.next() {
            Some(Token::Star) => Ok(NodeTest::Wildcard),
            Some(Token::Name(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(match name.strip_suffix(":*") {
                        Some(prefix) => NodeTest::PrefixWildcard(prefix.to_string()),
                        None => NodeTest::Name(name),
                    });
                }
                self.pos += 1;
                let test = match name.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    "processing-instruction" => match self.peek() {
                        Some(Token::Literal(target)) => {
                            let target = target.clone();
                            self.pos += 1;
                            NodeTest::PI(Some(target))
                        }
                        _ => NodeTest::PI(None),
                    },
                    other => return Err(self.error(format!("unknown node type '{}'", other))),
                };
                self.expect(&Token::RParen)?;
                Ok(test)
            }
            other => Err(self.error(format!("expected a node test, found {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(name: &str) -> Step {
        Step {
            axis: Axis::Child,
            test: NodeTest::Name(name.to_string()),
            predicates: vec![],
        }
    }

    #[test]
    fn test_parse_root() {
        assert_eq!(
            parse("/").unwrap(),
            Expr::Path(LocationPath {
                absolute: true,
                steps: vec![]
            })
        );
    }

    #[test]
    fn test_parse_descendant_path() {
        assert_eq!(
            parse("//AuthManager/Username").unwrap(),
            Expr::Path(LocationPath {
                absolute: true,
                steps: vec![
                    Step::descendant_or_self(),
                    child("AuthManager"),
                    child("Username")
                ]
            })
        );
    }

    #[test]
    fn test_parse_comment_predicate() {
        let expr = parse("//a/comment()[contains(., 'x')]").unwrap();
        let steps = match expr {
            Expr::Path(path) => path.steps,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].test, NodeTest::Comment);
        assert_eq!(
            steps[2].predicates,
            vec![Expr::FunctionCall(
                "contains".to_string(),
                vec![
                    Expr::Path(LocationPath {
                        absolute: false,
                        steps: vec![Step {
                            axis: Axis::SelfAxis,
                            test: NodeTest::Node,
                            predicates: vec![]
                        }]
                    }),
                    Expr::Literal("x".to_string())
                ]
            )]
        );
    }

    #[test]
    fn test_parse_operators() {
        let expr = parse("1 + 2 * 3 = 7 and not(false())").unwrap();
        assert!(matches!(expr, Expr::And(_, _)));
        let expr = parse("div div div").unwrap();
        assert!(matches!(
            expr,
            Expr::Arithmetic(ArithmeticOp::Divide, _, _)
        ));
        let expr = parse("//*[@a * 2 = 4]").unwrap();
        let steps = match expr {
            Expr::Path(path) => path.steps,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(steps[1].test, NodeTest::Wildcard);
        assert!(matches!(
            &steps[1].predicates[0],
            Expr::Compare(CompareOp::Eq, left, _)
                if matches!(**left, Expr::Arithmetic(ArithmeticOp::Multiply, _, _))
        ));
    }

    #[test]
    fn test_parse_name_like_operator() {
        assert_eq!(
            parse("//div[div]").unwrap(),
            Expr::Path(LocationPath {
                absolute: true,
                steps: vec![
                    Step::descendant_or_self(),
                    Step {
                        axis: Axis::Child,
                        test: NodeTest::Name("div".to_string()),
                        predicates: vec![Expr::Path(LocationPath {
                            absolute: false,
                            steps: vec![child("div")]
                        })]
                    }
                ]
            })
        );
    }

    #[test]
    fn test_parse_axes_and_variables() {
        for (expression, axis) in [
            ("following::a", Axis::Following),
            ("preceding::a", Axis::Preceding),
            ("namespace::*", Axis::Namespace),
            ("ancestor-or-self::node()", Axis::AncestorOrSelf),
        ]
        .iter()
        {
            match parse(expression).unwrap() {
                Expr::Path(path) => assert_eq!(path.steps[0].axis, *axis),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(
            parse("$limit").unwrap(),
            Expr::Variable("limit".to_string())
        );
    }

    #[test]
    fn test_parse_filter_path() {
        let expr = parse("(//a)[1]/b").unwrap();
        assert!(matches!(expr, Expr::PathFrom(_, ref steps) if steps.len() == 1));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "/a/", "a[", "a]", "foo::a", "a/unknown()", "(a", "a b"].iter() {
            assert!(
                matches!(parse(bad), Err(Error::Query { .. })),
                "{:?} should not parse",
                bad
            );
        }
    }
}
