//! Formula parser
//!
//! A recursive descent parser with one function per precedence level.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::ParseError;
use crate::lexer::{tokenize, Token, TokenKind};

/// Deepest expression tree accepted (parentheses, calls, operators)
pub const MAX_NESTING: usize = 256;

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use tabula_formula::parse_formula;
///
/// let ast = parse_formula("1 + 2").unwrap();
/// let ast = parse_formula("if(prop(\"Score\") > 50, \"Pass\", \"Fail\")").unwrap();
/// let ast = parse_formula("prop(\"Done\") ? 1 : 0").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> Result<FormulaExpr, ParseError> {
    if formula.trim().is_empty() {
        return Err(ParseError::new("Formula is empty", 0));
    }

    let tokens = tokenize(formula)?;
    let mut parser = FormulaParser::new(tokens);
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    if !parser.check(&TokenKind::Eof) {
        let token = parser.current();
        return Err(ParseError::new(
            format!("Unexpected {} after expression", token.kind),
            token.position,
        ));
    }

    Ok(expr)
}

/// Formula parser
struct FormulaParser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl FormulaParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // === Helper methods ===

    fn current(&self) -> &Token {
        // The lexer always terminates the stream with Eof, and `consume` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn consume(&mut self) -> Token {
        let token = self.current().clone();
        if !matches!(token.kind, TokenKind::Eof) {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &TokenKind, context: &str) -> Result<Token, ParseError> {
        if self.check(expected) {
            Ok(self.consume())
        } else {
            let token = self.current();
            Err(ParseError::new(
                format!("Expected {} {}, got {}", expected, context, token.kind),
                token.position,
            ))
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::new(
                "Formula is nested too deeply",
                self.current().position,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Conditional: ? :  (right associative)
    // 2. Logical or: or, ||
    // 3. Logical and: and, &&
    // 4. Equality: ==, !=
    // 5. Relational: >, <, >=, <=
    // 6. Additive: +, -
    // 7. Multiplicative: *, /, %
    // 8. Unary: not, !, -, +
    // 9. Primary: literals, function calls, parentheses

    fn parse_expression(&mut self) -> Result<FormulaExpr, ParseError> {
        self.enter()?;
        let expr = self.parse_conditional();
        self.leave();
        expr
    }

    fn parse_conditional(&mut self) -> Result<FormulaExpr, ParseError> {
        let condition = self.parse_or()?;

        if self.check(&TokenKind::Question) {
            self.consume();
            let consequent = self.parse_expression()?;
            self.expect(&TokenKind::Colon, "in conditional expression")?;
            let alternate = self.parse_expression()?;
            return Ok(FormulaExpr::Conditional {
                condition: Box::new(condition),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            });
        }

        Ok(condition)
    }

    fn parse_or(&mut self) -> Result<FormulaExpr, ParseError> {
        let mut left = self.parse_and()?;
        let mut chained = 0;

        while self.check(&TokenKind::Or) {
            self.consume();
            self.enter()?;
            chained += 1;
            let right = self.parse_and()?;
            left = binary(BinaryOperator::Or, left, right);
        }

        self.depth -= chained;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<FormulaExpr, ParseError> {
        let mut left = self.parse_equality()?;
        let mut chained = 0;

        while self.check(&TokenKind::And) {
            self.consume();
            self.enter()?;
            chained += 1;
            let right = self.parse_equality()?;
            left = binary(BinaryOperator::And, left, right);
        }

        self.depth -= chained;
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<FormulaExpr, ParseError> {
        let mut left = self.parse_relational()?;
        let mut chained = 0;

        loop {
            let op = match self.current().kind {
                TokenKind::EqualEqual => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };

            self.consume();
            self.enter()?;
            chained += 1;
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }

        self.depth -= chained;
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<FormulaExpr, ParseError> {
        let mut left = self.parse_additive()?;
        let mut chained = 0;

        loop {
            let op = match self.current().kind {
                TokenKind::Greater => BinaryOperator::GreaterThan,
                TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
                TokenKind::Less => BinaryOperator::LessThan,
                TokenKind::LessEqual => BinaryOperator::LessEqual,
                _ => break,
            };

            self.consume();
            self.enter()?;
            chained += 1;
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }

        self.depth -= chained;
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<FormulaExpr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        let mut chained = 0;

        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            self.enter()?;
            chained += 1;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }

        self.depth -= chained;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<FormulaExpr, ParseError> {
        let mut left = self.parse_unary()?;
        let mut chained = 0;

        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                TokenKind::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.consume();
            self.enter()?;
            chained += 1;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }

        self.depth -= chained;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<FormulaExpr, ParseError> {
        let op = match self.current().kind {
            // `not(...)` is a call to the `not` function
            TokenKind::Not if !matches!(self.peek_kind(1), TokenKind::LeftParen) => {
                UnaryOperator::Not
            }
            TokenKind::Minus => UnaryOperator::Negate,
            TokenKind::Plus => UnaryOperator::Plus,
            _ => return self.parse_primary(),
        };

        self.consume();
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        Ok(FormulaExpr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn parse_primary(&mut self) -> Result<FormulaExpr, ParseError> {
        let token = self.consume();
        match token.kind {
            TokenKind::Number(n) => Ok(FormulaExpr::Number(n)),
            TokenKind::String(s) => Ok(FormulaExpr::String(s)),
            TokenKind::Boolean(b) => Ok(FormulaExpr::Boolean(b)),

            TokenKind::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen, "to close parenthesis")?;
                Ok(expr)
            }

            TokenKind::Identifier(name) => {
                if self.check(&TokenKind::LeftParen) {
                    self.parse_function_call(name, token.position)
                } else {
                    Err(ParseError::new(
                        format!(
                            "Unknown identifier '{}' - did you mean to call a function?",
                            name
                        ),
                        token.position,
                    ))
                }
            }

            // Keyword spelled as a function call: and(a, b), or(a, b), not(a)
            TokenKind::And if self.check(&TokenKind::LeftParen) => {
                self.parse_function_call("and".to_string(), token.position)
            }
            TokenKind::Or if self.check(&TokenKind::LeftParen) => {
                self.parse_function_call("or".to_string(), token.position)
            }
            TokenKind::Not if self.check(&TokenKind::LeftParen) => {
                self.parse_function_call("not".to_string(), token.position)
            }

            TokenKind::Eof => Err(ParseError::new(
                "Unexpected end of input",
                token.position,
            )),

            other => Err(ParseError::new(
                format!("Unexpected {}", other),
                token.position,
            )),
        }
    }

    fn parse_function_call(
        &mut self,
        name: String,
        position: usize,
    ) -> Result<FormulaExpr, ParseError> {
        self.expect(&TokenKind::LeftParen, "after function name")?;

        let mut args = Vec::new();

        // Parse arguments
        if !self.check(&TokenKind::RightParen) {
            args.push(self.parse_expression()?);

            while self.check(&TokenKind::Comma) {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        let context = format!("in argument list of {}()", name);
        self.expect(&TokenKind::RightParen, &context)?;

        let name = name.to_lowercase();
        if name == "prop" {
            return match args.as_slice() {
                [FormulaExpr::String(column)] => Ok(FormulaExpr::Property(column.clone())),
                _ => Err(ParseError::new(
                    "prop() expects exactly one string literal argument",
                    position,
                )),
            };
        }

        Ok(FormulaExpr::Function { name, args })
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
