//! Formula Abstract Syntax Tree types

use std::fmt;

/// Formula expression AST
///
/// A tree is independent of any row: the same tree can be evaluated against many rows.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),

    // === References ===
    /// `prop("Column Name")`
    Property(String),

    // === Operators ===
    /// Binary operation
    Binary {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    Unary {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    /// Function call; `name` is stored lowercase
    Function { name: String, args: Vec<FormulaExpr> },

    // === Conditional ===
    /// `condition ? consequent : alternate`
    Conditional {
        condition: Box<FormulaExpr>,
        consequent: Box<FormulaExpr>,
        alternate: Box<FormulaExpr>,
    },
}

impl FormulaExpr {
    /// Distinct property names referenced by this tree, in first-seen order
    ///
    /// Names are compared with the same lowercase folding as column lookup.
    pub fn referenced_properties(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut folded = Vec::new();
        self.walk(&mut |expr| {
            if let FormulaExpr::Property(name) = expr {
                let key = name.to_lowercase();
                if !folded.contains(&key) {
                    folded.push(key);
                    names.push(name.clone());
                }
            }
        });
        names
    }

    /// Distinct function names called by this tree, in first-seen order
    pub fn function_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.walk(&mut |expr| {
            if let FormulaExpr::Function { name, .. } = expr {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        });
        names
    }

    /// Pre-order traversal
    fn walk<F: FnMut(&FormulaExpr)>(&self, visit: &mut F) {
        visit(self);
        match self {
            FormulaExpr::Number(_)
            | FormulaExpr::String(_)
            | FormulaExpr::Boolean(_)
            | FormulaExpr::Property(_) => {}
            FormulaExpr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            FormulaExpr::Unary { operand, .. } => operand.walk(visit),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            FormulaExpr::Conditional {
                condition,
                consequent,
                alternate,
            } => {
                condition.walk(visit);
                consequent.walk(visit);
                alternate.walk(visit);
            }
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Logical
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
}
