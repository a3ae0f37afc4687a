//! Query Tree: the crate-owned representation of one SELECT statement.
//!
//! The tree sits between the sqlparser AST and the remote dialect text. It
//! is independent of both: rewrite rules pattern-match on it and the
//! translator renders it. `Display` on every node produces remote dialect
//! text, so rendering a tree is deterministic by construction.

use std::fmt;

/// Literal values in expressions.
///
/// Numbers keep their source text so rendering reproduces them exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Number(String),
    String(String),
    Boolean(bool),
    Null,
    /// `date 'yyyy-MM-dd'`
    Date(String),
    /// `datetime 'yyyy-MM-dd HH:mm:ss'`
    DateTime(String),
    /// `timeofday 'HH:mm:ss'`
    TimeOfDay(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "{}", quote_string(s)),
            Literal::Boolean(true) => write!(f, "true"),
            Literal::Boolean(false) => write!(f, "false"),
            Literal::Null => write!(f, "null"),
            Literal::Date(s) => write!(f, "date {}", quote_string(s)),
            Literal::DateTime(s) => write!(f, "datetime {}", quote_string(s)),
            Literal::TimeOfDay(s) => write!(f, "timeofday {}", quote_string(s)),
        }
    }
}

impl Literal {
    /// Whether the literal can be rendered at all. Text holding both quote
    /// characters has no remote spelling.
    pub fn is_quotable(&self) -> bool {
        match self {
            Literal::String(s)
            | Literal::Date(s)
            | Literal::DateTime(s)
            | Literal::TimeOfDay(s) => !(s.contains('\'') && s.contains('"')),
            _ => true,
        }
    }
}

/// The remote dialect has no escape sequences inside string literals; it
/// accepts either quote character, so pick the one the value doesn't use.
fn quote_string(s: &str) -> String {
    if s.contains('\'') && !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        format!("'{}'", s)
    }
}

/// Binary operators, comparison and logical alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Literal(Literal),
    /// Column reference by label (or by remote identifier after translation).
    Column(String),
    /// Scalar or aggregate function call. `COUNT(*)` carries `Expr::Star`.
    Function { name: String, args: Vec<Expr> },
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },
    IsNull { expr: Box<Expr>, negated: bool },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    /// Parenthesized expression, kept so rendering preserves grouping.
    Nested(Box<Expr>),
    /// `*` in SELECT or inside `COUNT(*)`.
    Star,
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    /// First literal in the tree, depth first, for which `pred` holds.
    pub fn find_literal(&self, pred: &impl Fn(&Literal) -> bool) -> Option<&Literal> {
        match self {
            Expr::Literal(lit) => pred(lit).then_some(lit),
            Expr::Column(_) | Expr::Star => None,
            Expr::Function { args, .. } => args.iter().find_map(|a| a.find_literal(pred)),
            Expr::BinaryOp { left, right, .. } => left
                .find_literal(pred)
                .or_else(|| right.find_literal(pred)),
            Expr::UnaryOp { expr, .. } | Expr::IsNull { expr, .. } | Expr::Nested(expr) => {
                expr.find_literal(pred)
            }
            Expr::InList { expr, list, .. } => expr
                .find_literal(pred)
                .or_else(|| list.iter().find_map(|e| e.find_literal(pred))),
            Expr::Between {
                expr, low, high, ..
            } => expr
                .find_literal(pred)
                .or_else(|| low.find_literal(pred))
                .or_else(|| high.find_literal(pred)),
            Expr::Like { expr, pattern, .. } => expr
                .find_literal(pred)
                .or_else(|| pattern.find_literal(pred)),
        }
    }

    /// Apply `f` to every column name in the tree. Literals are never
    /// touched, so a string that happens to equal a label stays a string.
    pub fn map_columns(self, f: &impl Fn(String) -> String) -> Expr {
        let boxed = |e: Box<Expr>| Box::new(e.map_columns(f));
        match self {
            Expr::Column(name) => Expr::Column(f(name)),
            Expr::Literal(_) | Expr::Star => self,
            Expr::Function { name, args } => Expr::Function {
                name,
                args: args.into_iter().map(|a| a.map_columns(f)).collect(),
            },
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: boxed(left),
                op,
                right: boxed(right),
            },
            Expr::UnaryOp { op, expr } => Expr::UnaryOp {
                op,
                expr: boxed(expr),
            },
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: boxed(expr),
                negated,
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => Expr::InList {
                expr: boxed(expr),
                list: list.into_iter().map(|e| e.map_columns(f)).collect(),
                negated,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Expr::Between {
                expr: boxed(expr),
                low: boxed(low),
                high: boxed(high),
                negated,
            },
            Expr::Like {
                expr,
                pattern,
                negated,
            } => Expr::Like {
                expr: boxed(expr),
                pattern: boxed(pattern),
                negated,
            },
            Expr::Nested(inner) => Expr::Nested(boxed(inner)),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::Column(name) => write!(f, "{}", format_ident(name)),
            Expr::Function { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, args.join(", "))
            }
            Expr::BinaryOp { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => write!(f, "NOT {}", expr),
                UnaryOperator::Minus => write!(f, "-{}", expr),
                UnaryOperator::Plus => write!(f, "+{}", expr),
            },
            Expr::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let items: Vec<String> = list.iter().map(|e| e.to_string()).collect();
                write!(
                    f,
                    "{} {}IN ({})",
                    expr,
                    if *negated { "NOT " } else { "" },
                    items.join(", ")
                )
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => write!(
                f,
                "{} {}BETWEEN {} AND {}",
                expr,
                if *negated { "NOT " } else { "" },
                low,
                high
            ),
            Expr::Like {
                expr,
                pattern,
                negated,
            } => write!(
                f,
                "{} {}LIKE {}",
                expr,
                if *negated { "NOT " } else { "" },
                pattern
            ),
            Expr::Nested(inner) => write!(f, "({})", inner),
            Expr::Star => write!(f, "*"),
        }
    }
}

/// Format a column name for the remote dialect, quoting it with backticks
/// unless it is a plain identifier.
pub fn format_ident(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name)
    }
}

/// One SELECT list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: Expr) -> Self {
        SelectItem { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        SelectItem {
            expr,
            alias: Some(alias.into()),
        }
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {}", self.expr, format_ident(alias)),
            None => write!(f, "{}", self.expr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One ORDER BY entry. `direction` is `None` when the statement left it
/// implicit, so rendering does not invent an `ASC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub expr: Expr,
    pub direction: Option<SortDirection>,
}

impl fmt::Display for OrderItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Some(SortDirection::Asc) => write!(f, "{} ASC", self.expr),
            Some(SortDirection::Desc) => write!(f, "{} DESC", self.expr),
            None => write!(f, "{}", self.expr),
        }
    }
}

/// A parsed SELECT statement.
///
/// `from` holds the single source name exactly as written (for remote
/// sources, the locator URL). `having` is parsed so it can be rejected
/// explicitly rather than silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTree {
    pub select: Vec<SelectItem>,
    pub from: String,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QueryTree {
    pub fn new(from: impl Into<String>) -> Self {
        QueryTree {
            select: Vec::new(),
            from: from.into(),
            selection: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Alias of each SELECT item, positionally.
    pub fn aliases(&self) -> Vec<Option<String>> {
        self.select.iter().map(|item| item.alias.clone()).collect()
    }

    pub fn has_star(&self) -> bool {
        self.select.iter().any(|item| item.expr == Expr::Star)
    }
}

impl fmt::Display for QueryTree {
    /// Renders the statement without its FROM clause: the endpoint URL is
    /// the implicit target of remote dialect text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let select: Vec<String> = self.select.iter().map(|s| s.to_string()).collect();
        write!(f, "SELECT {}", select.join(", "))?;
        if let Some(selection) = &self.selection {
            write!(f, " WHERE {}", selection)?;
        }
        if !self.group_by.is_empty() {
            let groups: Vec<String> = self.group_by.iter().map(|e| e.to_string()).collect();
            write!(f, " GROUP BY {}", groups.join(", "))?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {}", having)?;
        }
        if !self.order_by.is_empty() {
            let orders: Vec<String> = self.order_by.iter().map(|o| o.to_string()).collect();
            write!(f, " ORDER BY {}", orders.join(", "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}
