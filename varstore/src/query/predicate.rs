//! Backend-agnostic predicate tree.
//!
//! Filters compile into a [`Predicate`] first and are rendered per backend at
//! the last step: [`Predicate::to_sql`] for SQL engines and
//! [`Predicate::to_expr`] for the Polars scan of the Parquet backend.

use std::fmt::Display;

use itertools::Itertools;
use polars::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Literal {
    pub fn to_sql(&self) -> String {
        match self {
            Literal::Int(v) => v.to_string(),
            Literal::Float(v) => format!("{:?}", v),
            Literal::Str(v) => format!("'{}'", v.replace('\'', "''")),
            Literal::Bool(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
        }
    }

    pub fn to_expr(&self) -> Expr {
        match self {
            Literal::Int(v) => lit(*v),
            Literal::Float(v) => lit(*v),
            Literal::Str(v) => lit(v.clone()),
            Literal::Bool(v) => lit(*v),
        }
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<u32> for Literal {
    fn from(value: u32) -> Self {
        Literal::Int(value as i64)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Str(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Const(bool),
    IsNull(String),
    IsNotNull(String),
    Compare {
        column: String,
        op:     CompareOp,
        value:  Literal,
    },
    /// `column & mask != 0`
    BitAnd { column: String, mask: u32 },
    InList {
        column: String,
        values: Vec<Literal>,
    },
    /// A list column holds at least one of `values`.
    ListContains {
        column: String,
        values: Vec<Literal>,
    },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(
        column: &str,
        op: CompareOp,
        value: impl Into<Literal>,
    ) -> Self {
        Predicate::Compare {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn equals(
        column: &str,
        value: impl Into<Literal>,
    ) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn is_null(column: &str) -> Self {
        Predicate::IsNull(column.to_string())
    }

    pub fn is_not_null(column: &str) -> Self {
        Predicate::IsNotNull(column.to_string())
    }

    pub fn bit_and(
        column: &str,
        mask: u32,
    ) -> Self {
        Predicate::BitAnd {
            column: column.to_string(),
            mask,
        }
    }

    /// Membership test; an empty list matches nothing.
    pub fn in_list<I, L>(
        column: &str,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>, {
        let values = values.into_iter().map_into().collect_vec();
        if values.is_empty() {
            return Predicate::Const(false);
        }
        Predicate::InList {
            column: column.to_string(),
            values,
        }
    }

    pub fn list_contains<I, L>(
        column: &str,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>, {
        let values = values.into_iter().map_into().collect_vec();
        if values.is_empty() {
            return Predicate::Const(false);
        }
        Predicate::ListContains {
            column: column.to_string(),
            values,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Predicate::Const(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Predicate::Const(false))
    }

    pub fn not(self) -> Self {
        match self {
            Predicate::Const(v) => Predicate::Const(!v),
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }

    pub fn and(
        self,
        other: Predicate,
    ) -> Self {
        Self::all([self, other])
    }

    pub fn or(
        self,
        other: Predicate,
    ) -> Self {
        Self::any([self, other])
    }

    /// Conjunction with constant folding; empty input is `true`.
    pub fn all<I>(predicates: I) -> Self
    where
        I: IntoIterator<Item = Predicate>, {
        let mut terms = Vec::new();
        for predicate in predicates {
            match predicate {
                Predicate::Const(true) => {},
                Predicate::Const(false) => return Predicate::Const(false),
                Predicate::And(inner) => terms.extend(inner),
                other => terms.push(other),
            }
        }
        match terms.len() {
            0 => Predicate::Const(true),
            1 => terms.remove(0),
            _ => Predicate::And(terms),
        }
    }

    /// Disjunction with constant folding; empty input is `false`.
    pub fn any<I>(predicates: I) -> Self
    where
        I: IntoIterator<Item = Predicate>, {
        let mut terms = Vec::new();
        for predicate in predicates {
            match predicate {
                Predicate::Const(false) => {},
                Predicate::Const(true) => return Predicate::Const(true),
                Predicate::Or(inner) => terms.extend(inner),
                other => terms.push(other),
            }
        }
        match terms.len() {
            0 => Predicate::Const(false),
            1 => terms.remove(0),
            _ => Predicate::Or(terms),
        }
    }

    /// Names of the columns the predicate reads.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out.into_iter().unique().collect()
    }

    fn collect_columns<'a>(
        &'a self,
        out: &mut Vec<&'a str>,
    ) {
        match self {
            Predicate::Const(_) => {},
            Predicate::IsNull(c) | Predicate::IsNotNull(c) => out.push(c),
            Predicate::Compare { column, .. }
            | Predicate::BitAnd { column, .. }
            | Predicate::InList { column, .. }
            | Predicate::ListContains { column, .. } => out.push(column),
            Predicate::Not(inner) => inner.collect_columns(out),
            Predicate::And(terms) | Predicate::Or(terms) => {
                terms.iter().for_each(|t| t.collect_columns(out))
            },
        }
    }

    /// Renders the predicate as a SQL boolean expression. Columns are
    /// qualified with `alias` when given.
    pub fn to_sql(
        &self,
        alias: Option<&str>,
    ) -> String {
        let name = |column: &str| {
            match alias {
                Some(alias) => format!("{}.{}", alias, column),
                None => column.to_string(),
            }
        };
        match self {
            Predicate::Const(true) => "1=1".to_string(),
            Predicate::Const(false) => "1=0".to_string(),
            Predicate::IsNull(c) => format!("{} IS NULL", name(c)),
            Predicate::IsNotNull(c) => format!("{} IS NOT NULL", name(c)),
            Predicate::Compare { column, op, value } => {
                format!("{} {} {}", name(column), op.as_str(), value.to_sql())
            },
            Predicate::BitAnd { column, mask } => {
                format!("({} & {}) != 0", name(column), mask)
            },
            Predicate::InList { column, values } => {
                format!(
                    "{} IN ({})",
                    name(column),
                    values.iter().map(Literal::to_sql).join(", ")
                )
            },
            Predicate::ListContains { column, values } => {
                format!(
                    "EXISTS (SELECT 1 FROM UNNEST({}) AS t(v) WHERE t.v IN ({}))",
                    name(column),
                    values.iter().map(Literal::to_sql).join(", ")
                )
            },
            Predicate::Not(inner) => format!("NOT ({})", inner.to_sql(alias)),
            Predicate::And(terms) => {
                terms
                    .iter()
                    .map(|t| format!("({})", t.to_sql(alias)))
                    .join(" AND ")
            },
            Predicate::Or(terms) => {
                terms
                    .iter()
                    .map(|t| format!("({})", t.to_sql(alias)))
                    .join(" OR ")
            },
        }
    }

    /// Renders the predicate as a Polars filter expression.
    pub fn to_expr(&self) -> Expr {
        match self {
            Predicate::Const(v) => lit(*v),
            Predicate::IsNull(c) => col(c.as_str()).is_null(),
            Predicate::IsNotNull(c) => col(c.as_str()).is_not_null(),
            Predicate::Compare { column, op, value } => {
                let (left, right) = (col(column.as_str()), value.to_expr());
                match op {
                    CompareOp::Eq => left.eq(right),
                    CompareOp::NotEq => left.neq(right),
                    CompareOp::Lt => left.lt(right),
                    CompareOp::LtEq => left.lt_eq(right),
                    CompareOp::Gt => left.gt(right),
                    CompareOp::GtEq => left.gt_eq(right),
                }
            },
            Predicate::BitAnd { column, mask } => {
                col(column.as_str())
                    .cast(DataType::Int64)
                    .and(lit(*mask as i64))
                    .neq(lit(0i64))
            },
            Predicate::InList { column, values } => {
                let strings = values
                    .iter()
                    .map(|v| {
                        match v {
                            Literal::Str(s) => Some(s.as_str()),
                            _ => None,
                        }
                    })
                    .collect::<Option<Vec<_>>>();
                match strings {
                    Some(strings) => {
                        let series = Series::new(column.as_str().into(), strings);
                        col(column.as_str()).is_in(lit(series))
                    },
                    None => {
                        values
                            .iter()
                            .map(|v| col(column.as_str()).eq(v.to_expr()))
                            .reduce(|acc, e| acc.or(e))
                            .unwrap_or(lit(false))
                    },
                }
            },
            Predicate::ListContains { column, values } => {
                values
                    .iter()
                    .map(|v| {
                        col(column.as_str())
                            .list()
                            .contains(v.to_expr())
                    })
                    .reduce(|acc, e| acc.or(e))
                    .unwrap_or(lit(false))
            },
            Predicate::Not(inner) => inner.to_expr().not(),
            Predicate::And(terms) => {
                terms
                    .iter()
                    .map(Predicate::to_expr)
                    .reduce(|acc, e| acc.and(e))
                    .unwrap_or(lit(true))
            },
            Predicate::Or(terms) => {
                terms
                    .iter()
                    .map(Predicate::to_expr)
                    .reduce(|acc, e| acc.or(e))
                    .unwrap_or(lit(false))
            },
        }
    }
}

impl Display for Predicate {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.to_sql(None))
    }
}
