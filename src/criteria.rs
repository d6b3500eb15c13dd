//! Filter predicates and column updates.
//!
//! A [`Criteria`] is a conjunction of per-header predicates evaluated against an
//! [`Entry`]. An [`Updates`] lists the replacement values written into matching rows.
//! Both can be built in code or parsed from the JSON object shape used by scripts:
//!
//! ```json
//! {"Age": {"operator": ">=", "value": 30}, "Name": {"operator": "in", "value": ["John", "Alice"]}}
//! ```
use crate::entry::Entry;
use crate::error::SheetDbError;
use crate::value::Value;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Comparison operators usable in a predicate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    /// `==` strict equality
    Eq,
    /// `!=` strict inequality
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `in` membership in a list
    In,
    /// `not in`
    NotIn,
}

impl Operator {
    /// Returns the textual form of the operator.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::In => "in",
            Operator::NotIn => "not in",
        }
    }

    /// Parses an operator from its textual form.
    pub fn parse(name: &str) -> Result<Self, SheetDbError> {
        match name {
            "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            "in" => Ok(Operator::In),
            "not in" => Ok(Operator::NotIn),
            _ => Err(SheetDbError::InvalidOperator(name.to_owned())),
        }
    }
}

/// Right-hand side of a predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Scalar(Value),
    List(Vec<Value>),
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Scalar(value)
    }
}

impl From<Vec<Value>> for Operand {
    fn from(values: Vec<Value>) -> Self {
        Operand::List(values)
    }
}

macro_rules! scalar_operand {
    ($($kind:ty),*) => {
        $(
            impl From<$kind> for Operand {
                fn from(value: $kind) -> Self {
                    Operand::Scalar(Value::from(value))
                }
            }
        )*
    };
}

scalar_operand!(bool, i32, i64, f64, &str, String);

impl Operand {
    /// Builds a list operand for `in` / `not in`.
    pub fn list<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
        Operand::List(values.into_iter().map(Into::into).collect())
    }

    fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Array(items) => items
                .iter()
                .map(Value::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Operand::List),
            _ => Value::from_json(value).map(Operand::Scalar),
        }
    }
}

/// A condition on one header.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub header: String,
    pub operator: Operator,
    pub operand: Operand,
}

impl Predicate {
    pub fn new(header: impl Into<String>, operator: Operator, operand: impl Into<Operand>) -> Self {
        Self {
            header: header.into(),
            operator,
            operand: operand.into(),
        }
    }

    /// Evaluates the predicate against one cell value.
    ///
    /// `in` and `not in` only hold against a list operand. Ordering operators only
    /// hold between comparable values of the same kind.
    pub fn test(&self, value: &Value) -> bool {
        match (self.operator, &self.operand) {
            (Operator::Eq, Operand::Scalar(expected)) => value == expected,
            (Operator::Ne, Operand::Scalar(expected)) => value != expected,
            (Operator::Gt, Operand::Scalar(expected)) => value.compare(expected) == Some(Ordering::Greater),
            (Operator::Ge, Operand::Scalar(expected)) => {
                matches!(value.compare(expected), Some(Ordering::Greater | Ordering::Equal))
            }
            (Operator::Lt, Operand::Scalar(expected)) => value.compare(expected) == Some(Ordering::Less),
            (Operator::Le, Operand::Scalar(expected)) => {
                matches!(value.compare(expected), Some(Ordering::Less | Ordering::Equal))
            }
            (Operator::In, Operand::List(values)) => values.contains(value),
            (Operator::NotIn, Operand::List(values)) => !values.contains(value),
            // A list never equals a single cell
            (Operator::Ne, Operand::List(_)) => true,
            _ => false,
        }
    }
}

/// A conjunction of predicates. Empty criteria match every entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Criteria {
    predicates: Vec<Predicate>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate on `header`.
    pub fn and(mut self, header: impl Into<String>, operator: Operator, operand: impl Into<Operand>) -> Self {
        self.predicates.push(Predicate::new(header, operator, operand));
        self
    }

    /// Adds a predicate whose operator is given as text, failing on unknown operators.
    pub fn parse_predicate(
        self,
        header: impl Into<String>,
        operator: &str,
        operand: impl Into<Operand>,
    ) -> Result<Self, SheetDbError> {
        Ok(self.and(header, Operator::parse(operator)?, operand))
    }

    pub fn eq(self, header: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(header, Operator::Eq, Operand::Scalar(value.into()))
    }

    pub fn ne(self, header: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(header, Operator::Ne, Operand::Scalar(value.into()))
    }

    pub fn gt(self, header: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(header, Operator::Gt, Operand::Scalar(value.into()))
    }

    pub fn ge(self, header: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(header, Operator::Ge, Operand::Scalar(value.into()))
    }

    pub fn lt(self, header: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(header, Operator::Lt, Operand::Scalar(value.into()))
    }

    pub fn le(self, header: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(header, Operator::Le, Operand::Scalar(value.into()))
    }

    pub fn is_in<T: Into<Value>>(self, header: impl Into<String>, values: impl IntoIterator<Item = T>) -> Self {
        self.and(header, Operator::In, Operand::list(values))
    }

    pub fn not_in<T: Into<Value>>(self, header: impl Into<String>, values: impl IntoIterator<Item = T>) -> Self {
        self.and(header, Operator::NotIn, Operand::list(values))
    }

    /// Parses `{"<header>": {"operator": "<op>", "value": <json>}, ...}`.
    pub fn from_json(json: &JsonValue) -> Result<Self, SheetDbError> {
        let object = json
            .as_object()
            .ok_or_else(|| SheetDbError::InvalidCriteria(format!("expected an object, found '{}'", json)))?;
        let mut criteria = Criteria::new();
        for (header, condition) in object {
            let operator = condition
                .get("operator")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| SheetDbError::InvalidCriteria(format!("missing operator for '{}'", header)))?;
            let operator = Operator::parse(operator)?;
            let value = condition.get("value").unwrap_or(&JsonValue::Null);
            let operand = Operand::from_json(value)
                .ok_or_else(|| SheetDbError::InvalidCriteria(format!("unsupported value for '{}': {}", header, value)))?;
            criteria = criteria.and(header.as_str(), operator, operand);
        }
        Ok(criteria)
    }

    /// Parses a JSON text, see [`Criteria::from_json`].
    pub fn from_json_str(text: &str) -> Result<Self, SheetDbError> {
        Self::from_json(&serde_json::from_str(text)?)
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Returns true when every predicate holds for `entry`.
    pub fn matches(&self, entry: &Entry) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate.test(entry.get(&predicate.header)))
    }
}

/// A replacement value for one header. `None` means "not provided" and is skipped.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnUpdate {
    pub header: String,
    pub value: Option<Value>,
}

/// Replacement values applied to matching rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Updates {
    columns: Vec<ColumnUpdate>,
}

impl Updates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` into `header` on every matching row.
    pub fn set(mut self, header: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(header.into(), Some(value.into()));
        self
    }

    /// Names `header` without providing a value; the column is left untouched.
    pub fn skip(mut self, header: impl Into<String>) -> Self {
        self.push(header.into(), None);
        self
    }

    /// Parses `{"<header>": <json>, ...}`. JSON `null` clears the cell.
    pub fn from_json(json: &JsonValue) -> Result<Self, SheetDbError> {
        let object = json
            .as_object()
            .ok_or_else(|| SheetDbError::InvalidCriteria(format!("expected an object, found '{}'", json)))?;
        let mut updates = Updates::new();
        for (header, value) in object {
            let value = Value::from_json(value)
                .ok_or_else(|| SheetDbError::InvalidCriteria(format!("unsupported value for '{}': {}", header, value)))?;
            updates = updates.set(header.as_str(), value);
        }
        Ok(updates)
    }

    /// Returns the value to write into `header`, if one was provided.
    pub fn value_for(&self, header: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|column| column.header == header)
            .and_then(|column| column.value.as_ref())
    }

    pub fn columns(&self) -> &[ColumnUpdate] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn push(&mut self, header: String, value: Option<Value>) {
        match self.columns.iter_mut().find(|column| column.header == header) {
            Some(column) => column.value = value,
            None => self.columns.push(ColumnUpdate { header, value }),
        }
    }
}
