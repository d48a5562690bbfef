use std::fmt;
use std::rc::Rc;

/// Opaque comparable value used for props and dependency snapshots.
///
/// Scalars compare by value. `Record` and `List` compare by *reference
/// identity* (`Rc::ptr_eq`): a freshly constructed record with equal fields
/// is still a different value. This mirrors the host-runtime assumption the
/// equality policies exist to work around — see [`crate::EqualityPolicy`].
///
/// `Str` is the exception among the composites: strings behave like scalars
/// and compare by content.
#[derive(Clone, Debug)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
    Record(Rc<Record>),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::from(items))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// `Unit` and `false` close a conditional gate: the gated child is not
    /// rendered and not evaluated at all.
    pub fn gate_closed(&self) -> bool {
        matches!(self, Value::Unit | Value::Bool(false))
    }

    /// `0`, `0.0` and `""` do *not* close a gate — they become the visible
    /// output themselves. Documented pitfall, kept on purpose.
    pub fn falsy_visible(&self) -> bool {
        match self {
            Value::Int(0) => true,
            Value::Float(f) => *f == 0.0,
            Value::Str(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                for item in items.iter() {
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Record(r) => write!(f, "{r:?}"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s.as_str()))
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(Rc::new(r))
    }
}

/// Ordered field list. Built once, shared via `Rc` inside [`Value::Record`]
/// and [`Props`].
#[derive(Debug, Default)]
pub struct Record {
    fields: Vec<(Rc<str>, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.push((Rc::from(name), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_ref(), v))
    }
}

/// Immutable props value supplied by the parent at each evaluation.
/// Cheap to clone; `same_object` is the identity fast path policies use.
#[derive(Clone, Debug)]
pub struct Props(Rc<Record>);

impl Props {
    pub fn new(record: Record) -> Self {
        Props(Rc::new(record))
    }

    pub fn empty() -> Self {
        Props(Rc::new(Record::new()))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn record(&self) -> &Record {
        &self.0
    }

    pub fn same_object(&self, other: &Props) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
