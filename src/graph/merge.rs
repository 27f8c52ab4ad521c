//! Merge functions, edge adapters and absence policies.
//!
//! An edge's resolved parameter is `merge(downward, upward)`, where the merge
//! function belongs to the edge's protocol. The same [`MergePolicy`] values
//! double as reducers for aggregation nodes, which fold many values into one.

use crate::graph::param::{Direction, FieldKind, Parameter, Schema, Value};
use std::fmt;
use std::sync::Arc;

/// Combines the downward and upward values meeting on an edge.
///
/// Implementations must be pure and deterministic. The engine memoizes every
/// result, so the final graph is independent of which edge is demanded first
/// only if merges applied along a chain give the same answer in any order.
/// A merge that is not associative in that sense yields implementation-defined
/// results.
pub trait Merge: Send + Sync {
    fn merge(&self, down: &Parameter, up: &Parameter) -> Result<Parameter, String>;

    /// The built-in policy this merge is, if any. Custom closures have none
    /// and compare by identity.
    fn policy(&self) -> Option<MergePolicy> {
        None
    }
}

impl<F> Merge for F
where
    F: Fn(&Parameter, &Parameter) -> Result<Parameter, String> + Send + Sync,
{
    fn merge(&self, down: &Parameter, up: &Parameter) -> Result<Parameter, String> {
        self(down, up)
    }
}

/// Built-in merge and aggregation policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MergePolicy {
    /// Field-wise constraint intersection, settled to concrete values.
    #[default]
    Intersect,
    /// Numeric fields take the larger side; other fields must agree.
    Maximum,
    /// Numeric fields take the smaller side; other fields must agree.
    Minimum,
    /// Both sides must be identical once settled.
    MustEqual,
}

impl MergePolicy {
    /// Fold many values into one with this policy.
    pub fn reduce(&self, values: &[Parameter]) -> Result<Parameter, String> {
        let (first, rest) = values
            .split_first()
            .ok_or_else(|| "no values to aggregate".to_string())?;
        rest.iter()
            .try_fold(first.settle()?, |acc, next| self.merge(&acc, next))
    }

    fn pick(&self, field: &str, a: &Value, b: &Value) -> Result<Value, String> {
        let settle = |v: &Value| v.settle().map_err(|e| format!("field '{}': {}", field, e));
        let (a, b) = (settle(a)?, settle(b)?);
        match (self, &a, &b) {
            (MergePolicy::Maximum, Value::Num(x), Value::Num(y)) => Ok(Value::Num(*x.max(y))),
            (MergePolicy::Minimum, Value::Num(x), Value::Num(y)) => Ok(Value::Num(*x.min(y))),
            _ if a == b => Ok(a.clone()),
            _ => Err(format!("field '{}': {} conflicts with {}", field, a, b)),
        }
    }

    fn combine(&self, down: &Parameter, up: &Parameter) -> Result<Parameter, String> {
        let mut out = down.settle()?;
        for (name, theirs) in up.fields() {
            let value = match down.get(name) {
                None => theirs
                    .settle()
                    .map_err(|e| format!("field '{}': {}", name, e))?,
                Some(ours) => self.pick(name, ours, theirs)?,
            };
            out = out.with(name, value);
        }
        Ok(out)
    }
}

impl Merge for MergePolicy {
    fn merge(&self, down: &Parameter, up: &Parameter) -> Result<Parameter, String> {
        match self {
            MergePolicy::Intersect => down.intersect(up)?.settle(),
            MergePolicy::Maximum | MergePolicy::Minimum => self.combine(down, up),
            MergePolicy::MustEqual => {
                let (d, u) = (down.settle()?, up.settle()?);
                if d == u {
                    Ok(d)
                } else {
                    Err(format!("{} does not equal {}", d, u))
                }
            }
        }
    }

    fn policy(&self) -> Option<MergePolicy> {
        Some(*self)
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergePolicy::Intersect => "intersect",
            MergePolicy::Maximum => "maximum",
            MergePolicy::Minimum => "minimum",
            MergePolicy::MustEqual => "must-equal",
        };
        write!(f, "{}", name)
    }
}

type Transform = Arc<dyn Fn(&Parameter) -> Result<Parameter, String> + Send + Sync>;

/// Pure per-edge transforms applied to a value as it crosses the edge.
#[derive(Clone, Default)]
pub struct EdgeAdapter {
    down: Option<Transform>,
    up: Option<Transform>,
}

impl EdgeAdapter {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_down<F>(mut self, f: F) -> Self
    where
        F: Fn(&Parameter) -> Result<Parameter, String> + Send + Sync + 'static,
    {
        self.down = Some(Arc::new(f));
        self
    }

    pub fn on_up<F>(mut self, f: F) -> Self
    where
        F: Fn(&Parameter) -> Result<Parameter, String> + Send + Sync + 'static,
    {
        self.up = Some(Arc::new(f));
        self
    }

    /// Overwrite one field of every value travelling in `direction`.
    pub fn set_field(direction: Direction, field: &str, value: impl Into<Value>) -> Self {
        let field = field.to_string();
        let value = value.into();
        let f = move |p: &Parameter| -> Result<Parameter, String> {
            Ok(p.replace(field.clone(), value.clone()))
        };
        match direction {
            Direction::Down => Self::new().on_down(f),
            Direction::Up => Self::new().on_up(f),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.down.is_none() && self.up.is_none()
    }

    pub fn apply(&self, direction: Direction, value: &Parameter) -> Result<Parameter, String> {
        let transform = match direction {
            Direction::Down => &self.down,
            Direction::Up => &self.up,
        };
        match transform {
            Some(f) => f(value),
            None => Ok(value.clone()),
        }
    }
}

impl fmt::Debug for EdgeAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeAdapter")
            .field("down", &self.down.is_some())
            .field("up", &self.up.is_some())
            .finish()
    }
}

/// What a node sees on a port that has no connections.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DefaultValue {
    /// Nothing; the node observes an empty port.
    #[default]
    Absent,
    /// A fixed fallback value.
    Value(Parameter),
    /// The schema's zero value. Must be chosen explicitly.
    Zeroed,
}

impl DefaultValue {
    pub fn materialize(&self, schema: &Schema) -> Option<Parameter> {
        match self {
            DefaultValue::Absent => None,
            DefaultValue::Value(p) => Some(p.clone()),
            DefaultValue::Zeroed => Some(Parameter::zeroed(schema)),
        }
    }
}

/// Convenience for numeric adapters: scale `field` by `num / den`.
pub fn scale_field(
    field: &str,
    num: u64,
    den: u64,
) -> impl Fn(&Parameter) -> Result<Parameter, String> + Send + Sync + 'static {
    let field = field.to_string();
    move |p: &Parameter| {
        let value = p
            .get(&field)
            .ok_or_else(|| format!("missing field '{}'", field))?;
        if value.kind() != FieldKind::Number {
            return Err(format!("field '{}' is not numeric", field));
        }
        let n = value
            .as_num()
            .ok_or_else(|| format!("field '{}' admits no value: {}", field, value))?;
        match n.checked_mul(num) {
            Some(scaled) if den != 0 && scaled % den == 0 => {
                Ok(p.replace(field.clone(), scaled / den))
            }
            _ => Err(format!("cannot scale {}={} by {}/{}", field, n, num, den)),
        }
    }
}
