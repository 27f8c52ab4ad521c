//! Parameter records and the constraint algebra behind them.
//!
//! A [`Parameter`] is an immutable record of named fields. Each field holds a
//! [`Value`], which is either concrete (`Num`, `Sym`, `Flag`, `Addr`) or a
//! numeric constraint still waiting to be narrowed (`OneOf`, `Span`).
//! Every value belongs to exactly one [`FieldKind`], and a [`Schema`] declares
//! which kind each field must have. Schemas are what ports compare at bind time.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The direction a parameter travels along an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Source to sink.
    Down,
    /// Sink back to source.
    Up,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Down => write!(f, "downward"),
            Direction::Up => write!(f, "upward"),
        }
    }
}

/// Shape of a single parameter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldKind {
    Number,
    Symbol,
    Flag,
    Address,
}

/// A half-open address window `[base, base + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AddressRange {
    pub base: u64,
    pub size: u64,
}

impl AddressRange {
    pub fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }
}

/// A normalized set of address ranges: sorted, non-empty, and with
/// overlapping or touching ranges coalesced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressSet(Vec<AddressRange>);

impl AddressSet {
    pub fn new(ranges: impl IntoIterator<Item = AddressRange>) -> Self {
        let mut ranges: Vec<AddressRange> = ranges.into_iter().filter(|r| r.size > 0).collect();
        ranges.sort();

        let mut merged: Vec<AddressRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if range.base <= last.end() => {
                    let end = last.end().max(range.end());
                    last.size = end - last.base;
                }
                _ => merged.push(range),
            }
        }
        Self(merged)
    }

    pub fn single(base: u64, size: u64) -> Self {
        Self::new([AddressRange::new(base, size)])
    }

    pub fn ranges(&self) -> &[AddressRange] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, address: u64) -> bool {
        self.0.iter().any(|r| r.contains(address))
    }

    pub fn union(&self, other: &AddressSet) -> AddressSet {
        AddressSet::new(self.0.iter().chain(other.0.iter()).copied())
    }

    pub fn intersect(&self, other: &AddressSet) -> AddressSet {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            let a = self.0[i];
            let b = other.0[j];
            let lo = a.base.max(b.base);
            let hi = a.end().min(b.end());
            if lo < hi {
                out.push(AddressRange::new(lo, hi - lo));
            }
            if a.end() <= b.end() {
                i += 1;
            } else {
                j += 1;
            }
        }
        AddressSet(out)
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// A concrete number (widths, counts, IDs).
    Num(u64),
    /// Any one of the listed numbers.
    OneOf(BTreeSet<u64>),
    /// Any number in `lo..=hi`.
    Span { lo: u64, hi: u64 },
    /// An enumerated symbol such as a protocol variant.
    Sym(String),
    Flag(bool),
    Addr(AddressSet),
}

impl Value {
    pub fn one_of(values: impl IntoIterator<Item = u64>) -> Self {
        let set: BTreeSet<u64> = values.into_iter().collect();
        if set.len() == 1 {
            if let Some(n) = set.first() {
                return Value::Num(*n);
            }
        }
        Value::OneOf(set)
    }

    pub fn span(lo: u64, hi: u64) -> Self {
        if lo == hi {
            Value::Num(lo)
        } else {
            Value::Span { lo, hi }
        }
    }

    pub fn sym(s: impl Into<String>) -> Self {
        Value::Sym(s.into())
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Num(_) | Value::OneOf(_) | Value::Span { .. } => FieldKind::Number,
            Value::Sym(_) => FieldKind::Symbol,
            Value::Flag(_) => FieldKind::Flag,
            Value::Addr(_) => FieldKind::Address,
        }
    }

    pub fn is_concrete(&self) -> bool {
        !matches!(self, Value::OneOf(_) | Value::Span { .. })
    }

    /// A constraint no number satisfies: an empty set or an inverted span.
    pub fn is_unsatisfiable(&self) -> bool {
        match self {
            Value::OneOf(set) => set.is_empty(),
            Value::Span { lo, hi } => lo > hi,
            _ => false,
        }
    }

    /// Whether the numeric constraint admits `n`. Non-numeric values admit nothing.
    pub fn admits(&self, n: u64) -> bool {
        match self {
            Value::Num(v) => *v == n,
            Value::OneOf(set) => set.contains(&n),
            Value::Span { lo, hi } => *lo <= n && n <= *hi,
            _ => false,
        }
    }

    /// Narrow a constraint to one concrete value, picking the largest candidate.
    /// An unsatisfiable constraint has nothing to settle on.
    pub fn settle(&self) -> Result<Value, String> {
        match self {
            Value::OneOf(set) => set
                .last()
                .map(|n| Value::Num(*n))
                .ok_or_else(|| format!("{} admits no value", self)),
            Value::Span { lo, hi } if lo <= hi => Ok(Value::Num(*hi)),
            Value::Span { .. } => Err(format!("{} admits no value", self)),
            other => Ok(other.clone()),
        }
    }

    /// The concrete number after settling, if this is a satisfiable numeric field.
    pub fn as_num(&self) -> Option<u64> {
        match self.settle() {
            Ok(Value::Num(n)) => Some(n),
            _ => None,
        }
    }

    /// Intersect two values of the same kind. Returns `None` when nothing
    /// satisfies both sides.
    pub fn intersect(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Num(a), x) | (x, Value::Num(a)) if x.kind() == FieldKind::Number => {
                x.admits(*a).then_some(Value::Num(*a))
            }
            (Value::OneOf(set), x) | (x, Value::OneOf(set)) if x.kind() == FieldKind::Number => {
                let kept: BTreeSet<u64> = set.iter().copied().filter(|n| x.admits(*n)).collect();
                (!kept.is_empty()).then(|| Value::one_of(kept))
            }
            (Value::Span { lo: a_lo, hi: a_hi }, Value::Span { lo: b_lo, hi: b_hi }) => {
                let lo = (*a_lo).max(*b_lo);
                let hi = (*a_hi).min(*b_hi);
                (lo <= hi).then(|| Value::span(lo, hi))
            }
            (Value::Sym(a), Value::Sym(b)) => (a == b).then(|| Value::Sym(a.clone())),
            (Value::Flag(a), Value::Flag(b)) => (a == b).then_some(Value::Flag(*a)),
            (Value::Addr(a), Value::Addr(b)) => {
                let both = a.intersect(b);
                (!both.is_empty()).then_some(Value::Addr(both))
            }
            _ => None,
        }
    }

    fn zero(kind: FieldKind) -> Value {
        match kind {
            FieldKind::Number => Value::Num(0),
            FieldKind::Symbol => Value::Sym(String::new()),
            FieldKind::Flag => Value::Flag(false),
            FieldKind::Address => Value::Addr(AddressSet::default()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{}", n),
            Value::OneOf(set) => {
                let items: Vec<String> = set.iter().map(|n| n.to_string()).collect();
                write!(f, "{{{}}}", items.join(","))
            }
            Value::Span { lo, hi } => write!(f, "{}..={}", lo, hi),
            Value::Sym(s) => write!(f, "{}", s),
            Value::Flag(b) => write!(f, "{}", b),
            Value::Addr(set) => {
                let items: Vec<String> = set
                    .ranges()
                    .iter()
                    .map(|r| format!("0x{:x}+0x{:x}", r.base, r.size))
                    .collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Num(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Flag(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Sym(s.to_string())
    }
}

impl From<AddressSet> for Value {
    fn from(set: AddressSet) -> Self {
        Value::Addr(set)
    }
}

/// Declared shape of a parameter record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema(BTreeMap<String, FieldKind>);

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.0.insert(name.into(), kind);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that `param` has exactly the declared fields with the declared kinds.
    pub fn check(&self, param: &Parameter) -> Result<(), String> {
        for (name, kind) in &self.0 {
            match param.get(name) {
                None => return Err(format!("missing field '{}'", name)),
                Some(value) if value.kind() != *kind => {
                    return Err(format!(
                        "field '{}' is {:?}, expected {:?}",
                        name,
                        value.kind(),
                        kind
                    ))
                }
                Some(value) if value.is_unsatisfiable() => {
                    return Err(format!("field '{}' admits no value: {}", name, value))
                }
                Some(_) => {}
            }
        }
        if let Some(extra) = param.fields().map(|(k, _)| k).find(|k| !self.0.contains_key(*k)) {
            return Err(format!("undeclared field '{}'", extra));
        }
        Ok(())
    }
}

/// An immutable record of named field values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter(BTreeMap<String, Value>);

impl Parameter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// The explicit zero value of a schema. Only used when a protocol opts in
    /// through `DefaultValue::Zeroed`.
    pub fn zeroed(schema: &Schema) -> Self {
        Self(
            schema
                .fields()
                .map(|(name, kind)| (name.to_string(), Value::zero(kind)))
                .collect(),
        )
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Settled numeric value of `field`.
    pub fn num(&self, field: &str) -> Option<u64> {
        self.0.get(field).and_then(Value::as_num)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn conforms_to(&self, schema: &Schema) -> bool {
        schema.check(self).is_ok()
    }

    pub fn is_concrete(&self) -> bool {
        self.0.values().all(Value::is_concrete)
    }

    /// Settle every field, failing on the first one that admits no value.
    pub fn settle(&self) -> Result<Parameter, String> {
        self.0
            .iter()
            .map(|(k, v)| {
                v.settle()
                    .map(|settled| (k.clone(), settled))
                    .map_err(|e| format!("field '{}': {}", k, e))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(Self)
    }

    /// Field-wise intersection. Fields present on only one side are carried over.
    pub fn intersect(&self, other: &Parameter) -> Result<Parameter, String> {
        let mut out = self.0.clone();
        for (name, theirs) in &other.0 {
            let merged = match self.0.get(name) {
                None => theirs.clone(),
                Some(ours) => ours.intersect(theirs).ok_or_else(|| {
                    format!("field '{}': {} and {} have no common value", name, ours, theirs)
                })?,
            };
            out.insert(name.clone(), merged);
        }
        Ok(Self(out))
    }

    /// Replace one field, producing a new record.
    pub fn replace(&self, field: impl Into<String>, value: impl Into<Value>) -> Parameter {
        self.clone().with(field, value)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", items.join(", "))
    }
}
