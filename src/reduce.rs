//! Streaming reducers.
//!
//! A [`Reducer`] names an aggregation; an [`Accumulator`] carries its running
//! state. Accumulators can be merged, so partial reductions over adjacent
//! chunks can run in parallel and be combined in order. Absent values are
//! skipped; a reduction that saw no value finishes as absent.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::Number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reducer {
    Average,
    Sum,
    Count,
    CountDistinct,
    First,
    Last,
    Minimum,
    Maximum,
    Median,
    /// Most frequent value; ties go to the value seen first.
    Mode,
    Multiply,
    SquareSum,
}

impl Reducer {
    pub const ALL: [Reducer; 12] = [
        Reducer::Average,
        Reducer::Sum,
        Reducer::Count,
        Reducer::CountDistinct,
        Reducer::First,
        Reducer::Last,
        Reducer::Minimum,
        Reducer::Maximum,
        Reducer::Median,
        Reducer::Mode,
        Reducer::Multiply,
        Reducer::SquareSum,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Reducer::Average => "AVERAGE",
            Reducer::Sum => "SUM",
            Reducer::Count => "COUNT",
            Reducer::CountDistinct => "COUNT_DISTINCT",
            Reducer::First => "FIRST",
            Reducer::Last => "LAST",
            Reducer::Minimum => "MINIMUM",
            Reducer::Maximum => "MAXIMUM",
            Reducer::Median => "MEDIAN",
            Reducer::Mode => "MODE",
            Reducer::Multiply => "MULTIPLY",
            Reducer::SquareSum => "SQUARE_SUM",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(name))
    }

    pub fn accumulator(self) -> Accumulator {
        Accumulator::new(self)
    }

    /// Reduces `values` in order.
    pub fn reduce(self, values: impl IntoIterator<Item = Option<Number>>) -> Option<Number> {
        let mut acc = self.accumulator();
        for value in values {
            acc.push(value);
        }
        acc.finish()
    }

    /// Merges an incoming value into the one already stored at a slot.
    ///
    /// The stored value counts as a single earlier sample.
    pub fn combine(self, existing: Option<Number>, incoming: Option<Number>) -> Option<Number> {
        self.reduce([existing, incoming])
    }

    fn keeps_values(self) -> bool {
        matches!(self, Reducer::Median | Reducer::Mode | Reducer::CountDistinct)
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running state of one reduction.
#[derive(Debug, Clone)]
pub struct Accumulator {
    reducer: Reducer,
    count: u64,
    all_int: bool,
    sum: f64,
    square_sum: f64,
    product: f64,
    min: f64,
    max: f64,
    first: Option<Number>,
    last: Option<Number>,
    values: Vec<Number>,
}

impl Accumulator {
    pub fn new(reducer: Reducer) -> Self {
        Self {
            reducer,
            count: 0,
            all_int: true,
            sum: 0.0,
            square_sum: 0.0,
            product: 1.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            first: None,
            last: None,
            values: Vec::new(),
        }
    }

    pub fn reducer(&self) -> Reducer {
        self.reducer
    }

    /// Number of present values seen.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn push(&mut self, value: Option<Number>) {
        let Some(value) = Number::present(value) else { return };
        let v = value.as_f64();
        self.count += 1;
        self.all_int &= matches!(value, Number::Int(_));
        self.sum += v;
        self.square_sum += v * v;
        self.product *= v;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        if self.first.is_none() {
            self.first = Some(value);
        }
        self.last = Some(value);
        if self.reducer.keeps_values() {
            self.values.push(value);
        }
    }

    /// Folds in `other`, which covers values after the ones seen so far.
    pub fn merge(&mut self, other: Accumulator) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other;
            return;
        }
        self.count += other.count;
        self.all_int &= other.all_int;
        self.sum += other.sum;
        self.square_sum += other.square_sum;
        self.product *= other.product;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.last = other.last;
        self.values.extend(other.values);
    }

    pub fn finish(self) -> Option<Number> {
        if self.count == 0 {
            return None;
        }
        let all_int = self.all_int;
        let value = match self.reducer {
            Reducer::Average => numeric(self.sum / self.count as f64, all_int),
            Reducer::Sum => numeric(self.sum, all_int),
            Reducer::Count => Number::Int(self.count as i64),
            Reducer::CountDistinct => Number::Int(distinct(&self.values) as i64),
            Reducer::First => self.first?,
            Reducer::Last => self.last?,
            Reducer::Minimum => numeric(self.min, all_int),
            Reducer::Maximum => numeric(self.max, all_int),
            Reducer::Median => median(self.values),
            Reducer::Mode => mode(&self.values)?,
            Reducer::Multiply => numeric(self.product, all_int),
            Reducer::SquareSum => numeric(self.square_sum, all_int),
        };
        Some(value)
    }
}

/// Keeps integer results integral while they stay exactly representable.
fn numeric(v: f64, all_int: bool) -> Number {
    const EXACT: f64 = (1u64 << 53) as f64;
    if all_int && v.fract() == 0.0 && v.abs() <= EXACT {
        Number::Int(v as i64)
    } else {
        Number::Float(v)
    }
}

/// Equality key; `-0.0` and `0.0` count as one value.
fn key(value: Number) -> u64 {
    let v = value.as_f64();
    if v == 0.0 {
        0
    } else {
        v.to_bits()
    }
}

fn distinct(values: &[Number]) -> usize {
    values.iter().map(|v| key(*v)).collect::<HashSet<_>>().len()
}

fn median(mut values: Vec<Number>) -> Number {
    values.sort_by(|a, b| a.as_f64().total_cmp(&b.as_f64()));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        Number::Float((values[mid - 1].as_f64() + values[mid].as_f64()) / 2.0)
    }
}

fn mode(values: &[Number]) -> Option<Number> {
    // key -> (occurrences, index of first occurrence)
    let mut counts: HashMap<u64, (usize, usize)> = HashMap::new();
    for (i, value) in values.iter().enumerate() {
        counts.entry(key(*value)).or_insert((0, i)).0 += 1;
    }
    counts
        .into_values()
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, first)| values[first])
}
