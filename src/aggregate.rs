//! Aggregate: grouped or whole-table reduction over a child operator's
//! output, with integer MIN/MAX/SUM/AVG/COUNT and string COUNT.

use std::collections::HashMap;

use crate::error::{DbError, DbErrorKind};
use crate::field::{Field, Type};
use crate::operator::OpIterator;
use crate::schema::TupleDesc;
use crate::tuple::Tuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl AggOp {
    fn name(&self) -> &'static str {
        match self {
            AggOp::Min => "min",
            AggOp::Max => "max",
            AggOp::Sum => "sum",
            AggOp::Avg => "avg",
            AggOp::Count => "count",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    count: i64,
    sum: i64,
    min: i64,
    max: i64,
}

impl Accumulator {
    fn new() -> Accumulator {
        Accumulator {
            count: 0,
            sum: 0,
            min: i64::MAX,
            max: i64::MIN,
        }
    }

    fn merge_int(&mut self, v: i32) {
        self.count += 1;
        self.sum += v as i64;
        self.min = self.min.min(v as i64);
        self.max = self.max.max(v as i64);
    }

    fn merge_present(&mut self) {
        self.count += 1;
    }

    fn finish(&self, op: AggOp) -> i32 {
        match op {
            AggOp::Min => self.min as i32,
            AggOp::Max => self.max as i32,
            AggOp::Sum => self.sum as i32,
            AggOp::Avg => (self.sum / self.count.max(1)) as i32,
            AggOp::Count => self.count as i32,
        }
    }
}

/// Integer field aggregation, with an optional group-by field of any type.
struct IntegerAggregator {
    group_field: Option<usize>,
    agg_field: usize,
    op: AggOp,
    groups: HashMap<Option<Field>, Accumulator>,
}

impl IntegerAggregator {
    fn new(group_field: Option<usize>, agg_field: usize, op: AggOp) -> IntegerAggregator {
        IntegerAggregator {
            group_field,
            agg_field,
            op,
            groups: HashMap::new(),
        }
    }

    fn merge(&mut self, tuple: &Tuple) -> Result<(), DbError> {
        let key = self.group_field.map(|i| tuple.field(i).clone());
        let value = match tuple.field(self.agg_field) {
            Field::Int(v) => *v,
            Field::Str(_) => {
                return Err(DbError::new(
                    DbErrorKind::SchemaMismatch,
                    "integer aggregator applied to a string field",
                ))
            }
        };
        self.groups.entry(key).or_insert_with(Accumulator::new).merge_int(value);
        Ok(())
    }

    fn results(&self) -> Vec<(Option<Field>, i32)> {
        self.groups
            .iter()
            .map(|(k, acc)| (k.clone(), acc.finish(self.op)))
            .collect()
    }
}

/// String field aggregation: only COUNT is meaningful for a non-ordered
/// type, so every other `AggOp` is rejected at construction.
struct StringAggregator {
    group_field: Option<usize>,
    agg_field: usize,
    groups: HashMap<Option<Field>, Accumulator>,
}

impl StringAggregator {
    fn new(group_field: Option<usize>, agg_field: usize) -> StringAggregator {
        StringAggregator {
            group_field,
            agg_field,
            groups: HashMap::new(),
        }
    }

    fn merge(&mut self, tuple: &Tuple) {
        let key = self.group_field.map(|i| tuple.field(i).clone());
        self.groups.entry(key).or_insert_with(Accumulator::new).merge_present();
    }

    fn results(&self) -> Vec<(Option<Field>, i32)> {
        self.groups
            .iter()
            .map(|(k, acc)| (k.clone(), acc.finish(AggOp::Count)))
            .collect()
    }
}

enum Inner {
    Int(IntegerAggregator),
    Str(StringAggregator),
}

/// Wraps a child `OpIterator`, draining it on `open` and replaying its
/// computed groups on `next`. The output schema is `(group, aggName)` when
/// grouping, or just `(aggName)` otherwise.
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    group_field: Option<usize>,
    agg_field: usize,
    op: AggOp,
    schema: TupleDesc,
    results: Vec<Tuple>,
    index: usize,
    opened: bool,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn OpIterator>,
        group_field: Option<usize>,
        agg_field: usize,
        op: AggOp,
    ) -> Result<Aggregate, DbError> {
        let child_schema = child.schema();
        let agg_name = format!("{}({})", op.name(), child_schema.field_name(agg_field).unwrap_or("?"));

        let field_specs: Vec<(Type, Option<String>)> = match group_field {
            Some(g) => vec![
                (child_schema.field_type(g), child_schema.field_name(g).map(|s| s.to_string())),
                (Type::Int, Some(agg_name)),
            ],
            None => vec![(Type::Int, Some(agg_name))],
        };
        let schema = TupleDesc::new(field_specs)?;

        if child_schema.field_type(agg_field) == Type::String && op != AggOp::Count {
            return Err(DbError::new(
                DbErrorKind::SchemaMismatch,
                "only COUNT is supported over a string field",
            ));
        }

        Ok(Aggregate {
            child,
            group_field,
            agg_field,
            op,
            schema,
            results: Vec::new(),
            index: 0,
            opened: false,
        })
    }

    fn compute(&mut self) -> Result<(), DbError> {
        let is_string = self.child.schema().field_type(self.agg_field) == Type::String;
        let mut inner = if is_string {
            Inner::Str(StringAggregator::new(self.group_field, self.agg_field))
        } else {
            Inner::Int(IntegerAggregator::new(self.group_field, self.agg_field, self.op))
        };

        while self.child.has_next()? {
            let tuple = self.child.next()?;
            match &mut inner {
                Inner::Int(agg) => agg.merge(&tuple)?,
                Inner::Str(agg) => agg.merge(&tuple),
            }
        }

        let mut raw = match &inner {
            Inner::Int(agg) => agg.results(),
            Inner::Str(agg) => agg.results(),
        };

        // An ungrouped COUNT/SUM over zero input rows still reports one row
        // of 0 (there is exactly one group: the whole, empty, table). MIN,
        // MAX and AVG have no sensible zero and correctly yield no row.
        if self.group_field.is_none()
            && raw.is_empty()
            && matches!(self.op, AggOp::Count | AggOp::Sum)
        {
            raw.push((None, 0));
        }

        self.results = raw
            .into_iter()
            .map(|(group, value)| {
                let fields = match (group, self.group_field) {
                    (Some(g), Some(_)) => vec![g, Field::Int(value)],
                    _ => vec![Field::Int(value)],
                };
                Tuple::new(self.schema.clone(), fields)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(())
    }
}

impl OpIterator for Aggregate {
    fn open(&mut self) -> Result<(), DbError> {
        self.child.open()?;
        self.compute()?;
        self.child.close();
        self.index = 0;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, DbError> {
        if !self.opened {
            return Err(DbError::new(DbErrorKind::IllegalState, "aggregate not open"));
        }
        Ok(self.index < self.results.len())
    }

    fn next(&mut self) -> Result<Tuple, DbError> {
        if !self.opened {
            return Err(DbError::new(DbErrorKind::IllegalState, "aggregate not open"));
        }
        let tuple = self
            .results
            .get(self.index)
            .cloned()
            .ok_or_else(|| DbError::new(DbErrorKind::NoSuchElement, "no more groups"))?;
        self.index += 1;
        Ok(tuple)
    }

    fn rewind(&mut self) -> Result<(), DbError> {
        if !self.opened {
            return Err(DbError::new(DbErrorKind::IllegalState, "aggregate not open"));
        }
        self.index = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        self.index = 0;
    }

    fn schema(&self) -> &TupleDesc {
        &self.schema
    }
}
