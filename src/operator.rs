//! The pull-based operator iterator protocol shared by every operator in
//! the execution layer.
//!
//! `open`/`has_next`/`next`/`rewind`/`close`/`schema`. Calling anything but
//! `close` before `open` or after `close` is `IllegalState`; calling `next`
//! when `has_next` is false is `NoSuchElement`; calling `rewind` on an
//! operator that does not support it is `UnsupportedOperation`. These are
//! programmer errors: violating them is a bug in the caller, not a
//! recoverable condition, so implementations are free to treat the
//! returned `DbError` as fatal.

use crate::error::DbError;
use crate::schema::TupleDesc;
use crate::tuple::Tuple;

pub trait OpIterator {
    fn open(&mut self) -> Result<(), DbError>;
    fn has_next(&mut self) -> Result<bool, DbError>;
    fn next(&mut self) -> Result<Tuple, DbError>;
    fn rewind(&mut self) -> Result<(), DbError>;
    fn close(&mut self);
    fn schema(&self) -> &TupleDesc;
}
