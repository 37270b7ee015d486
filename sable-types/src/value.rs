//! The tagged value container.
//!
//! A [`Value`] carries a NULL bit independent of its payload: a null value
//! keeps its declared type, and assignment into it preserves that type,
//! converting the source where an implicit conversion exists.

use core::cmp::Ordering;
use core::fmt;

use crate::archive::{ArchiveReader, ArchiveWriter, Externalizable};
use crate::array::DataArray;
use crate::bitset::BitSet;
use crate::calendar::{Date, DateTime};
use crate::decimal::Decimal;
use crate::error::ValueError;
use crate::object_id::ObjectId;
use crate::operation::Operation;
use crate::string::Utf16String;
use crate::word::{WordCompare, WordData};

/// Hash of any null value.
const NULL_HASH: u64 = 0x9e37_79b9_7f4a_7c15;

/// Class-id base for value kinds in archives.
const VALUE_CLASS_BASE: i32 = 100;

/// Dynamic type tags of [`Value`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
#[allow(missing_docs)]
pub enum DataType {
    /// Undetermined: a slot of this type adopts whatever is assigned into it.
    #[default]
    Data = 0,
    Bool = 1,
    Int32 = 2,
    UInt32 = 3,
    Int64 = 4,
    UInt64 = 5,
    Double = 6,
    Decimal = 7,
    String = 8,
    Binary = 9,
    Date = 10,
    DateTime = 11,
    ObjectId = 12,
    BitSet = 13,
    Array = 14,
    Word = 15,
}

impl DataType {
    /// The serialized type code.
    pub const fn code(&self) -> i32 {
        *self as i32
    }

    /// Recovers a type from its serialized code.
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Data,
            1 => Self::Bool,
            2 => Self::Int32,
            3 => Self::UInt32,
            4 => Self::Int64,
            5 => Self::UInt64,
            6 => Self::Double,
            7 => Self::Decimal,
            8 => Self::String,
            9 => Self::Binary,
            10 => Self::Date,
            11 => Self::DateTime,
            12 => Self::ObjectId,
            13 => Self::BitSet,
            14 => Self::Array,
            15 => Self::Word,
            _ => return None,
        })
    }

    /// True for types that take part in arithmetic promotion.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int32 | Self::UInt32 | Self::Int64 | Self::UInt64 | Self::Double | Self::Decimal
        )
    }

    /// True for non-composite types.
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Self::Array | Self::BitSet | Self::Data)
    }

    fn numeric_rank(&self) -> Option<u8> {
        Some(match self {
            Self::Int32 => 0,
            Self::UInt32 => 1,
            Self::Int64 => 2,
            Self::UInt64 => 3,
            Self::Decimal => 4,
            Self::Double => 5,
            _ => return None,
        })
    }

    fn from_numeric_rank(rank: u8) -> Self {
        match rank {
            0 => Self::Int32,
            1 => Self::UInt32,
            2 => Self::Int64,
            3 => Self::UInt64,
            4 => Self::Decimal,
            _ => Self::Double,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Data,
    Bool(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Decimal(Decimal),
    String(Utf16String),
    Binary(Vec<u8>),
    Date(Date),
    DateTime(DateTime),
    ObjectId(ObjectId),
    BitSet(BitSet),
    Array(DataArray),
    Word(WordData),
}

impl Body {
    fn default_of(data_type: DataType) -> Body {
        match data_type {
            DataType::Data => Body::Data,
            DataType::Bool => Body::Bool(false),
            DataType::Int32 => Body::Int32(0),
            DataType::UInt32 => Body::UInt32(0),
            DataType::Int64 => Body::Int64(0),
            DataType::UInt64 => Body::UInt64(0),
            DataType::Double => Body::Double(0.0),
            DataType::Decimal => Body::Decimal(Decimal::default()),
            DataType::String => Body::String(Utf16String::new()),
            DataType::Binary => Body::Binary(Vec::new()),
            DataType::Date => Body::Date(Date::default()),
            DataType::DateTime => Body::DateTime(DateTime::default()),
            DataType::ObjectId => Body::ObjectId(ObjectId::UNDEFINED),
            DataType::BitSet => Body::BitSet(BitSet::new()),
            DataType::Array => Body::Array(DataArray::new()),
            DataType::Word => Body::Word(WordData::default()),
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            Body::Data => DataType::Data,
            Body::Bool(_) => DataType::Bool,
            Body::Int32(_) => DataType::Int32,
            Body::UInt32(_) => DataType::UInt32,
            Body::Int64(_) => DataType::Int64,
            Body::UInt64(_) => DataType::UInt64,
            Body::Double(_) => DataType::Double,
            Body::Decimal(_) => DataType::Decimal,
            Body::String(_) => DataType::String,
            Body::Binary(_) => DataType::Binary,
            Body::Date(_) => DataType::Date,
            Body::DateTime(_) => DataType::DateTime,
            Body::ObjectId(_) => DataType::ObjectId,
            Body::BitSet(_) => DataType::BitSet,
            Body::Array(_) => DataType::Array,
            Body::Word(_) => DataType::Word,
        }
    }
}

enum Num {
    Int(i128),
    Float(f64),
    Dec(Decimal),
}

/// A scalar, composite, or undetermined value with an explicit NULL bit.
#[derive(Debug, Clone)]
pub struct Value {
    null: bool,
    body: Body,
}

impl Value {
    /// A null value of undetermined type.
    pub const fn null() -> Value {
        Value {
            null: true,
            body: Body::Data,
        }
    }

    /// A null value of the given declared type.
    pub fn null_of(data_type: DataType) -> Value {
        Value {
            null: true,
            body: Body::default_of(data_type),
        }
    }

    /// A non-null default value of the given type.
    pub fn default_of(data_type: DataType) -> Value {
        Value {
            null: false,
            body: Body::default_of(data_type),
        }
    }

    /// The dynamic type.
    pub fn data_type(&self) -> DataType {
        self.body.data_type()
    }

    /// The element type when this is an array.
    pub fn element_type(&self) -> Option<DataType> {
        match &self.body {
            Body::Array(a) => Some(a.element_type()),
            _ => None,
        }
    }

    /// True when the NULL bit is set.
    pub const fn is_null(&self) -> bool {
        self.null
    }

    /// Sets the NULL bit, keeping the declared type.
    pub fn set_null(&mut self) {
        self.null = true;
    }

    /// True when this value is a heterogeneous array (a tuple row).
    pub fn is_row(&self) -> bool {
        matches!(&self.body, Body::Array(a) if a.element_type() == DataType::Data)
    }

    /// Borrows the array payload.
    pub fn as_array(&self) -> Option<&DataArray> {
        match &self.body {
            Body::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Mutably borrows the array payload.
    pub fn as_array_mut(&mut self) -> Option<&mut DataArray> {
        match &mut self.body {
            Body::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Borrows the string payload.
    pub fn as_str16(&self) -> Option<&Utf16String> {
        match &self.body {
            Body::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows the binary payload.
    pub fn as_binary(&self) -> Option<&Vec<u8>> {
        match &self.body {
            Body::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Borrows the bitset payload.
    pub fn as_bitset(&self) -> Option<&BitSet> {
        match &self.body {
            Body::BitSet(b) => Some(b),
            _ => None,
        }
    }

    /// Borrows the word payload.
    pub fn as_word(&self) -> Option<&WordData> {
        match &self.body {
            Body::Word(w) => Some(w),
            _ => None,
        }
    }

    /// The object-id payload.
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match &self.body {
            Body::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    /// The bool payload.
    pub fn as_bool(&self) -> Option<bool> {
        match &self.body {
            Body::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Converts a non-null numeric payload to i32 when it fits.
    pub fn to_i32(&self) -> Option<i32> {
        if self.null {
            return None;
        }
        match self.numeric()? {
            Num::Int(v) => i32::try_from(v).ok(),
            Num::Float(v) => {
                let t = v.trunc();
                (t >= i32::MIN as f64 && t <= i32::MAX as f64).then_some(t as i32)
            }
            Num::Dec(d) => i32::try_from(decimal_to_int(&d)).ok(),
        }
    }

    /// Converts a non-null numeric payload to i64 when it fits.
    pub fn to_i64(&self) -> Option<i64> {
        if self.null {
            return None;
        }
        match self.numeric()? {
            Num::Int(v) => i64::try_from(v).ok(),
            Num::Float(v) => {
                let t = v.trunc();
                (t >= i64::MIN as f64 && t <= i64::MAX as f64).then_some(t as i64)
            }
            Num::Dec(d) => i64::try_from(decimal_to_int(&d)).ok(),
        }
    }

    /// Converts a non-null numeric payload to u32 when it fits.
    pub fn to_u32(&self) -> Option<u32> {
        self.to_i64().and_then(|v| u32::try_from(v).ok())
    }

    /// Converts a non-null numeric payload to f64.
    pub fn to_f64(&self) -> Option<f64> {
        if self.null {
            return None;
        }
        Some(match self.numeric()? {
            Num::Int(v) => v as f64,
            Num::Float(v) => v,
            Num::Dec(d) => d.to_f64(),
        })
    }

    fn numeric(&self) -> Option<Num> {
        Some(match &self.body {
            Body::Int32(v) => Num::Int(*v as i128),
            Body::UInt32(v) => Num::Int(*v as i128),
            Body::Int64(v) => Num::Int(*v as i128),
            Body::UInt64(v) => Num::Int(*v as i128),
            Body::Double(v) => Num::Float(*v),
            Body::Decimal(d) => Num::Dec(*d),
            _ => return None,
        })
    }

    /// Clones this value.
    pub fn copy(&self) -> Value {
        self.clone()
    }

    /// Assigns `other` into this value, preserving this value's declared type
    /// when it is concrete. Numeric payloads convert along the implicit
    /// lattice; impossible conversions fail with [`ValueError::NotCompatible`]
    /// and out-of-range numeric conversions with
    /// [`ValueError::NumericValueOutOfRange`].
    pub fn assign(&mut self, other: &Value) -> Result<(), ValueError> {
        if other.null {
            self.null = true;
            return Ok(());
        }
        if matches!(self.body, Body::Data) || self.data_type() == other.data_type() {
            self.body = other.body.clone();
            self.null = false;
            return Ok(());
        }
        let own_type = self.data_type();
        if own_type.is_numeric() && other.data_type().is_numeric() {
            self.body = convert_numeric(other, own_type).ok_or(ValueError::NumericValueOutOfRange)?;
            self.null = false;
            return Ok(());
        }
        Err(ValueError::NotCompatible)
    }

    /// Assignment requiring identical dynamic types.
    pub fn assign_no_cast(&mut self, other: &Value) -> Result<(), ValueError> {
        if !matches!(self.body, Body::Data) && self.data_type() != other.data_type() {
            return Err(ValueError::NotSupported);
        }
        self.assign(other)
    }

    /// Three-way comparison. `None` is the unknown indicator: one of the
    /// operands is null.
    pub fn compare_to(&self, other: &Value) -> Option<Ordering> {
        if self.null || other.null {
            return None;
        }
        if let (Some(a), Some(b)) = (self.numeric(), other.numeric()) {
            return Some(compare_numeric(&a, &b));
        }
        Some(match (&self.body, &other.body) {
            (Body::Bool(a), Body::Bool(b)) => a.cmp(b),
            (Body::String(a), Body::String(b)) => a.cmp(b),
            (Body::Binary(a), Body::Binary(b)) => a.cmp(b),
            (Body::Date(a), Body::Date(b)) => a.cmp(b),
            (Body::DateTime(a), Body::DateTime(b)) => a.cmp(b),
            (Body::ObjectId(a), Body::ObjectId(b)) => a.cmp(b),
            (Body::Word(a), Body::Word(b)) => a.compare_by(b, WordCompare::Term),
            (Body::Array(a), Body::Array(b)) => a.compare_to(b),
            (Body::BitSet(a), Body::BitSet(b)) => a.iter().cmp(b.iter()),
            // No common ground: order by type tag so heterogeneous data still
            // sorts deterministically.
            _ => self.data_type().cmp(&other.data_type()),
        })
    }

    /// Comparison under one of the word-data comparators.
    pub fn compare_word(&self, other: &Value, variant: WordCompare) -> Option<Ordering> {
        if self.null || other.null {
            return None;
        }
        match (&self.body, &other.body) {
            (Body::Word(a), Body::Word(b)) => Some(a.compare_by(b, variant)),
            _ => self.compare_to(other),
        }
    }

    /// Total order for sorting: nulls compare equal to each other and greater
    /// than every non-null value, so ascending output carries them last.
    pub fn compare_total(&self, other: &Value) -> Ordering {
        match (self.null, other.null) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.compare_to(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Equality with implicit conversion; null never equals anything.
    pub fn equals(&self, other: &Value) -> bool {
        self.compare_to(other) == Some(Ordering::Equal)
    }

    /// Equality requiring identical dynamic types.
    pub fn equals_no_cast(&self, other: &Value) -> bool {
        self.data_type() == other.data_type() && !self.null && !other.null && self.body == other.body
    }

    /// Performs an arithmetic operation with type promotion. `Ok(None)` means
    /// the result did not fit (overflow or division by zero); the caller
    /// chooses between the overflow-as-null policy and an error.
    pub fn operate_with(
        &self,
        op: Operation,
        other: Option<&Value>,
    ) -> Result<Option<Value>, ValueError> {
        match other {
            None => self.operate_monadic(op),
            Some(rhs) => self.operate_dyadic(op, rhs),
        }
    }

    fn operate_monadic(&self, op: Operation) -> Result<Option<Value>, ValueError> {
        if !op.is_monadic() {
            return Err(ValueError::BadArgument);
        }
        let own_type = self.data_type();
        if self.null && own_type.is_numeric() {
            return Ok(Some(Value::null_of(own_type)));
        }
        let Some(operand) = self.numeric() else {
            return Err(ValueError::NotCompatible);
        };
        let result = match operand {
            Num::Int(v) => {
                let r = match op {
                    Operation::Negation => v.checked_neg(),
                    _ => v.checked_abs(),
                };
                match r {
                    Some(r) => int_value(r, own_type),
                    None => None,
                }
            }
            Num::Float(v) => {
                let r = match op {
                    Operation::Negation => -v,
                    _ => v.abs(),
                };
                r.is_finite().then(|| Value::from(r))
            }
            Num::Dec(d) => {
                let r = match op {
                    Operation::Negation => d.checked_neg(),
                    _ => d.checked_abs(),
                };
                r.map(Value::from)
            }
        };
        Ok(result)
    }

    fn operate_dyadic(&self, op: Operation, other: &Value) -> Result<Option<Value>, ValueError> {
        if op.is_monadic() {
            return Err(ValueError::BadArgument);
        }
        let lhs_rank = self
            .data_type()
            .numeric_rank()
            .ok_or(ValueError::NotCompatible)?;
        let rhs_rank = other
            .data_type()
            .numeric_rank()
            .ok_or(ValueError::NotCompatible)?;
        let result_type = DataType::from_numeric_rank(lhs_rank.max(rhs_rank));
        if self.null || other.null {
            return Ok(Some(Value::null_of(result_type)));
        }
        let (Some(a), Some(b)) = (self.numeric(), other.numeric()) else {
            return Err(ValueError::NotCompatible);
        };
        let result = match result_type {
            DataType::Double => {
                let (a, b) = (num_to_f64(&a), num_to_f64(&b));
                let r = match op {
                    Operation::Addition => a + b,
                    Operation::Subtraction => a - b,
                    Operation::Multiplication => a * b,
                    Operation::Division => a / b,
                    _ => a % b,
                };
                r.is_finite().then(|| Value::from(r))
            }
            DataType::Decimal => {
                let (a, b) = (num_to_decimal(&a), num_to_decimal(&b));
                let r = match op {
                    Operation::Addition => a.checked_add(&b),
                    Operation::Subtraction => a.checked_sub(&b),
                    Operation::Multiplication => a.checked_mul(&b),
                    Operation::Division => a.checked_div(&b),
                    _ => a.checked_rem(&b),
                };
                r.map(Value::from)
            }
            _ => {
                let (a, b) = match (a, b) {
                    (Num::Int(a), Num::Int(b)) => (a, b),
                    _ => return Err(ValueError::NotCompatible),
                };
                let r = match op {
                    Operation::Addition => a.checked_add(b),
                    Operation::Subtraction => a.checked_sub(b),
                    Operation::Multiplication => a.checked_mul(b),
                    Operation::Division => a.checked_div(b),
                    _ => a.checked_rem(b),
                };
                match r {
                    Some(r) => int_value(r, result_type),
                    None => None,
                }
            }
        };
        Ok(result)
    }

    /// Deterministic hash; every null value hashes to the same sentinel and
    /// array hashes fold their element hashes.
    pub fn hash_code(&self) -> u64 {
        if self.null {
            return NULL_HASH;
        }
        let mut h = fnv_start(self.data_type().code() as u64);
        match &self.body {
            Body::Data => {}
            Body::Bool(v) => h = fnv(h, &[*v as u8]),
            Body::Int32(v) => h = fnv(h, &v.to_le_bytes()),
            Body::UInt32(v) => h = fnv(h, &v.to_le_bytes()),
            Body::Int64(v) => h = fnv(h, &v.to_le_bytes()),
            Body::UInt64(v) => h = fnv(h, &v.to_le_bytes()),
            Body::Double(v) => h = fnv(h, &v.to_bits().to_le_bytes()),
            Body::Decimal(d) => {
                h = fnv(h, &d.digits().to_le_bytes());
                h = fnv(h, &d.scale().to_le_bytes());
            }
            Body::String(s) => {
                for unit in s.units() {
                    h = fnv(h, &unit.to_le_bytes());
                }
            }
            Body::Binary(b) => h = fnv(h, b),
            Body::Date(d) => {
                h = fnv(h, &d.year.to_le_bytes());
                h = fnv(h, &[d.month, d.day]);
            }
            Body::DateTime(t) => {
                h = fnv(h, &t.date.year.to_le_bytes());
                h = fnv(h, &[t.date.month, t.date.day, t.hour, t.minute, t.second]);
                h = fnv(h, &t.millisecond.to_le_bytes());
            }
            Body::ObjectId(id) => h = fnv(h, &id.value().to_le_bytes()),
            Body::BitSet(b) => {
                for bit in b.iter() {
                    h = fnv(h, &bit.to_le_bytes());
                }
            }
            Body::Array(a) => {
                for element in a.values() {
                    h = fnv(h, &element.hash_code().to_le_bytes());
                }
            }
            Body::Word(w) => {
                for unit in w.term.units() {
                    h = fnv(h, &unit.to_le_bytes());
                }
                h = fnv(h, &w.df.to_le_bytes());
            }
        }
        h
    }

    /// Reads a value written by [`Externalizable::write_to`], including the
    /// class-id frame.
    pub fn read_from(reader: &mut ArchiveReader<'_>) -> Result<Value, ValueError> {
        let class_id = reader.read_i32()?;
        let data_type =
            DataType::from_code(class_id - VALUE_CLASS_BASE).ok_or(ValueError::BadArgument)?;
        let null = reader.read_bool()?;
        let body = match data_type {
            DataType::Data => Body::Data,
            DataType::Bool => Body::Bool(reader.read_bool()?),
            DataType::Int32 => Body::Int32(reader.read_i32()?),
            DataType::UInt32 => Body::UInt32(reader.read_u32()?),
            DataType::Int64 => Body::Int64(reader.read_i64()?),
            DataType::UInt64 => Body::UInt64(reader.read_u64()?),
            DataType::Double => Body::Double(reader.read_f64()?),
            DataType::Decimal => {
                let digits = reader.read_i128()?;
                let scale = reader.read_u32()?;
                Body::Decimal(Decimal::new(digits, scale))
            }
            DataType::String => Body::String(reader.read_str16()?),
            DataType::Binary => Body::Binary(reader.read_bytes()?),
            DataType::Date => Body::Date(Date::new(
                reader.read_i32()?,
                reader.read_u8()?,
                reader.read_u8()?,
            )),
            DataType::DateTime => Body::DateTime(DateTime {
                date: Date::new(reader.read_i32()?, reader.read_u8()?, reader.read_u8()?),
                hour: reader.read_u8()?,
                minute: reader.read_u8()?,
                second: reader.read_u8()?,
                millisecond: reader.read_u16()?,
            }),
            DataType::ObjectId => Body::ObjectId(ObjectId::from_value(reader.read_u64()?)),
            DataType::BitSet => {
                let count = reader.read_len()?;
                let mut set = BitSet::new();
                for _ in 0..count {
                    set.set(reader.read_u32()?);
                }
                Body::BitSet(set)
            }
            DataType::Array => {
                let element_type =
                    DataType::from_code(reader.read_i32()?).ok_or(ValueError::BadArgument)?;
                let count = reader.read_len()?;
                let mut array = DataArray::with_element_type(element_type);
                array.reserve(count);
                for _ in 0..count {
                    array.push_back(Value::read_from(reader)?);
                }
                Body::Array(array)
            }
            DataType::Word => Body::Word(WordData {
                term: reader.read_str16()?,
                language: reader.read_str16()?,
                category: reader.read_i32()?,
                scale: reader.read_f64()?,
                df: reader.read_u32()?,
            }),
        };
        Ok(Value { null, body })
    }
}

impl Externalizable for Value {
    fn class_id(&self) -> i32 {
        VALUE_CLASS_BASE + self.data_type().code()
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        writer.write_bool(self.null);
        match &self.body {
            Body::Data => {}
            Body::Bool(v) => writer.write_bool(*v),
            Body::Int32(v) => writer.write_i32(*v),
            Body::UInt32(v) => writer.write_u32(*v),
            Body::Int64(v) => writer.write_i64(*v),
            Body::UInt64(v) => writer.write_u64(*v),
            Body::Double(v) => writer.write_f64(*v),
            Body::Decimal(d) => {
                writer.write_i128(d.digits());
                writer.write_u32(d.scale());
            }
            Body::String(s) => writer.write_str16(s),
            Body::Binary(b) => writer.write_bytes(b),
            Body::Date(d) => {
                writer.write_i32(d.year);
                writer.write_u8(d.month);
                writer.write_u8(d.day);
            }
            Body::DateTime(t) => {
                writer.write_i32(t.date.year);
                writer.write_u8(t.date.month);
                writer.write_u8(t.date.day);
                writer.write_u8(t.hour);
                writer.write_u8(t.minute);
                writer.write_u8(t.second);
                writer.write_u16(t.millisecond);
            }
            Body::ObjectId(id) => writer.write_u64(id.value()),
            Body::BitSet(b) => {
                writer.write_len(b.count() as usize);
                for bit in b.iter() {
                    writer.write_u32(bit);
                }
            }
            Body::Array(a) => {
                writer.write_i32(a.element_type().code());
                writer.write_len(a.count());
                for element in a.values() {
                    element.write_to(writer);
                }
            }
            Body::Word(w) => {
                writer.write_str16(&w.term);
                writer.write_str16(&w.language);
                writer.write_i32(w.category);
                writer.write_f64(w.scale);
                writer.write_u32(w.df);
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.null == other.null && self.body == other.body
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.null {
            return f.write_str("(null)");
        }
        match &self.body {
            Body::Data => f.write_str("(data)"),
            Body::Bool(v) => write!(f, "{v}"),
            Body::Int32(v) => write!(f, "{v}"),
            Body::UInt32(v) => write!(f, "{v}"),
            Body::Int64(v) => write!(f, "{v}"),
            Body::UInt64(v) => write!(f, "{v}"),
            Body::Double(v) => write!(f, "{v}"),
            Body::Decimal(v) => write!(f, "{v}"),
            Body::String(v) => write!(f, "{v}"),
            Body::Binary(v) => write!(f, "binary({} bytes)", v.len()),
            Body::Date(v) => write!(f, "{v}"),
            Body::DateTime(v) => write!(f, "{v}"),
            Body::ObjectId(v) => write!(f, "objectid({},{})", v.page(), v.area()),
            Body::BitSet(v) => {
                f.write_str("{")?;
                for (i, bit) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{bit}")?;
                }
                f.write_str("}")
            }
            Body::Array(v) => {
                f.write_str("{")?;
                for (i, element) in v.values().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("}")
            }
            Body::Word(v) => write!(f, "{}", v.term),
        }
    }
}

macro_rules! value_from {
    ($($from:ty => $variant:ident),* $(,)?) => {
        $(impl From<$from> for Value {
            fn from(v: $from) -> Value {
                Value { null: false, body: Body::$variant(v) }
            }
        })*
    };
}

value_from!(
    bool => Bool,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f64 => Double,
    Decimal => Decimal,
    Utf16String => String,
    Vec<u8> => Binary,
    Date => Date,
    DateTime => DateTime,
    ObjectId => ObjectId,
    BitSet => BitSet,
    DataArray => Array,
    WordData => Word,
);

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::from(Utf16String::from(s))
    }
}

fn int_value(v: i128, target: DataType) -> Option<Value> {
    Some(match target {
        DataType::Int32 => Value::from(i32::try_from(v).ok()?),
        DataType::UInt32 => Value::from(u32::try_from(v).ok()?),
        DataType::Int64 => Value::from(i64::try_from(v).ok()?),
        DataType::UInt64 => Value::from(u64::try_from(v).ok()?),
        _ => return None,
    })
}

fn decimal_to_int(d: &Decimal) -> i128 {
    let divisor = 10i128.checked_pow(d.scale()).unwrap_or(i128::MAX);
    d.digits() / divisor
}

fn num_to_f64(n: &Num) -> f64 {
    match n {
        Num::Int(v) => *v as f64,
        Num::Float(v) => *v,
        Num::Dec(d) => d.to_f64(),
    }
}

fn num_to_decimal(n: &Num) -> Decimal {
    match n {
        Num::Int(v) => Decimal::new(*v, 0),
        Num::Float(v) => Decimal::new((*v * 1_000_000.0) as i128, 6),
        Num::Dec(d) => *d,
    }
}

fn compare_numeric(a: &Num, b: &Num) -> Ordering {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => a.cmp(b),
        (Num::Dec(a), Num::Dec(b)) => a.cmp(b),
        (Num::Int(a), Num::Dec(b)) => Decimal::new(*a, 0).cmp(b),
        (Num::Dec(a), Num::Int(b)) => a.cmp(&Decimal::new(*b, 0)),
        _ => num_to_f64(a)
            .partial_cmp(&num_to_f64(b))
            .unwrap_or(Ordering::Equal),
    }
}

fn convert_numeric(source: &Value, target: DataType) -> Option<Body> {
    let n = source.numeric()?;
    Some(match target {
        DataType::Double => Body::Double(num_to_f64(&n)),
        DataType::Decimal => match n {
            Num::Int(v) => Body::Decimal(Decimal::new(v, 0)),
            Num::Dec(d) => Body::Decimal(d),
            Num::Float(v) => {
                if !v.is_finite() {
                    return None;
                }
                Body::Decimal(Decimal::new((v * 1_000_000.0) as i128, 6))
            }
        },
        _ => {
            let int = match n {
                Num::Int(v) => v,
                Num::Float(v) => {
                    let t = v.trunc();
                    if !t.is_finite() || t < i128::MIN as f64 || t > i128::MAX as f64 {
                        return None;
                    }
                    t as i128
                }
                Num::Dec(d) => decimal_to_int(&d),
            };
            int_value(int, target)?.body
        }
    })
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x100_0000_01b3;

fn fnv_start(seed: u64) -> u64 {
    fnv(FNV_OFFSET, &seed.to_le_bytes())
}

fn fnv(mut h: u64, bytes: &[u8]) -> u64 {
    for b in bytes {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_equals_original() {
        let values = [
            Value::from(42i32),
            Value::from("text"),
            Value::from(1.5f64),
            Value::null_of(DataType::Int32),
            Value::from(DataArray::from_values(vec![
                Value::from(1i32),
                Value::from("x"),
            ])),
        ];
        for v in &values {
            assert_eq!(&v.copy(), v);
        }
    }

    #[test]
    fn assign_preserves_destination_type() {
        let mut slot = Value::default_of(DataType::Int64);
        slot.assign(&Value::from(7i32)).unwrap();
        assert_eq!(slot.data_type(), DataType::Int64);
        assert_eq!(slot.to_i64(), Some(7));
    }

    #[test]
    fn assign_narrowing_out_of_range() {
        let mut slot = Value::default_of(DataType::Int32);
        let err = slot.assign(&Value::from(i64::MAX)).unwrap_err();
        assert_eq!(err, ValueError::NumericValueOutOfRange);
    }

    #[test]
    fn assign_incompatible() {
        let mut slot = Value::default_of(DataType::String);
        assert_eq!(
            slot.assign(&Value::from(1i32)),
            Err(ValueError::NotCompatible)
        );
    }

    #[test]
    fn assign_null_keeps_type() {
        let mut slot = Value::from(5i32);
        slot.assign(&Value::null()).unwrap();
        assert!(slot.is_null());
        assert_eq!(slot.data_type(), DataType::Int32);
    }

    #[test]
    fn undetermined_slot_adopts_source() {
        let mut slot = Value::null();
        slot.assign(&Value::from("abc")).unwrap();
        assert_eq!(slot.data_type(), DataType::String);
    }

    #[test]
    fn null_comparison_is_unknown() {
        assert_eq!(Value::null().compare_to(&Value::from(1i32)), None);
        assert_eq!(Value::from(1i32).compare_to(&Value::null()), None);
    }

    #[test]
    fn total_order_places_null_last() {
        let mut values = vec![
            Value::from(3i32),
            Value::null_of(DataType::Int32),
            Value::from(1i32),
        ];
        values.sort_by(|a, b| a.compare_total(b));
        assert_eq!(values[0].to_i32(), Some(1));
        assert_eq!(values[1].to_i32(), Some(3));
        assert!(values[2].is_null());
    }

    #[test]
    fn arithmetic_promotes_and_overflows() {
        let sum = Value::from(1i32)
            .operate_with(Operation::Addition, Some(&Value::from(2i64)))
            .unwrap()
            .unwrap();
        assert_eq!(sum.data_type(), DataType::Int64);
        assert_eq!(sum.to_i64(), Some(3));

        let overflow = Value::from(i32::MAX)
            .operate_with(Operation::Addition, Some(&Value::from(1i32)))
            .unwrap();
        assert!(overflow.is_none());
    }

    #[test]
    fn null_operand_yields_null() {
        for op in [
            Operation::Addition,
            Operation::Subtraction,
            Operation::Multiplication,
            Operation::Division,
            Operation::Modulus,
        ] {
            let r = Value::null_of(DataType::Int32)
                .operate_with(op, Some(&Value::from(1i32)))
                .unwrap()
                .unwrap();
            assert!(r.is_null());
        }
    }

    #[test]
    fn division_by_zero_is_overflow_path() {
        let r = Value::from(1i32)
            .operate_with(Operation::Division, Some(&Value::from(0i32)))
            .unwrap();
        assert!(r.is_none());
    }

    #[test]
    fn null_hash_sentinel() {
        assert_eq!(Value::null().hash_code(), NULL_HASH);
        assert_eq!(Value::null_of(DataType::String).hash_code(), NULL_HASH);
        assert_ne!(Value::from(0i32).hash_code(), NULL_HASH);
    }

    #[test]
    fn serialize_roundtrip() {
        let values = [
            Value::from(true),
            Value::from(-5i32),
            Value::from(9u64),
            Value::from(2.25f64),
            Value::from(Decimal::new(314, 2)),
            Value::from("héllo"),
            Value::from(vec![1u8, 2, 3]),
            Value::from(ObjectId::new(7, 9)),
            Value::from([1u32, 5, 9].into_iter().collect::<BitSet>()),
            Value::null_of(DataType::Double),
            Value::from(DataArray::from_values(vec![
                Value::from(10i32),
                Value::from("y"),
                Value::null(),
            ])),
        ];
        for v in &values {
            let mut w = ArchiveWriter::new();
            w.write_object(v);
            let bytes = w.into_bytes();
            let mut r = ArchiveReader::new(&bytes);
            let restored = Value::read_from(&mut r).unwrap();
            assert_eq!(&restored, v);
        }
    }
}
