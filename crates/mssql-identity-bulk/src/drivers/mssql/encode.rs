//! Conversion between [`SqlValue`] and tiberius [`ColumnData`].

use std::borrow::Cow;

use rust_decimal::Decimal;
use tiberius::{ColumnData, IntoSql};

use crate::core::value::{SqlNullType, SqlValue};
use crate::error::{BulkCopyError, Result};

/// Encode a row-set value for a TDS bulk-load row.
pub fn sql_value_to_column_data(value: &SqlValue<'_>) -> ColumnData<'static> {
    match value {
        SqlValue::Null(null_type) => null_column_data(*null_type),
        SqlValue::Bool(b) => ColumnData::Bit(Some(*b)),
        SqlValue::U8(v) => ColumnData::U8(Some(*v)),
        SqlValue::I16(v) => ColumnData::I16(Some(*v)),
        SqlValue::I32(v) => ColumnData::I32(Some(*v)),
        SqlValue::I64(v) => ColumnData::I64(Some(*v)),
        // SQL Server has no representation for NaN or infinity
        SqlValue::F32(f) if !f.is_finite() => ColumnData::F32(None),
        SqlValue::F32(f) => ColumnData::F32(Some(*f)),
        SqlValue::F64(f) if !f.is_finite() => ColumnData::F64(None),
        SqlValue::F64(f) => ColumnData::F64(Some(*f)),
        SqlValue::Text(s) => ColumnData::String(Some(Cow::Owned(s.to_string()))),
        SqlValue::Bytes(b) => ColumnData::Binary(Some(Cow::Owned(b.to_vec()))),
        SqlValue::Uuid(u) => ColumnData::Guid(Some(*u)),
        SqlValue::Decimal(d) => ColumnData::Numeric(Some(tiberius::numeric::Numeric::new_with_scale(
            d.mantissa(),
            d.scale() as u8,
        ))),
        SqlValue::DateTime(dt) => (*dt).into_sql(),
        SqlValue::DateTimeOffset(dto) => (*dto).into_sql(),
        SqlValue::Date(d) => (*d).into_sql(),
        SqlValue::Time(t) => (*t).into_sql(),
    }
}

fn null_column_data(null_type: SqlNullType) -> ColumnData<'static> {
    match null_type {
        SqlNullType::Bool => ColumnData::Bit(None),
        SqlNullType::U8 => ColumnData::U8(None),
        SqlNullType::I16 => ColumnData::I16(None),
        SqlNullType::I32 => ColumnData::I32(None),
        SqlNullType::I64 => ColumnData::I64(None),
        SqlNullType::F32 => ColumnData::F32(None),
        SqlNullType::F64 => ColumnData::F64(None),
        SqlNullType::String => ColumnData::String(None),
        SqlNullType::Bytes => ColumnData::Binary(None),
        SqlNullType::Uuid => ColumnData::Guid(None),
        SqlNullType::Decimal => ColumnData::Numeric(None),
        SqlNullType::DateTime => ColumnData::DateTime2(None),
        SqlNullType::DateTimeOffset => ColumnData::DateTimeOffset(None),
        SqlNullType::Date => ColumnData::Date(None),
        SqlNullType::Time => ColumnData::Time(None),
    }
}

/// Decode a result cell.
///
/// Covers the scalar types a captured identity or ordinal can arrive as,
/// plus the common text, binary and floating types.
pub fn column_data_to_sql_value(data: ColumnData<'static>) -> Result<SqlValue<'static>> {
    let value = match data {
        ColumnData::U8(v) => v.map(SqlValue::U8).unwrap_or(SqlValue::Null(SqlNullType::U8)),
        ColumnData::I16(v) => v
            .map(SqlValue::I16)
            .unwrap_or(SqlValue::Null(SqlNullType::I16)),
        ColumnData::I32(v) => v
            .map(SqlValue::I32)
            .unwrap_or(SqlValue::Null(SqlNullType::I32)),
        ColumnData::I64(v) => v
            .map(SqlValue::I64)
            .unwrap_or(SqlValue::Null(SqlNullType::I64)),
        ColumnData::F32(v) => v
            .map(SqlValue::F32)
            .unwrap_or(SqlValue::Null(SqlNullType::F32)),
        ColumnData::F64(v) => v
            .map(SqlValue::F64)
            .unwrap_or(SqlValue::Null(SqlNullType::F64)),
        ColumnData::Bit(v) => v
            .map(SqlValue::Bool)
            .unwrap_or(SqlValue::Null(SqlNullType::Bool)),
        ColumnData::String(v) => v
            .map(|s| SqlValue::Text(Cow::Owned(s.into_owned())))
            .unwrap_or(SqlValue::Null(SqlNullType::String)),
        ColumnData::Binary(v) => v
            .map(|b| SqlValue::Bytes(Cow::Owned(b.into_owned())))
            .unwrap_or(SqlValue::Null(SqlNullType::Bytes)),
        ColumnData::Guid(v) => v
            .map(SqlValue::Uuid)
            .unwrap_or(SqlValue::Null(SqlNullType::Uuid)),
        ColumnData::Numeric(None) => SqlValue::Null(SqlNullType::Decimal),
        ColumnData::Numeric(Some(n)) => {
            let decimal = Decimal::try_from_i128_with_scale(n.value(), u32::from(n.scale()))
                .map_err(|e| BulkCopyError::Decode(format!("numeric {:?}: {}", n, e)))?;
            SqlValue::Decimal(decimal)
        }
        other => {
            return Err(BulkCopyError::Decode(format!(
                "unsupported result column type {:?}",
                other
            )))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_encoding_follows_type_hint() {
        assert!(matches!(
            sql_value_to_column_data(&SqlValue::Null(SqlNullType::I32)),
            ColumnData::I32(None)
        ));
        assert!(matches!(
            sql_value_to_column_data(&SqlValue::Null(SqlNullType::String)),
            ColumnData::String(None)
        ));
        assert!(matches!(
            sql_value_to_column_data(&SqlValue::Null(SqlNullType::DateTime)),
            ColumnData::DateTime2(None)
        ));
    }

    #[test]
    fn test_decimal_encodes_as_numeric() {
        let value = SqlValue::Decimal(Decimal::new(12345, 2));
        match sql_value_to_column_data(&value) {
            ColumnData::Numeric(Some(n)) => {
                assert_eq!(n.value(), 12345);
                assert_eq!(n.scale(), 2);
            }
            other => panic!("expected numeric, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_floats_become_null() {
        assert!(matches!(
            sql_value_to_column_data(&SqlValue::F64(f64::NAN)),
            ColumnData::F64(None)
        ));
        assert!(matches!(
            sql_value_to_column_data(&SqlValue::F32(f32::INFINITY)),
            ColumnData::F32(None)
        ));
    }

    #[test]
    fn test_decode_identity_types() {
        assert_eq!(
            column_data_to_sql_value(ColumnData::I32(Some(7))).unwrap(),
            SqlValue::I32(7)
        );
        assert_eq!(
            column_data_to_sql_value(ColumnData::I64(None)).unwrap(),
            SqlValue::Null(SqlNullType::I64)
        );
        assert_eq!(
            column_data_to_sql_value(ColumnData::U8(Some(3))).unwrap(),
            SqlValue::U8(3)
        );

        let numeric = tiberius::numeric::Numeric::new_with_scale(12345, 0);
        assert_eq!(
            column_data_to_sql_value(ColumnData::Numeric(Some(numeric))).unwrap(),
            SqlValue::Decimal(Decimal::from(12345))
        );
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(
            column_data_to_sql_value(ColumnData::String(Some(Cow::Borrowed("Name 1")))).unwrap(),
            SqlValue::from("Name 1".to_string())
        );
    }

    #[test]
    fn test_decode_unsupported() {
        assert!(column_data_to_sql_value(ColumnData::DateTime2(None)).is_err());
    }
}
