//! SQL synthesis
//!
//! Provides dialect adapters, the literal codec, clause builders, DDL generation
//! and identifier validation.

pub mod clause;
pub mod codec;
pub mod ddl;
pub mod dialect;
pub mod sanitize;
pub mod statement;

pub use clause::{
    FieldPolicy, build_id_list, build_insert, build_order_by, build_pagination, build_select,
    build_update, build_where,
};
pub use codec::{decode_row, decode_rows, decode_text, encode, encode_text};
pub use ddl::DdlGenerator;
pub use dialect::{
    Dialect, DialectAdapter, MsSqlDialect, MySqlDialect, OracleDialect, PostgresDialect,
};
pub use sanitize::{MAX_IDENTIFIER_LENGTH, validate_identifier, validate_table_name};
pub use statement::{ParamSink, SqlValue, Statement};
