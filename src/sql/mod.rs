//! SQL front end for sheet-query.
//!
//! Wraps `sqlparser-rs` to parse a SQL subset, rewrites the tree shapes the
//! remote dialect cannot express, and renders the result as remote dialect
//! text.
//!
//! Supported SQL subset:
//! - SELECT: columns, aliases, scalar/aggregate calls, COUNT(*), `*`
//! - FROM: one double-quoted source URL
//! - WHERE: comparisons, AND/OR/NOT, IN, BETWEEN, LIKE, IS NULL
//! - GROUP BY, ORDER BY (ASC/DESC), LIMIT, OFFSET
//! - `datetrunc('<granularity>', column)`
//!
//! HAVING parses but never translates; statements using it run on the local
//! fallback engine.

pub mod locator;
pub mod params;
pub mod parser;
pub mod processors;
pub mod translator;
pub mod types;
