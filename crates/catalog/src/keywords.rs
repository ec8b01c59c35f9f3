// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Reserved Kusto keywords
//!
//! Identifiers equal to one of these words must be escaped before they can be
//! used as a database, table or column name in a query. Matching is
//! case-sensitive: `Where` is a valid bare identifier, `where` is not.

/// Reserved words of the Kusto query language
pub const RESERVED_KEYWORDS: &[&str] = &[
    "and",
    "anomalychart",
    "areachart",
    "as",
    "asc",
    "barchart",
    "between",
    "bool",
    "boolean",
    "by",
    "columnchart",
    "consume",
    "contains",
    "containscs",
    "count",
    "date",
    "datetime",
    "decimal",
    "default",
    "desc",
    "distinct",
    "double",
    "dynamic",
    "endswith",
    "evaluate",
    "extend",
    "false",
    "filter",
    "find",
    "first",
    "flags",
    "float",
    "getschema",
    "has",
    "hasprefix",
    "hassuffix",
    "in",
    "int",
    "join",
    "journal",
    "kind",
    "ladderchart",
    "last",
    "let",
    "like",
    "limit",
    "linechart",
    "long",
    "materialize",
    "mvexpand",
    "notcontains",
    "notlike",
    "null",
    "of",
    "on",
    "or",
    "order",
    "parse",
    "piechart",
    "pivotchart",
    "print",
    "project",
    "queries",
    "range",
    "real",
    "regex",
    "render",
    "sample",
    "scatterchart",
    "search",
    "set",
    "sort",
    "stacked",
    "stacked100",
    "stackedareachart",
    "startswith",
    "string",
    "summarize",
    "table",
    "take",
    "time",
    "timechart",
    "timeline",
    "timepivot",
    "timespan",
    "to",
    "top",
    "toscalar",
    "true",
    "typeof",
    "union",
    "unstacked",
    "viewers",
    "where",
    "with",
    "withsource",
];

/// Whether `name` is a reserved keyword (case-sensitive)
pub fn is_reserved_keyword(name: &str) -> bool {
    RESERVED_KEYWORDS.contains(&name)
}
