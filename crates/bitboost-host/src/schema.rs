//! The engine's configuration parameter schema.
//!
//! The engine build generates `bitboost_config.gen.csv`, a table with one row
//! per configuration parameter:
//!
//! ```text
//! name,default,type,description
//! max_depth,6,usize,"Maximum depth of each tree."
//! categorical_features,,Vec<usize>,"Indices of categorical features."
//! csv_has_header,true,bool,"Whether the input CSV has a header (cli only)."
//! ```
//!
//! [`ConfigSchema::parse`] turns that table into an immutable lookup used to
//! validate and coerce values before they cross the boundary. Rows whose
//! description marks them `cli only` are dropped: those settings only exist
//! for the engine's own command-line tool.
//!
//! The schema is loaded once per [`Runtime`](crate::Runtime) and shared
//! read-only by every [`Booster`](crate::Booster).

use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::path::Path;

use polars::prelude::*;
use serde::Serialize;

use crate::error::BitBoostError;

/// Marker in a description that excludes the row from the schema.
const CLI_ONLY_MARKER: &str = "cli only";

/// Column width used by [`ConfigSchema::describe`].
const DESCRIBE_WIDTH: usize = 80;

/// Shape of a parameter's value, derived from the engine's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// Integer scalar (`usize`, `u32`, `i64`, ...).
    Integer,
    /// Float scalar (`f32`, `f64`, `NumT`).
    Float,
    /// Boolean scalar.
    Bool,
    /// Text scalar.
    String,
    /// Repeated value (`Vec<...>`); crosses the boundary comma-separated.
    List,
    /// Any other tag, e.g. an engine enum. Passed as text.
    Other,
}

impl ParamType {
    /// Classifies an engine type tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use bitboost_host::ParamType;
    ///
    /// assert_eq!(ParamType::from_tag("Vec<usize>"), ParamType::List);
    /// assert_eq!(ParamType::from_tag("NumT"), ParamType::Float);
    /// assert_eq!(ParamType::from_tag("Objective"), ParamType::Other);
    /// ```
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.starts_with("Vec") {
            return ParamType::List;
        }
        match tag {
            "u8" | "u16" | "u32" | "u64" | "usize" | "i8" | "i16" | "i32" | "i64" | "isize" => {
                ParamType::Integer
            }
            "f32" | "f64" | "NumT" => ParamType::Float,
            "bool" => ParamType::Bool,
            "String" | "&str" | "str" => ParamType::String,
            _ => ParamType::Other,
        }
    }
}

/// One settable engine parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigParam {
    /// Parameter name, unique within the schema.
    pub name: String,
    /// Default value as written in the schema source.
    pub default: String,
    /// The engine's type tag, e.g. `usize` or `Vec<usize>`.
    pub type_tag: String,
    /// Classified value shape.
    pub param_type: ParamType,
    /// Human-readable description.
    pub description: String,
}

impl ConfigParam {
    /// Default value for display; string defaults are quoted.
    #[must_use]
    pub fn default_display(&self) -> String {
        if self.param_type == ParamType::String {
            format!("\"{}\"", self.default)
        } else {
            self.default.clone()
        }
    }

    /// Returns `true` if the parameter takes a comma-separated list.
    #[must_use]
    pub fn is_list(&self) -> bool {
        self.param_type == ParamType::List
    }
}

impl fmt::Display for ConfigParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "    {} : {} (default {})",
            self.name,
            self.type_tag,
            self.default_display()
        )?;
        for line in wrap(&self.description, DESCRIBE_WIDTH) {
            writeln!(f, "        {line}")?;
        }
        Ok(())
    }
}

/// Immutable table of settable parameters, in source order.
#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
    params: Vec<ConfigParam>,
    index: HashMap<String, usize>,
}

impl ConfigSchema {
    /// Parses the schema CSV.
    ///
    /// The first row is a header. Each following row needs at least four
    /// columns: name, default, type tag, description. Empty cells read as
    /// empty strings.
    ///
    /// # Errors
    ///
    /// Returns [`BitBoostError::SchemaParse`] if the table or a row has fewer
    /// than four fields, a row has an empty name, or a name appears twice. CSV syntax
    /// errors surface as [`BitBoostError::Polars`].
    pub fn parse(text: &str) -> Result<Self, BitBoostError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        // All columns as strings; defaults like "0.1" must stay verbatim.
        // Fields past the description are ignored.
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_parse_options(CsvParseOptions::default().with_truncate_ragged_lines(true))
            .into_reader_with_file_handle(Cursor::new(text.as_bytes().to_vec()))
            .finish()?;

        if df.width() < 4 {
            return Err(BitBoostError::SchemaParse(format!(
                "expected 4 columns (name, default, type, description), found {}",
                df.width()
            )));
        }

        let columns = df.get_columns();
        let names = columns[0].as_materialized_series().str()?;
        let defaults = columns[1].as_materialized_series().str()?;
        let tags = columns[2].as_materialized_series().str()?;
        let descriptions = columns[3].as_materialized_series().str()?;

        let mut schema = Self::default();
        for (row, (((name, default), tag), description)) in names
            .into_iter()
            .zip(defaults.into_iter())
            .zip(tags.into_iter())
            .zip(descriptions.into_iter())
            .enumerate()
        {
            let name = name.unwrap_or_default().trim();
            let (Some(tag), Some(description)) = (tag, description) else {
                return Err(BitBoostError::SchemaParse(format!(
                    "row {} ('{}') has fewer than 4 fields",
                    row + 1,
                    name
                )));
            };

            if description.to_lowercase().contains(CLI_ONLY_MARKER) {
                continue;
            }
            if name.is_empty() {
                return Err(BitBoostError::SchemaParse(format!(
                    "row {} has an empty parameter name",
                    row + 1
                )));
            }

            let type_tag = tag.trim();
            schema.insert(ConfigParam {
                name: name.to_string(),
                default: default.unwrap_or_default().to_string(),
                type_tag: type_tag.to_string(),
                param_type: ParamType::from_tag(type_tag),
                description: description.to_string(),
            })?;
        }

        Ok(schema)
    }

    /// Reads and parses a schema file.
    ///
    /// # Errors
    ///
    /// Returns [`BitBoostError::Io`] if the file cannot be read, otherwise the
    /// errors of [`parse`](Self::parse).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BitBoostError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    fn insert(&mut self, param: ConfigParam) -> Result<(), BitBoostError> {
        if self.index.contains_key(&param.name) {
            return Err(BitBoostError::SchemaParse(format!(
                "parameter '{}' is declared more than once",
                param.name
            )));
        }
        self.index.insert(param.name.clone(), self.params.len());
        self.params.push(param);
        Ok(())
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConfigParam> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    /// Looks up a parameter, failing with [`BitBoostError::UnknownParameter`].
    pub fn param(&self, name: &str) -> Result<&ConfigParam, BitBoostError> {
        self.get(name)
            .ok_or_else(|| BitBoostError::UnknownParameter(name.to_string()))
    }

    /// Returns `true` if `name` is a settable parameter.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Parameters in source order.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigParam> {
        self.params.iter()
    }

    /// Parameter names in source order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    /// Number of settable parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if the schema has no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Renders the parameter documentation.
    ///
    /// Each parameter is listed as `name : type (default value)` followed by
    /// its description wrapped at 80 columns.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut doc = String::from("PARAMETERS\n----------\n");
        for param in &self.params {
            doc.push('\n');
            doc.push_str(&param.to_string());
        }
        doc
    }
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
