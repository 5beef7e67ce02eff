//! Header-matching analyzer.
//!
//! Works without any model service by recognising the usual register-table
//! column names. Register map tables (one register per row) are read from the
//! first named row; bit field tables contribute reserved bits as boundary
//! conditions.

use super::{RegisterAnalyzer, TableInput};
use crate::analysis::{AccessType, AnalysisError, RegisterAnalysis};
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Columns {
    name: Option<usize>,
    address: Option<usize>,
    access: Option<usize>,
    reset: Option<usize>,
    bits: Option<usize>,
    field: Option<usize>,
}

impl Columns {
    fn detect(headers: &[String]) -> Self {
        let mut columns = Columns::default();

        for (index, header) in headers.iter().enumerate() {
            let header = header.trim().to_lowercase();
            let slot = if header.contains("address") || header.contains("offset") {
                &mut columns.address
            } else if header.contains("reset") || header.contains("default") {
                &mut columns.reset
            } else if header.contains("access")
                || header.contains("r/w")
                || header.contains("permission")
                || header == "rw"
                || header == "type"
            {
                &mut columns.access
            } else if header.contains("register")
                || header.contains("mnemonic")
                || header.contains("symbol")
                || header == "name"
            {
                &mut columns.name
            } else if header.starts_with("bit") {
                &mut columns.bits
            } else if header.contains("field") {
                &mut columns.field
            } else {
                continue;
            };

            if slot.is_none() {
                *slot = Some(index);
            }
        }

        columns
    }

    fn describes_register(&self) -> bool {
        self.name.is_some() || self.address.is_some() || self.access.is_some() || self.reset.is_some()
    }
}

fn cell(row: &[String], column: Option<usize>) -> Option<&str> {
    column
        .and_then(|index| row.get(index))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn is_reserved(value: &str) -> bool {
    let value = value.to_lowercase();
    value.contains("reserved") || value == "rsvd"
}

/// Analyzer that reads register tables by their column headers.
///
/// Produces one analysis per table. In a register map with one register per
/// row only the first named row is analyzed; the remaining registers are
/// reported at debug level and dropped.
#[derive(Debug, Default, Clone)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Names in the register column after the first one.
    fn other_register_names<'a>(input: &'a TableInput, columns: &Columns) -> Vec<&'a str> {
        input
            .rows
            .iter()
            .filter_map(|row| cell(row, columns.name))
            .skip(1)
            .filter(|name| !is_reserved(name))
            .collect()
    }

    /// Synchronous core of [`RegisterAnalyzer::analyze`].
    pub fn analyze_table(&self, input: &TableInput) -> Result<RegisterAnalysis, AnalysisError> {
        let columns = Columns::detect(&input.headers);
        if !columns.describes_register() {
            return Err(AnalysisError::Unrecognized {
                reason: format!(
                    "no register, address, access or reset column in headers {:?}",
                    input.headers
                ),
            });
        }

        let named_row = columns.name.and_then(|_| {
            input
                .rows
                .iter()
                .find(|row| cell(row, columns.name).is_some())
        });

        let dropped = Self::other_register_names(input, &columns);
        if !dropped.is_empty() {
            debug!(
                "Register map lists {} more registers, analyzing only the first: {}",
                dropped.len(),
                dropped.join(", ")
            );
        }

        let mut analysis = RegisterAnalysis::new(
            named_row
                .and_then(|row| cell(row, columns.name))
                .unwrap_or_default(),
        );

        let register_row = named_row.or_else(|| input.rows.first());
        if let Some(address) = register_row.and_then(|row| cell(row, columns.address)) {
            analysis = analysis.with_address(address);
        }

        if let Some(access) = Self::access_token(input, &columns, named_row) {
            analysis = analysis.with_access_type(AccessType::parse(access));
        }

        // Per-field reset values of a bit field table do not add up to a
        // register reset value.
        if let Some(reset) = named_row.and_then(|row| cell(row, columns.reset)) {
            analysis = analysis.with_reset_value(reset);
        }

        let boundary_conditions = Self::reserved_conditions(input, &columns);

        let mut scenarios = Vec::new();
        if let Some(reset) = analysis.known_reset_value() {
            scenarios.push(format!("Verify reset value {}", reset));
        }
        if analysis.access_type().is_writable() {
            scenarios.push("Write and read back all writable bits".to_string());
        }
        if !boundary_conditions.is_empty() {
            scenarios.push("Check reserved bits keep their reset state".to_string());
        }

        Ok(analysis
            .with_boundary_conditions(boundary_conditions)
            .with_test_scenarios(scenarios))
    }

    /// A register row gives its own access token. Without one, the first
    /// writable field wins, else the first token at all.
    fn access_token<'a>(
        input: &'a TableInput,
        columns: &Columns,
        named_row: Option<&'a Vec<String>>,
    ) -> Option<&'a str> {
        if let Some(row) = named_row {
            return cell(row, columns.access);
        }

        let mut tokens = input.rows.iter().filter_map(|row| cell(row, columns.access));
        let first = tokens.clone().next();
        tokens
            .find(|token| AccessType::parse(token).is_writable())
            .or(first)
    }

    fn reserved_conditions(input: &TableInput, columns: &Columns) -> Vec<String> {
        input
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|value| is_reserved(value)))
            .map(|(index, row)| {
                let label = if let Some(bits) = cell(row, columns.bits) {
                    if bits.to_lowercase().starts_with("bit") {
                        bits.to_string()
                    } else {
                        format!("bit {}", bits)
                    }
                } else if let Some(field) =
                    cell(row, columns.field).filter(|field| !is_reserved(field))
                {
                    field.to_string()
                } else {
                    format!("row {}", index + 1)
                };
                format!("{} reserved", label)
            })
            .collect()
    }
}

#[async_trait]
impl RegisterAnalyzer for HeuristicAnalyzer {
    async fn analyze(&self, input: &TableInput) -> Result<RegisterAnalysis, AnalysisError> {
        self.analyze_table(input)
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}
