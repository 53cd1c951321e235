//! SQL-backed checks.

use super::{AggregateCheck, FinalizeContext, Outcome, Rule};
use crate::{Batch, RuleConfigError, RuleFamily, RuleParams, RuleRegistry};
use quality_core::FailedRecord;
use tracing::warn;

pub(crate) fn register(registry: &mut RuleRegistry) {
    registry.register_family("SqlCustomCheck", RuleFamily::Aggregate, |p| {
        Ok(Rule::aggregate(SqlCustomCheck::new(p)?))
    });
}

/// Runs a query at finalize; every returned row is a violation.
///
/// Passes while the number of rows is at most `max_violations`.
pub struct SqlCustomCheck {
    connection_string: String,
    query: String,
    max_violations: u64,
    max_samples: usize,
}

impl SqlCustomCheck {
    pub fn new(params: &RuleParams) -> Result<Self, RuleConfigError> {
        let query = params.str("query")?;
        let head = query.trim_start().to_uppercase();
        if !(head.starts_with("SELECT") || head.starts_with("WITH")) {
            return Err(params.error("query", "only SELECT queries are allowed"));
        }
        Ok(Self {
            connection_string: params.str("connection_string")?,
            query,
            max_violations: params.opt_u64("max_violations")?.unwrap_or(0),
            max_samples: params.max_samples(),
        })
    }
}

impl AggregateCheck for SqlCustomCheck {
    fn consume(&mut self, _batch: &Batch) {}

    fn finalize(&mut self, ctx: &FinalizeContext<'_>) -> Outcome {
        let rows = match ctx.executor.execute(&self.connection_string, &self.query) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "SQL check could not run");
                return Outcome::fail(format!("Query failed: {}", err), 0, 0);
            }
        };

        let violations = rows.len() as u64;
        let samples = rows
            .iter()
            .take(self.max_samples.min(ctx.max_samples))
            .enumerate()
            .map(|(i, row)| FailedRecord {
                row: i as u64 + 1,
                field: None,
                value: Some(row.to_string()),
                message: "Query returned a violating row".to_string(),
            })
            .collect();

        Outcome::judge(
            violations <= self.max_violations,
            format!(
                "Query returned {} violating row(s) (maximum {})",
                violations, self.max_violations
            ),
            violations,
            violations,
        )
        .with_samples(samples)
    }
}
