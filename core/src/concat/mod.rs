//! String concatenation strategy.
//!
//! Whether the host offers a bulk multi-operand join is probed once per
//! process. Each concatenation expression then gets a [`ConcatPlan`] fixed at
//! compile time: either bulk-join groups of at most `cap` operands folded
//! left to right, or a single accumulator that appends every operand.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::catalog::{Descriptor, WellKnown};
use crate::coerce::render_text;
use crate::config::{BackendConfig, ConcatConfig};
use crate::error::{Result, ScriptError, SiteLocation};
use crate::typ::{ScriptType, TypeTag};
use crate::val::Val;

/// Host capability flag: bulk join availability and its operand cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinCapability {
    pub available: bool,
    pub max_operands: usize,
}

static PROBED: OnceCell<JoinCapability> = OnceCell::new();

impl JoinCapability {
    pub fn new(available: bool, max_operands: usize) -> Self {
        Self {
            available,
            max_operands,
        }
    }

    /// Process-wide capability, decided on first use from the global config.
    pub fn probe() -> JoinCapability {
        *PROBED.get_or_init(|| {
            let capability = JoinCapability::detect(&BackendConfig::global().concat);
            tracing::debug!(
                target: "scour::concat",
                available = capability.available,
                max_operands = capability.max_operands,
                "bulk join probed"
            );
            capability
        })
    }

    /// Fixes the capability before anything probes it. Returns the already
    /// decided capability if the probe ran first.
    pub fn install(capability: JoinCapability) -> std::result::Result<(), JoinCapability> {
        PROBED.set(capability).map_err(|_| JoinCapability::probe())
    }

    /// The join is available unless configuration turns it off; a cap below
    /// two operands cannot make progress and counts as unavailable.
    pub fn detect(config: &ConcatConfig) -> JoinCapability {
        let available = config.bulk_join.unwrap_or(true) && config.max_group_operands >= 2;
        JoinCapability::new(available, config.max_group_operands)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatStrategy {
    BulkJoin { cap: usize },
    Accumulator,
}

impl fmt::Display for ConcatStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcatStrategy::BulkJoin { cap } => write!(f, "bulk-join(cap={cap})"),
            ConcatStrategy::Accumulator => f.write_str("accumulator"),
        }
    }
}

/// One bulk join: the previous group's result (when `carries_previous`)
/// followed by `operands`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGroup {
    pub carries_previous: bool,
    pub operands: Range<usize>,
}

impl JoinGroup {
    /// Operands this join receives, the carried result included.
    pub fn width(&self) -> usize {
        self.operands.len() + usize::from(self.carries_previous)
    }
}

/// Chooses the strategy once and plans each concatenation with it.
#[derive(Debug, Clone, Copy)]
pub struct ConcatSelector {
    strategy: ConcatStrategy,
    ceiling: usize,
}

impl ConcatSelector {
    pub fn new(capability: JoinCapability, ceiling: usize) -> Self {
        let strategy = if capability.available && capability.max_operands >= 2 {
            ConcatStrategy::BulkJoin {
                cap: capability.max_operands,
            }
        } else {
            ConcatStrategy::Accumulator
        };
        Self { strategy, ceiling }
    }

    /// Selector over the process-wide probed capability.
    pub fn probed(config: &BackendConfig) -> Self {
        Self::new(JoinCapability::probe(), config.concat.max_total_operands)
    }

    /// Selector decided by `config` alone, ignoring the process-wide probe.
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(JoinCapability::detect(&config.concat), config.concat.max_total_operands)
    }

    #[inline]
    pub fn strategy(&self) -> ConcatStrategy {
        self.strategy
    }

    #[inline]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Plans a concatenation of operands with the given static types.
    pub fn plan(&self, location: &SiteLocation, operands: &[ScriptType]) -> Result<ConcatPlan> {
        if operands.len() > self.ceiling {
            return Err(ScriptError::rejected(
                location,
                "too many operands in one concatenation",
                format!("at most {}", self.ceiling),
                operands.len(),
            ));
        }
        let well_known = WellKnown::global()?;
        let groups = match self.strategy {
            ConcatStrategy::BulkJoin { cap } => chunk(operands.len(), cap),
            ConcatStrategy::Accumulator => Vec::new(),
        };
        let appends = match self.strategy {
            ConcatStrategy::BulkJoin { .. } => Vec::new(),
            ConcatStrategy::Accumulator => operands
                .iter()
                .map(|ty| {
                    let tag = ty.tag().unwrap_or(TypeTag::Object);
                    well_known
                        .append(tag)
                        .cloned()
                        .ok_or_else(|| ScriptError::rejected(location, "no append routine", "a text operand", ty))
                })
                .collect::<Result<Vec<_>>>()?,
        };
        tracing::debug!(
            target: "scour::concat",
            site = %location,
            operands = operands.len(),
            strategy = %self.strategy,
            groups = groups.len(),
            "planned concatenation"
        );
        Ok(ConcatPlan {
            operands: operands.into(),
            strategy: self.strategy,
            groups: groups.into(),
            appends: appends.into(),
        })
    }
}

/// Left-to-right grouping: the first group takes `cap` operands, every later
/// group takes the previous result plus `cap - 1` new operands.
fn chunk(len: usize, cap: usize) -> Vec<JoinGroup> {
    let mut groups = Vec::new();
    if len == 0 {
        return groups;
    }
    let first = len.min(cap);
    groups.push(JoinGroup {
        carries_previous: false,
        operands: 0..first,
    });
    let mut start = first;
    while start < len {
        let end = len.min(start + cap - 1);
        groups.push(JoinGroup {
            carries_previous: true,
            operands: start..end,
        });
        start = end;
    }
    groups
}

/// Compile-time plan for one concatenation expression.
#[derive(Debug, Clone)]
pub struct ConcatPlan {
    operands: Box<[ScriptType]>,
    strategy: ConcatStrategy,
    groups: Box<[JoinGroup]>,
    appends: Box<[Descriptor]>,
}

impl ConcatPlan {
    #[inline]
    pub fn strategy(&self) -> ConcatStrategy {
        self.strategy
    }

    #[inline]
    pub fn operands(&self) -> &[ScriptType] {
        &self.operands
    }

    /// Bulk-join groups; empty under the accumulator strategy.
    #[inline]
    pub fn groups(&self) -> &[JoinGroup] {
        &self.groups
    }

    /// Append routine per operand; empty under the bulk strategy.
    #[inline]
    pub fn appends(&self) -> &[Descriptor] {
        &self.appends
    }

    pub fn execute(&self, values: &[Val]) -> Result<Val> {
        if values.len() != self.operands.len() {
            return Err(ScriptError::Host(anyhow::anyhow!(
                "concatenation planned for {} operands, got {}",
                self.operands.len(),
                values.len()
            )));
        }
        let text = match self.strategy {
            ConcatStrategy::BulkJoin { .. } => self.join_groups(values),
            ConcatStrategy::Accumulator => accumulate(values),
        };
        Ok(Val::Str(text))
    }

    fn join_groups(&self, values: &[Val]) -> Arc<str> {
        let mut carried: Option<Arc<str>> = None;
        for group in self.groups.iter() {
            let parts: Vec<Arc<str>> = carried
                .take()
                .into_iter()
                .chain(values[group.operands.clone()].iter().map(render_text))
                .collect();
            carried = Some(join(&parts));
        }
        carried.unwrap_or_else(|| Arc::from(""))
    }
}

/// Bulk join of already textual operands.
pub fn join(parts: &[Arc<str>]) -> Arc<str> {
    if let [single] = parts {
        return single.clone();
    }
    let len = parts.iter().map(|p| p.len()).sum();
    let mut out = String::with_capacity(len);
    for part in parts {
        out.push_str(part);
    }
    Arc::from(out)
}

/// Accumulator fallback: numbers, booleans and chars are appended in place
/// without an intermediate text value.
fn accumulate(values: &[Val]) -> Arc<str> {
    let mut out = String::new();
    for val in values {
        val.write_text(&mut out);
    }
    Arc::from(out)
}

#[cfg(test)]
mod concat_test;
