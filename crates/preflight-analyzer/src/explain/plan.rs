//! Query Plan Model - Data structures for representing query execution plans

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a complete query execution plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Root node of the plan tree
    pub root: PlanNode,
    /// Total estimated cost of the top-level node
    pub total_cost: f64,
}

impl Plan {
    /// Creates a plan whose total cost is taken from the root node
    pub fn new(root: PlanNode) -> Self {
        let total_cost = root.total_cost;
        Self { root, total_cost }
    }

    /// Returns an iterator over all nodes in the plan (depth-first, pre-order)
    pub fn iter_nodes(&self) -> PlanNodeIterator<'_> {
        PlanNodeIterator::new(&self.root)
    }

    /// Returns true if any node's type matches `node_type`, ignoring case
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.iter_nodes().any(|n| n.is_type(node_type))
    }

    /// Returns the total number of nodes in the plan
    pub fn node_count(&self) -> usize {
        self.iter_nodes().count()
    }
}

/// Renders the plan as an indented tree, one node per line
impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack: Vec<(&PlanNode, String, bool)> = vec![(&self.root, String::new(), true)];
        while let Some((node, indent, is_last)) = stack.pop() {
            let branch = if is_last { "└─ " } else { "├─ " };
            write!(f, "{indent}{branch}{}", node.node_type)?;
            if let Some(relation) = &node.relation_name {
                write!(f, " on {relation}")?;
            }
            if let Some(alias) = &node.alias {
                write!(f, " as {alias}")?;
            }
            write!(f, " (rows={}, cost={})", node.estimated_rows, node.total_cost)?;
            if let Some(filter) = node.filter.as_deref().filter(|s| !s.trim().is_empty()) {
                write!(f, " [filter={filter}]")?;
            }
            if let Some(cond) = node.index_cond.as_deref().filter(|s| !s.trim().is_empty()) {
                write!(f, " [indexCond={cond}]")?;
            }
            writeln!(f)?;

            let child_indent = format!("{indent}{}", if is_last { "   " } else { "│  " });
            let last = node.plans.len().saturating_sub(1);
            for (idx, child) in node.plans.iter().enumerate().rev() {
                stack.push((child, child_indent.clone(), idx == last));
            }
        }
        Ok(())
    }
}

/// Represents a single node in the query plan tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanNode {
    /// Operator name as reported by the engine, e.g. "Seq Scan"
    pub node_type: String,
    pub relation_name: Option<String>,
    pub schema: Option<String>,
    pub alias: Option<String>,
    /// Filter condition applied
    pub filter: Option<String>,
    /// Index condition (for index scans)
    pub index_cond: Option<String>,
    /// Child nodes, in engine order
    pub plans: Vec<PlanNode>,
    /// Planner's row estimate
    pub estimated_rows: f64,
    /// Estimated average row width in bytes
    pub plan_width: u32,
    /// Planner's total cost in abstract cost units
    pub total_cost: f64,
}

impl PlanNode {
    /// Creates a new plan node with the given type
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            relation_name: None,
            schema: None,
            alias: None,
            filter: None,
            index_cond: None,
            plans: Vec::new(),
            estimated_rows: 0.0,
            plan_width: 0,
            total_cost: 0.0,
        }
    }

    /// Sets the relation/table name
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation_name = Some(relation.into());
        self
    }

    /// Sets the alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Sets the estimated rows
    pub fn with_rows(mut self, rows: f64) -> Self {
        self.estimated_rows = rows;
        self
    }

    /// Sets the row width
    pub fn with_width(mut self, width: u32) -> Self {
        self.plan_width = width;
        self
    }

    /// Sets the total cost
    pub fn with_cost(mut self, total_cost: f64) -> Self {
        self.total_cost = total_cost;
        self
    }

    /// Sets the filter condition
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the index condition
    pub fn with_index_cond(mut self, cond: impl Into<String>) -> Self {
        self.index_cond = Some(cond.into());
        self
    }

    /// Adds a child node
    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.plans.push(child);
        self
    }

    /// Lowercased node type, used by every type test in the rules
    pub fn kind(&self) -> String {
        self.node_type.to_lowercase()
    }

    /// Case-insensitive exact match on the node type
    pub fn is_type(&self, node_type: &str) -> bool {
        self.node_type.eq_ignore_ascii_case(node_type)
    }

    /// Case-insensitive substring match on the node type
    pub fn type_contains(&self, fragment: &str) -> bool {
        self.kind().contains(&fragment.to_lowercase())
    }

    /// Returns the maximum depth of this subtree
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            stack.extend(node.plans.iter().map(|c| (c, depth + 1)));
        }
        max
    }

    /// Returns an iterator over this subtree (depth-first, pre-order)
    pub fn iter(&self) -> PlanNodeIterator<'_> {
        PlanNodeIterator::new(self)
    }
}

/// Iterator for traversing plan nodes depth-first
pub struct PlanNodeIterator<'a> {
    stack: Vec<&'a PlanNode>,
}

impl<'a> PlanNodeIterator<'a> {
    fn new(root: &'a PlanNode) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for PlanNodeIterator<'a> {
    type Item = &'a PlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Push children in reverse order so we visit them in order
        for child in node.plans.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests;
