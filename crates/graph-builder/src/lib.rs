//! Lowers a [`JobSpec`] into a fully-formed, acyclic [`Graph`] of
//! [`graph_model::Node`]s.
//!
//! The builder performs no I/O: it only reads the job specification (and any
//! registry entries it references) and produces a graph whose every
//! dependency id resolves inside the same graph. Building the same spec
//! twice yields structurally identical graphs — no wall-clock or random node
//! naming is used anywhere in this crate.
//!
//! # Shape
//!
//! ```text
//! JobSpec --[GraphBuilder::build]--> Graph { nodes, root_id }
//! ```
//!
//! See [`GraphBuilder`] for the seven lowering steps (spec §4.1).

mod builder;
mod error;
mod flow;
mod spec;

pub use builder::GraphBuilder;
pub use error::BuildError;
pub use spec::{
    DataSelector, FlowDef, FlowStep, FlowStepInput, JobSpec, JobType, OutputSelector,
    ParamValue, Registry, TargetSelector,
};

use graph_model::{Node, NodeId};
use std::collections::HashMap;

/// The lowered, acyclic execution graph for one job.
#[derive(Debug, Clone)]
pub struct Graph {
    pub nodes: HashMap<NodeId, Node>,
    pub root_id: NodeId,
}

impl Graph {
    /// Structural validation the builder guarantees on every graph it
    /// returns: every referenced dependency id exists, and the graph is
    /// acyclic (spec invariants 1 and 2).
    pub fn validate(&self) -> Result<(), BuildError> {
        for node in self.nodes.values() {
            for dep in node.dependencies.keys() {
                if !self.nodes.contains_key(dep) {
                    return Err(BuildError::DanglingDependency {
                        node: format!("{:?}", node.id),
                        dependency: format!("{:?}", dep),
                    });
                }
            }
        }
        self.assert_acyclic()
    }

    fn assert_acyclic(&self) -> Result<(), BuildError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }
        let mut marks: HashMap<&NodeId, Mark> = HashMap::new();

        fn visit<'a>(
            id: &'a NodeId,
            nodes: &'a HashMap<NodeId, Node>,
            marks: &mut HashMap<&'a NodeId, Mark>,
        ) -> Result<(), BuildError> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(BuildError::Cycle(format!("{:?}", id)));
                }
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            if let Some(node) = nodes.get(id) {
                for dep in node.dependencies.keys() {
                    visit(dep, nodes, marks)?;
                }
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        for id in self.nodes.keys() {
            visit(id, &self.nodes, &mut marks)?;
        }
        Ok(())
    }
}
