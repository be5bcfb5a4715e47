//! Topological ordering of `RUN_FLOW` steps.
//!
//! The distilled spec fixes the *shape* of flow lowering (recursive
//! sub-context push/pop around each step) but not the step ordering. Steps
//! declare their own dependencies implicitly, through `StepOutput` inputs
//! that name another step's output; this module turns that implicit edge
//! set into an explicit topological order before the builder lowers each
//! step in turn.

use crate::error::BuildError;
use crate::spec::{FlowDef, FlowStepInput};
use std::collections::HashMap;

/// Order a flow's steps so that every step appears after every step whose
/// output it consumes.
pub fn topological_order(flow: &FlowDef) -> Result<Vec<usize>, BuildError> {
    let index_by_name: HashMap<&str, usize> = flow
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    let mut deps: Vec<Vec<usize>> = vec![Vec::new(); flow.steps.len()];
    for (i, step) in flow.steps.iter().enumerate() {
        for input in step.inputs.values() {
            if let FlowStepInput::StepOutput { step: dep_step, .. } = input {
                let dep_idx = index_by_name
                    .get(dep_step.as_str())
                    .copied()
                    .ok_or_else(|| BuildError::UnknownFlowSource(step.name.clone(), dep_step.clone()))?;
                deps[i].push(dep_idx);
            }
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: HashMap<usize, Mark> = HashMap::new();
    let mut order = Vec::with_capacity(flow.steps.len());

    fn visit(
        i: usize,
        deps: &[Vec<usize>],
        marks: &mut HashMap<usize, Mark>,
        order: &mut Vec<usize>,
        names: &[String],
    ) -> Result<(), BuildError> {
        match marks.get(&i) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(BuildError::CyclicFlow(names[i].clone())),
            None => {}
        }
        marks.insert(i, Mark::Visiting);
        for &d in &deps[i] {
            visit(d, deps, marks, order, names)?;
        }
        marks.insert(i, Mark::Done);
        order.push(i);
        Ok(())
    }

    let names: Vec<String> = flow.steps.iter().map(|s| s.name.clone()).collect();
    for i in 0..flow.steps.len() {
        visit(i, &deps, &mut marks, &mut order, &names)?;
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FlowStep;
    use std::collections::HashMap;

    fn step(name: &str, inputs: Vec<(&str, FlowStepInput)>) -> FlowStep {
        FlowStep {
            name: name.to_string(),
            target: "model".to_string(),
            inputs: inputs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            outputs: vec!["out".to_string()],
            parameters: Vec::new(),
        }
    }

    #[test]
    fn linear_flow_orders_a_before_b() {
        let flow = FlowDef {
            steps: vec![
                step("b", vec![("in", FlowStepInput::StepOutput { step: "a".into(), output: "out".into() })]),
                step("a", vec![("in", FlowStepInput::JobInput("x".into()))]),
            ],
            exposed_outputs: HashMap::new(),
        };
        let order = topological_order(&flow).unwrap();
        let pos_a = order.iter().position(|&i| flow.steps[i].name == "a").unwrap();
        let pos_b = order.iter().position(|&i| flow.steps[i].name == "b").unwrap();
        assert!(pos_a < pos_b);
    }

    #[test]
    fn cyclic_flow_is_rejected() {
        let flow = FlowDef {
            steps: vec![
                step("a", vec![("in", FlowStepInput::StepOutput { step: "b".into(), output: "out".into() })]),
                step("b", vec![("in", FlowStepInput::StepOutput { step: "a".into(), output: "out".into() })]),
            ],
            exposed_outputs: HashMap::new(),
        };
        assert!(topological_order(&flow).is_err());
    }
}
